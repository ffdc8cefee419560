//! Saving and loading whole documents.
//!
//! Save: data block -> zlib -> cipher -> envelope -> file.
//! Load: file -> envelope (CRC first) -> version check -> password check ->
//! decipher -> inflate -> data block.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use crate::crypto::{BuiltinCipherer, Cipherer, CIPHER_NONE};
use crate::format::boib::{BoiBuffer, OpenMode};
use crate::format::envelope::{self, FileInfo};
use crate::format::mmap::MappedFile;
use crate::format::progress::Progress;
use crate::format::reader::read_data_block;
use crate::format::schema::{schema_for, Schema};
use crate::format::writer::{write_data_block, SaveContext};
use crate::format::compression;
use crate::graph::Document;
use crate::types::{
    CipherHeader, FileHeader, FormatVersion, QnmsError, QnmsResult, LATEST_FORMAT_VERSION,
    MAX_COMPRESSION_LEVEL,
};

use super::config::SerializerConfig;
use super::interaction::InteractionChannel;
use super::job::{BusyGuard, Job, Outcome, SerializerEvent, SharedDocument};

/// Everything a save needs once the document lock is released.
struct PreparedSave {
    version: u16,
    compression_level: u8,
    cipher_id: u8,
    password: Option<String>,
    data: Vec<u8>,
}

/// Reads and writes .qnms files.
pub struct Serializer {
    cipherer: Arc<dyn Cipherer>,
    config: SerializerConfig,
}

impl Serializer {
    /// Serializer with the built-in cipher catalog.
    pub fn new(config: SerializerConfig) -> Self {
        Self::with_cipherer(Arc::new(BuiltinCipherer::new()), config)
    }

    pub fn with_cipherer(cipherer: Arc<dyn Cipherer>, config: SerializerConfig) -> Self {
        Self { cipherer, config }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    pub fn cipherer(&self) -> &dyn Cipherer {
        self.cipherer.as_ref()
    }

    // ---- save ----

    /// Encode a document as a complete file image.
    pub fn save_to_bytes(
        &self,
        doc: &Document,
        version: Option<u16>,
        progress: &mut dyn FnMut(u8),
    ) -> QnmsResult<Vec<u8>> {
        let prepared = self.prepare_save(doc, version, progress)?;
        self.seal(prepared)
    }

    /// Save a document to `path`.
    pub fn save_file(
        &self,
        doc: &Document,
        path: &Path,
        version: Option<u16>,
        progress: &mut dyn FnMut(u8),
    ) -> QnmsResult<()> {
        let bytes = self.save_to_bytes(doc, version, progress)?;
        self.write_file(path, &bytes)
    }

    /// Validate settings and build the data block. This is the only part of a
    /// save that needs the document.
    fn prepare_save(
        &self,
        doc: &Document,
        version: Option<u16>,
        progress: &mut dyn FnMut(u8),
    ) -> QnmsResult<PreparedSave> {
        let version = version.unwrap_or(self.config.default_version);
        let schema = schema_for(version).ok_or(QnmsError::UnsupportedVersion(version))?;

        let props = doc.properties();
        if props.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(QnmsError::InvalidCompressionLevel(props.compression_level));
        }
        let password = if props.cipher_id == CIPHER_NONE {
            None
        } else {
            self.check_cipher_ids(
                props.cipher_id,
                self.config.hash_id,
                self.config.secure_hash_id,
            )?;
            match props.password() {
                Some(p) if !p.is_empty() => Some(p.to_string()),
                _ => {
                    return Err(QnmsError::Encryption(
                        "document is encrypted but has no password".into(),
                    ))
                }
            }
        };

        if schema.drops_data(&SaveContext::new(doc)) {
            warn!(
                "format {} cannot store attached files or bookmarks; they are not saved",
                schema.version()
            );
        }

        let mut progress = Progress::new(progress, 0);
        let data = write_data_block(doc, schema, &mut progress);
        Ok(PreparedSave {
            version,
            compression_level: props.compression_level,
            cipher_id: props.cipher_id,
            password,
            data,
        })
    }

    fn seal(&self, prepared: PreparedSave) -> QnmsResult<Vec<u8>> {
        let PreparedSave {
            version,
            compression_level,
            cipher_id,
            password,
            data,
        } = prepared;
        let plain_len = data.len();
        let compressed = compression::compress(&data, compression_level)?;
        drop(data);

        let (cipher, payload) = match password {
            Some(password) if cipher_id != CIPHER_NONE => {
                let key = self.cipherer.hash(&password, self.config.hash_id)?;
                let check = self
                    .cipherer
                    .secure_hash(&password, self.config.secure_hash_id)?;
                let payload = self.cipherer.encrypt(&compressed, &key, cipher_id)?;
                debug!(
                    "encrypted data block with {}",
                    self.cipherer.cipher_name(cipher_id).unwrap_or("unknown cipher")
                );
                let cipher = CipherHeader {
                    hash_id: self.config.hash_id,
                    secure_hash_id: self.config.secure_hash_id,
                    secure_hash: check,
                };
                (Some(cipher), payload)
            }
            _ => (None, compressed),
        };
        if u32::try_from(payload.len()).is_err() {
            return Err(QnmsError::InvalidOperation(
                "data block larger than 4 GiB".into(),
            ));
        }

        let header = FileHeader {
            version: FormatVersion(version),
            compression_level,
            cipher_id: if cipher.is_some() { cipher_id } else { CIPHER_NONE },
            cipher,
        };
        debug!(
            "sealing format {} file: {} byte data block, {} bytes stored",
            header.version,
            plain_len,
            payload.len()
        );
        Ok(envelope::seal(&header, &payload))
    }

    /// Write a file image, through `<file>.partial` when saves are atomic.
    /// A failed write never leaves a partial file behind.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> QnmsResult<()> {
        let target = if self.config.atomic_save {
            partial_path(path)
        } else {
            path.to_path_buf()
        };
        // Only a file this call created or truncated may be removed on failure.
        let mut created = false;
        let result = File::create(&target)
            .map_err(QnmsError::from)
            .and_then(|file| {
                created = true;
                let mut buf = BoiBuffer::new(file);
                buf.open(OpenMode::WriteOnly);
                write_checked(&mut buf, bytes)?;
                if let Some(file) = buf.into_inner() {
                    file.sync_all()?;
                }
                if target != path {
                    fs::rename(&target, path)?;
                }
                Ok(())
            });
        if let Err(e) = &result {
            warn!("saving {} failed: {}", path.display(), e);
            if created && target.exists() {
                if let Err(rm) = fs::remove_file(&target) {
                    warn!("cannot remove {}: {}", target.display(), rm);
                }
            }
        } else {
            info!("saved {} ({} bytes)", path.display(), bytes.len());
        }
        result
    }

    // ---- load ----

    /// Decode a complete file image.
    pub fn load_from_bytes(
        &self,
        bytes: &[u8],
        interaction: &dyn InteractionChannel,
        progress: &mut dyn FnMut(u8),
    ) -> QnmsResult<Document> {
        let (header, stored) = envelope::open(bytes)?;
        let schema = self.resolve_schema(header.version, interaction)?;

        let (payload, password): (Cow<'_, [u8]>, Option<String>) = if header.is_encrypted() {
            let (plain, password) = self.decrypt(&header, stored, interaction)?;
            (Cow::Owned(plain), Some(password))
        } else {
            (Cow::Borrowed(stored), None)
        };
        let data = if header.compression_level == 0 {
            payload
        } else {
            Cow::Owned(compression::decompress(&payload)?)
        };

        let mut progress = Progress::new(progress, data.len() as u64);
        let mut doc = read_data_block(&data, schema, &mut progress)?;

        let props = doc.properties_mut();
        props.compression_level = header.compression_level;
        props.cipher_id = header.cipher_id;
        if let Some(password) = password {
            props.set_password(password);
        }
        Ok(doc)
    }

    /// Load a document from `path`.
    pub fn load_file(
        &self,
        path: &Path,
        interaction: &dyn InteractionChannel,
        progress: &mut dyn FnMut(u8),
    ) -> QnmsResult<Document> {
        let mapped = MappedFile::open(path)?;
        let doc = self.load_from_bytes(mapped.bytes(), interaction, progress)?;
        info!(
            "loaded {}: {} notes, {} folders, {} tags",
            mapped.path().display(),
            doc.note_count(),
            doc.folder_count(),
            doc.tag_count()
        );
        Ok(doc)
    }

    /// Envelope facts of a file, without asking for a password or parsing records.
    pub fn inspect(&self, path: &Path) -> QnmsResult<FileInfo> {
        MappedFile::open(path)?.info()
    }

    /// Pick the schema for a file version, asking before reading a newer
    /// compatible revision.
    fn resolve_schema(
        &self,
        version: FormatVersion,
        interaction: &dyn InteractionChannel,
    ) -> QnmsResult<&'static dyn Schema> {
        let latest = FormatVersion(LATEST_FORMAT_VERSION);
        if version.major() > latest.major() {
            return Err(QnmsError::NewerVersion { found: version.0 });
        }
        if version.major() < latest.major() {
            return Err(QnmsError::UnsupportedVersion(version.0));
        }
        if let Some(schema) = schema_for(version.0) {
            return Ok(schema);
        }
        let message = format!(
            "This file was created with a newer version of the format ({}). \
             Some data may not load. Continue?",
            version
        );
        if !interaction.confirm(&message) {
            return Err(QnmsError::Aborted(format!(
                "declined to open format {} file",
                version
            )));
        }
        warn!("reading format {} file as format {}", version, latest);
        schema_for(LATEST_FORMAT_VERSION).ok_or(QnmsError::UnsupportedVersion(version.0))
    }

    /// Ask for the password until it matches the stored check value, then
    /// decrypt. An empty or cancelled answer aborts.
    fn decrypt(
        &self,
        header: &FileHeader,
        data: &[u8],
        interaction: &dyn InteractionChannel,
    ) -> QnmsResult<(Vec<u8>, String)> {
        let cipher = header
            .cipher
            .as_ref()
            .ok_or_else(|| QnmsError::Corrupt("encrypted file without password data".into()))?;
        self.check_cipher_ids(header.cipher_id, cipher.hash_id, cipher.secure_hash_id)?;

        let mut retry = false;
        let password = loop {
            let password = match interaction.request_password(retry) {
                Some(p) if !p.is_empty() => p,
                _ => return Err(QnmsError::Aborted("no password given".into())),
            };
            if self.cipherer.secure_hash(&password, cipher.secure_hash_id)? == cipher.secure_hash {
                break password;
            }
            warn!("wrong password; asking again");
            retry = true;
        };

        let key = self.cipherer.hash(&password, cipher.hash_id)?;
        let plain = self.cipherer.decrypt(data, &key, header.cipher_id)?;
        Ok((plain, password))
    }

    fn check_cipher_ids(&self, cipher_id: u8, hash_id: u8, secure_hash_id: u8) -> QnmsResult<()> {
        if !self.cipherer.is_cipher_supported(cipher_id) {
            return Err(QnmsError::UnsupportedCipher(cipher_id));
        }
        if !self.cipherer.is_hash_supported(hash_id) {
            return Err(QnmsError::UnsupportedHash(hash_id));
        }
        if !self.cipherer.is_secure_hash_supported(secure_hash_id) {
            return Err(QnmsError::UnsupportedSecureHash(secure_hash_id));
        }
        Ok(())
    }

    // ---- background jobs ----

    /// Save a shared document on a worker thread.
    ///
    /// The document is locked only while the data block is built.
    pub fn save(
        self: &Arc<Self>,
        shared: &SharedDocument,
        path: impl Into<PathBuf>,
        version: Option<u16>,
    ) -> Job {
        let this = Arc::clone(self);
        let doc = shared.clone();
        let path = path.into();
        spawn_job("qnms-save", shared, move |progress| {
            let prepared = {
                let doc = doc.lock();
                this.prepare_save(&doc, version, progress)?
            };
            let bytes = this.seal(prepared)?;
            this.write_file(&path, &bytes)
        })
    }

    /// Load a file into a shared document on a worker thread.
    ///
    /// The document is in bulk-initialization mode while the file is read
    /// and is replaced only when the whole load succeeds.
    pub fn load(
        self: &Arc<Self>,
        shared: &SharedDocument,
        path: impl Into<PathBuf>,
        interaction: Arc<dyn InteractionChannel>,
    ) -> Job {
        let this = Arc::clone(self);
        let doc = shared.clone();
        let path = path.into();
        spawn_job("qnms-load", shared, move |progress| {
            doc.lock().begin_bulk_init();
            let result = this.load_file(&path, interaction.as_ref(), progress);
            let mut doc = doc.lock();
            match result {
                Ok(loaded) => {
                    doc.replace_contents(loaded);
                    Ok(())
                }
                Err(e) => {
                    doc.end_bulk_init();
                    Err(e)
                }
            }
        })
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(SerializerConfig::default())
    }
}

/// Run `work` on a named thread holding the document's busy guard.
fn spawn_job<F>(name: &str, shared: &SharedDocument, work: F) -> Job
where
    F: FnOnce(&mut dyn FnMut(u8)) -> QnmsResult<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let guard: BusyGuard = match shared.try_begin() {
        Ok(guard) => guard,
        Err(e) => {
            let outcome = Outcome::from(Err::<(), _>(e));
            let _ = tx.send(SerializerEvent::from(outcome.clone()));
            return Job::rejected(rx, outcome);
        }
    };

    let job_name = name.to_string();
    let worker_tx = tx.clone();
    let spawned = thread::Builder::new().name(job_name.clone()).spawn(move || {
        let _guard = guard;
        let progress_tx = worker_tx.clone();
        let mut sink = move |p: u8| {
            let _ = progress_tx.send(SerializerEvent::Progress(p));
        };
        let outcome = Outcome::from(work(&mut sink));
        match &outcome {
            Outcome::Finished => debug!("{} finished", job_name),
            other => info!("{} {}", job_name, other),
        }
        let _ = worker_tx.send(SerializerEvent::from(outcome.clone()));
        outcome
    });

    match spawned {
        Ok(handle) => Job::spawned(rx, handle),
        Err(e) => {
            let outcome = Outcome::Failed(format!("cannot start {}: {}", name, e));
            let _ = tx.send(SerializerEvent::from(outcome.clone()));
            Job::rejected(rx, outcome)
        }
    }
}

/// `<file>.partial` next to `path`.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write all of `bytes` or fail with a short-write error.
fn write_checked<D: Write + Seek>(buf: &mut BoiBuffer<D>, bytes: &[u8]) -> QnmsResult<()> {
    let written = buf.write_bytes(bytes);
    if written != bytes.len() {
        return Err(QnmsError::Io(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: {} of {} bytes", written, bytes.len()),
        )));
    }
    if !buf.flush() {
        return Err(QnmsError::Io(io::Error::new(
            io::ErrorKind::Other,
            "flush failed",
        )));
    }
    Ok(())
}
