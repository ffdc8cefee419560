//! Load failures, user interaction and background jobs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::tempdir;

use qnms::format::boib::MemoryBuffer;
use qnms::format::checksum::crc32;
use qnms::format::chunk::{begin_block, end_block, write_string};
use qnms::format::codec::{write_note, write_tag, CodecContext};
use qnms::format::envelope;
use qnms::format::schema::schema_for;
use qnms::types::CipherHeader;
use qnms::{
    AttachedFile, BlockingInteraction, Document, DocumentBuilder, DocumentEvent, FileHeader, FormatVersion,
    IconStore, InteractionChannel, InteractionRequest, NoInteraction, Note, Outcome, QnmsError,
    Serializer, SerializerEvent, SharedDocument, Tag, FORMAT_VERSION_1, FORMAT_VERSION_2,
};

// ==================== Helpers ====================

/// Records every question and answers from a script.
#[derive(Default)]
struct Scripted {
    passwords: Mutex<VecDeque<Option<String>>>,
    retries: Mutex<Vec<bool>>,
    accept: bool,
    confirmations: Mutex<Vec<String>>,
}

impl Scripted {
    fn passwords(answers: &[Option<&str>]) -> Self {
        Self {
            passwords: Mutex::new(answers.iter().map(|a| a.map(str::to_string)).collect()),
            ..Default::default()
        }
    }

    fn confirming(accept: bool) -> Self {
        Self {
            accept,
            ..Default::default()
        }
    }
}

impl InteractionChannel for Scripted {
    fn request_password(&self, retry: bool) -> Option<String> {
        self.retries.lock().push(retry);
        self.passwords.lock().pop_front().flatten()
    }

    fn confirm(&self, message: &str) -> bool {
        self.confirmations.lock().push(message.to_string());
        self.accept
    }
}

fn sample_document() -> Document {
    let mut b = DocumentBuilder::new();
    let root = b.root();
    let a = b.folder(root, "A");
    let n = b.note(a, "N");
    b.tag(n, "t").bookmark(n);
    b.build().unwrap()
}

fn saved(doc: &Document) -> Vec<u8> {
    Serializer::default()
        .save_to_bytes(doc, None, &mut |_| {})
        .unwrap()
}

/// Recompute the trailing CRC after patching a file image.
fn reseal(bytes: &mut [u8]) {
    let len = bytes.len();
    let crc = crc32(&bytes[..len - 4]);
    bytes[len - 4..].copy_from_slice(&crc.to_le_bytes());
}

/// A format 1.2 file as a newer writer might produce it: the note record,
/// the bookmark section and the data block all carry fields a 1.1 reader
/// does not know.
fn newer_minor_file() -> Vec<u8> {
    let icons = IconStore::new();
    let ctx = CodecContext::new(&icons, schema_for(FORMAT_VERSION_2).unwrap());
    let mut buf = MemoryBuffer::memory();

    let at = begin_block(&mut buf);
    buf.write(100u32);
    buf.write(200u32);
    write_string(&mut buf, "");
    write_string(&mut buf, "");
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    buf.write(1u32);
    write_tag(&mut buf, &Tag::new("t"));
    end_block(&mut buf, at);

    let mut note = Note::new("N");
    note.author = "someone".into();
    note.attachments.push(AttachedFile::new("a.txt", b"abc".to_vec()));
    let mut record = MemoryBuffer::memory();
    write_note(&mut record, &note, &ctx);
    let mut record = record.into_bytes();
    let extra = b"field from 1.2";
    let len = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
    record[..4].copy_from_slice(&(len + extra.len() as u32).to_le_bytes());
    record.extend_from_slice(extra);

    let at = begin_block(&mut buf);
    buf.write(10u32);
    buf.write_bytes(&record);
    buf.write(11u32);
    write_note(&mut buf, &Note::new("after"), &ctx);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    buf.write(0u32);
    buf.write(2u32);
    buf.write(10u32);
    buf.write(11u32);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    buf.write(1u32);
    buf.write(1u32);
    buf.write(10u32);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    buf.write(1u32);
    buf.write(10u32);
    buf.write_bytes(b"bookmark flags");
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    buf.write_bytes(b"a section only 1.2 knows about");
    end_block(&mut buf, at);

    envelope::seal(&FileHeader::plain(0x0102, 0), &buf.into_bytes())
}

fn load(bytes: &[u8], interaction: &dyn InteractionChannel) -> Result<Document, QnmsError> {
    Serializer::default().load_from_bytes(bytes, interaction, &mut |_| {})
}

// ==================== Envelope failures ====================

#[test]
fn test_crc_flip_anywhere_in_data_block_fails() {
    let bytes = saved(&sample_document());
    let info = envelope::inspect(&bytes).unwrap();
    let start = bytes.len() - 4 - info.data_len as usize;
    for i in (start..bytes.len() - 4).step_by(3) {
        let mut bad = bytes.clone();
        bad[i] = bad[i].wrapping_add(1);
        assert!(
            matches!(load(&bad, &NoInteraction), Err(QnmsError::CrcMismatch { .. })),
            "flip at {} not caught",
            i
        );
    }
}

#[test]
fn test_signature_and_truncation() {
    let bytes = saved(&sample_document());
    assert!(matches!(
        load(&bytes[..10], &NoInteraction),
        Err(QnmsError::Truncated)
    ));
    let mut bad = bytes.clone();
    bad[0] = 0x89;
    assert!(matches!(
        load(&bad, &NoInteraction),
        Err(QnmsError::InvalidSignature)
    ));
}

#[test]
fn test_unsupported_cipher_fails() {
    let header = FileHeader {
        version: FormatVersion(qnms::FORMAT_VERSION_2),
        compression_level: 0,
        cipher_id: 42,
        cipher: Some(CipherHeader {
            hash_id: 1,
            secure_hash_id: 1,
            secure_hash: vec![0; 64],
        }),
    };
    let bytes = envelope::seal(&header, b"ciphertext");
    let interaction = Scripted::passwords(&[Some("pw")]);
    assert!(matches!(
        load(&bytes, &interaction),
        Err(QnmsError::UnsupportedCipher(42))
    ));
    assert!(interaction.retries.lock().is_empty());
}

// ==================== Passwords ====================

#[cfg(feature = "encryption")]
fn encrypted_file() -> Vec<u8> {
    let mut doc = sample_document();
    doc.properties_mut().cipher_id = qnms::crypto::CIPHER_AES256_GCM;
    doc.properties_mut().set_password("right");
    saved(&doc)
}

#[cfg(feature = "encryption")]
#[test]
fn test_wrong_password_reprompts_then_cancel_aborts() {
    let interaction = Scripted::passwords(&[Some("wrong"), Some("also wrong"), None]);
    let err = load(&encrypted_file(), &interaction).unwrap_err();
    assert!(err.is_abort(), "expected abort, got {}", err);
    assert_eq!(*interaction.retries.lock(), vec![false, true, true]);
    assert!(matches!(Outcome::from(Err::<(), _>(err)), Outcome::Aborted(_)));
}

#[cfg(feature = "encryption")]
#[test]
fn test_empty_password_aborts() {
    let interaction = Scripted::passwords(&[Some("")]);
    assert!(load(&encrypted_file(), &interaction).unwrap_err().is_abort());
}

#[cfg(feature = "encryption")]
#[test]
fn test_right_password_after_wrong_one() {
    let interaction = Scripted::passwords(&[Some("wrong"), Some("right")]);
    let doc = load(&encrypted_file(), &interaction).unwrap();
    assert_eq!(doc.note_count(), 1);
    assert_eq!(*interaction.retries.lock(), vec![false, true]);
}

#[cfg(feature = "encryption")]
#[test]
fn test_tampered_ciphertext_is_encryption_error() {
    let mut bytes = encrypted_file();
    let len = bytes.len();
    bytes[len - 10] ^= 0xFF;
    reseal(&mut bytes);
    let err = load(&bytes, &Scripted::passwords(&[Some("right")])).unwrap_err();
    assert!(matches!(err, QnmsError::Encryption(_)));
}

// ==================== Versions ====================

#[test]
fn test_newer_minor_version_accepted() {
    let interaction = Scripted::confirming(true);
    let doc = load(&newer_minor_file(), &interaction).unwrap();
    assert_eq!(interaction.confirmations.lock().len(), 1);
    assert_eq!(doc.properties().created, 100);

    let children = doc.children(doc.root());
    assert_eq!(children.len(), 2);
    let first = children[0].as_note().unwrap();
    let note = doc.note(first).unwrap();
    assert_eq!(note.name, "N");
    assert_eq!(note.author, "someone");
    assert_eq!(note.attachment("a.txt").unwrap().data(), b"abc");
    assert_eq!(note.tags().len(), 1);
    assert_eq!(doc.tag(note.tags()[0]).unwrap().name(), "t");
    assert_eq!(doc.bookmarks(), &[first]);

    let second = doc.note(children[1].as_note().unwrap()).unwrap();
    assert_eq!(second.name, "after");
}

#[test]
fn test_newer_minor_version_declined_aborts() {
    let interaction = Scripted::confirming(false);
    let err = load(&newer_minor_file(), &interaction).unwrap_err();
    assert!(err.is_abort());
}

#[test]
fn test_older_major_version_unsupported() {
    let mut bytes = saved(&sample_document());
    bytes[10] = 0x00;
    reseal(&mut bytes);
    assert!(matches!(
        load(&bytes, &NoInteraction),
        Err(QnmsError::UnsupportedVersion(_))
    ));
}

// ==================== Partial corruption ====================

/// A v1 data block with notes 10 and 11 and the given hierarchy records.
fn hand_built_file(hierarchy: &[(u32, &[u32])]) -> Vec<u8> {
    let icons = IconStore::new();
    let ctx = CodecContext::new(&icons, schema_for(FORMAT_VERSION_1).unwrap());
    let mut buf = MemoryBuffer::memory();

    let at = begin_block(&mut buf);
    buf.write(100u32);
    buf.write(200u32);
    write_string(&mut buf, "");
    write_string(&mut buf, "");
    end_block(&mut buf, at);

    for _ in 0..2 {
        let at = begin_block(&mut buf);
        end_block(&mut buf, at);
    }

    let at = begin_block(&mut buf);
    buf.write(10u32);
    write_note(&mut buf, &Note::new("valid"), &ctx);
    buf.write(11u32);
    write_note(&mut buf, &Note::new("second"), &ctx);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    for (parent, children) in hierarchy {
        buf.write(*parent);
        buf.write(children.len() as u32);
        for child in *children {
            buf.write(*child);
        }
    }
    end_block(&mut buf, at);

    let at = begin_block(&mut buf);
    end_block(&mut buf, at);

    envelope::seal(
        &FileHeader::plain(FORMAT_VERSION_1, 0),
        &buf.into_bytes(),
    )
}

#[test]
fn test_missing_child_is_skipped() {
    let _ = env_logger::builder().is_test(true).try_init();
    let doc = load(&hand_built_file(&[(0, &[10, 4242])]), &NoInteraction).unwrap();
    let children = doc.children(doc.root());
    assert_eq!(children.len(), 1);
    let note = doc.note(children[0].as_note().unwrap()).unwrap();
    assert_eq!(note.name, "valid");
    assert_eq!(doc.properties().created, 100);
}

#[test]
fn test_missing_parent_fails_whole_load() {
    let err = load(&hand_built_file(&[(0, &[10]), (4242, &[11])]), &NoInteraction).unwrap_err();
    assert!(matches!(err, QnmsError::Corrupt(_)));
    assert!(err.to_string().starts_with("File corrupted"));
}

// ==================== Background jobs ====================

#[test]
fn test_job_hand_off_busy_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("newer.qnms");
    std::fs::write(&path, newer_minor_file()).unwrap();

    let shared = SharedDocument::new(Document::new());
    let observer = shared.lock().subscribe();
    let serializer = Arc::new(Serializer::default());
    let interaction = Arc::new(BlockingInteraction::new());

    let job = serializer.load(&shared, &path, interaction.clone());

    let request = interaction.wait_request(Duration::from_secs(10)).unwrap();
    assert!(matches!(request, InteractionRequest::Confirmation { .. }));
    assert!(shared.is_busy());
    assert!(shared.lock().is_bulk_initializing());

    let second = serializer.save(&shared, dir.path().join("other.qnms"), None);
    let second_events: Vec<_> = second.events().try_iter().collect();
    assert!(matches!(second.wait(), Outcome::Failed(_)));
    assert!(matches!(second_events.last(), Some(SerializerEvent::Failed(_))));

    assert!(interaction.answer_confirmation(true));
    assert_eq!(job.wait(), Outcome::Finished);
    assert!(!shared.is_busy());

    let doc = shared.lock();
    assert!(!doc.is_bulk_initializing());
    assert_eq!(doc.note_count(), 2);
    assert_eq!(observer.try_iter().last(), Some(DocumentEvent::Reloaded));
}

#[test]
fn test_job_events_end_with_outcome() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.qnms");
    let shared = SharedDocument::new(sample_document());
    let serializer = Arc::new(Serializer::default());

    let job = serializer.save(&shared, &path, None);
    let events: Vec<SerializerEvent> = job.events().iter().collect();
    assert_eq!(events.last(), Some(&SerializerEvent::Finished));
    assert!(events
        .iter()
        .any(|e| matches!(e, SerializerEvent::Progress(100))));
    assert_eq!(job.wait(), Outcome::Finished);

    let reloaded = SharedDocument::default();
    let job = serializer.load(&reloaded, &path, Arc::new(NoInteraction));
    assert_eq!(job.wait(), Outcome::Finished);
    assert_eq!(reloaded.lock().bookmarks().len(), 1);
}

#[test]
fn test_failed_load_keeps_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.qnms");
    let mut bytes = saved(&sample_document());
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let shared = SharedDocument::new(sample_document());
    let serializer = Arc::new(Serializer::default());
    let outcome = serializer
        .load(&shared, &path, Arc::new(NoInteraction))
        .wait();
    assert!(matches!(outcome, Outcome::Failed(ref msg) if msg.contains("CRC")));

    let doc = shared.lock();
    assert_eq!(doc.note_count(), 1);
    assert!(!doc.is_bulk_initializing());
}

#[test]
fn test_declined_version_aborts_job() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("newer.qnms");
    std::fs::write(&path, newer_minor_file()).unwrap();

    let shared = SharedDocument::default();
    let serializer = Arc::new(Serializer::default());
    let outcome = serializer
        .load(&shared, &path, Arc::new(Scripted::confirming(false)))
        .wait();
    assert!(matches!(outcome, Outcome::Aborted(_)));
}
