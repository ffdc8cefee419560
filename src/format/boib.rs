//! Byte-order-independent buffer.
//!
//! All multi-byte integers are stored little-endian whatever the host byte
//! order is. Reads and writes are best effort: they return the number of
//! bytes moved and log instead of failing, so callers may ignore the count
//! and keep their cursor bookkeeping simple.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::warn;

/// Byte order of a (possibly simulated) host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the machine we are running on.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

/// How a buffer's device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    fn readable(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    fn writable(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// A fixed-width value the buffer can move.
pub trait Scalar: Copy + Default {
    /// Width on disk in bytes.
    const SIZE: usize;

    /// Lay the value out the way a host of the given byte order holds it in memory.
    fn to_host_bytes(self, host: Endian, out: &mut [u8]);

    /// Inverse of [`Scalar::to_host_bytes`].
    fn from_host_bytes(host: Endian, bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn to_host_bytes(self, host: Endian, out: &mut [u8]) {
                match host {
                    Endian::Little => out.copy_from_slice(&self.to_le_bytes()),
                    Endian::Big => out.copy_from_slice(&self.to_be_bytes()),
                }
            }

            fn from_host_bytes(host: Endian, bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                match host {
                    Endian::Little => <$t>::from_le_bytes(raw),
                    Endian::Big => <$t>::from_be_bytes(raw),
                }
            }
        }
    )*};
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64);

impl Scalar for bool {
    const SIZE: usize = 1;

    fn to_host_bytes(self, _host: Endian, out: &mut [u8]) {
        out[0] = self as u8;
    }

    fn from_host_bytes(_host: Endian, bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Largest scalar width.
const MAX_SCALAR: usize = 8;

/// In-memory growable buffer.
pub type MemoryBuffer = BoiBuffer<Cursor<Vec<u8>>>;

/// Read-only view over borrowed bytes.
pub type SliceBuffer<'a> = BoiBuffer<Cursor<&'a [u8]>>;

/// Byte-order-independent wrapper over a seekable device.
pub struct BoiBuffer<D> {
    device: Option<D>,
    mode: Option<OpenMode>,
    host: Endian,
}

impl<D> BoiBuffer<D> {
    /// Wrap a device. The buffer starts closed.
    pub fn new(device: D) -> Self {
        Self {
            device: Some(device),
            mode: None,
            host: Endian::native(),
        }
    }

    /// Pretend to run on a host with the given byte order.
    pub fn with_host_endian(mut self, host: Endian) -> Self {
        self.host = host;
        self
    }

    /// Open the device. Fails (returns false) only when there is no device.
    pub fn open(&mut self, mode: OpenMode) -> bool {
        if self.device.is_none() {
            warn!("BoiBuffer::open: no device to open");
            return false;
        }
        self.mode = Some(mode);
        true
    }

    /// Close the buffer; later reads and writes become no-ops.
    pub fn close(&mut self) {
        self.mode = None;
    }

    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.mode.is_some_and(OpenMode::readable)
    }

    pub fn is_writable(&self) -> bool {
        self.mode.is_some_and(OpenMode::writable)
    }

    /// Borrow the underlying device.
    pub fn get_ref(&self) -> Option<&D> {
        self.device.as_ref()
    }

    /// Unwrap the underlying device.
    pub fn into_inner(self) -> Option<D> {
        self.device
    }

    fn readable_device(&mut self) -> Option<&mut D> {
        if !self.is_readable() {
            warn!("BoiBuffer: read on a buffer that is not open for reading");
            return None;
        }
        self.device.as_mut()
    }

    fn writable_device(&mut self) -> Option<&mut D> {
        if !self.is_writable() {
            warn!("BoiBuffer: write on a buffer that is not open for writing");
            return None;
        }
        self.device.as_mut()
    }
}

impl MemoryBuffer {
    /// Empty in-memory buffer, open for reading and writing.
    pub fn memory() -> Self {
        let mut buf = Self::new(Cursor::new(Vec::new()));
        buf.open(OpenMode::ReadWrite);
        buf
    }

    /// Take the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.into_inner().map(Cursor::into_inner).unwrap_or_default()
    }

    /// View the written bytes.
    pub fn bytes(&self) -> &[u8] {
        self.get_ref().map(|c| c.get_ref().as_slice()).unwrap_or(&[])
    }
}

impl<'a> SliceBuffer<'a> {
    /// Read-only buffer over borrowed bytes.
    pub fn reader(data: &'a [u8]) -> Self {
        let mut buf = Self::new(Cursor::new(data));
        buf.open(OpenMode::ReadOnly);
        buf
    }
}

impl BoiBuffer<File> {
    /// Open a file. On failure the buffer is returned closed and a warning is logged.
    pub fn from_path(path: &Path, mode: OpenMode) -> Self {
        let result = match mode {
            OpenMode::ReadOnly => File::open(path),
            OpenMode::WriteOnly => File::create(path),
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path),
        };
        match result {
            Ok(file) => {
                let mut buf = Self::new(file);
                buf.open(mode);
                buf
            }
            Err(e) => {
                warn!("BoiBuffer: cannot open {}: {}", path.display(), e);
                Self {
                    device: None,
                    mode: None,
                    host: Endian::native(),
                }
            }
        }
    }
}

impl<D: Seek> BoiBuffer<D> {
    /// Current absolute position (0 when closed).
    pub fn pos(&mut self) -> u64 {
        if !self.is_open() {
            return 0;
        }
        match self.device.as_mut().map(|d| d.stream_position()) {
            Some(Ok(p)) => p,
            _ => 0,
        }
    }

    /// Move to an absolute position.
    pub fn seek(&mut self, pos: u64) -> bool {
        if !self.is_open() {
            warn!("BoiBuffer: seek on a closed buffer");
            return false;
        }
        match self.device.as_mut().map(|d| d.seek(SeekFrom::Start(pos))) {
            Some(Ok(_)) => true,
            Some(Err(e)) => {
                warn!("BoiBuffer: seek to {} failed: {}", pos, e);
                false
            }
            None => false,
        }
    }

    /// Total size of the device.
    pub fn len(&mut self) -> u64 {
        if !self.is_open() {
            return 0;
        }
        let Some(device) = self.device.as_mut() else {
            return 0;
        };
        let Ok(here) = device.stream_position() else {
            return 0;
        };
        let end = device.seek(SeekFrom::End(0)).unwrap_or(here);
        let _ = device.seek(SeekFrom::Start(here));
        end
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Bytes between the cursor and the end of the device.
    pub fn remaining(&mut self) -> u64 {
        let pos = self.pos();
        self.len().saturating_sub(pos)
    }

    /// Move forward by `n` bytes, clamped to the end. Returns the distance moved.
    pub fn skip(&mut self, n: u64) -> u64 {
        let step = n.min(self.remaining());
        let target = self.pos() + step;
        if self.seek(target) {
            step
        } else {
            0
        }
    }
}

impl<D: Read + Seek> BoiBuffer<D> {
    /// Read one scalar into `out`. Returns bytes read; `out` is zeroed on a short read.
    pub fn read<T: Scalar>(&mut self, out: &mut T) -> usize {
        let host = self.host;
        let mut raw = [0u8; MAX_SCALAR];
        let raw = &mut raw[..T::SIZE];
        let n = self.read_bytes(raw);
        if n < T::SIZE {
            *out = T::default();
            return n;
        }
        if host == Endian::Big {
            raw.reverse();
        }
        *out = T::from_host_bytes(host, raw);
        n
    }

    /// Read one scalar, yielding zero on failure.
    pub fn get<T: Scalar>(&mut self) -> T {
        let mut v = T::default();
        self.read(&mut v);
        v
    }

    pub fn read_u8(&mut self) -> u8 {
        self.get()
    }

    pub fn read_u16(&mut self) -> u16 {
        self.get()
    }

    pub fn read_u32(&mut self) -> u32 {
        self.get()
    }

    pub fn read_u64(&mut self) -> u64 {
        self.get()
    }

    pub fn read_bool(&mut self) -> bool {
        self.get()
    }

    /// Fill `out` as far as the device allows. Returns bytes read.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> usize {
        let Some(device) = self.readable_device() else {
            return 0;
        };
        let mut filled = 0;
        while filled < out.len() {
            match device.read(&mut out[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("BoiBuffer: read failed: {}", e);
                    break;
                }
            }
        }
        if filled < out.len() {
            warn!(
                "BoiBuffer: short read ({} of {} bytes)",
                filled,
                out.len()
            );
        }
        filled
    }
}

impl<D: Write + Seek> BoiBuffer<D> {
    /// Write one scalar. Returns bytes written.
    pub fn write<T: Scalar>(&mut self, value: T) -> usize {
        let host = self.host;
        let mut raw = [0u8; MAX_SCALAR];
        let raw = &mut raw[..T::SIZE];
        value.to_host_bytes(host, raw);
        if host == Endian::Big {
            raw.reverse();
        }
        self.write_bytes(raw)
    }

    /// Write raw bytes. Returns bytes written.
    pub fn write_bytes(&mut self, data: &[u8]) -> usize {
        let Some(device) = self.writable_device() else {
            return 0;
        };
        let mut written = 0;
        while written < data.len() {
            match device.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("BoiBuffer: write failed: {}", e);
                    break;
                }
            }
        }
        written
    }

    /// Flush the device.
    pub fn flush(&mut self) -> bool {
        match self.writable_device().map(|d| d.flush()) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("BoiBuffer: flush failed: {}", e);
                false
            }
            None => false,
        }
    }
}
