//! Length-prefixed framing shared by sections, records and sub-records.
//!
//! A block is `[u32 length][payload]`, where the length counts the payload
//! bytes only. Writers reserve the length and backpatch it once the payload
//! is out; readers skip whatever part of the payload they did not consume,
//! which lets newer files append fields older readers do not know.

use std::io::{Read, Seek, Write};

use log::debug;

use super::boib::BoiBuffer;
use crate::types::error::{QnmsError, QnmsResult};

/// Reserve a length field. Pass the result to [`end_block`].
pub fn begin_block<D: Write + Seek>(buf: &mut BoiBuffer<D>) -> u64 {
    let at = buf.pos();
    buf.write(0u32);
    at
}

/// Backpatch the length reserved at `at` and return to the end of the block.
pub fn end_block<D: Write + Seek>(buf: &mut BoiBuffer<D>, at: u64) -> u32 {
    let end = buf.pos();
    let len = end.saturating_sub(at + 4) as u32;
    buf.seek(at);
    buf.write(len);
    buf.seek(end);
    len
}

/// `[u32 byteLength][utf-8 bytes]`.
pub fn write_string<D: Write + Seek>(buf: &mut BoiBuffer<D>, s: &str) -> usize {
    write_blob(buf, s.as_bytes())
}

/// `[u32 byteLength][bytes]`.
pub fn write_blob<D: Write + Seek>(buf: &mut BoiBuffer<D>, data: &[u8]) -> usize {
    buf.write(data.len() as u32) + buf.write_bytes(data)
}

/// Read a length-prefixed byte string, refusing lengths that overrun the buffer.
pub fn read_blob<D: Read + Seek>(buf: &mut BoiBuffer<D>) -> QnmsResult<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(QnmsError::Corrupt("length field past end of data".into()));
    }
    let len = u64::from(buf.read_u32());
    if len > buf.remaining() {
        return Err(QnmsError::Corrupt(format!(
            "field of {} bytes overruns data ({} left)",
            len,
            buf.remaining()
        )));
    }
    let mut data = vec![0u8; len as usize];
    buf.read_bytes(&mut data);
    Ok(data)
}

/// Read a length-prefixed UTF-8 string (invalid sequences are replaced).
pub fn read_string<D: Read + Seek>(buf: &mut BoiBuffer<D>) -> QnmsResult<String> {
    let bytes = read_blob(buf)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Read side of a length-prefixed block.
#[derive(Debug, Clone, Copy)]
pub struct BlockReader {
    start: u64,
    len: u64,
}

impl BlockReader {
    /// Read the length prefix and remember where the payload starts.
    pub fn open<D: Read + Seek>(buf: &mut BoiBuffer<D>) -> QnmsResult<Self> {
        if buf.remaining() < 4 {
            return Err(QnmsError::Corrupt("block header past end of data".into()));
        }
        let len = u64::from(buf.read_u32());
        let start = buf.pos();
        if len > buf.remaining() {
            return Err(QnmsError::Corrupt(format!(
                "block of {} bytes at offset {} overruns data",
                len, start
            )));
        }
        Ok(Self { start, len })
    }

    /// Declared payload length.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute offset just past the payload.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    /// Payload bytes consumed so far.
    pub fn consumed<D: Seek>(&self, buf: &mut BoiBuffer<D>) -> u64 {
        buf.pos().saturating_sub(self.start)
    }

    /// Whether unread payload remains.
    pub fn has_more<D: Seek>(&self, buf: &mut BoiBuffer<D>) -> bool {
        self.consumed(buf) < self.len
    }

    /// Skip unread payload and land on the next block. Returns bytes skipped.
    pub fn finish<D: Seek>(self, buf: &mut BoiBuffer<D>) -> QnmsResult<u64> {
        let consumed = self.consumed(buf);
        if consumed > self.len {
            return Err(QnmsError::Corrupt(format!(
                "record at offset {} read {} bytes past its declared length {}",
                self.start,
                consumed - self.len,
                self.len
            )));
        }
        let skip = self.len - consumed;
        if skip > 0 {
            debug!(
                "skipping {} unknown trailing bytes in block at offset {}",
                skip, self.start
            );
        }
        buf.seek(self.end());
        Ok(skip)
    }
}
