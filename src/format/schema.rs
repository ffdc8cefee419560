//! Per-version differences of the data-block layout.
//!
//! Both revisions share every section and record layout; v2 appends an
//! attached-files block to note records and a bookmarks section to the data
//! block. Everything else is in the shared codecs.

use log::warn;

use super::boib::{MemoryBuffer, SliceBuffer};
use super::chunk::{begin_block, end_block, read_blob, read_string, write_blob, write_string, BlockReader};
use super::reader::LoadContext;
use super::writer::SaveContext;
use crate::types::{
    AttachedFile, FormatVersion, Note, QnmsResult, FORMAT_VERSION_1, FORMAT_VERSION_2,
};

/// Version strategy consulted by the record codecs and the orchestrators.
pub trait Schema: Send + Sync {
    fn version(&self) -> FormatVersion;

    /// Write fields that follow the shared note fields.
    fn write_note_extras(&self, note: &Note, buf: &mut MemoryBuffer);

    /// Read fields that follow the shared note fields.
    fn read_note_extras(&self, note: &mut Note, buf: &mut SliceBuffer<'_>) -> QnmsResult<()>;

    /// Write sections that follow tag ownership.
    fn write_extra_sections(&self, ctx: &SaveContext<'_>, buf: &mut MemoryBuffer);

    /// Read sections that follow tag ownership.
    fn read_extra_sections(
        &self,
        ctx: &mut LoadContext,
        buf: &mut SliceBuffer<'_>,
    ) -> QnmsResult<()>;

    /// Whether documents lose data when written with this schema.
    fn drops_data(&self, _ctx: &SaveContext<'_>) -> bool {
        false
    }
}

/// First revision.
pub struct SchemaV1;

/// Second revision: attached files and bookmarks.
pub struct SchemaV2;

static V1: SchemaV1 = SchemaV1;
static V2: SchemaV2 = SchemaV2;

/// Schema for an exact version number.
pub fn schema_for(version: u16) -> Option<&'static dyn Schema> {
    match version {
        FORMAT_VERSION_1 => Some(&V1),
        FORMAT_VERSION_2 => Some(&V2),
        _ => None,
    }
}

impl Schema for SchemaV1 {
    fn version(&self) -> FormatVersion {
        FormatVersion(FORMAT_VERSION_1)
    }

    fn write_note_extras(&self, _note: &Note, _buf: &mut MemoryBuffer) {}

    fn read_note_extras(&self, _note: &mut Note, _buf: &mut SliceBuffer<'_>) -> QnmsResult<()> {
        Ok(())
    }

    fn write_extra_sections(&self, _ctx: &SaveContext<'_>, _buf: &mut MemoryBuffer) {}

    fn read_extra_sections(
        &self,
        _ctx: &mut LoadContext,
        _buf: &mut SliceBuffer<'_>,
    ) -> QnmsResult<()> {
        Ok(())
    }

    fn drops_data(&self, ctx: &SaveContext<'_>) -> bool {
        let doc = ctx.document();
        !doc.bookmarks().is_empty() || doc.notes().any(|(_, n)| !n.attachments.is_empty())
    }
}

impl Schema for SchemaV2 {
    fn version(&self) -> FormatVersion {
        FormatVersion(FORMAT_VERSION_2)
    }

    /// `[u32 blockLength]` then `[u32 len][name][data]` per file.
    fn write_note_extras(&self, note: &Note, buf: &mut MemoryBuffer) {
        let block = begin_block(buf);
        for file in &note.attachments {
            let at = begin_block(buf);
            write_string(buf, &file.name);
            write_blob(buf, file.data());
            end_block(buf, at);
        }
        end_block(buf, block);
    }

    fn read_note_extras(&self, note: &mut Note, buf: &mut SliceBuffer<'_>) -> QnmsResult<()> {
        let block = BlockReader::open(buf)?;
        while block.has_more(buf) {
            let record = BlockReader::open(buf)?;
            let name = read_string(buf)?;
            let data = read_blob(buf)?;
            record.finish(buf)?;
            note.attachments.push(AttachedFile::new(name, data));
        }
        block.finish(buf)?;
        Ok(())
    }

    /// `[u32 count][u32 noteID] x count`, wrapped as a section.
    fn write_extra_sections(&self, ctx: &SaveContext<'_>, buf: &mut MemoryBuffer) {
        let section = begin_block(buf);
        let ids: Vec<u32> = ctx
            .document()
            .bookmarks()
            .iter()
            .filter_map(|n| ctx.note_id(*n))
            .collect();
        buf.write(ids.len() as u32);
        for id in ids {
            buf.write(id);
        }
        end_block(buf, section);
    }

    fn read_extra_sections(
        &self,
        ctx: &mut LoadContext,
        buf: &mut SliceBuffer<'_>,
    ) -> QnmsResult<()> {
        let section = BlockReader::open(buf)?;
        let count = buf.read_u32();
        for _ in 0..count {
            if !section.has_more(buf) {
                warn!("bookmark list shorter than its count of {}", count);
                break;
            }
            let id = buf.read_u32();
            ctx.resolve_bookmark(id)?;
        }
        section.finish(buf)?;
        Ok(())
    }
}
