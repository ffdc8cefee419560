//! Record codecs for tags, folders, notes and embedded images.
//!
//! Every record is a block (`[u32 length][fields]`). Readers consume the
//! fields they know and then skip to the declared end, so fields appended by
//! a newer revision are ignored rather than misread.

use log::warn;

use super::boib::{MemoryBuffer, SliceBuffer};
use super::chunk::{
    begin_block, end_block, read_blob, read_string, write_blob, write_string, BlockReader,
};
use super::schema::Schema;
use crate::types::{Argb, Folder, IconStore, Note, QnmsResult, ResourceImage, Tag, TextDocument};

/// What the codecs need beyond the record itself.
#[derive(Clone, Copy)]
pub struct CodecContext<'a> {
    /// Icons known to the document being written or read.
    pub icons: &'a IconStore,
    pub schema: &'a dyn Schema,
}

impl<'a> CodecContext<'a> {
    pub fn new(icons: &'a IconStore, schema: &'a dyn Schema) -> Self {
        Self { icons, schema }
    }

    /// Icon names that do not resolve are written as "default".
    pub(crate) fn icon_out<'s>(&self, icon_id: &'s str, owner: &str) -> &'s str {
        if self.icons.resolves(icon_id) {
            icon_id
        } else {
            warn!(
                "'{}' uses unknown icon '{}'; saving with the default icon",
                owner, icon_id
            );
            ""
        }
    }

    pub(crate) fn icon_in(&self, icon_id: String, owner: &str) -> String {
        if self.icons.resolves(&icon_id) {
            icon_id
        } else {
            warn!(
                "'{}' refers to missing icon '{}'; using the default icon",
                owner, icon_id
            );
            String::new()
        }
    }
}

/// Tag record: name.
pub fn write_tag(buf: &mut MemoryBuffer, tag: &Tag) {
    let at = begin_block(buf);
    write_string(buf, tag.name());
    end_block(buf, at);
}

pub fn read_tag(buf: &mut SliceBuffer<'_>) -> QnmsResult<Tag> {
    let record = BlockReader::open(buf)?;
    let name = read_string(buf)?;
    record.finish(buf)?;
    Ok(Tag::new(name))
}

/// Folder record: name, created, modified, icon, foreground, background, locked.
pub fn write_folder(buf: &mut MemoryBuffer, folder: &Folder, ctx: &CodecContext<'_>) {
    let at = begin_block(buf);
    write_string(buf, &folder.name);
    buf.write(folder.created);
    buf.write(folder.modified);
    write_string(buf, ctx.icon_out(&folder.icon_id, &folder.name));
    buf.write(folder.foreground.0);
    buf.write(folder.background.0);
    buf.write(folder.locked);
    end_block(buf, at);
}

pub fn read_folder(buf: &mut SliceBuffer<'_>, ctx: &CodecContext<'_>) -> QnmsResult<Folder> {
    let record = BlockReader::open(buf)?;
    let mut folder = Folder::new(read_string(buf)?);
    folder.created = buf.read_u32();
    folder.modified = buf.read_u32();
    folder.icon_id = ctx.icon_in(read_string(buf)?, &folder.name);
    folder.foreground = Argb(buf.read_u32());
    folder.background = Argb(buf.read_u32());
    folder.locked = buf.read_bool();
    record.finish(buf)?;
    Ok(folder)
}

/// Note record: name, text, created, modified, text-created (0 = unset),
/// author, source, comment, icon, foreground, background, locked, images,
/// then whatever the schema appends.
pub fn write_note(buf: &mut MemoryBuffer, note: &Note, ctx: &CodecContext<'_>) {
    let at = begin_block(buf);
    write_string(buf, &note.name);
    write_blob(buf, note.text.to_opaque_bytes());
    buf.write(note.created);
    buf.write(note.modified);
    buf.write(note.text_created.unwrap_or(0));
    write_string(buf, &note.author);
    write_string(buf, &note.source);
    write_string(buf, &note.comment);
    write_string(buf, ctx.icon_out(&note.icon_id, &note.name));
    buf.write(note.foreground.0);
    buf.write(note.background.0);
    buf.write(note.locked);
    write_images(buf, &note.text);
    ctx.schema.write_note_extras(note, buf);
    end_block(buf, at);
}

pub fn read_note(buf: &mut SliceBuffer<'_>, ctx: &CodecContext<'_>) -> QnmsResult<Note> {
    let record = BlockReader::open(buf)?;
    let mut note = Note::new(read_string(buf)?);
    note.text.set_opaque_bytes(read_blob(buf)?);
    note.created = buf.read_u32();
    note.modified = buf.read_u32();
    note.text_created = match buf.read_u32() {
        0 => None,
        ts => Some(ts),
    };
    note.author = read_string(buf)?;
    note.source = read_string(buf)?;
    note.comment = read_string(buf)?;
    note.icon_id = ctx.icon_in(read_string(buf)?, &note.name);
    note.foreground = Argb(buf.read_u32());
    note.background = Argb(buf.read_u32());
    note.locked = buf.read_bool();
    read_images(buf, &mut note.text)?;
    ctx.schema.read_note_extras(&mut note, buf)?;
    record.finish(buf)?;
    Ok(note)
}

/// Image sub-record: name, format, data.
pub fn write_image(buf: &mut MemoryBuffer, image: &ResourceImage) {
    let at = begin_block(buf);
    write_string(buf, &image.name);
    write_string(buf, &image.format);
    write_blob(buf, &image.data);
    end_block(buf, at);
}

pub fn read_image(buf: &mut SliceBuffer<'_>) -> QnmsResult<ResourceImage> {
    let record = BlockReader::open(buf)?;
    let name = read_string(buf)?;
    let format = read_string(buf)?;
    let data = read_blob(buf)?;
    record.finish(buf)?;
    Ok(ResourceImage::new(name, format, data))
}

/// `[u32 blockLength]` followed by image sub-records until the length is used up.
// TODO: switch to a count prefix when the major version is bumped; byte-length
// framing is kept for 1.x compatibility.
fn write_images(buf: &mut MemoryBuffer, text: &TextDocument) {
    let block = begin_block(buf);
    for image in text.resources() {
        write_image(buf, image);
    }
    end_block(buf, block);
}

fn read_images(buf: &mut SliceBuffer<'_>, text: &mut TextDocument) -> QnmsResult<()> {
    let block = BlockReader::open(buf)?;
    while block.has_more(buf) {
        text.add_resource(read_image(buf)?);
    }
    block.finish(buf)?;
    Ok(())
}
