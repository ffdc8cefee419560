//! Builds the data block of a document.

use log::debug;

use crate::graph::Document;
use crate::types::{FolderId, ItemRef, NoteId, TagId, FIRST_ITEM_ID, FIRST_TAG_ID};

use super::boib::MemoryBuffer;
use super::chunk::{begin_block, end_block, write_blob, write_string};
use super::codec::{self, CodecContext};
use super::progress::Progress;
use super::schema::Schema;

/// IDs assigned to every entity for one save.
///
/// Tags count from 1 in registry order. Notes and then user folders share a
/// counter starting at 10; the system folders keep 0, 1 and 2.
pub struct SaveContext<'a> {
    doc: &'a Document,
    tag_ids: Vec<u32>,
    note_ids: Vec<u32>,
    folder_ids: Vec<u32>,
}

impl<'a> SaveContext<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let tag_ids = (0..doc.tag_count() as u32).map(|i| FIRST_TAG_ID + i).collect();
        let mut next = FIRST_ITEM_ID;
        let note_ids = doc
            .notes()
            .map(|_| {
                next += 1;
                next - 1
            })
            .collect();
        let folder_ids = doc
            .folders()
            .map(|(_, f)| match f.kind().system_id() {
                Some(id) => id,
                None => {
                    next += 1;
                    next - 1
                }
            })
            .collect();
        Self {
            doc,
            tag_ids,
            note_ids,
            folder_ids,
        }
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn tag_id(&self, tag: TagId) -> Option<u32> {
        self.tag_ids.get(tag.0).copied()
    }

    pub fn note_id(&self, note: NoteId) -> Option<u32> {
        self.note_ids.get(note.0).copied()
    }

    pub fn folder_id(&self, folder: FolderId) -> Option<u32> {
        self.folder_ids.get(folder.0).copied()
    }

    pub fn item_id(&self, item: ItemRef) -> Option<u32> {
        match item {
            ItemRef::Folder(f) => self.folder_id(f),
            ItemRef::Note(n) => self.note_id(n),
        }
    }

    /// Records written by a full save, for progress reporting.
    fn record_count(&self) -> u64 {
        let doc = self.doc;
        (doc.icons().len() + doc.tag_count() + doc.note_count() + doc.folder_count()) as u64
    }
}

/// Serialize `doc` into an uncompressed, unencrypted data block.
pub fn write_data_block(doc: &Document, schema: &dyn Schema, progress: &mut Progress<'_>) -> Vec<u8> {
    let ids = SaveContext::new(doc);
    let ctx = CodecContext::new(doc.icons(), schema);
    progress.set_total(ids.record_count());
    let mut done = 0u64;
    let mut buf = MemoryBuffer::memory();

    // 1. properties
    let section = begin_block(&mut buf);
    let props = doc.properties();
    buf.write(props.created);
    buf.write(props.modified);
    write_string(&mut buf, ctx.icon_out(&props.default_note_icon, "default note icon"));
    write_string(&mut buf, ctx.icon_out(&props.default_folder_icon, "default folder icon"));
    end_block(&mut buf, section);

    // 2. custom icons
    let section = begin_block(&mut buf);
    for (name, icon) in doc.icons().iter() {
        write_string(&mut buf, name);
        write_blob(&mut buf, &icon.data);
        done += 1;
        progress.report(done);
    }
    end_block(&mut buf, section);

    // 3. tags
    let section = begin_block(&mut buf);
    for (id, tag) in doc.tags() {
        buf.write(ids.tag_ids[id.0]);
        codec::write_tag(&mut buf, tag);
        done += 1;
        progress.report(done);
    }
    end_block(&mut buf, section);

    // 4. notes
    let section = begin_block(&mut buf);
    for (id, note) in doc.notes() {
        buf.write(ids.note_ids[id.0]);
        codec::write_note(&mut buf, note, &ctx);
        done += 1;
        progress.report(done);
    }
    end_block(&mut buf, section);

    // 5. user folders
    let section = begin_block(&mut buf);
    for (id, folder) in doc.user_folders() {
        buf.write(ids.folder_ids[id.0]);
        codec::write_folder(&mut buf, folder, &ctx);
        done += 1;
        progress.report(done);
    }
    end_block(&mut buf, section);

    // 6. hierarchy, system folders included
    let section = begin_block(&mut buf);
    for (id, folder) in doc.folders() {
        let children: Vec<u32> = folder
            .children()
            .iter()
            .filter_map(|c| ids.item_id(*c))
            .collect();
        if children.is_empty() {
            continue;
        }
        buf.write(ids.folder_ids[id.0]);
        buf.write(children.len() as u32);
        for child in children {
            buf.write(child);
        }
    }
    end_block(&mut buf, section);

    // 7. tag ownership
    let section = begin_block(&mut buf);
    for (id, tag) in doc.tags() {
        let owners: Vec<u32> = tag.owners().iter().filter_map(|n| ids.note_id(*n)).collect();
        if owners.is_empty() {
            continue;
        }
        buf.write(ids.tag_ids[id.0]);
        buf.write(owners.len() as u32);
        for owner in owners {
            buf.write(owner);
        }
    }
    end_block(&mut buf, section);

    schema.write_extra_sections(&ids, &mut buf);
    progress.complete();

    let bytes = buf.into_bytes();
    debug!(
        "wrote {} byte data block (format {}): {} notes, {} folders, {} tags",
        bytes.len(),
        schema.version(),
        doc.note_count(),
        doc.folder_count(),
        doc.tag_count()
    );
    bytes
}
