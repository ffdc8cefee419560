//! Rebuilds a document from its data block.
//!
//! Records are read flat first, each under the ID it was written with. The
//! hierarchy, tag ownership and bookmark sections are then resolved against
//! those tables. A reference to a missing parent folder or tag is fatal; a
//! reference to a missing child, owner or bookmark drops only that edge.

use std::collections::HashMap;

use log::{debug, warn};

use crate::graph::Document;
use crate::types::{
    format_from_name, CustomIcon, FolderId, ItemRef, QnmsError, QnmsResult, TagId,
    ROOT_FOLDER_ID, TEMP_FOLDER_ID, TRASH_FOLDER_ID,
};

use super::boib::SliceBuffer;
use super::chunk::{read_blob, read_string, BlockReader};
use super::codec::{self, CodecContext};
use super::progress::Progress;
use super::schema::Schema;

/// ID tables and the document under construction for one load.
///
/// The document stays in bulk-initialization mode for the whole load.
pub struct LoadContext {
    doc: Document,
    tags_by_id: HashMap<u32, TagId>,
    items_by_id: HashMap<u32, ItemRef>,
}

impl LoadContext {
    pub fn new() -> Self {
        let mut doc = Document::new();
        doc.begin_bulk_init();
        let mut items_by_id = HashMap::new();
        items_by_id.insert(ROOT_FOLDER_ID, ItemRef::Folder(doc.root()));
        items_by_id.insert(TEMP_FOLDER_ID, ItemRef::Folder(doc.temp()));
        items_by_id.insert(TRASH_FOLDER_ID, ItemRef::Folder(doc.trash()));
        Self {
            doc,
            tags_by_id: HashMap::new(),
            items_by_id,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn register_item(&mut self, id: u32, item: ItemRef) -> QnmsResult<()> {
        if self.items_by_id.insert(id, item).is_some() {
            return Err(QnmsError::Corrupt(format!("item ID {} used twice", id)));
        }
        Ok(())
    }

    fn register_tag(&mut self, id: u32, tag: TagId) -> QnmsResult<()> {
        if self.tags_by_id.insert(id, tag).is_some() {
            return Err(QnmsError::Corrupt(format!("tag ID {} used twice", id)));
        }
        Ok(())
    }

    /// Resolve a hierarchy parent. Unknown IDs and non-folders are fatal.
    fn parent_folder(&self, id: u32) -> QnmsResult<FolderId> {
        match self.items_by_id.get(&id) {
            Some(ItemRef::Folder(f)) => Ok(*f),
            Some(ItemRef::Note(_)) => Err(QnmsError::Corrupt(format!(
                "hierarchy parent {} is a note",
                id
            ))),
            None => Err(QnmsError::Corrupt(format!(
                "hierarchy parent {} does not exist",
                id
            ))),
        }
    }

    /// Place `child_id` at the end of `parent`, skipping edges that cannot hold.
    fn attach_child(&mut self, parent: FolderId, parent_id: u32, child_id: u32) {
        let Some(&item) = self.items_by_id.get(&child_id) else {
            warn!(
                "folder {} lists missing child {}; skipping it",
                parent_id, child_id
            );
            return;
        };
        if let Err(e) = self.doc.append_child(parent, item) {
            warn!(
                "cannot place item {} under folder {}: {}; skipping it",
                child_id, parent_id, e
            );
        }
    }

    /// Add `owner_id` to a tag. Missing or non-note owners are skipped.
    fn attach_owner(&mut self, tag: TagId, tag_id: u32, owner_id: u32) -> QnmsResult<()> {
        let note = match self.items_by_id.get(&owner_id) {
            Some(ItemRef::Note(n)) => *n,
            Some(ItemRef::Folder(_)) => {
                warn!("tag {} lists folder {} as owner; skipping it", tag_id, owner_id);
                return Ok(());
            }
            None => {
                warn!("tag {} lists missing note {}; skipping it", tag_id, owner_id);
                return Ok(());
            }
        };
        if let Some(n) = self.doc.note_mut_silent(note) {
            n.begin_tag_list_init();
        }
        let attached = self.doc.attach_tag(note, tag);
        if let Some(n) = self.doc.note_mut_silent(note) {
            n.end_tag_list_init();
        }
        attached.map(|_| ())
    }

    /// Append a stored bookmark. Unknown or non-note IDs are skipped.
    pub fn resolve_bookmark(&mut self, id: u32) -> QnmsResult<()> {
        match self.items_by_id.get(&id) {
            Some(ItemRef::Note(n)) => self.doc.bookmark(*n),
            _ => {
                warn!("bookmark refers to missing note {}; skipping it", id);
                Ok(())
            }
        }
    }

    fn into_document(mut self) -> Document {
        let orphans = self.doc.notes().filter(|(_, n)| n.parent().is_none()).count()
            + self
                .doc
                .user_folders()
                .filter(|(_, f)| f.parent().is_none())
                .count();
        if orphans > 0 {
            warn!("{} items are not placed in any folder", orphans);
        }
        self.doc.end_bulk_init();
        self.doc
    }
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a decompressed, decrypted data block.
pub fn read_data_block(
    data: &[u8],
    schema: &dyn Schema,
    progress: &mut Progress<'_>,
) -> QnmsResult<Document> {
    let mut buf = SliceBuffer::reader(data);
    let mut ctx = LoadContext::new();
    progress.set_total(data.len() as u64);

    // 1. properties; icon names are resolved once the icons are known
    let section = BlockReader::open(&mut buf)?;
    let created = buf.read_u32();
    let modified = buf.read_u32();
    let note_icon = read_string(&mut buf)?;
    let folder_icon = read_string(&mut buf)?;
    section.finish(&mut buf)?;

    // 2. custom icons
    let section = BlockReader::open(&mut buf)?;
    while section.has_more(&mut buf) {
        let name = read_string(&mut buf)?;
        let data = read_blob(&mut buf)?;
        let format = format_from_name(&name);
        ctx.doc.icons_mut().insert(name, CustomIcon::new(data, format));
        progress.report(buf.pos());
    }
    section.finish(&mut buf)?;

    {
        let codecs = CodecContext::new(ctx.doc.icons(), schema);
        let note_icon = codecs.icon_in(note_icon, "default note icon");
        let folder_icon = codecs.icon_in(folder_icon, "default folder icon");
        let props = ctx.doc.properties_mut();
        props.created = created;
        props.modified = modified;
        props.default_note_icon = note_icon;
        props.default_folder_icon = folder_icon;
    }

    // 3-5. flat records
    let icons = ctx.doc.icons().clone();
    let codecs = CodecContext::new(&icons, schema);

    let section = BlockReader::open(&mut buf)?;
    while section.has_more(&mut buf) {
        let id = buf.read_u32();
        let tag = codec::read_tag(&mut buf)?;
        let handle = ctx.doc.insert_tag(tag);
        ctx.register_tag(id, handle)?;
        progress.report(buf.pos());
    }
    section.finish(&mut buf)?;

    let section = BlockReader::open(&mut buf)?;
    while section.has_more(&mut buf) {
        let id = buf.read_u32();
        let note = codec::read_note(&mut buf, &codecs)?;
        let handle = ctx.doc.insert_note_detached(note);
        ctx.register_item(id, ItemRef::Note(handle))?;
        progress.report(buf.pos());
    }
    section.finish(&mut buf)?;

    let section = BlockReader::open(&mut buf)?;
    while section.has_more(&mut buf) {
        let id = buf.read_u32();
        let folder = codec::read_folder(&mut buf, &codecs)?;
        let handle = ctx.doc.insert_folder_detached(folder);
        ctx.register_item(id, ItemRef::Folder(handle))?;
        progress.report(buf.pos());
    }
    section.finish(&mut buf)?;

    // 6. hierarchy
    let section = BlockReader::open(&mut buf)?;
    while section.has_more(&mut buf) {
        let parent_id = buf.read_u32();
        let parent = ctx.parent_folder(parent_id)?;
        let count = buf.read_u32();
        for _ in 0..count {
            if !section.has_more(&mut buf) {
                return Err(QnmsError::Corrupt(format!(
                    "child list of folder {} is shorter than {}",
                    parent_id, count
                )));
            }
            let child_id = buf.read_u32();
            ctx.attach_child(parent, parent_id, child_id);
        }
        progress.report(buf.pos());
    }
    section.finish(&mut buf)?;

    // 7. tag ownership
    let section = BlockReader::open(&mut buf)?;
    while section.has_more(&mut buf) {
        let tag_id = buf.read_u32();
        let tag = *ctx
            .tags_by_id
            .get(&tag_id)
            .ok_or_else(|| QnmsError::Corrupt(format!("tag {} does not exist", tag_id)))?;
        let count = buf.read_u32();
        for _ in 0..count {
            if !section.has_more(&mut buf) {
                return Err(QnmsError::Corrupt(format!(
                    "owner list of tag {} is shorter than {}",
                    tag_id, count
                )));
            }
            let owner_id = buf.read_u32();
            ctx.attach_owner(tag, tag_id, owner_id)?;
        }
        progress.report(buf.pos());
    }
    section.finish(&mut buf)?;

    schema.read_extra_sections(&mut ctx, &mut buf)?;

    let rest = buf.remaining();
    if rest > 0 {
        debug!("ignoring {} bytes after the last known section", rest);
    }
    progress.complete();

    Ok(ctx.into_document())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::boib::MemoryBuffer;
    use crate::format::chunk::{begin_block, end_block, write_string};
    use crate::format::schema::schema_for;
    use crate::format::writer::write_data_block;
    use crate::graph::DocumentBuilder;
    use crate::types::{Note, FORMAT_VERSION_1, FORMAT_VERSION_2};

    fn quiet() -> impl FnMut(u8) {
        |_| {}
    }

    fn empty_section(buf: &mut MemoryBuffer) {
        let at = begin_block(buf);
        end_block(buf, at);
    }

    /// Data block with two notes (IDs 10 and 11) and the given hierarchy.
    fn hand_built(hierarchy: &[(u32, &[u32])]) -> Vec<u8> {
        let v1 = schema_for(FORMAT_VERSION_1).unwrap();
        let icons = crate::types::IconStore::new();
        let ctx = CodecContext::new(&icons, v1);
        let mut buf = MemoryBuffer::memory();

        let at = begin_block(&mut buf);
        buf.write(1u32);
        buf.write(2u32);
        write_string(&mut buf, "");
        write_string(&mut buf, "");
        end_block(&mut buf, at);

        empty_section(&mut buf);
        empty_section(&mut buf);

        let at = begin_block(&mut buf);
        for (id, name) in [(10u32, "good"), (11, "other")] {
            buf.write(id);
            codec::write_note(&mut buf, &Note::new(name), &ctx);
        }
        end_block(&mut buf, at);

        empty_section(&mut buf);

        let at = begin_block(&mut buf);
        for (parent, children) in hierarchy {
            buf.write(*parent);
            buf.write(children.len() as u32);
            for c in *children {
                buf.write(*c);
            }
        }
        end_block(&mut buf, at);

        empty_section(&mut buf);
        buf.into_bytes()
    }

    fn load_v1(bytes: &[u8]) -> QnmsResult<Document> {
        let mut sink = quiet();
        let mut progress = Progress::new(&mut sink, 0);
        read_data_block(bytes, schema_for(FORMAT_VERSION_1).unwrap(), &mut progress)
    }

    #[test]
    fn missing_child_is_skipped() {
        let doc = load_v1(&hand_built(&[(0, &[10, 999, 11])])).unwrap();
        let names: Vec<&str> = doc
            .children(doc.root())
            .iter()
            .map(|c| doc.note(c.as_note().unwrap()).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["good", "other"]);
        assert!(!doc.is_bulk_initializing());
    }

    #[test]
    fn missing_parent_is_fatal() {
        let err = load_v1(&hand_built(&[(0, &[10]), (777, &[11])])).unwrap_err();
        assert!(matches!(err, QnmsError::Corrupt(_)));
    }

    #[test]
    fn note_as_parent_is_fatal() {
        assert!(load_v1(&hand_built(&[(10, &[11])])).is_err());
    }

    #[test]
    fn second_parent_is_skipped() {
        let doc = load_v1(&hand_built(&[(0, &[10]), (2, &[10, 11])])).unwrap();
        assert_eq!(doc.children(doc.root()).len(), 1);
        assert_eq!(doc.children(doc.trash()).len(), 1);
    }

    #[test]
    fn rebuilds_written_document() {
        let mut b = DocumentBuilder::new();
        let root = b.root();
        let a = b.folder(root, "A");
        let deep = b.folder(a, "B");
        let n1 = b.note(deep, "N1");
        let n2 = b.note(root, "N2");
        b.tag(n1, "x").tag(n1, "y").tag(n2, "y").bookmark(n2);
        let doc = b.build().unwrap();

        let schema = schema_for(FORMAT_VERSION_2).unwrap();
        let mut sink = quiet();
        let mut progress = Progress::new(&mut sink, 0);
        let bytes = write_data_block(&doc, schema, &mut progress);
        let back = read_data_block(&bytes, schema, &mut progress).unwrap();

        let a2 = back.children(back.root())[0].as_folder().unwrap();
        assert_eq!(back.folder(a2).unwrap().name, "A");
        let b2 = back.children(a2)[0].as_folder().unwrap();
        let n1b = back.children(b2)[0].as_note().unwrap();
        let tags: Vec<&str> = back
            .note(n1b)
            .unwrap()
            .tags()
            .iter()
            .map(|t| back.tag(*t).unwrap().name())
            .collect();
        assert_eq!(tags, vec!["x", "y"]);
        let n2b = back.bookmarks()[0];
        assert_eq!(back.note(n2b).unwrap().name, "N2");
        assert_eq!(back.parent_of(ItemRef::Note(n2b)), Some(back.root()));
        assert!(back.note(n1b).unwrap().same_content(doc.note(n1).unwrap()));
    }
}
