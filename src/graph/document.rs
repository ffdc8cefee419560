//! The in-memory document: folder tree, notes, tags, bookmarks and icons.

use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::types::{
    now_secs, Folder, FolderId, FolderKind, IconStore, ItemRef, Note, NoteId, QnmsError,
    QnmsResult, Tag, TagId,
};

/// Notification sent to document observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// Something changed; observers should refresh.
    Changed,
    /// An item was placed under a folder.
    ItemAdded { parent: FolderId, item: ItemRef },
    /// A note's fields or tags changed.
    NoteChanged(NoteId),
    /// The whole content was replaced by a load.
    Reloaded,
}

/// Document-wide settings.
#[derive(Clone)]
pub struct DocumentProperties {
    /// Unix seconds.
    pub created: u32,
    pub modified: u32,
    /// Icon name used by notes with an empty `icon_id`.
    pub default_note_icon: String,
    /// Icon name used by folders with an empty `icon_id`.
    pub default_folder_icon: String,
    /// 0 = off, 1..=9 = zlib level used on save.
    pub compression_level: u8,
    /// 0 = not encrypted.
    pub cipher_id: u8,
    password: Option<String>,
}

impl DocumentProperties {
    fn new() -> Self {
        let now = now_secs();
        Self {
            created: now,
            modified: now,
            default_note_icon: String::new(),
            default_folder_icon: String::new(),
            compression_level: 0,
            cipher_id: 0,
            password: None,
        }
    }

    /// In-memory password; never written to disk.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }
}

impl fmt::Debug for DocumentProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProperties")
            .field("created", &self.created)
            .field("modified", &self.modified)
            .field("default_note_icon", &self.default_note_icon)
            .field("default_folder_icon", &self.default_folder_icon)
            .field("compression_level", &self.compression_level)
            .field("cipher_id", &self.cipher_id)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

const ROOT: FolderId = FolderId(0);
const TEMP: FolderId = FolderId(1);
const TRASH: FolderId = FolderId(2);

/// A note collection.
pub struct Document {
    properties: DocumentProperties,
    icons: IconStore,
    /// Indexes 0, 1 and 2 hold the root, temporary and trash folders.
    folders: Vec<Folder>,
    notes: Vec<Note>,
    tags: Vec<Tag>,
    bookmarks: Vec<NoteId>,
    observers: Vec<Sender<DocumentEvent>>,
    bulk_init: bool,
}

impl Document {
    /// An empty document holding only the system folders.
    pub fn new() -> Self {
        Self {
            properties: DocumentProperties::new(),
            icons: IconStore::new(),
            folders: vec![
                Folder::system(FolderKind::Root),
                Folder::system(FolderKind::Temp),
                Folder::system(FolderKind::Trash),
            ],
            notes: Vec::new(),
            tags: Vec::new(),
            bookmarks: Vec::new(),
            observers: Vec::new(),
            bulk_init: false,
        }
    }

    pub fn properties(&self) -> &DocumentProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut DocumentProperties {
        self.emit(DocumentEvent::Changed);
        &mut self.properties
    }

    pub fn icons(&self) -> &IconStore {
        &self.icons
    }

    pub fn icons_mut(&mut self) -> &mut IconStore {
        self.emit(DocumentEvent::Changed);
        &mut self.icons
    }

    pub fn root(&self) -> FolderId {
        ROOT
    }

    pub fn temp(&self) -> FolderId {
        TEMP
    }

    pub fn trash(&self) -> FolderId {
        TRASH
    }

    pub fn folder(&self, id: FolderId) -> Option<&Folder> {
        self.folders.get(id.0)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.0)
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id.0)
    }

    /// Mutable access to a folder's fields.
    pub fn folder_mut(&mut self, id: FolderId) -> Option<&mut Folder> {
        if id.0 < self.folders.len() {
            self.emit(DocumentEvent::Changed);
        }
        self.folders.get_mut(id.0)
    }

    /// Mutable access to a note's fields.
    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        if id.0 < self.notes.len() {
            self.emit(DocumentEvent::NoteChanged(id));
        }
        self.notes.get_mut(id.0)
    }

    /// All notes in creation order.
    pub fn notes(&self) -> impl Iterator<Item = (NoteId, &Note)> {
        self.notes.iter().enumerate().map(|(i, n)| (NoteId(i), n))
    }

    /// All user folders (system folders excluded) in creation order.
    pub fn user_folders(&self) -> impl Iterator<Item = (FolderId, &Folder)> {
        self.folders
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.kind().is_system())
            .map(|(i, f)| (FolderId(i), f))
    }

    /// Every folder, system folders first.
    pub fn folders(&self) -> impl Iterator<Item = (FolderId, &Folder)> {
        self.folders.iter().enumerate().map(|(i, f)| (FolderId(i), f))
    }

    /// All tags in creation order.
    pub fn tags(&self) -> impl Iterator<Item = (TagId, &Tag)> {
        self.tags.iter().enumerate().map(|(i, t)| (TagId(i), t))
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Number of user folders.
    pub fn folder_count(&self) -> usize {
        self.folders.len() - 3
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Children of a folder in display order (empty for unknown folders).
    pub fn children(&self, folder: FolderId) -> &[ItemRef] {
        self.folder(folder).map(Folder::children).unwrap_or(&[])
    }

    /// Parent folder of any item.
    pub fn parent_of(&self, item: ItemRef) -> Option<FolderId> {
        match item {
            ItemRef::Folder(id) => self.folder(id)?.parent(),
            ItemRef::Note(id) => self.note(id)?.parent(),
        }
    }

    /// Create a user folder at the end of `parent`.
    pub fn create_folder(&mut self, parent: FolderId, name: &str) -> QnmsResult<FolderId> {
        self.add_folder(parent, Folder::new(name))
    }

    /// Create a note at the end of `parent`.
    pub fn create_note(&mut self, parent: FolderId, name: &str) -> QnmsResult<NoteId> {
        self.add_note(parent, Note::new(name))
    }

    /// Insert a prepared folder at the end of `parent`.
    pub fn add_folder(&mut self, parent: FolderId, mut folder: Folder) -> QnmsResult<FolderId> {
        self.check_folder(parent)?;
        folder.kind = FolderKind::User;
        folder.parent = None;
        folder.children.clear();
        let id = self.insert_folder_detached(folder);
        self.append_child(parent, ItemRef::Folder(id))?;
        Ok(id)
    }

    /// Insert a prepared note at the end of `parent`.
    pub fn add_note(&mut self, parent: FolderId, mut note: Note) -> QnmsResult<NoteId> {
        self.check_folder(parent)?;
        note.parent = None;
        note.tags.clear();
        note.tag_list_init = false;
        let id = self.insert_note_detached(note);
        self.append_child(parent, ItemRef::Note(id))?;
        Ok(id)
    }

    /// Move an item to the end of another folder.
    pub fn move_item(&mut self, item: ItemRef, new_parent: FolderId) -> QnmsResult<()> {
        self.check_folder(new_parent)?;
        self.check_movable(item, new_parent)?;
        if let Some(old) = self.parent_of(item) {
            self.folders[old.0].children.retain(|c| *c != item);
            self.set_parent(item, None);
        }
        self.append_child(new_parent, item)
    }

    /// The tag called `name`, created if missing.
    pub fn create_tag(&mut self, name: &str) -> TagId {
        if let Some(id) = self.find_tag(name) {
            return id;
        }
        let id = self.insert_tag(Tag::new(name));
        self.emit(DocumentEvent::Changed);
        id
    }

    pub fn find_tag(&self, name: &str) -> Option<TagId> {
        self.tags
            .iter()
            .position(|t| t.name() == name)
            .map(TagId)
    }

    /// Tag a note. Returns false when the note already had the tag.
    pub fn attach_tag(&mut self, note: NoteId, tag: TagId) -> QnmsResult<bool> {
        self.check_note(note)?;
        self.check_tag(tag)?;
        if self.notes[note.0].tags.contains(&tag) {
            return Ok(false);
        }
        self.notes[note.0].tags.push(tag);
        self.tags[tag.0].owners.push(note);
        self.note_tags_changed(note);
        Ok(true)
    }

    /// Untag a note. Returns false when the note did not have the tag.
    pub fn detach_tag(&mut self, note: NoteId, tag: TagId) -> QnmsResult<bool> {
        self.check_note(note)?;
        self.check_tag(tag)?;
        let before = self.notes[note.0].tags.len();
        self.notes[note.0].tags.retain(|t| *t != tag);
        if self.notes[note.0].tags.len() == before {
            return Ok(false);
        }
        self.tags[tag.0].owners.retain(|n| *n != note);
        self.note_tags_changed(note);
        Ok(true)
    }

    /// Bookmarked notes in order.
    pub fn bookmarks(&self) -> &[NoteId] {
        &self.bookmarks
    }

    pub fn is_bookmarked(&self, note: NoteId) -> bool {
        self.bookmarks.contains(&note)
    }

    /// Append a note to the bookmarks. The note stays where it is.
    pub fn bookmark(&mut self, note: NoteId) -> QnmsResult<()> {
        self.check_note(note)?;
        if !self.bookmarks.contains(&note) {
            self.bookmarks.push(note);
            self.emit(DocumentEvent::Changed);
        }
        Ok(())
    }

    pub fn unbookmark(&mut self, note: NoteId) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|n| *n != note);
        let removed = self.bookmarks.len() != before;
        if removed {
            self.emit(DocumentEvent::Changed);
        }
        removed
    }

    /// Receive change notifications.
    pub fn subscribe(&mut self) -> Receiver<DocumentEvent> {
        let (tx, rx) = channel();
        self.observers.push(tx);
        rx
    }

    /// Suppress notifications until [`Document::end_bulk_init`].
    pub fn begin_bulk_init(&mut self) {
        self.bulk_init = true;
    }

    pub fn end_bulk_init(&mut self) {
        self.bulk_init = false;
    }

    pub fn is_bulk_initializing(&self) -> bool {
        self.bulk_init
    }

    /// Take over the content of a freshly loaded document, keeping our observers.
    pub fn replace_contents(&mut self, loaded: Document) {
        let Document {
            properties,
            icons,
            folders,
            notes,
            tags,
            bookmarks,
            ..
        } = loaded;
        self.properties = properties;
        self.icons = icons;
        self.folders = folders;
        self.notes = notes;
        self.tags = tags;
        self.bookmarks = bookmarks;
        self.bulk_init = false;
        self.emit(DocumentEvent::Reloaded);
    }

    pub(crate) fn insert_folder_detached(&mut self, folder: Folder) -> FolderId {
        self.folders.push(folder);
        FolderId(self.folders.len() - 1)
    }

    pub(crate) fn insert_note_detached(&mut self, note: Note) -> NoteId {
        self.notes.push(note);
        NoteId(self.notes.len() - 1)
    }

    pub(crate) fn insert_tag(&mut self, tag: Tag) -> TagId {
        self.tags.push(tag);
        TagId(self.tags.len() - 1)
    }

    pub(crate) fn note_mut_silent(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.get_mut(id.0)
    }

    /// Append a parentless item to `parent`'s children.
    pub(crate) fn append_child(&mut self, parent: FolderId, item: ItemRef) -> QnmsResult<()> {
        self.check_folder(parent)?;
        if self.parent_of(item).is_some() {
            return Err(QnmsError::InvalidOperation(format!(
                "{:?} already has a parent",
                item
            )));
        }
        self.check_movable(item, parent)?;
        self.set_parent(item, Some(parent));
        self.folders[parent.0].children.push(item);
        self.emit(DocumentEvent::ItemAdded { parent, item });
        Ok(())
    }

    fn set_parent(&mut self, item: ItemRef, parent: Option<FolderId>) {
        match item {
            ItemRef::Folder(id) => self.folders[id.0].parent = parent,
            ItemRef::Note(id) => self.notes[id.0].parent = parent,
        }
    }

    /// Items must exist, the root cannot move, and a folder cannot go below itself.
    fn check_movable(&self, item: ItemRef, target: FolderId) -> QnmsResult<()> {
        match item {
            ItemRef::Note(id) => self.check_note(id),
            ItemRef::Folder(id) => {
                self.check_folder(id)?;
                if id == ROOT {
                    return Err(QnmsError::InvalidOperation(
                        "the root folder cannot be moved".into(),
                    ));
                }
                let mut cursor = Some(target);
                while let Some(f) = cursor {
                    if f == id {
                        return Err(QnmsError::InvalidOperation(
                            "a folder cannot be placed inside itself".into(),
                        ));
                    }
                    cursor = self.folders[f.0].parent;
                }
                Ok(())
            }
        }
    }

    fn note_tags_changed(&mut self, note: NoteId) {
        if self.notes[note.0].is_tag_list_initializing() {
            return;
        }
        self.notes[note.0].modified = now_secs();
        self.emit(DocumentEvent::NoteChanged(note));
    }

    fn check_folder(&self, id: FolderId) -> QnmsResult<()> {
        if id.0 < self.folders.len() {
            Ok(())
        } else {
            Err(QnmsError::InvalidOperation(format!("unknown folder {:?}", id)))
        }
    }

    fn check_note(&self, id: NoteId) -> QnmsResult<()> {
        if id.0 < self.notes.len() {
            Ok(())
        } else {
            Err(QnmsError::InvalidOperation(format!("unknown note {:?}", id)))
        }
    }

    fn check_tag(&self, id: TagId) -> QnmsResult<()> {
        if id.0 < self.tags.len() {
            Ok(())
        } else {
            Err(QnmsError::InvalidOperation(format!("unknown tag {:?}", id)))
        }
    }

    fn emit(&mut self, event: DocumentEvent) {
        if self.bulk_init || self.observers.is_empty() {
            return;
        }
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("properties", &self.properties)
            .field("folders", &self.folder_count())
            .field("notes", &self.notes.len())
            .field("tags", &self.tags.len())
            .field("bookmarks", &self.bookmarks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_system_folders() {
        let doc = Document::new();
        assert_eq!(doc.folder(doc.root()).unwrap().kind(), FolderKind::Root);
        assert_eq!(doc.folder(doc.temp()).unwrap().kind(), FolderKind::Temp);
        assert_eq!(doc.folder(doc.trash()).unwrap().kind(), FolderKind::Trash);
        assert_eq!(doc.folder_count(), 0);
        assert_eq!(doc.user_folders().count(), 0);
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_folder(root, "A").unwrap();
        let n = doc.create_note(root, "N").unwrap();
        let b = doc.create_folder(root, "B").unwrap();
        assert_eq!(
            doc.children(root),
            &[ItemRef::Folder(a), ItemRef::Note(n), ItemRef::Folder(b)]
        );
        assert_eq!(doc.parent_of(ItemRef::Note(n)), Some(root));
    }

    #[test]
    fn move_rejects_cycles() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_folder(root, "A").unwrap();
        let b = doc.create_folder(a, "B").unwrap();
        assert!(doc.move_item(ItemRef::Folder(a), b).is_err());
        assert!(doc.move_item(ItemRef::Folder(root), a).is_err());

        doc.move_item(ItemRef::Folder(b), doc.trash()).unwrap();
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(doc.trash()), &[ItemRef::Folder(b)]);
    }

    #[test]
    fn tags_are_symmetric_and_deduplicated() {
        let mut doc = Document::new();
        let n = doc.create_note(doc.root(), "N").unwrap();
        let x = doc.create_tag("x");
        assert_eq!(doc.create_tag("x"), x);
        assert!(doc.attach_tag(n, x).unwrap());
        assert!(!doc.attach_tag(n, x).unwrap());
        assert_eq!(doc.note(n).unwrap().tags(), &[x]);
        assert_eq!(doc.tag(x).unwrap().owners(), &[n]);
        assert!(doc.detach_tag(n, x).unwrap());
        assert!(doc.tag(x).unwrap().owners().is_empty());
    }

    #[test]
    fn tag_init_mode_does_not_touch_note() {
        let mut doc = Document::new();
        let n = doc.create_note(doc.root(), "N").unwrap();
        let x = doc.create_tag("x");
        doc.note_mut(n).unwrap().modified = 5;
        let events = doc.subscribe();

        doc.note_mut_silent(n).unwrap().begin_tag_list_init();
        doc.attach_tag(n, x).unwrap();
        doc.note_mut_silent(n).unwrap().end_tag_list_init();

        assert_eq!(doc.note(n).unwrap().modified, 5);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn bulk_init_suppresses_events() {
        let mut doc = Document::new();
        let events = doc.subscribe();
        doc.begin_bulk_init();
        doc.create_note(doc.root(), "quiet").unwrap();
        assert!(events.try_recv().is_err());
        doc.end_bulk_init();
        doc.create_note(doc.root(), "loud").unwrap();
        assert!(matches!(
            events.try_recv(),
            Ok(DocumentEvent::ItemAdded { .. })
        ));
    }

    #[test]
    fn bookmarks_are_references() {
        let mut doc = Document::new();
        let n = doc.create_note(doc.root(), "N").unwrap();
        doc.bookmark(n).unwrap();
        doc.bookmark(n).unwrap();
        assert_eq!(doc.bookmarks(), &[n]);
        assert_eq!(doc.parent_of(ItemRef::Note(n)), Some(doc.root()));
        assert!(doc.unbookmark(n));
        assert!(!doc.is_bookmarked(n));
    }

    #[test]
    fn password_is_redacted() {
        let mut doc = Document::new();
        doc.properties_mut().set_password("secret");
        let dbg = format!("{:?}", doc.properties());
        assert!(!dbg.contains("secret"));
        assert_eq!(doc.properties().password(), Some("secret"));
    }
}
