//! Fluent API for building Document instances.

use crate::types::{CustomIcon, FolderId, Note, NoteId, QnmsError, QnmsResult};

use super::Document;

/// Fluent builder for constructing a Document.
///
/// Errors are deferred: a failing step is remembered and reported by
/// [`DocumentBuilder::build`].
pub struct DocumentBuilder {
    doc: Document,
    error: Option<QnmsError>,
}

impl DocumentBuilder {
    /// Start from an empty document.
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            error: None,
        }
    }

    pub fn root(&self) -> FolderId {
        self.doc.root()
    }

    pub fn temp(&self) -> FolderId {
        self.doc.temp()
    }

    pub fn trash(&self) -> FolderId {
        self.doc.trash()
    }

    fn record<T>(&mut self, result: QnmsResult<T>, fallback: T) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                self.error.get_or_insert(e);
                fallback
            }
        }
    }

    /// Add a folder under `parent`.
    pub fn folder(&mut self, parent: FolderId, name: &str) -> FolderId {
        let result = self.doc.create_folder(parent, name);
        let fallback = self.doc.root();
        self.record(result, fallback)
    }

    /// Add an empty note under `parent`.
    pub fn note(&mut self, parent: FolderId, name: &str) -> NoteId {
        self.note_with(parent, Note::new(name))
    }

    /// Add a prepared note under `parent`.
    pub fn note_with(&mut self, parent: FolderId, note: Note) -> NoteId {
        let result = self.doc.add_note(parent, note);
        self.record(result, NoteId(usize::MAX))
    }

    /// Tag a note, creating the tag on first use.
    pub fn tag(&mut self, note: NoteId, tag_name: &str) -> &mut Self {
        let tag = self.doc.create_tag(tag_name);
        let result = self.doc.attach_tag(note, tag).map(|_| ());
        self.record(result, ());
        self
    }

    pub fn bookmark(&mut self, note: NoteId) -> &mut Self {
        let result = self.doc.bookmark(note);
        self.record(result, ());
        self
    }

    pub fn icon(&mut self, name: &str, icon: CustomIcon) -> &mut Self {
        self.doc.icons_mut().insert(name, icon);
        self
    }

    /// zlib level used when the document is saved.
    pub fn compression(&mut self, level: u8) -> &mut Self {
        self.doc.properties_mut().compression_level = level;
        self
    }

    /// Encrypt with `cipher_id` under `password` when saved.
    pub fn cipher(&mut self, cipher_id: u8, password: &str) -> &mut Self {
        let props = self.doc.properties_mut();
        props.cipher_id = cipher_id;
        props.set_password(password);
        self
    }

    /// Direct access for anything the fluent calls do not cover.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Build the final Document.
    pub fn build(self) -> QnmsResult<Document> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.doc),
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemRef;

    #[test]
    fn builds_nested_tree() {
        let mut b = DocumentBuilder::new();
        let root = b.root();
        let a = b.folder(root, "A");
        let n1 = b.note(a, "N1");
        b.tag(n1, "x").tag(n1, "y").bookmark(n1).compression(5);
        let doc = b.build().unwrap();

        assert_eq!(doc.children(root), &[ItemRef::Folder(a)]);
        assert_eq!(doc.children(a), &[ItemRef::Note(n1)]);
        assert_eq!(doc.note(n1).unwrap().tags().len(), 2);
        assert_eq!(doc.bookmarks(), &[n1]);
        assert_eq!(doc.properties().compression_level, 5);
    }

    #[test]
    fn errors_surface_at_build() {
        let mut b = DocumentBuilder::new();
        b.bookmark(NoteId(42));
        assert!(b.build().is_err());
    }
}
