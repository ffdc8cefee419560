//! Handles into a document's entity tables.
//!
//! Handles are only meaningful for the document that issued them. They are
//! not the numeric IDs written to disk; those are assigned per save.

/// Handle of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(pub(crate) usize);

/// Handle of a folder (system folders included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderId(pub(crate) usize);

/// Handle of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub(crate) usize);

/// A folder child: either a folder or a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Folder(FolderId),
    Note(NoteId),
}

impl ItemRef {
    pub fn as_folder(&self) -> Option<FolderId> {
        match self {
            Self::Folder(id) => Some(*id),
            Self::Note(_) => None,
        }
    }

    pub fn as_note(&self) -> Option<NoteId> {
        match self {
            Self::Note(id) => Some(*id),
            Self::Folder(_) => None,
        }
    }
}

impl From<FolderId> for ItemRef {
    fn from(id: FolderId) -> Self {
        Self::Folder(id)
    }
}

impl From<NoteId> for ItemRef {
    fn from(id: NoteId) -> Self {
        Self::Note(id)
    }
}
