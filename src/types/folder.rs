//! Folders and the three system folders.

use super::ids::{FolderId, ItemRef};
use super::{now_secs, Argb, ROOT_FOLDER_ID, TEMP_FOLDER_ID, TRASH_FOLDER_ID};

/// Role of a folder in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderKind {
    /// An ordinary user folder.
    User,
    /// Top of the tree.
    Root,
    /// Holds quick notes.
    Temp,
    /// Holds deleted items.
    Trash,
}

impl FolderKind {
    /// Fixed save-time ID of a system folder.
    pub fn system_id(&self) -> Option<u32> {
        match self {
            Self::User => None,
            Self::Root => Some(ROOT_FOLDER_ID),
            Self::Temp => Some(TEMP_FOLDER_ID),
            Self::Trash => Some(TRASH_FOLDER_ID),
        }
    }

    pub fn is_system(&self) -> bool {
        !matches!(self, Self::User)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "folder",
            Self::Root => "root",
            Self::Temp => "temporary",
            Self::Trash => "trash",
        }
    }
}

/// A folder.
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    /// Unix seconds.
    pub created: u32,
    pub modified: u32,
    /// Custom icon name; empty means the document default.
    pub icon_id: String,
    pub foreground: Argb,
    pub background: Argb,
    pub locked: bool,
    pub(crate) kind: FolderKind,
    pub(crate) parent: Option<FolderId>,
    pub(crate) children: Vec<ItemRef>,
}

impl Folder {
    /// A new, detached user folder stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, FolderKind::User)
    }

    pub(crate) fn system(kind: FolderKind) -> Self {
        Self::with_kind(kind.name(), kind)
    }

    fn with_kind(name: impl Into<String>, kind: FolderKind) -> Self {
        let now = now_secs();
        Self {
            name: name.into(),
            created: now,
            modified: now,
            icon_id: String::new(),
            foreground: Argb::DEFAULT,
            background: Argb::DEFAULT,
            locked: false,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> FolderKind {
        self.kind
    }

    pub fn parent(&self) -> Option<FolderId> {
        self.parent
    }

    /// Children in display order.
    pub fn children(&self) -> &[ItemRef] {
        &self.children
    }

    /// Same persisted content, ignoring graph links.
    pub fn same_content(&self, other: &Folder) -> bool {
        self.name == other.name
            && self.created == other.created
            && self.modified == other.modified
            && self.icon_id == other.icon_id
            && self.foreground == other.foreground
            && self.background == other.background
            && self.locked == other.locked
            && self.kind == other.kind
    }
}
