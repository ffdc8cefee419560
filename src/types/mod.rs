//! All data types for the qnms library.

pub mod error;
pub mod folder;
pub mod header;
pub mod icon;
pub mod ids;
pub mod note;
pub mod tag;

pub use error::{QnmsError, QnmsResult};
pub use folder::{Folder, FolderKind};
pub use header::{CipherHeader, FileHeader, FormatVersion, FIXED_HEADER_SIZE, MIN_FILE_SIZE};
pub use icon::{format_from_name, CustomIcon, IconStore};
pub use ids::{FolderId, ItemRef, NoteId, TagId};
pub use note::{AttachedFile, Note, ResourceImage, TextDocument};
pub use tag::Tag;

/// Magic bytes at the start of every .qnms file (PNG-style).
pub const QNMS_SIGNATURE: [u8; 9] = [0x8A, b'Q', b'N', b'M', b'S', 0x0D, 0x0A, 0x1A, 0x0A];

/// First format revision: no attachments, no bookmarks.
pub const FORMAT_VERSION_1: u16 = 0x0100;

/// Second format revision: adds attached files and bookmarks.
pub const FORMAT_VERSION_2: u16 = 0x0101;

/// The newest version this library writes and reads natively.
pub const LATEST_FORMAT_VERSION: u16 = FORMAT_VERSION_2;

/// Reserved save-time ID of the root folder.
pub const ROOT_FOLDER_ID: u32 = 0;

/// Reserved save-time ID of the temporary ("quick note") folder.
pub const TEMP_FOLDER_ID: u32 = 1;

/// Reserved save-time ID of the trash folder.
pub const TRASH_FOLDER_ID: u32 = 2;

/// First save-time ID handed to ordinary notes and folders (0-9 are reserved).
pub const FIRST_ITEM_ID: u32 = 10;

/// First save-time ID handed to tags.
pub const FIRST_TAG_ID: u32 = 1;

/// Highest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: u8 = 9;

/// Returns the current time as Unix epoch seconds.
pub fn now_secs() -> u32 {
    chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
}

/// Packed 0xAARRGGBB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Argb(pub u32);

impl Argb {
    /// Fully transparent; means "use the view's default color".
    pub const DEFAULT: Argb = Argb(0);

    /// Build a color from its components.
    pub fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(u32::from_be_bytes([a, r, g, b]))
    }

    /// Opaque color from RGB components.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(0xFF, r, g, b)
    }

    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(&self) -> u8 {
        self.0 as u8
    }
}
