//! qnms: persistence engine for hierarchical note documents.
//!
//! A document is a tree of folders and notes with tags, bookmarks and custom
//! icons. It is stored as a single binary file: a signed, CRC-protected
//! envelope around an optionally compressed and encrypted data block of
//! length-prefixed sections.

pub mod crypto;
pub mod engine;
pub mod format;
pub mod graph;
pub mod types;

// Re-export commonly used types at the crate root
pub use crypto::{BuiltinCipherer, Cipherer, DecryptError, EncryptionKey};
pub use engine::{
    BlockingInteraction, InteractionChannel, InteractionRequest, Job, NoInteraction, Outcome,
    Serializer, SerializerConfig, SerializerEvent, SharedDocument,
};
pub use format::FileInfo;
pub use graph::{Document, DocumentBuilder, DocumentEvent, DocumentProperties};
pub use types::{
    now_secs, Argb, AttachedFile, CustomIcon, FileHeader, Folder, FolderId, FolderKind, FormatVersion,
    IconStore, ItemRef, Note, NoteId, QnmsError, QnmsResult, ResourceImage, Tag, TagId,
    TextDocument, FORMAT_VERSION_1, FORMAT_VERSION_2, LATEST_FORMAT_VERSION,
};
