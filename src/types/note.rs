//! Notes and the opaque payloads they carry.

use std::sync::OnceLock;

use super::ids::{FolderId, TagId};
use super::{now_secs, Argb};
use crate::format::checksum::crc32;

/// An image embedded in a note's rich text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceImage {
    /// Name the rich text refers to the image by.
    pub name: String,
    /// Format hint, e.g. "png".
    pub format: String,
    pub data: Vec<u8>,
}

impl ResourceImage {
    pub fn new(name: impl Into<String>, format: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            data,
        }
    }
}

/// Rich-text body of a note.
///
/// The persistence layer never looks inside the HTML; it stores the bytes
/// and the embedded images as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDocument {
    html: Vec<u8>,
    resources: Vec<ResourceImage>,
}

impl TextDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_html(html: &str) -> Self {
        Self {
            html: html.as_bytes().to_vec(),
            resources: Vec::new(),
        }
    }

    /// Serialized body.
    pub fn to_opaque_bytes(&self) -> &[u8] {
        &self.html
    }

    /// Replace the body with previously serialized bytes.
    pub fn set_opaque_bytes(&mut self, bytes: Vec<u8>) {
        self.html = bytes;
    }

    /// Names of embedded images, in insertion order.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }

    pub fn resources(&self) -> &[ResourceImage] {
        &self.resources
    }

    /// Format and bytes of a named image.
    pub fn resource(&self, name: &str) -> Option<(&str, &[u8])> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .map(|r| (r.format.as_str(), r.data.as_slice()))
    }

    /// Add an image, replacing any image with the same name.
    pub fn add_resource(&mut self, image: ResourceImage) {
        match self.resources.iter_mut().find(|r| r.name == image.name) {
            Some(existing) => *existing = image,
            None => self.resources.push(image),
        }
    }

    pub fn remove_resource(&mut self, name: &str) -> Option<ResourceImage> {
        let pos = self.resources.iter().position(|r| r.name == name)?;
        Some(self.resources.remove(pos))
    }
}

/// A file attached to a note.
#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub name: String,
    data: Vec<u8>,
    crc: OnceLock<u32>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            crc: OnceLock::new(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// CRC-32 of the contents, computed on first use.
    pub fn crc32(&self) -> u32 {
        *self.crc.get_or_init(|| crc32(&self.data))
    }
}

impl PartialEq for AttachedFile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data == other.data
    }
}

impl Eq for AttachedFile {}

/// A note.
#[derive(Debug, Clone)]
pub struct Note {
    pub name: String,
    pub text: TextDocument,
    /// Unix seconds.
    pub created: u32,
    pub modified: u32,
    /// When the text was first written, if known.
    pub text_created: Option<u32>,
    pub author: String,
    pub source: String,
    pub comment: String,
    /// Custom icon name; empty means the document default.
    pub icon_id: String,
    pub foreground: Argb,
    pub background: Argb,
    pub locked: bool,
    pub attachments: Vec<AttachedFile>,
    pub(crate) parent: Option<FolderId>,
    pub(crate) tags: Vec<TagId>,
    pub(crate) tag_list_init: bool,
}

impl Note {
    /// A new, detached note stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_secs();
        Self {
            name: name.into(),
            text: TextDocument::new(),
            created: now,
            modified: now,
            text_created: None,
            author: String::new(),
            source: String::new(),
            comment: String::new(),
            icon_id: String::new(),
            foreground: Argb::DEFAULT,
            background: Argb::DEFAULT,
            locked: false,
            attachments: Vec::new(),
            parent: None,
            tags: Vec::new(),
            tag_list_init: false,
        }
    }

    /// Folder holding this note.
    pub fn parent(&self) -> Option<FolderId> {
        self.parent
    }

    /// Tags on this note, in the order they were attached.
    pub fn tags(&self) -> &[TagId] {
        &self.tags
    }

    /// True while tags are being restored from a file; tag changes then do
    /// not count as edits.
    pub fn is_tag_list_initializing(&self) -> bool {
        self.tag_list_init
    }

    pub(crate) fn begin_tag_list_init(&mut self) {
        self.tag_list_init = true;
    }

    pub(crate) fn end_tag_list_init(&mut self) {
        self.tag_list_init = false;
    }

    pub fn attachment(&self, name: &str) -> Option<&AttachedFile> {
        self.attachments.iter().find(|a| a.name == name)
    }

    /// Same persisted content, ignoring graph links.
    pub fn same_content(&self, other: &Note) -> bool {
        self.name == other.name
            && self.text == other.text
            && self.created == other.created
            && self.modified == other.modified
            && self.text_created == other.text_created
            && self.author == other.author
            && self.source == other.source
            && self.comment == other.comment
            && self.icon_id == other.icon_id
            && self.foreground == other.foreground
            && self.background == other.background
            && self.locked == other.locked
            && self.attachments == other.attachments
    }
}
