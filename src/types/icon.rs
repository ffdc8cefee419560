//! Custom icons stored inside a document.

use std::collections::BTreeMap;

/// Image bytes plus a format hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomIcon {
    pub data: Vec<u8>,
    /// File extension style hint, e.g. "png".
    pub format: String,
}

impl CustomIcon {
    pub fn new(data: Vec<u8>, format: impl Into<String>) -> Self {
        Self {
            data,
            format: format.into(),
        }
    }
}

/// Name-keyed icon collection. Notes and folders refer to icons by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconStore {
    icons: BTreeMap<String, CustomIcon>,
}

impl IconStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an icon.
    pub fn insert(&mut self, name: impl Into<String>, icon: CustomIcon) {
        self.icons.insert(name.into(), icon);
    }

    pub fn get(&self, name: &str) -> Option<&CustomIcon> {
        self.icons.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.icons.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<CustomIcon> {
        self.icons.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CustomIcon)> {
        self.icons.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Whether `icon_id` can be written as-is: empty (default) or a known name.
    pub fn resolves(&self, icon_id: &str) -> bool {
        icon_id.is_empty() || self.contains(icon_id)
    }
}

/// Format hint taken from an icon name's extension ("star.PNG" -> "png").
pub fn format_from_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}
