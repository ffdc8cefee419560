//! Tags.

use super::ids::NoteId;

/// A named label attached to any number of notes.
#[derive(Debug, Clone)]
pub struct Tag {
    name: String,
    pub(crate) owners: Vec<NoteId>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owners: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Notes carrying this tag, in attach order.
    pub fn owners(&self) -> &[NoteId] {
        &self.owners
    }
}
