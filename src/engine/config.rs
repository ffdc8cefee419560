//! Serializer settings.

use serde::{Deserialize, Serialize};

use crate::crypto::{HASH_SHA256, SECURE_HASH_SHA512};
use crate::format::schema::schema_for;
use crate::types::{QnmsError, QnmsResult, LATEST_FORMAT_VERSION};

/// Settings that apply to every save and load done by one serializer.
///
/// Per-document settings (compression level, cipher, password) live in
/// [`crate::graph::DocumentProperties`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Format version written when a save does not name one.
    pub default_version: u16,
    /// Key-derivation hash written into new encrypted files.
    pub hash_id: u8,
    /// Password-verification hash written into new encrypted files.
    pub secure_hash_id: u8,
    /// Write to `<file>.partial` and rename over the target.
    pub atomic_save: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            default_version: LATEST_FORMAT_VERSION,
            hash_id: HASH_SHA256,
            secure_hash_id: SECURE_HASH_SHA512,
            atomic_save: true,
        }
    }
}

impl SerializerConfig {
    /// Parse and validate a JSON object. Missing keys take their defaults.
    pub fn from_json(json: &str) -> QnmsResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| QnmsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> QnmsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| QnmsError::Config(e.to_string()))
    }

    pub fn validate(&self) -> QnmsResult<()> {
        if schema_for(self.default_version).is_none() {
            return Err(QnmsError::Config(format!(
                "default_version {:#06x} is not a writable format version",
                self.default_version
            )));
        }
        Ok(())
    }
}
