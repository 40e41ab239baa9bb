//! Cache keys derived from media URIs.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Stable identity of a media resource.
///
/// Built from the canonical form of the URI: parsed with `url`, scheme and
/// host lower-cased, fragment dropped. References that do not parse as URLs
/// fall back to the trimmed input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidKey`] for blank input.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(PlaybackError::InvalidKey(uri.to_string()));
        }

        match Url::parse(trimmed) {
            Ok(mut url) => {
                url.set_fragment(None);
                Ok(Self(url.into()))
            }
            Err(_) => Ok(Self(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Content-addressed file name of the blob holding this resource.
    pub fn blob_name(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("{}.blob", hex::encode(digest))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
