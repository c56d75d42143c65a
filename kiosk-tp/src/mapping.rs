//! Tag → video mapping store
//!
//! Loaded once at startup from a JSON object of `"<uid>": "<video path>"`
//! pairs and read-only afterwards. A UID without an entry is not an error;
//! the scan is simply ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read tag mapping {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tag mapping {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable table from tag UID to video file path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVideoMapping {
    entries: HashMap<String, PathBuf>,
}

impl TagVideoMapping {
    /// Load the mapping from a JSON file
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let data = std::fs::read(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: HashMap<String, PathBuf> =
            serde_json::from_slice(&data).map_err(|source| MappingError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { entries })
    }

    /// Video path for `uid`, if mapped
    pub fn resolve(&self, uid: &str) -> Option<&Path> {
        self.entries.get(uid).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<PathBuf>> FromIterator<(K, V)> for TagVideoMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(uid, path)| (uid.into(), path.into()))
                .collect(),
        }
    }
}
