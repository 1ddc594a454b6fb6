use std::fmt;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::utils::{content_digest, is_hex_digest};

/// SHA-1 of an uploaded payload, lowercase hex. Doubles as the public id
/// clients use to address that upload again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId(String);

impl ContentId {
    pub fn of(payload: &[u8]) -> Self {
        Self(content_digest(payload))
    }

    /// Accepts only the exact digest shape, so an id can never name a path
    /// outside the storage root.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if is_hex_digest(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AppError::InvalidParameter(format!(
                "'{}' is not a sinogram id",
                raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Params { size: u32, angles: u32 },
    Content(ContentId),
}

impl StorageKey {
    pub fn params(size: u32, angles: u32) -> Self {
        Self::Params { size, angles }
    }

    pub fn dir_name(&self) -> String {
        match self {
            Self::Params { size, angles } => format!("sh_l_size_{}_ang_{}", size, angles),
            Self::Content(id) => id.to_string(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// Maps request parameters onto storage directories. Pure: nothing is
/// created on disk here.
#[derive(Debug, Clone)]
pub struct PathKey {
    root: PathBuf,
}

impl PathKey {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn directory_for_params(&self, size: u32, angles: u32) -> PathBuf {
        self.root.join(StorageKey::params(size, angles).dir_name())
    }

    pub fn directory_for_content(&self, payload: &[u8]) -> (ContentId, PathBuf) {
        let id = ContentId::of(payload);
        let path = self.root.join(id.as_str());
        (id, path)
    }

    pub fn directory_for(&self, key: &StorageKey) -> PathBuf {
        match key {
            StorageKey::Params { size, angles } => self.directory_for_params(*size, *angles),
            StorageKey::Content(id) => self.root.join(id.as_str()),
        }
    }
}
