//! Image metadata, as returned by a registry.

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

/// One file which makes up part of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Where the file's bytes are stored. The scheme selects the backend.
    pub location: Url,

    /// The exact number of bytes stored at `location`.
    pub size: u64,
}

impl FileDescriptor {
    /// Create a new file descriptor
    pub fn new(location: Url, size: u64) -> Self {
        Self { location, size }
    }
}

/// An image, made of an ordered list of files.
///
/// The image's bytes are the concatenation of its files' bytes, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Image identifier, unique within its registry.
    #[serde(deserialize_with = "image_id")]
    pub id: String,

    /// The files making up the image, in order.
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}

impl ImageDescriptor {
    /// Create a new image descriptor
    pub fn new(id: impl Into<String>, files: Vec<FileDescriptor>) -> Self {
        Self {
            id: id.into(),
            files,
        }
    }

    /// Total size of the image in bytes, or `None` if it does not fit in a `u64`.
    pub fn size(&self) -> Option<u64> {
        self.files
            .iter()
            .try_fold(0u64, |total, file| total.checked_add(file.size))
    }
}

fn image_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(id) => id,
        Id::Number(id) => id.to_string(),
    })
}
