//! Files handed to an upload session

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unique identifier of an upload item within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(u64);

impl ItemId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        ItemId(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Item-{}", self.0)
    }
}

/// Where the bytes of a file come from
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// A file on the local disk, streamed by the transport
    Path(PathBuf),
    /// An in-memory payload
    Memory(Bytes),
}

/// A file to upload; its name, source and size never change after creation
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    name: String,
    source: FileSource,
    size: u64,
}

impl UploadFile {
    /// Build a file from a local path, reading its size from the filesystem
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(UploadFile {
            name,
            source: FileSource::Path(path.to_path_buf()),
            size: metadata.len(),
        })
    }

    /// Build a file from an in-memory payload
    pub fn from_bytes(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        UploadFile {
            name: name.into(),
            size: payload.len() as u64,
            source: FileSource::Memory(payload),
        }
    }

    /// Build a file with an explicitly declared size.
    ///
    /// The declared size is what the session aggregates, even when the transport
    /// later reports a different number of bytes.
    pub fn with_declared_size(name: impl Into<String>, source: FileSource, size: u64) -> Self {
        UploadFile {
            name: name.into(),
            source,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// One file or many, as accepted by `add_files`
#[derive(Debug, Clone, PartialEq)]
pub struct FileBatch(Vec<UploadFile>);

impl FileBatch {
    pub fn into_files(self) -> Vec<UploadFile> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<UploadFile> for FileBatch {
    fn from(file: UploadFile) -> Self {
        FileBatch(vec![file])
    }
}

impl From<Vec<UploadFile>> for FileBatch {
    fn from(files: Vec<UploadFile>) -> Self {
        FileBatch(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_bytes_uses_payload_length() {
        let file = UploadFile::from_bytes("a.txt", vec![0u8; 42]);
        assert_eq!(file.size(), 42);
        assert_eq!(file.name(), "a.txt");
    }

    #[tokio::test]
    async fn test_from_path_reads_size() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        tmp.flush().unwrap();

        let file = UploadFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.size(), 11);
        assert!(matches!(file.source(), FileSource::Path(_)));
    }

    #[tokio::test]
    async fn test_from_path_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadFile::from_path(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_single_file_is_a_one_element_batch() {
        let batch: FileBatch = UploadFile::from_bytes("a", "abc").into();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_item_id_display() {
        assert_eq!(ItemId::from(7).to_string(), "Item-7");
    }
}
