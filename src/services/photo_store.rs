use image::ImageFormat;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Local staging area for uploaded photos awaiting the worker.
///
/// Staged names are generated here and never derived from client input, so
/// a report's `photo_reference` always resolves inside `root`.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum PhotoStoreError {
    #[error("Photo staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid staged photo name: {0:?}")]
    InvalidName(String),
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under a fresh name and return that name.
    pub async fn stage(&self, bytes: &[u8], format: ImageFormat) -> Result<String, PhotoStoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let name = format!("{}.{}", Uuid::new_v4().simple(), extension);

        tokio::fs::write(self.root.join(&name), bytes).await?;
        Ok(name)
    }

    /// Resolve a staged name to its path.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, PhotoStoreError> {
        let is_plain = !name.is_empty()
            && name != "."
            && !name.contains("..")
            && !name.contains('/')
            && !name.contains('\\');

        if !is_plain {
            return Err(PhotoStoreError::InvalidName(name.to_string()));
        }

        Ok(self.root.join(name))
    }

    /// Remove a staged photo. Already-missing files are not an error.
    pub async fn discard(&self, name: &str) -> Result<(), PhotoStoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_writes_under_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path().join("tmp"));

        let name = store.stage(b"jpeg bytes", ImageFormat::Jpeg).await.unwrap();
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 32 + ".jpg".len());

        let path = store.path_for(&name).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_path_for_rejects_escapes() {
        let store = PhotoStore::new("/srv/uploads");
        for name in ["", ".", "..", "../etc/passwd", "a/b.png", "a\\b.png"] {
            assert!(store.path_for(name).is_err(), "{name:?} should be rejected");
        }
        assert_eq!(
            store.path_for("abc.png").unwrap(),
            PathBuf::from("/srv/uploads/abc.png")
        );
    }

    #[tokio::test]
    async fn test_discard_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());

        let name = store.stage(b"png", ImageFormat::Png).await.unwrap();
        store.discard(&name).await.unwrap();
        assert!(!store.path_for(&name).unwrap().exists());
        store.discard(&name).await.unwrap();
    }
}
