//! Filesystem artifact store.
//!
//! Accepted reports are stored as `{root}/{subject_id}/{record_id}.md`.
//! Deletion is idempotent: a missing file is not an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the artifact for a record.
    #[must_use]
    pub fn path_for(&self, subject_id: &str, record_id: &str) -> PathBuf {
        self.root
            .join(path_component(subject_id))
            .join(format!("{}.md", path_component(record_id)))
    }

    /// Write the artifact for a record, creating directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` if the file cannot be written.
    pub async fn store(
        &self,
        subject_id: &str,
        record_id: &str,
        contents: &str,
    ) -> Result<PathBuf, DatabaseError> {
        let path = self.path_for(subject_id, record_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// Remove an artifact. Returns `false` when it was already gone.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` for any failure other than a missing file.
    pub async fn delete(&self, path: &Path) -> Result<bool, DatabaseError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_delete_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());

        let path = store.store("vid-1", "ana-00000001", "report").await.unwrap();
        assert_eq!(path, dir.path().join("vid-1").join("ana-00000001.md"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "report");

        assert!(store.delete(&path).await.unwrap());
        assert!(!store.delete(&path).await.unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn path_components_cannot_escape_root() {
        let store = ArtifactStore::new(PathBuf::from("/artifacts"));
        assert_eq!(
            store.path_for("../etc", "a/b"),
            PathBuf::from("/artifacts/.._etc/a_b.md")
        );
        assert_eq!(store.path_for("..", "x"), PathBuf::from("/artifacts/_/x.md"));
    }
}
