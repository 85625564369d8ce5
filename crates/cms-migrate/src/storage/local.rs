//! Local directory backend.

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::ObjectStore;
use crate::error::{Error, Result};

/// Writes objects as files below a root directory.
///
/// Headers are not persisted; the CDN in front of the directory is expected
/// to derive them from the extension.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created.
    pub async fn new(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Filesystem path for `key`. Keys may not escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid object key '{key}'"),
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
        _cache_control: &str,
    ) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never see a half-written object.
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
