use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The directory holding one markdown file per document.
pub struct BackupDir {
    root: PathBuf,
}

impl BackupDir {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create backup directory {:?}", root))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<()> {
        let path = self.path(filename);
        fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))
    }

    /// Returns false when the file was already gone.
    pub fn remove(&self, filename: &str) -> Result<bool> {
        let path = self.path(filename);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("{:?} already removed", path);
                Ok(false)
            }
            Err(e) => Err(e).with_context(|| format!("failed to remove {:?}", path)),
        }
    }
}
