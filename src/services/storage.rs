//! Local storage for uploaded contracts.
//!
//! Each upload lands at `<root>/<uuid>.txt` whatever its original extension.
//! Files are never overwritten or deleted.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone, Debug)]
pub struct ContractStore {
    root: PathBuf,
}

impl ContractStore {
    /// Open the store, creating the directory if it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;

        tracing::info!(upload_dir = %root.display(), "Contract store ready");

        Ok(Self { root })
    }

    fn path_for(&self, file_id: Uuid) -> PathBuf {
        self.root.join(format!("{file_id}.txt"))
    }

    /// Persist `bytes` under a fresh identifier.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(&self, bytes: &[u8]) -> Result<Uuid> {
        let file_id = Uuid::new_v4();
        let path = self.path_for(file_id);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.flush().await?;

        debug!(file_id = %file_id, "Stored uploaded contract");
        Ok(file_id)
    }

    /// Read a stored upload back as text.
    ///
    /// Only UTF-8 plain text is supported; a leading byte-order mark is dropped.
    #[instrument(skip(self))]
    pub async fn load_text(&self, file_id: Uuid) -> Result<String, ApiError> {
        let path = self.path_for(file_id);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApiError::NotFound(format!(
                    "no uploaded contract with file_id {file_id}"
                )))
            }
            Err(e) => {
                return Err(ApiError::Internal(
                    anyhow::Error::new(e).context(format!("Failed to read {}", path.display())),
                ))
            }
        };

        let text = String::from_utf8(bytes).map_err(|_| {
            ApiError::UnsupportedDocument(
                "uploaded file is not UTF-8 text; only plain-text contracts can be analyzed"
                    .to_string(),
            )
        })?;

        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }

    /// Check that the upload directory still exists.
    pub async fn health_check(&self) -> Result<()> {
        let meta = fs::metadata(&self.root)
            .await
            .with_context(|| format!("Upload directory {} is missing", self.root.display()))?;
        anyhow::ensure!(meta.is_dir(), "{} is not a directory", self.root.display());
        Ok(())
    }
}
