use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ApiError;

/// Recognized configuration options, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Directory holding the markdown notes. Must be absolute.
    pub notes_root: PathBuf,
    /// Directory for the embedded store files. Must be absolute and must
    /// not overlap the notes root.
    pub store_root: PathBuf,
    /// Sentence-embedding model identifier.
    pub embedding_model: String,
    /// Vector dimension; must match the model. Changing either between runs
    /// triggers a model rotation on the next bootstrap.
    pub embedding_dimension: usize,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let bytes = std::fs::read(path).map_err(|error| ApiError::Config {
            message: format!("cannot read config at {}: {error}", path.display()),
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|error| ApiError::Config {
            message: format!("cannot parse config at {}: {error}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if !self.notes_root.is_absolute() {
            return Err(config_error("notesRoot must be an absolute path"));
        }
        if !self.store_root.is_absolute() {
            return Err(config_error("storeRoot must be an absolute path"));
        }
        if self.notes_root.starts_with(&self.store_root)
            || self.store_root.starts_with(&self.notes_root)
        {
            return Err(config_error("notesRoot and storeRoot must not overlap"));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(config_error("embeddingModel must not be empty"));
        }
        if self.embedding_dimension == 0 {
            return Err(config_error("embeddingDimension must be positive"));
        }

        // The notes root must not contain the running application.
        if let Ok(exe) = std::env::current_exe() {
            if let Some(install_dir) = exe.parent() {
                if install_dir.starts_with(&self.notes_root) {
                    return Err(config_error(
                        "notesRoot must not contain the application install directory",
                    ));
                }
            }
        }

        Ok(())
    }
}

fn config_error(message: &str) -> ApiError {
    ApiError::Config {
        message: message.to_string(),
    }
}
