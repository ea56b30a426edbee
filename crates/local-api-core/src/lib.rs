//! Retrieval and mutation surface consumed by the agent.
//!
//! Each operation is a service function over an [`ApiContext`] with typed
//! input and output structs and a structured [`ApiError`]. The context may
//! be degraded — opened without a working store — in which case notes
//! filesystem operations still succeed while everything that touches the
//! store fails fast with `StoreUnavailable`.

pub mod config;
pub mod services;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use embedding::TextEncoder;
use graph_store::{GraphStore, StoreError};
use thiserror::Error;

pub use config::AppConfig;
pub use vault_indexing::SyncReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    PathEscape,
    NotFound,
    AlreadyExists,
    InvalidIdentifier,
    ReservedName,
    DimensionMismatch,
    StoreUnavailable,
    Query,
    Timeout,
    Parse,
    Config,
    Internal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("path escapes the notes root: {path}")]
    PathEscape { path: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("invalid identifier: {identifier:?}")]
    InvalidIdentifier { identifier: String },

    #[error("{name} is a reserved name")]
    ReservedName { name: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("{message}")]
    Query { message: String },

    #[error("operation timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::PathEscape { .. } => ApiErrorKind::PathEscape,
            Self::NotFound { .. } => ApiErrorKind::NotFound,
            Self::AlreadyExists { .. } => ApiErrorKind::AlreadyExists,
            Self::InvalidIdentifier { .. } => ApiErrorKind::InvalidIdentifier,
            Self::ReservedName { .. } => ApiErrorKind::ReservedName,
            Self::DimensionMismatch { .. } => ApiErrorKind::DimensionMismatch,
            Self::StoreUnavailable { .. } => ApiErrorKind::StoreUnavailable,
            Self::Query { .. } => ApiErrorKind::Query,
            Self::Timeout { .. } => ApiErrorKind::Timeout,
            Self::Parse { .. } => ApiErrorKind::Parse,
            Self::Config { .. } => ApiErrorKind::Config,
            Self::Internal { .. } => ApiErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind() {
            ApiErrorKind::PathEscape => "PATH_ESCAPE",
            ApiErrorKind::NotFound => "NOT_FOUND",
            ApiErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ApiErrorKind::InvalidIdentifier => "INVALID_IDENTIFIER",
            ApiErrorKind::ReservedName => "RESERVED_NAME",
            ApiErrorKind::DimensionMismatch => "DIMENSION_MISMATCH",
            ApiErrorKind::StoreUnavailable => "STORE_UNAVAILABLE",
            ApiErrorKind::Query => "QUERY_ERROR",
            ApiErrorKind::Timeout => "TIMEOUT",
            ApiErrorKind::Parse => "PARSE_ERROR",
            ApiErrorKind::Config => "CONFIG_ERROR",
            ApiErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl From<vault::VaultError> for ApiError {
    fn from(error: vault::VaultError) -> Self {
        use vault::VaultError;

        match error {
            VaultError::PathEscape { path } => Self::PathEscape { path },
            VaultError::InvalidTitle { title } => Self::InvalidIdentifier { identifier: title },
            VaultError::AlreadyExists { path } | VaultError::RestoreConflict { path } => {
                Self::AlreadyExists { path }
            }
            VaultError::NotFound { path } => Self::NotFound { what: path },
            VaultError::SourceOverlap { path } => Self::PathEscape { path },
            VaultError::Parse(parse) => Self::Parse {
                message: parse.to_string(),
            },
            VaultError::Io { path, source } => Self::Internal {
                message: format!("io error at {path}: {source}"),
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable { message } => Self::StoreUnavailable { message },
            StoreError::Query { message } => Self::Query { message },
            StoreError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
        }
    }
}

impl From<note_core::ParseError> for ApiError {
    fn from(error: note_core::ParseError) -> Self {
        Self::Parse {
            message: error.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<StoreError>() {
            Ok(store_error) => store_error.into(),
            Err(error) => Self::Internal {
                message: error.to_string(),
            },
        }
    }
}

/// Shared state behind every surface operation.
#[derive(Clone)]
pub struct ApiContext {
    notes_root: PathBuf,
    store: Option<GraphStore>,
    encoder: Arc<dyn TextEncoder>,
}

impl ApiContext {
    /// Build a context. Passing `None` for the store puts the surface in
    /// degraded mode: filesystem operations keep working, store-backed ones
    /// fail fast.
    pub fn new(
        notes_root: PathBuf,
        store: Option<GraphStore>,
        encoder: Arc<dyn TextEncoder>,
    ) -> Self {
        Self {
            notes_root,
            store,
            encoder,
        }
    }

    pub fn notes_root(&self) -> &Path {
        &self.notes_root
    }

    pub fn encoder(&self) -> Arc<dyn TextEncoder> {
        self.encoder.clone()
    }

    /// The store, or `StoreUnavailable` in degraded mode.
    pub fn store(&self) -> Result<&GraphStore, ApiError> {
        self.store.as_ref().ok_or_else(|| ApiError::StoreUnavailable {
            message: "store bootstrap failed; running in degraded mode".to_string(),
        })
    }

    pub(crate) fn try_store(&self) -> Option<&GraphStore> {
        self.store.as_ref()
    }
}

/// Run a retrieval future under an optional caller-supplied deadline.
pub(crate) async fn with_deadline<T, F>(timeout_ms: Option<u64>, future: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), future)
            .await
            .map_err(|_| ApiError::Timeout { timeout_ms: ms })?,
        None => future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_and_codes_line_up() {
        let cases: Vec<(ApiError, ApiErrorKind, &str)> = vec![
            (
                ApiError::PathEscape {
                    path: "x".to_string(),
                },
                ApiErrorKind::PathEscape,
                "PATH_ESCAPE",
            ),
            (
                ApiError::ReservedName {
                    name: "note".to_string(),
                },
                ApiErrorKind::ReservedName,
                "RESERVED_NAME",
            ),
            (
                ApiError::Timeout { timeout_ms: 10 },
                ApiErrorKind::Timeout,
                "TIMEOUT",
            ),
        ];

        for (error, kind, code) in cases {
            assert_eq!(error.kind(), kind);
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn vault_errors_map_to_surface_kinds() {
        let escape: ApiError = vault::VaultError::PathEscape {
            path: "../x".to_string(),
        }
        .into();
        assert_eq!(escape.kind(), ApiErrorKind::PathEscape);

        let conflict: ApiError = vault::VaultError::AlreadyExists {
            path: "A.md".to_string(),
        }
        .into();
        assert_eq!(conflict.kind(), ApiErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn deadline_zero_times_out() {
        let result: Result<(), ApiError> = with_deadline(Some(0), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ApiError::Timeout { .. })));
    }
}
