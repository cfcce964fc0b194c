//! Unified error type for toolbox: failures that must reach the user.
//!
//! Catalog reads and icon extraction never produce these: they degrade to
//! empty results or a placeholder instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolboxError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Failed to save tool info to {}: {source}", path.display())]
    MetadataWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode tool info: {0}")]
    MetadataEncode(#[from] serde_json::Error),

    #[error("Cannot run tool {}: {reason}", path.display())]
    Launch { path: PathBuf, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ToolboxError {
    /// Process exit code for the CLI front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CategoryNotFound(_) | Self::ToolNotFound(_) => 2,
            Self::Launch { .. } => 3,
            Self::MetadataWrite { .. } | Self::MetadataEncode(_) => 4,
            Self::Config(_) | Self::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolboxError>;
