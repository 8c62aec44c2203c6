//! CLI error types.

use fencepost_config::ConfigError;
use fencepost_page::PageError;
use fencepost_transform::TransformError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Page(#[from] PageError),

    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("{0}")]
    Validation(String),
}
