//! Runtime error types.
//!
//! None of these reach the page: capability load failures abort one batch,
//! render failures become error panels, icon pack failures skip the pack.

/// The rendering capability could not be loaded or initialized.
///
/// Cached by the engine for the rest of the session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityLoadError {
    /// The rendering service did not answer its health check.
    #[error("renderer at {url} is unreachable: {message}")]
    Unreachable { url: String, message: String },

    /// The capability loaded but refused to start.
    #[error("renderer failed to start: {0}")]
    Startup(String),
}

/// A single diagram failed to render.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The request did not complete.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service rejected the diagram.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The diagram text is invalid.
    #[error("{0}")]
    Syntax(String),

    /// The service answered with something that is not a visual.
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// The blocking render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    Task(String),
}

/// An icon pack could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum IconPackError {
    /// The request did not complete or was rejected.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The payload is not an icon set.
    #[error("invalid icon set from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}
