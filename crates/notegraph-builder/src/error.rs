//! Error types for graph construction.

use thiserror::Error;

/// Errors surfaced by a vault provider.
///
/// Per-file failures are caught and tallied by the builder; only a failure
/// to produce the file tree itself aborts a build.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Reading a path failed.
    #[error("failed to read `{path}`: {message}")]
    Read { path: String, message: String },

    /// The requested path does not exist.
    #[error("path not found: `{0}`")]
    NotFound(String),

    /// The provider could not enumerate the workspace.
    #[error("failed to enumerate workspace: {0}")]
    Tree(String),
}
