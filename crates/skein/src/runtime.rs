//! Filesystem runtime abstraction.
//!
//! The loader core never touches `std::fs` directly; it reads sources and
//! probes candidate files through this trait. That keeps the core portable
//! (native, in-memory for tests, eventually WASM hosts) and makes every read
//! an explicit suspension point.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by [`Runtime`] implementations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Any other I/O failure, with a human-readable description.
    #[error("{0}")]
    Io(String),

    /// Failures outside the filesystem proper (task join errors etc.).
    #[error("{0}")]
    Other(String),
}

/// Platform abstraction for the read side of the filesystem.
///
/// `read_file` is async because it is the suspension point the loader's
/// concurrency model is built around. `exists`, `canonicalize` and `get_cwd`
/// are quick metadata operations and stay synchronous.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read the entire contents of a file.
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Resolve symlinks to the canonical on-disk path.
    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf>;

    /// Working directory used to anchor entry-point resolution.
    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}
