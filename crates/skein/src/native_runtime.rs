//! Native [`Runtime`] implementation backed by `std::fs`.
//!
//! Standard library file operations block on the OS. To use them from async
//! code without stalling the executor we run reads in tokio's blocking pool
//! via `task::spawn_blocking`; the metadata probes (`exists`,
//! `canonicalize`) are quick enough to stay on the calling thread.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::runtime::{Runtime, RuntimeError, RuntimeResult};

/// Native filesystem runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    /// Create a new `NativeRuntime` instance.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("failed to read {}: {}", path.display(), e))
                }
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("task join error: {}", e)))?
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        std::fs::canonicalize(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::FileNotFound(path.to_path_buf())
            } else {
                RuntimeError::Io(format!("failed to canonicalize {}: {}", path.display(), e))
            }
        })
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        std::env::current_dir()
            .map_err(|e| RuntimeError::Io(format!("failed to get current working directory: {}", e)))
    }
}
