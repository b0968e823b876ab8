//! Test utilities shared by downstream test suites.
//!
//! [`MemoryRuntime`] keeps an entire module tree in a hash map so loader
//! tests control the filesystem, the working directory, and symlink layout
//! without touching disk.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::runtime::{Runtime, RuntimeError, RuntimeResult};

/// In-memory filesystem behind the [`Runtime`] trait.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    cwd: PathBuf,
    files: Mutex<FxHashMap<PathBuf, Vec<u8>>>,
    links: Mutex<FxHashMap<PathBuf, PathBuf>>,
}

impl MemoryRuntime {
    /// Create an empty runtime rooted at `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            files: Mutex::new(FxHashMap::default()),
            links: Mutex::new(FxHashMap::default()),
        }
    }

    /// Add a file, builder style.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Add a symlink from `link` to `target`, builder style.
    pub fn with_link(self, link: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        self.links.lock().unwrap().insert(link.into(), target.into());
        self
    }

    /// Add a file after construction.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), content.into());
    }

    fn follow(&self, path: &Path) -> PathBuf {
        let links = self.links.lock().unwrap();
        let mut current = path.to_path_buf();
        // Chains are short in tests; a bounded walk avoids link cycles.
        for _ in 0..8 {
            match links.get(&current) {
                Some(target) => current = target.clone(),
                None => break,
            }
        }
        current
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let target = self.follow(path);
        self.files
            .lock()
            .unwrap()
            .get(&target)
            .cloned()
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let target = self.follow(path);
        self.files.lock().unwrap().contains_key(&target)
    }

    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        let target = self.follow(path);
        if self.files.lock().unwrap().contains_key(&target) {
            Ok(target)
        } else {
            Err(RuntimeError::FileNotFound(path.to_path_buf()))
        }
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}
