//! # skein
//!
//! Skein foundation crate - runtime abstraction and path utilities.
//!
//! This crate provides the platform seam the loader core is written against:
//! a [`Runtime`] trait for filesystem access plus the pure path helpers used
//! during module resolution. The graph and loading machinery lives in the
//! `skein-graph` crate; the plugin surface lives in `skein-plugin`.

pub mod path;
pub mod runtime;

#[cfg(not(target_family = "wasm"))]
pub mod native_runtime;
#[cfg(not(target_family = "wasm"))]
pub use native_runtime::NativeRuntime;

// Test utilities (in-memory runtime); opt-in so production builds stay lean.
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use runtime::{Runtime, RuntimeError, RuntimeResult};
