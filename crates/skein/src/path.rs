//! Pure path helpers for module resolution.
//!
//! Module ids are plain strings: absolute filesystem paths for internal
//! modules, bare package names for externals, and NUL-prefixed synthetic ids
//! for plugin-provided virtual modules. Everything here is lexical; no
//! filesystem access happens in this module.

use path_clean::PathClean;
use std::path::{Path, PathBuf};

/// Returns `true` for plugin-provided synthetic ids (NUL-byte prefix).
///
/// Synthetic ids must never reach user-supplied predicates.
pub fn is_synthetic(id: &str) -> bool {
    id.starts_with('\0')
}

/// Returns `true` for specifiers addressed by location rather than by name:
/// `./`, `../`, and absolute paths.
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

/// Directory that contains `id`.
pub fn dirname(id: &str) -> PathBuf {
    Path::new(id)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Join `specifier` onto `base_dir` and normalize `.`/`..` components
/// lexically.
pub fn resolve_from(base_dir: &Path, specifier: &str) -> PathBuf {
    base_dir.join(specifier).clean()
}

/// Canonical id for a specifier that stays external.
///
/// External hints may still be written relative (`./helper`); those are
/// re-anchored at the importer (or the working directory for entries). Bare
/// names pass through untouched.
pub fn resolve_external_specifier(specifier: &str, importer: Option<&str>, cwd: &Path) -> String {
    if !is_relative(specifier) {
        return specifier.to_string();
    }
    let base = match importer {
        Some(importer) => dirname(importer),
        None => cwd.to_path_buf(),
    };
    resolve_from(&base, specifier).to_string_lossy().into_owned()
}

/// Display form of an id, relative to the working directory when possible.
///
/// Used for error and warning context so messages stay stable across
/// machines.
pub fn relative_id(id: &str, cwd: &Path) -> String {
    Path::new(id)
        .strip_prefix(cwd)
        .map(|relative| relative.to_string_lossy().into_owned())
        .unwrap_or_else(|_| id.to_string())
}
