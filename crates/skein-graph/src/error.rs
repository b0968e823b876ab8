//! Fatal loader errors.
//!
//! Each failure mode has its own variant; the stable code strings hosts
//! dispatch on are exposed through `miette::Diagnostic::code`.

use thiserror::Error;

/// Result type alias for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Fatal errors raised during module loading.
///
/// Fatal errors abort the batch that produced them; warnings are routed
/// through [`crate::Warnings`] instead and never appear here.
#[derive(Debug, Error)]
pub enum LoadError {
    /// An entry specifier did not resolve to anything.
    #[error("could not resolve entry module \"{specifier}\"")]
    UnresolvedEntry { specifier: String },

    /// An entry resolved to an external module.
    #[error("entry module \"{specifier}\" cannot be external")]
    EntryCannotBeExternal { specifier: String },

    /// A relative import did not resolve.
    #[error("could not resolve \"{specifier}\" from {importer}")]
    UnresolvedImport { specifier: String, importer: String },

    /// The loader produced something that could not be coerced to source
    /// text.
    #[error("error loading \"{id}\": loader did not return a string")]
    BadLoader { id: String },

    /// A plugin marked an id external after it was already registered as an
    /// internal module.
    #[error(
        "\"{specifier}\" is imported as an external by \"{importer}\", but is already an existing non-external module id"
    )]
    InternalIdCannotBeExternal { specifier: String, importer: String },

    /// A module was assigned to two different manual chunks.
    #[error(
        "cannot assign \"{id}\" to the \"{alias}\" chunk as it is already in the \"{previous}\" chunk"
    )]
    CannotAssignModuleToChunk {
        id: String,
        alias: String,
        previous: String,
    },

    /// Loading a module's source failed; carries the importer context.
    #[error("could not load {id}{}: {message}", import_context(.importer))]
    CouldNotLoad {
        id: String,
        importer: Option<String>,
        message: String,
    },

    /// A plugin hook or the transformer failed.
    #[error("{0}")]
    Plugin(anyhow::Error),

    /// Host-environment failure (working directory lookup and the like).
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<anyhow::Error> for LoadError {
    fn from(error: anyhow::Error) -> Self {
        Self::Plugin(error)
    }
}

fn import_context(importer: &Option<String>) -> String {
    match importer {
        Some(importer) => format!(" (imported by {})", importer),
        None => String::new(),
    }
}

impl miette::Diagnostic for LoadError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        let code = match self {
            Self::UnresolvedEntry { .. } => "UNRESOLVED_ENTRY",
            Self::EntryCannotBeExternal { .. } => "ENTRY_CANNOT_BE_EXTERNAL",
            Self::UnresolvedImport { .. } => "UNRESOLVED_IMPORT",
            Self::BadLoader { .. } => "BAD_LOADER",
            Self::InternalIdCannotBeExternal { .. } => "INTERNAL_ID_CANNOT_BE_EXTERNAL",
            Self::CannotAssignModuleToChunk { .. } => "CANNOT_ASSIGN_MODULE_TO_CHUNK",
            Self::CouldNotLoad { .. } | Self::Plugin(_) | Self::Io(_) => return None,
        };
        Some(Box::new(code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }
}
