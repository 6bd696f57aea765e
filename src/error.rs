//! Error kinds raised by the registry, transfer and installer layers.
//!
//! Functions return `anyhow::Result` like the rest of the crate; the values
//! below are what ends up inside the `anyhow::Error`, so callers can classify
//! a failure with `err.downcast_ref::<EmpError>()`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EmpError {
    /// A string that should have been a `major.minor.patch` version.
    #[error("The string \"{input}\" is not a valid semantic-version.")]
    Format { input: String },

    /// A file that should exist is missing, or could not be written.
    #[error("{detail}: {}", path.display())]
    Io { path: PathBuf, detail: String },

    /// A move was refused because the file did not look like what was expected.
    #[error("File sanity check failed for {}: {detail}", path.display())]
    SanityCheck { path: PathBuf, detail: String },

    /// The artifact file name already exists in the store.
    #[error("Release {file_name} already exists in the registry.")]
    AlreadyReleased { file_name: String },

    /// The catalog already has an entry for this name and version.
    #[error("Package {name}@{version} is already registered in the packages overview.")]
    DuplicateVersion { name: String, version: String },

    /// Bytes differ from the digest recorded at release time.
    #[error(
        "[Important!] The hash for {name}@{version} ({}) did not match the expected hash \
         (expected {expected}, got {actual}). Are you experiencing a man in the middle attack?",
        path.display()
    )]
    Integrity {
        name: String,
        version: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Bumping would overflow a version component.
    #[error("Cannot bump the {kind} component of {version}: it is already at its maximum.")]
    VersionOverflow { version: String, kind: String },

    #[error("{what}")]
    NotFound { what: String },

    #[error("Aborted by user request: {reason}")]
    UserAborted { reason: String },

    /// Another process holds the catalog lock.
    #[error(
        "The registry catalog is locked by another emp process. \
         If no other process is running, remove {}",
        path.display()
    )]
    Locked { path: PathBuf },
}

impl EmpError {
    pub fn not_found(what: impl Into<String>) -> Self {
        EmpError::NotFound { what: what.into() }
    }

    pub fn io(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        EmpError::Io {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Returns the [`EmpError`] carried by `err`, if there is one.
pub fn kind_of(err: &anyhow::Error) -> Option<&EmpError> {
    err.downcast_ref::<EmpError>()
}
