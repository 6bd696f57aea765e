//! Content hashing and file transfer between a workspace and the registry store.
//!
//! The SHA-256 digest recorded at release time is the only integrity
//! guarantee an artifact carries, so every copy goes through [`copy_file`]
//! (never half-written) and every consumer re-hashes with [`hash_file`].

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::error::EmpError;
use crate::runtime::Runtime;

/// Lowercase hex SHA-256 of the file's bytes.
#[tracing::instrument(skip(runtime))]
pub fn hash_file<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<String> {
    if !runtime.exists(path) {
        return Err(EmpError::io(path, "No such file exists").into());
    }

    let mut reader = runtime.open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)
        .with_context(|| format!("Failed to read {:?} for hashing", path))?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Sibling file a copy is staged in before it is renamed onto `dest`.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.part", name))
}

/// Copy `source` to `dest` so that `dest` either does not change or holds the complete file.
#[tracing::instrument(skip(runtime))]
pub fn copy_file<R: Runtime + ?Sized>(runtime: &R, source: &Path, dest: &Path) -> Result<()> {
    if !runtime.exists(source) {
        return Err(EmpError::io(source, "No such file exists").into());
    }

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !runtime.is_dir(parent) {
        return Err(EmpError::io(parent, "Target directory does not exist").into());
    }

    let staging = partial_path(dest);
    debug!("Copying {:?} to {:?} via {:?}", source, dest, staging);

    let staged = runtime
        .copy(source, &staging)
        .and_then(|_| runtime.rename(&staging, dest));

    if let Err(e) = staged {
        if runtime.exists(&staging)
            && let Err(cleanup) = runtime.remove_file(&staging)
        {
            warn!("Failed to remove partial file {:?}: {}", staging, cleanup);
        }
        return Err(e).with_context(|| format!("Failed to copy {:?} to {:?}", source, dest));
    }

    Ok(())
}

fn has_suffix(path: &Path, expected_suffix: &str) -> bool {
    expected_suffix.starts_with('.')
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(expected_suffix))
}

/// Copy `source` to `dest`, then delete `source`.
///
/// The source must end with `expected_suffix` (which itself must start with
/// `.`) and the copy must verifiably exist before anything is deleted.
/// On a failed check the source is left in place.
#[tracing::instrument(skip(runtime))]
pub fn move_into_store<R: Runtime + ?Sized>(
    runtime: &R,
    source: &Path,
    dest: &Path,
    expected_suffix: &str,
) -> Result<()> {
    if !has_suffix(source, expected_suffix) {
        return Err(EmpError::SanityCheck {
            path: source.to_path_buf(),
            detail: format!("expected a file ending in \"{}\"", expected_suffix),
        }
        .into());
    }

    copy_file(runtime, source, dest)?;

    if !runtime.exists(dest) {
        return Err(EmpError::SanityCheck {
            path: dest.to_path_buf(),
            detail: "copy did not produce the target file".into(),
        }
        .into());
    }

    runtime.remove_file(source)?;
    Ok(())
}

/// Delete `path` only if it is a file ending in `expected_suffix`.
///
/// Returns Ok(false) when there was nothing to delete.
#[tracing::instrument(skip(runtime))]
pub fn safe_delete<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    expected_suffix: &str,
) -> Result<bool> {
    if !runtime.exists(path) {
        return Ok(false);
    }
    if runtime.is_dir(path) || !has_suffix(path, expected_suffix) {
        return Err(EmpError::SanityCheck {
            path: path.to_path_buf(),
            detail: format!("refusing to delete, expected a \"{}\" file", expected_suffix),
        }
        .into());
    }
    runtime.remove_file(path)?;
    Ok(true)
}
