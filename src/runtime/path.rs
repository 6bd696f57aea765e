//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep `..` if there is nothing left to pop
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
///
/// `/project/.dependencies/../package.json` is NOT under `/project/.dependencies`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Resolve a path stored relative to `base_dir` (such as `./.dependencies/x.tgz`) to a normalized path.
pub fn resolve_relative_path(base_dir: &Path, relative_path: &Path) -> PathBuf {
    if relative_path.is_absolute() {
        relative_path.to_path_buf()
    } else {
        normalize_path(&base_dir.join(relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_dots() {
        assert_eq!(
            normalize_path(Path::new("/app/./.dependencies/../package.json")),
            PathBuf::from("/app/package.json")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_is_path_under() {
        assert!(is_path_under(
            Path::new("/app/.dependencies/pkg-v1.0.0.tgz"),
            Path::new("/app/.dependencies")
        ));
        assert!(!is_path_under(
            Path::new("/app/.dependencies/../package.json"),
            Path::new("/app/.dependencies")
        ));
        assert!(!is_path_under(Path::new("/app"), Path::new("/app/.dependencies")));
        // Component-wise, not string prefix
        assert!(!is_path_under(
            Path::new("/app/.dependencies-old/x.tgz"),
            Path::new("/app/.dependencies")
        ));
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_relative_path(Path::new("/app"), Path::new("./.dependencies/x.tgz")),
            PathBuf::from("/app/.dependencies/x.tgz")
        );
        assert_eq!(
            resolve_relative_path(Path::new("/app"), Path::new("/abs/x.tgz")),
            PathBuf::from("/abs/x.tgz")
        );
    }
}
