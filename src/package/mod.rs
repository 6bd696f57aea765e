//! Package identity: versions and the artifact file names derived from them.

mod version;

pub use version::{SemanticVersion, VersionBump};

/// Extension shared by every released artifact.
pub const ARTIFACT_SUFFIX: &str = ".tgz";

/// Turn a package name into something usable inside a file name.
///
/// `@scope/ui` becomes `scope-ui`; other characters that are illegal in
/// file names on common platforms become `-`.
pub fn sanitize_package_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '@')
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
}

/// Deterministic artifact name: `{sanitizedName}-v{version}.tgz`.
pub fn release_file_name(name: &str, version: &SemanticVersion) -> String {
    format!(
        "{}-v{}{}",
        sanitize_package_name(name),
        version,
        ARTIFACT_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_package_name() {
        assert_eq!(sanitize_package_name("my-app"), "my-app");
        assert_eq!(sanitize_package_name("@scope/ui"), "scope-ui");
        assert_eq!(sanitize_package_name("a:b*c?d"), "a-b-c-d");
    }

    #[test]
    fn test_release_file_name() {
        let version = SemanticVersion::new(1, 2, 3);
        assert_eq!(release_file_name("@scope/ui", &version), "scope-ui-v1.2.3.tgz");
        assert_eq!(release_file_name("pkg", &version), "pkg-v1.2.3.tgz");
    }
}
