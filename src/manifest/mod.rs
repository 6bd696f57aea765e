//! Consumer `package.json` handling.
//!
//! Only `name`, `version` and the two dependency tables are interpreted;
//! every other key is carried through a rewrite untouched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

use crate::error::EmpError;
use crate::package::SemanticVersion;
use crate::runtime::Runtime;

pub const MANIFEST_NAME: &str = "package.json";

/// Folder inside the consumer project holding fetched artifacts.
pub const DEPENDENCY_FOLDER: &str = ".dependencies";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyCategory {
    Runtime,
    Development,
}

impl DependencyCategory {
    pub const ALL: [DependencyCategory; 2] =
        [DependencyCategory::Runtime, DependencyCategory::Development];

    /// Key of the category's table in `package.json`.
    pub fn key(&self) -> &'static str {
        match self {
            DependencyCategory::Runtime => "dependencies",
            DependencyCategory::Development => "devDependencies",
        }
    }
}

impl fmt::Display for DependencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DependencyCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dependencies" => Ok(DependencyCategory::Runtime),
            "devDependencies" => Ok(DependencyCategory::Development),
            _ => bail!("Unknown dependency category: {}", s),
        }
    }
}

/// Reference into `.dependencies` stored as a dependency value.
pub fn dependency_reference(file_name: &str) -> String {
    format!("./{}/{}", DEPENDENCY_FOLDER, file_name)
}

/// A dependency already declared in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingDependency {
    pub category: DependencyCategory,
    pub version: SemanticVersion,
    /// The raw value, e.g. `./.dependencies/ui-v1.0.0.tgz`
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    content: Map<String, Value>,
}

impl Manifest {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_NAME);
        if !runtime.exists(&path) {
            return Err(EmpError::io(&path, "No package.json found").into());
        }

        let raw = runtime.read_to_string(&path)?;
        let content: Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(Self { path, content })
    }

    fn required_string(&self, key: &str) -> Result<&str> {
        match self.content.get(key).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => bail!(
                "Expected \"{}\" in {:?} to be a valid string.",
                key,
                self.path
            ),
        }
    }

    pub fn name(&self) -> Result<&str> {
        self.required_string("name")
    }

    pub fn version(&self) -> Result<SemanticVersion> {
        Ok(SemanticVersion::parse(self.required_string("version")?)?)
    }

    pub fn set_version(&mut self, version: &SemanticVersion) {
        self.content
            .insert("version".into(), Value::String(version.to_string()));
    }

    /// Find `name` in the dependency tables, runtime first.
    ///
    /// The installed version is recovered from the reference string; a
    /// reference without one is a format error, not a missing dependency.
    pub fn existing_dependency(&self, name: &str) -> Result<Option<ExistingDependency>> {
        for category in DependencyCategory::ALL {
            let reference = self
                .content
                .get(category.key())
                .and_then(|table| table.get(name))
                .and_then(Value::as_str);

            if let Some(reference) = reference {
                let version = SemanticVersion::extract(reference).with_context(|| {
                    format!(
                        "Cannot determine installed version of {} from {:?} in {:?}",
                        name, reference, self.path
                    )
                })?;
                return Ok(Some(ExistingDependency {
                    category,
                    version,
                    reference: reference.to_string(),
                }));
            }
        }
        Ok(None)
    }

    /// Point `name` at `reference` in the given table, keeping the table's keys sorted.
    pub fn set_dependency(&mut self, category: DependencyCategory, name: &str, reference: &str) {
        let table = self
            .content
            .get(category.key())
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut entries: Vec<(String, Value)> = table.into_iter().collect();
        entries.retain(|(k, _)| k != name);
        entries.push((name.to_string(), Value::String(reference.to_string())));
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        self.content
            .insert(category.key().into(), Value::Object(entries.into_iter().collect()));
    }

    pub fn save<R: Runtime + ?Sized>(&self, runtime: &R) -> Result<()> {
        let mut json = serde_json::to_string_pretty(&self.content)?;
        json.push('\n');
        runtime
            .write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to save {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn manifest(json: &str) -> Manifest {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/app/package.json");
        runtime.expect_exists().with(eq(path.clone())).returning(|_| true);
        let json = json.to_string();
        runtime
            .expect_read_to_string()
            .with(eq(path))
            .returning(move |_| Ok(json.clone()));
        Manifest::load(&runtime, Path::new("/app")).unwrap()
    }

    #[test]
    fn test_load_missing_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(&RealRuntime, dir.path()).unwrap_err();
        assert!(matches!(kind_of(&err), Some(EmpError::Io { .. })));
    }

    #[test]
    fn test_name_and_version() {
        let m = manifest(r#"{"name":"app","version":"1.2.3"}"#);
        assert_eq!(m.name().unwrap(), "app");
        assert_eq!(m.version().unwrap().to_string(), "1.2.3");

        let m = manifest(r#"{"name":"","version":"x"}"#);
        assert!(m.name().is_err());
        assert!(matches!(
            kind_of(&m.version().unwrap_err()),
            Some(EmpError::Format { .. })
        ));
    }

    #[test]
    fn test_existing_dependency_derives_version() {
        let m = manifest(
            r#"{"devDependencies":{"@scope/ui":"./.dependencies/scope-ui-v1.4.0.tgz"}}"#,
        );
        let existing = m.existing_dependency("@scope/ui").unwrap().unwrap();

        assert_eq!(existing.category, DependencyCategory::Development);
        assert_eq!(existing.version.to_string(), "1.4.0");
        assert_eq!(existing.reference, "./.dependencies/scope-ui-v1.4.0.tgz");
        assert!(m.existing_dependency("other").unwrap().is_none());
    }

    #[test]
    fn test_existing_dependency_without_version_is_format_error() {
        let m = manifest(r#"{"dependencies":{"ui":"^1.0"}}"#);
        let err = m.existing_dependency("ui").unwrap_err();
        assert!(matches!(kind_of(&err), Some(EmpError::Format { .. })));
    }

    #[test]
    fn test_set_dependency_keeps_keys_sorted() {
        let mut m = manifest(r#"{"name":"app","dependencies":{"zeta":"1.0.0","alpha":"1.0.0"}}"#);
        m.set_dependency(DependencyCategory::Runtime, "mid", "./.dependencies/mid-v1.0.0.tgz");

        let keys: Vec<&String> = m.content["dependencies"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_set_dependency_creates_table_and_replaces_value() {
        let mut m = manifest(r#"{"name":"app"}"#);
        m.set_dependency(DependencyCategory::Development, "ui", "./.dependencies/ui-v1.0.0.tgz");
        m.set_dependency(DependencyCategory::Development, "ui", "./.dependencies/ui-v2.0.0.tgz");

        let existing = m.existing_dependency("ui").unwrap().unwrap();
        assert_eq!(existing.version.to_string(), "2.0.0");
        assert_eq!(m.content["devDependencies"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_save_preserves_unrelated_keys() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_NAME),
            r#"{"name":"app","version":"1.0.0","scripts":{"test":"jest"}}"#,
        )
        .unwrap();

        let mut m = Manifest::load(&RealRuntime, dir.path()).unwrap();
        m.set_dependency(DependencyCategory::Runtime, "ui", &dependency_reference("ui-v1.0.0.tgz"));
        m.save(&RealRuntime).unwrap();

        let raw = fs::read_to_string(dir.path().join(MANIFEST_NAME)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["scripts"]["test"], "jest");
        assert_eq!(value["dependencies"]["ui"], "./.dependencies/ui-v1.0.0.tgz");
        // Original key order comes first
        assert!(raw.find("\"name\"").unwrap() < raw.find("\"dependencies\"").unwrap());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(
            "devDependencies".parse::<DependencyCategory>().unwrap(),
            DependencyCategory::Development
        );
        assert!("peerDependencies".parse::<DependencyCategory>().is_err());
    }
}
