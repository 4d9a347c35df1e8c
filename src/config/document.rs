//! Config documents: parsing, sibling includes and the merge law
//!
//! A document is a plain TOML table. Two documents merge key by key:
//! - keys only on the right are copied over
//! - scalars on both sides: the right value wins
//! - lists on both sides: the right list is appended to the left one
//! - tables on both sides: merged recursively with the same rules
//! - anything else is a type conflict naming the dotted key path

use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::error::{DevDockerError, Result};

/// Parsed, not yet validated config document
pub type Document = toml::Table;

/// Key listing sibling documents to merge in before this one
pub const INCLUDE_KEY: &str = "include";

/// Value shape as seen by the merge law
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Scalar,
    List,
    Mapping,
}

impl Kind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => Kind::List,
            Value::Table(_) => Kind::Mapping,
            _ => Kind::Scalar,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Scalar => "scalar",
            Kind::List => "list",
            Kind::Mapping => "mapping",
        }
    }
}

/// Parse the document at `path`, resolving its `include` list.
///
/// Include paths are relative to the directory of the file naming them.
/// Includes merge left to right in listed order, and the including
/// document's own keys are merged last.
pub fn load_document(path: &Path) -> Result<Document> {
    let mut chain = Vec::new();
    load_with_includes(path, &mut chain)
}

fn load_with_includes(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Document> {
    let canonical = fs::canonicalize(path).map_err(|e| DevDockerError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if chain.contains(&canonical) {
        return Err(DevDockerError::ConfigParse {
            path: canonical,
            message: "include cycle detected".to_string(),
        });
    }

    let text = fs::read_to_string(&canonical).map_err(|e| DevDockerError::ConfigParse {
        path: canonical.clone(),
        message: e.to_string(),
    })?;
    let mut doc = parse_document(&text).map_err(|message| DevDockerError::ConfigParse {
        path: canonical.clone(),
        message,
    })?;

    let includes = take_includes(&mut doc).map_err(|message| DevDockerError::ConfigParse {
        path: canonical.clone(),
        message,
    })?;

    let base_dir = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    chain.push(canonical);
    let mut merged = Document::new();
    for include in includes {
        let include_path = base_dir.join(&include);
        log::debug!("Including {}", include_path.display());
        let included = load_with_includes(&include_path, chain)?;
        merge_into(&mut merged, &included, "")?;
    }
    chain.pop();

    merge_into(&mut merged, &doc, "")?;
    Ok(merged)
}

/// Parse TOML text into a document
pub fn parse_document(text: &str) -> std::result::Result<Document, String> {
    toml::from_str::<Document>(text).map_err(|e| e.message().to_string())
}

fn take_includes(doc: &mut Document) -> std::result::Result<Vec<String>, String> {
    match doc.remove(INCLUDE_KEY) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(format!(
                    "'{}' entries must be file paths, got {}",
                    INCLUDE_KEY,
                    other.type_str()
                )),
            })
            .collect(),
        Some(other) => Err(format!(
            "'{}' must be a list of file paths, got {}",
            INCLUDE_KEY,
            other.type_str()
        )),
    }
}

/// Merge `right` over `left`, returning a new document
pub fn merge_documents(left: &Document, right: &Document) -> Result<Document> {
    let mut merged = left.clone();
    merge_into(&mut merged, right, "")?;
    Ok(merged)
}

/// Left fold of [`merge_documents`] over any number of documents
pub fn merge_all<'a, I>(docs: I) -> Result<Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut merged = Document::new();
    for doc in docs {
        merge_into(&mut merged, doc, "")?;
    }
    Ok(merged)
}

fn merge_into(target: &mut Document, overlay: &Document, prefix: &str) -> Result<()> {
    for (key, right) in overlay {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), right.clone());
            }
            Some(left) => merge_value(left, right, &path)?,
        }
    }
    Ok(())
}

fn merge_value(left: &mut Value, right: &Value, path: &str) -> Result<()> {
    match (Kind::of(left), Kind::of(right)) {
        (Kind::List, Kind::List) => {
            if let (Value::Array(l), Value::Array(r)) = (left, right) {
                l.extend(r.iter().cloned());
            }
        }
        (Kind::Mapping, Kind::Mapping) => {
            if let (Value::Table(l), Value::Table(r)) = (left, right) {
                merge_into(l, r, path)?;
            }
        }
        (Kind::Scalar, Kind::Scalar) => *left = right.clone(),
        (l, r) => {
            return Err(DevDockerError::ConfigMergeConflict {
                key: path.to_string(),
                left: l.name(),
                right: r.name(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(text: &str) -> Document {
        parse_document(text).unwrap()
    }

    #[test]
    fn test_scalar_right_wins() {
        let merged = merge_documents(&doc("imageVersion = '1'"), &doc("imageVersion = '2'")).unwrap();
        assert_eq!(merged["imageVersion"].as_str(), Some("2"));
    }

    #[test]
    fn test_scalar_kinds_may_differ() {
        let merged = merge_documents(&doc("mutagen = 'yes'"), &doc("mutagen = false")).unwrap();
        assert_eq!(merged["mutagen"].as_bool(), Some(false));
    }

    #[test]
    fn test_repeated_scalar_overrides() {
        let a = doc("network = 'a'");
        let b = doc("network = 'b'");
        let c = doc("network = 'c'");
        let merged = merge_all([&a, &b, &c]).unwrap();
        assert_eq!(merged["network"].as_str(), Some("c"));
    }

    #[test]
    fn test_list_append_preserves_order_and_duplicates() {
        let a = doc("mount = ['/a:/a', '/b:/b']");
        let b = doc("mount = ['/b:/b', '/c:/c']");
        let merged = merge_documents(&a, &b).unwrap();
        let mounts: Vec<&str> = merged["mount"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(mounts, vec!["/a:/a", "/b:/b", "/b:/b", "/c:/c"]);
    }

    #[test]
    fn test_key_only_on_right_is_copied() {
        let merged = merge_documents(&doc("registry = 'r'"), &doc("ports = ['8080']")).unwrap();
        assert_eq!(merged["registry"].as_str(), Some("r"));
        assert_eq!(merged["ports"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_list_associativity() {
        let a = doc("mount = ['/a:/a']\nregistry = 'a'");
        let b = doc("mount = ['/b:/b']\nregistry = 'b'");
        let c = doc("mount = ['/c:/c']\nregistry = 'c'");

        let left = merge_documents(&merge_documents(&a, &b).unwrap(), &c).unwrap();
        let right = merge_documents(&a, &merge_documents(&b, &c).unwrap()).unwrap();
        assert_eq!(left, right);
        assert_eq!(left, merge_all([&a, &b, &c]).unwrap());
    }

    #[test]
    fn test_list_scalar_conflict_either_order() {
        let list = doc("mount = ['/a:/a']");
        let scalar = doc("mount = '/a:/a'");

        for (l, r) in [(&list, &scalar), (&scalar, &list)] {
            let err = merge_documents(l, r).unwrap_err();
            assert!(matches!(err, DevDockerError::ConfigMergeConflict { ref key, .. } if key == "mount"));
            assert!(err.to_string().contains("mount"));
        }
    }

    #[test]
    fn test_nested_tables_merge_by_key() {
        let a = doc("[environment]\nA = '1'\nB = '1'");
        let b = doc("[environment]\nB = '2'\nC = '2'");
        let merged = merge_documents(&a, &b).unwrap();
        let env = merged["environment"].as_table().unwrap();
        assert_eq!(env["A"].as_str(), Some("1"));
        assert_eq!(env["B"].as_str(), Some("2"));
        assert_eq!(env["C"].as_str(), Some("2"));
    }

    #[test]
    fn test_nested_conflict_names_dotted_path() {
        let a = doc("[environment]\nA = '1'");
        let b = doc("[environment]\nA = ['x']");
        let err = merge_documents(&a, &b).unwrap_err();
        assert!(matches!(err, DevDockerError::ConfigMergeConflict { ref key, .. } if key == "environment.A"));
    }

    #[test]
    fn test_table_scalar_conflict() {
        let err = merge_documents(&doc("environment = 'x'"), &doc("[environment]\nA = '1'")).unwrap_err();
        assert!(matches!(err, DevDockerError::ConfigMergeConflict { left: "scalar", right: "mapping", .. }));
    }

    #[test]
    fn test_load_document_with_includes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("shared")).unwrap();
        std::fs::write(
            root.join("shared").join("base.toml"),
            "registry = 'base'\nmount = ['/base:/base']\n",
        )
        .unwrap();
        std::fs::write(
            root.join("main.toml"),
            "include = ['shared/base.toml']\nregistry = 'main'\nmount = ['/main:/main']\n",
        )
        .unwrap();

        let loaded = load_document(&root.join("main.toml")).unwrap();
        assert_eq!(loaded["registry"].as_str(), Some("main"));
        let mounts: Vec<&str> = loaded["mount"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(mounts, vec!["/base:/base", "/main:/main"]);
        assert!(!loaded.contains_key(INCLUDE_KEY));
    }

    #[test]
    fn test_nested_include_is_relative_to_including_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a").join("b")).unwrap();
        std::fs::write(root.join("a").join("b").join("leaf.toml"), "network = 'leaf'\n").unwrap();
        std::fs::write(root.join("a").join("mid.toml"), "include = ['b/leaf.toml']\n").unwrap();
        std::fs::write(root.join("top.toml"), "include = ['a/mid.toml']\n").unwrap();

        let loaded = load_document(&root.join("top.toml")).unwrap();
        assert_eq!(loaded["network"].as_str(), Some("leaf"));
    }

    #[test]
    fn test_include_cycle_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("one.toml"), "include = ['two.toml']\n").unwrap();
        std::fs::write(root.join("two.toml"), "include = ['one.toml']\n").unwrap();

        let err = load_document(&root.join("one.toml")).unwrap_err();
        assert!(matches!(err, DevDockerError::ConfigParse { .. }));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_include_must_be_list() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "include = 'other.toml'\n").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DevDockerError::ConfigParse { .. }));
    }

    #[test]
    fn test_malformed_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "registry = \n").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DevDockerError::ConfigParse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
