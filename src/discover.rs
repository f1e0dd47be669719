//! Find templates to render.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::HelmgenError;

/// Every file under `dir` whose name ends in `.<extension>`, sorted by path.
///
/// Zero matches is an error: a run with nothing to render is almost always
/// pointed at the wrong directory.
pub fn discover_templates(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, HelmgenError> {
    let suffix = format!(".{extension}");
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            HelmgenError::IoError {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(&suffix) && name.len() > suffix.len())
        {
            found.push(entry.into_path());
        }
    }

    if found.is_empty() {
        return Err(HelmgenError::NoTemplatesFound {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_nested_templates_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("secrets")).unwrap();
        fs::write(dir.path().join("values.yaml.j2"), "").unwrap();
        fs::write(dir.path().join("secrets").join("db.yaml.j2"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let found = discover_templates(dir.path(), "j2").unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("secrets").join("db.yaml.j2"),
                dir.path().join("values.yaml.j2"),
            ]
        );
    }

    #[test]
    fn extension_must_follow_a_dot() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notj2"), "").unwrap();
        fs::write(dir.path().join(".j2"), "").unwrap();
        let err = discover_templates(dir.path(), "j2").unwrap_err();
        assert!(matches!(err, HelmgenError::NoTemplatesFound { .. }));
    }

    #[test]
    fn empty_dir_is_no_templates_found() {
        let dir = TempDir::new().unwrap();
        let err = discover_templates(dir.path(), "j2").unwrap_err();
        match err {
            HelmgenError::NoTemplatesFound { dir: d, extension } => {
                assert_eq!(d, dir.path());
                assert_eq!(extension, "j2");
            }
            other => panic!("expected NoTemplatesFound, got {other:?}"),
        }
    }

    #[test]
    fn custom_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("values.yaml.tpl"), "").unwrap();
        fs::write(dir.path().join("values.yaml.j2"), "").unwrap();
        let found = discover_templates(dir.path(), "tpl").unwrap();
        assert_eq!(found, vec![dir.path().join("values.yaml.tpl")]);
    }

    #[test]
    fn missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = discover_templates(&dir.path().join("absent"), "j2").unwrap_err();
        assert!(matches!(err, HelmgenError::IoError { .. }));
    }
}
