//! Locate the `vercel` executable installed under `node_modules`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::core::project_config::json_type;
use crate::error::VercelError;

/// Package manifest path relative to a project directory.
pub const PACKAGE_MANIFEST: &str = "node_modules/vercel/package.json";

/// Walk up from `start` to the nearest `node_modules/vercel/package.json`
/// and resolve its `bin.vercel` entry.
pub fn resolve_from(start: &Path) -> Result<PathBuf, VercelError> {
    let manifest = start
        .ancestors()
        .map(|dir| dir.join(PACKAGE_MANIFEST))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| VercelError::BinaryNotFound {
            reason: format!("no {PACKAGE_MANIFEST} at or above {}", start.display()),
        })?;
    debug!(manifest = %manifest.display(), "found vercel package");
    bin_from_manifest(&manifest)
}

/// Read `bin.vercel` from a package manifest and resolve it against the
/// package directory.
pub fn bin_from_manifest(manifest: &Path) -> Result<PathBuf, VercelError> {
    let not_found = |reason: String| VercelError::BinaryNotFound { reason };

    let contents = fs::read_to_string(manifest)?;
    let package: Value = serde_json::from_str(&contents)
        .map_err(|err| not_found(format!("parse {}: {err}", manifest.display())))?;
    let Value::Object(package) = package else {
        return Err(not_found("Expected `vercelPkg` to be an object".to_string()));
    };
    let bin = match package.get("bin") {
        None | Some(Value::Null) => {
            return Err(not_found("`[vercel:package.json].bin` is missing.".to_string()));
        }
        Some(Value::Object(bin)) => bin,
        Some(other) => {
            return Err(not_found(format!(
                "Expected `[vercel:package.json].bin` to be an object, got `{}`",
                json_type(other)
            )));
        }
    };
    let relative = match bin.get("vercel") {
        Some(Value::String(path)) => path.as_str(),
        other => {
            return Err(not_found(format!(
                "Expected `[vercel:package.json].bin.vercel` to be a string, got `{}`",
                other.map_or("undefined", json_type)
            )));
        }
    };
    if relative.is_empty() {
        return Err(not_found(
            "`[vercel:package.json].bin.vercel` is empty.".to_string(),
        ));
    }
    if relative.starts_with('/') || relative.starts_with("../") {
        return Err(not_found(format!(
            "Expected `[vercel:package.json].bin.vercel` to not start with `/` or `../`, got `{relative}` (Potential security vulnerability)"
        )));
    }

    let package_dir = manifest.parent().unwrap_or_else(|| Path::new("."));
    Ok(package_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(root: &Path, contents: &str) -> PathBuf {
        let dir = root.join("node_modules/vercel");
        fs::create_dir_all(&dir).expect("create package dir");
        let manifest = dir.join("package.json");
        fs::write(&manifest, contents).expect("write manifest");
        manifest
    }

    #[test]
    fn resolves_bin_relative_to_package() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_manifest(temp.path(), r#"{"bin":{"vercel":"dist/index.js"}}"#);
        let nested = temp.path().join("apps/web");
        fs::create_dir_all(&nested).expect("nested");

        let bin = resolve_from(&nested).expect("resolve");
        assert_eq!(bin, temp.path().join("node_modules/vercel/dist/index.js"));
    }

    #[test]
    fn missing_package_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = resolve_from(temp.path()).expect_err("missing");
        assert!(matches!(err, VercelError::BinaryNotFound { .. }));
    }

    #[test]
    fn rejects_bad_bin_entries() {
        let cases = [
            (r#"{}"#, "is missing"),
            (r#"{"bin":"cli.js"}"#, "to be an object, got `string`"),
            (r#"{"bin":{}}"#, "to be a string, got `undefined`"),
            (r#"{"bin":{"vercel":""}}"#, "is empty"),
            (r#"{"bin":{"vercel":"../escape.js"}}"#, "Potential security vulnerability"),
            (r#"{"bin":{"vercel":"/abs.js"}}"#, "Potential security vulnerability"),
        ];
        for (contents, expected) in cases {
            let temp = tempfile::tempdir().expect("tempdir");
            let manifest = write_manifest(temp.path(), contents);
            let err = bin_from_manifest(&manifest).expect_err(contents);
            assert!(
                err.to_string().contains(expected),
                "{contents}: {err}"
            );
        }
    }
}
