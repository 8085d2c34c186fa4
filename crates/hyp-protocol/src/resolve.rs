//! Module specifier resolution over a [`Filesystem`].
//!
//! Path-like specifiers (`./x`, `../x`, `/x`) are resolved against the
//! requiring file's directory: first as a file, then as a directory. Bare
//! specifiers (`pkg`, `pkg/sub`, `@scope/pkg`) are looked up in the
//! `node_modules` directory of the requiring directory and of each of its
//! ancestors, nearest first.
//!
//! As a file, `x` matches `x`, `x.js` then `x.json`. As a directory, `x`
//! matches the `main` entry of `x/package.json` (as a file, then as a
//! directory index) and then `x/index.js` and `x/index.json`.

use hyp_drive::{path, Filesystem};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};

/// Extensions tried after the exact name, in order.
pub const EXTENSIONS: [&str; 2] = [".js", ".json"];

/// Directory searched for bare specifiers.
pub const PACKAGES_DIR: &str = "node_modules";

/// Directory-level manifest consulted for a `main` entry.
pub const PACKAGE_MANIFEST: &str = "package.json";

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    main: Option<String>,
}

/// Returns `true` for specifiers resolved relative to the requiring file.
pub fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// `node_modules` directories to search from `basedir`, nearest first.
pub fn package_dirs(basedir: &str) -> Vec<String> {
    path::ancestors(basedir)
        .into_iter()
        .filter(|dir| path::basename(dir) != PACKAGES_DIR)
        .map(|dir| path::join(&dir, PACKAGES_DIR))
        .collect()
}

/// Resolve `specifier` as required from the file `filename`.
///
/// Fails with [`ProtocolError::ResolutionFailed`] when nothing matches.
/// Storage errors other than not-found are passed through.
pub async fn resolve(fs: &dyn Filesystem, specifier: &str, filename: &str) -> ProtocolResult<String> {
    let basedir = path::dirname(filename);
    let dir_only = specifier.ends_with('/');

    let found = if is_path_like(specifier) {
        load(fs, &path::join(&basedir, specifier), dir_only).await?
    } else {
        let mut found = None;
        for dir in package_dirs(&basedir) {
            found = load(fs, &path::join(&dir, specifier), dir_only).await?;
            if found.is_some() {
                break;
            }
        }
        found
    };

    match found {
        Some(resolved) => {
            debug!(specifier, filename, resolved = %resolved, "resolved");
            Ok(resolved)
        }
        None => {
            debug!(specifier, filename, "resolution failed");
            Err(ProtocolError::ResolutionFailed {
                name: specifier.to_string(),
                filename: filename.to_string(),
            })
        }
    }
}

async fn load(fs: &dyn Filesystem, target: &str, dir_only: bool) -> ProtocolResult<Option<String>> {
    if !dir_only {
        if let Some(found) = load_as_file(fs, target).await? {
            return Ok(Some(found));
        }
    }
    load_as_directory(fs, target).await
}

async fn load_as_file(fs: &dyn Filesystem, target: &str) -> ProtocolResult<Option<String>> {
    if target == "/" {
        return Ok(None);
    }
    if is_file(fs, target).await? {
        return Ok(Some(target.to_string()));
    }
    for ext in EXTENSIONS {
        let candidate = format!("{target}{ext}");
        if is_file(fs, &candidate).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

async fn load_as_directory(fs: &dyn Filesystem, dir: &str) -> ProtocolResult<Option<String>> {
    if let Some(main) = package_main(fs, dir).await? {
        let target = path::join(dir, &main);
        if target != dir {
            if let Some(found) = load_as_file(fs, &target).await? {
                return Ok(Some(found));
            }
        }
        if let Some(found) = load_index(fs, &target).await? {
            return Ok(Some(found));
        }
    }
    load_index(fs, dir).await
}

async fn load_index(fs: &dyn Filesystem, dir: &str) -> ProtocolResult<Option<String>> {
    let index = path::join(dir, "index");
    for ext in EXTENSIONS {
        let candidate = format!("{index}{ext}");
        if is_file(fs, &candidate).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

async fn package_main(fs: &dyn Filesystem, dir: &str) -> ProtocolResult<Option<String>> {
    let manifest = path::join(dir, PACKAGE_MANIFEST);
    if !is_file(fs, &manifest).await? {
        return Ok(None);
    }
    let data = fs.read_file(&manifest).await?;
    match serde_json::from_slice::<PackageManifest>(&data) {
        Ok(pkg) => Ok(pkg.main.filter(|m| !m.is_empty())),
        Err(e) => {
            debug!(manifest = %manifest, error = %e, "ignoring unreadable package manifest");
            Ok(None)
        }
    }
}

async fn is_file(fs: &dyn Filesystem, target: &str) -> ProtocolResult<bool> {
    match fs.stat(target).await {
        Ok(stat) => Ok(stat.is_file()),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyp_drive::MemoryDrive;
    use hyp_types::ContentKey;

    fn drive(files: &[(&str, &str)]) -> MemoryDrive {
        let d = MemoryDrive::new(ContentKey::from_bytes([7; 32]));
        for (path, data) in files {
            d.write_file(path, data.to_string());
        }
        d
    }

    async fn ok(fs: &MemoryDrive, spec: &str, from: &str) -> String {
        resolve(fs, spec, from).await.unwrap()
    }

    #[tokio::test]
    async fn exact_file_wins_over_extensions() {
        let fs = drive(&[("/app/util", "a"), ("/app/util.js", "b")]);
        assert_eq!(ok(&fs, "./util", "/app/index.js").await, "/app/util");
    }

    #[tokio::test]
    async fn extensions_in_order() {
        let fs = drive(&[("/app/conf.json", "{}"), ("/app/lib.js", ""), ("/app/lib.json", "")]);
        assert_eq!(ok(&fs, "./conf", "/app/index.js").await, "/app/conf.json");
        assert_eq!(ok(&fs, "./lib", "/app/index.js").await, "/app/lib.js");
        assert_eq!(ok(&fs, "../lib", "/app/sub/x.js").await, "/app/lib.js");
        assert_eq!(ok(&fs, "/app/lib.js", "/elsewhere/x.js").await, "/app/lib.js");
    }

    #[tokio::test]
    async fn directory_uses_package_main_then_index() {
        let fs = drive(&[
            ("/app/a/package.json", r#"{"main": "lib/entry"}"#),
            ("/app/a/lib/entry.js", ""),
            ("/app/b/index.json", "{}"),
            ("/app/c/package.json", r#"{"main": "dist"}"#),
            ("/app/c/dist/index.js", ""),
            ("/app/d/package.json", "not json"),
            ("/app/d/index.js", ""),
        ]);
        assert_eq!(ok(&fs, "./a", "/app/x.js").await, "/app/a/lib/entry.js");
        assert_eq!(ok(&fs, "./b", "/app/x.js").await, "/app/b/index.json");
        assert_eq!(ok(&fs, "./c", "/app/x.js").await, "/app/c/dist/index.js");
        assert_eq!(ok(&fs, "./d/", "/app/x.js").await, "/app/d/index.js");
    }

    #[tokio::test]
    async fn bare_specifiers_walk_up_node_modules() {
        let fs = drive(&[
            ("/node_modules/left/index.js", ""),
            ("/app/node_modules/left/index.js", ""),
            ("/node_modules/@scope/pkg/package.json", r#"{"main": "main.js"}"#),
            ("/node_modules/@scope/pkg/main.js", ""),
            ("/node_modules/deep/sub/file.js", ""),
        ]);
        assert_eq!(ok(&fs, "left", "/app/src/index.js").await, "/app/node_modules/left/index.js");
        assert_eq!(ok(&fs, "left", "/other/index.js").await, "/node_modules/left/index.js");
        assert_eq!(ok(&fs, "@scope/pkg", "/app/index.js").await, "/node_modules/@scope/pkg/main.js");
        assert_eq!(ok(&fs, "deep/sub/file", "/app/index.js").await, "/node_modules/deep/sub/file.js");
    }

    #[tokio::test]
    async fn bare_specifier_is_not_relative() {
        let fs = drive(&[("/app/util.js", "")]);
        let err = resolve(&fs, "util", "/app/index.js").await.unwrap_err();
        assert!(matches!(err, ProtocolError::ResolutionFailed { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn missing_module_fails() {
        let fs = drive(&[("/app/index.js", "")]);
        assert!(resolve(&fs, "./nope", "/app/index.js").await.is_err());
        assert!(resolve(&fs, "..", "/index.js").await.is_err());
    }

    #[test]
    fn package_dirs_skip_nested_node_modules() {
        assert_eq!(
            package_dirs("/app/node_modules/a"),
            vec!["/app/node_modules/a/node_modules", "/app/node_modules", "/node_modules"]
        );
    }

    #[test]
    fn path_like_detection() {
        assert!(is_path_like("./a") && is_path_like("../a") && is_path_like("/a") && is_path_like("."));
        assert!(!is_path_like("a") && !is_path_like("@s/a") && !is_path_like(".a"));
    }
}
