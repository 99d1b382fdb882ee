//! Locating installed packages and their manifests.
//!
//! Resolution goes through the [`Resolver`] trait. [`NodeResolver`] follows
//! the `node_modules` lookup and `exports` map rules closely enough to
//! produce the same diagnostics as Node, which [`DependencyLocator`] relies
//! on when a package hides its own manifest.

use std::fs;
use std::path::{Path, PathBuf};

use plusfile_core::{
    assert_invariant, is_package_name, manifest_path_from_diagnostic, to_posix_path,
    PACKAGE_MANIFEST,
};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{LoaderError, Result};

/// Classification of a resolution failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveErrorCode {
    ModuleNotFound,
    PackagePathNotExported,
    InvalidPackageConfig,
}

impl ResolveErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveErrorCode::ModuleNotFound => "MODULE_NOT_FOUND",
            ResolveErrorCode::PackagePathNotExported => "ERR_PACKAGE_PATH_NOT_EXPORTED",
            ResolveErrorCode::InvalidPackageConfig => "ERR_INVALID_PACKAGE_CONFIG",
        }
    }
}

impl std::fmt::Display for ResolveErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolver diagnostic: a classification plus a human readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ResolveError {
    pub code: ResolveErrorCode,
    pub message: String,
}

impl ResolveError {
    pub fn new(code: ResolveErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Resolves `<package>[/<subpath>]` to an absolute file path.
pub trait Resolver: Send + Sync {
    fn resolve(&self, request: &str, search_root: &Path) -> std::result::Result<PathBuf, ResolveError>;
}

/// Conditions of `require()` resolution.
pub const REQUIRE_CONDITIONS: &[&str] = &["node", "require", "default"];

/// Conditions of ES module `import` resolution.
pub const IMPORT_CONDITIONS: &[&str] = &["node", "import", "default"];

/// Filesystem resolver walking `node_modules` directories upward.
///
/// In `exports` condition objects the first key listed by the package that
/// is one of `conditions` wins.
#[derive(Clone, Copy, Debug)]
pub struct NodeResolver {
    conditions: &'static [&'static str],
}

impl NodeResolver {
    /// Resolves like `require.resolve`.
    pub fn require() -> Self {
        Self {
            conditions: REQUIRE_CONDITIONS,
        }
    }

    /// Resolves like an ES module `import`.
    pub fn import() -> Self {
        Self {
            conditions: IMPORT_CONDITIONS,
        }
    }
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::require()
    }
}

impl Resolver for NodeResolver {
    fn resolve(&self, request: &str, search_root: &Path) -> std::result::Result<PathBuf, ResolveError> {
        let (name, subpath) = split_request(request);

        let Some(package_dir) = search_root
            .ancestors()
            .map(|dir| dir.join("node_modules").join(name))
            .find(|dir| dir.is_dir())
        else {
            return Err(ResolveError::new(
                ResolveErrorCode::ModuleNotFound,
                format!("Cannot find module '{request}' from '{}'", search_root.display()),
            ));
        };

        let manifest_path = package_dir.join(PACKAGE_MANIFEST);
        let manifest = read_manifest(&manifest_path)?;

        let target = match manifest.as_ref().and_then(|m| m.get("exports")) {
            Some(exports) if !exports.is_null() => {
                let Some(target) = resolve_exports(exports, &subpath, self.conditions) else {
                    return Err(ResolveError::new(
                        ResolveErrorCode::PackagePathNotExported,
                        format!(
                            "Package subpath '{subpath}' is not defined by \"exports\" in {}",
                            manifest_path.display()
                        ),
                    ));
                };
                package_dir.join(target.trim_start_matches("./"))
            }
            _ if subpath == "." => {
                let main = manifest
                    .as_ref()
                    .and_then(|m| m.get("main"))
                    .and_then(Value::as_str)
                    .unwrap_or("index.js");
                package_dir.join(main.trim_start_matches("./"))
            }
            _ => package_dir.join(subpath.trim_start_matches("./")),
        };

        if !target.is_file() {
            return Err(ResolveError::new(
                ResolveErrorCode::ModuleNotFound,
                format!("Cannot find module '{}' imported from {}", target.display(), search_root.display()),
            ));
        }
        Ok(target)
    }
}

/// Split `@scope/name/sub/path` into `@scope/name` and `./sub/path`.
fn split_request(request: &str) -> (&str, String) {
    let name_segments = if request.starts_with('@') { 2 } else { 1 };
    let name_end = request
        .match_indices('/')
        .nth(name_segments - 1)
        .map(|(i, _)| i)
        .unwrap_or(request.len());

    let (name, rest) = request.split_at(name_end);
    let subpath = match rest.trim_start_matches('/') {
        "" => ".".to_string(),
        rest => format!("./{rest}"),
    };
    (name, subpath)
}

fn read_manifest(path: &Path) -> std::result::Result<Option<Map<String, Value>>, ResolveError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ResolveError::new(
                ResolveErrorCode::InvalidPackageConfig,
                format!("Cannot read {}: {e}", path.display()),
            ))
        }
    };
    match serde_json::from_str(&text) {
        Ok(Value::Object(manifest)) => Ok(Some(manifest)),
        Ok(_) => Err(ResolveError::new(
            ResolveErrorCode::InvalidPackageConfig,
            format!("Invalid package config {}: not an object", path.display()),
        )),
        Err(e) => Err(ResolveError::new(
            ResolveErrorCode::InvalidPackageConfig,
            format!("Invalid package config {}: {e}", path.display()),
        )),
    }
}

/// Look `subpath` up in an `exports` field, returning the `./`-relative target.
fn resolve_exports(exports: &Value, subpath: &str, conditions: &[&str]) -> Option<String> {
    let is_subpath_map = matches!(
        exports,
        Value::Object(map) if map.keys().next().is_some_and(|k| k.starts_with('.'))
    );
    if !is_subpath_map {
        // Sugar for `{ ".": exports }`.
        return (subpath == ".").then(|| resolve_target(exports, None, conditions)).flatten();
    }
    let Value::Object(map) = exports else {
        return None;
    };

    if let Some(target) = map.get(subpath) {
        return resolve_target(target, None, conditions);
    }

    // Longest matching `*` pattern wins.
    let pattern = map
        .iter()
        .filter_map(|(key, target)| {
            let (prefix, suffix) = key.split_once('*')?;
            let middle = subpath.strip_prefix(prefix)?.strip_suffix(suffix)?;
            Some((prefix.len(), middle, target))
        })
        .max_by_key(|(prefix_len, _, _)| *prefix_len);
    if let Some((_, middle, target)) = pattern {
        return resolve_target(target, Some(middle), conditions);
    }

    map.iter()
        .filter(|(key, _)| key.ends_with('/'))
        .filter_map(|(key, target)| Some((key.len(), subpath.strip_prefix(key.as_str())?, target)))
        .max_by_key(|(key_len, _, _)| *key_len)
        .and_then(|(_, rest, target)| {
            let base = resolve_target(target, None, conditions)?;
            Some(format!("{base}{rest}"))
        })
}

fn resolve_target(target: &Value, pattern_match: Option<&str>, conditions: &[&str]) -> Option<String> {
    match target {
        Value::String(path) if path.starts_with("./") => Some(match pattern_match {
            Some(middle) => path.replace('*', middle),
            None => path.clone(),
        }),
        Value::Array(candidates) => candidates
            .iter()
            .find_map(|candidate| resolve_target(candidate, pattern_match, conditions)),
        Value::Object(map) => map
            .iter()
            .filter(|(condition, _)| conditions.contains(&condition.as_str()))
            .find_map(|(_, candidate)| resolve_target(candidate, pattern_match, conditions)),
        _ => None,
    }
}

/// Directory of a forward-slash manifest path.
pub fn manifest_root_dir(manifest_path: &str) -> String {
    let root_dir = manifest_path
        .strip_suffix(PACKAGE_MANIFEST)
        .unwrap_or(manifest_path)
        .trim_end_matches('/');
    if root_dir.is_empty() { "/" } else { root_dir }.to_string()
}

/// Finds where a dependency is installed.
pub struct DependencyLocator<R> {
    resolver: R,
}

impl Default for DependencyLocator<NodeResolver> {
    fn default() -> Self {
        Self::new(NodeResolver::require())
    }
}

impl<R: Resolver> DependencyLocator<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Absolute forward-slash path of `package_name`'s manifest, as seen from
    /// `search_root`.
    ///
    /// Packages whose `exports` map does not expose `./package.json` are still
    /// located by reading the manifest path out of the resolver diagnostic.
    pub fn locate_package_manifest(&self, package_name: &str, search_root: &Path) -> Result<String> {
        assert_invariant(
            is_package_name(package_name),
            format!("`{package_name}` is not a package name"),
        )?;

        let request = format!("{package_name}/{PACKAGE_MANIFEST}");
        let manifest_path = match self.resolver.resolve(&request, search_root) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) if e.code == ResolveErrorCode::PackagePathNotExported => {
                tracing::debug!(
                    package = package_name,
                    "Manifest hidden by exports map, reading its path from the resolver message"
                );
                manifest_path_from_diagnostic(&e.message)?
            }
            Err(e) => return Err(e.into()),
        };

        let manifest_path = to_posix_path(&manifest_path);
        assert_invariant(
            manifest_path.ends_with(&format!("/{PACKAGE_MANIFEST}")),
            format!("resolved manifest `{manifest_path}` is not a {PACKAGE_MANIFEST}"),
        )?;
        Ok(manifest_path)
    }

    /// Directory containing `package_name`'s manifest.
    pub fn locate_root_dir(&self, package_name: &str, search_root: &Path) -> Result<String> {
        let manifest_path = self.locate_package_manifest(package_name, search_root)?;
        Ok(manifest_root_dir(&manifest_path))
    }

    /// Locate and parse `package_name`'s manifest.
    pub fn read_package_manifest(&self, package_name: &str, search_root: &Path) -> Result<Map<String, Value>> {
        let path = self.locate_package_manifest(package_name, search_root)?;
        let text = fs::read_to_string(&path).map_err(|source| LoaderError::Io {
            action: "read",
            path: path.clone(),
            source,
        })?;
        match serde_json::from_str(&text) {
            Ok(Value::Object(manifest)) => Ok(manifest),
            Ok(_) => Err(LoaderError::ManifestRead {
                path,
                reason: "not a JSON object".to_string(),
            }),
            Err(e) => Err(LoaderError::ManifestRead {
                path,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plusfile_core::CoreError;
    use serde_json::json;

    struct FailingResolver(ResolveError);

    impl Resolver for FailingResolver {
        fn resolve(&self, _request: &str, _search_root: &Path) -> std::result::Result<PathBuf, ResolveError> {
            Err(self.0.clone())
        }
    }

    struct FixedResolver(PathBuf);

    impl Resolver for FixedResolver {
        fn resolve(&self, _request: &str, _search_root: &Path) -> std::result::Result<PathBuf, ResolveError> {
            Ok(self.0.clone())
        }
    }

    fn not_exported(message: &str) -> DependencyLocator<FailingResolver> {
        DependencyLocator::new(FailingResolver(ResolveError::new(
            ResolveErrorCode::PackagePathNotExported,
            message,
        )))
    }

    fn install(root: &Path, name: &str, manifest: Value) -> PathBuf {
        let dir = root.join("node_modules").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PACKAGE_MANIFEST), manifest.to_string()).unwrap();
        dir
    }

    fn posix(path: &Path) -> String {
        to_posix_path(&path.to_string_lossy())
    }

    #[test]
    fn test_split_request() {
        assert_eq!(split_request("react"), ("react", ".".to_string()));
        assert_eq!(split_request("react/package.json"), ("react", "./package.json".to_string()));
        assert_eq!(split_request("@org/ui/a/b.js"), ("@org/ui", "./a/b.js".to_string()));
        assert_eq!(split_request("@org/ui"), ("@org/ui", ".".to_string()));
    }

    #[test]
    fn test_exports_resolution() {
        let exports = json!({
            ".": { "types": "./index.d.ts", "import": "./index.mjs", "default": "./index.js" },
            "./server": { "import": "./server.mjs", "require": "./server.cjs" },
            "./features/*": "./src/features/*.js",
            "./features/internal/*": null,
            "./legacy/": "./lib/",
            "./package.json": "./package.json"
        });
        assert_eq!(resolve_exports(&exports, ".", REQUIRE_CONDITIONS), Some("./index.js".to_string()));
        assert_eq!(resolve_exports(&exports, "./server", REQUIRE_CONDITIONS), Some("./server.cjs".to_string()));
        assert_eq!(resolve_exports(&exports, "./server", IMPORT_CONDITIONS), Some("./server.mjs".to_string()));
        assert_eq!(resolve_exports(&exports, ".", IMPORT_CONDITIONS), Some("./index.mjs".to_string()));
        assert_eq!(resolve_exports(&exports, "./features/a", REQUIRE_CONDITIONS), Some("./src/features/a.js".to_string()));
        assert_eq!(resolve_exports(&exports, "./features/internal/x", REQUIRE_CONDITIONS), None);
        assert_eq!(resolve_exports(&exports, "./legacy/util.js", REQUIRE_CONDITIONS), Some("./lib/util.js".to_string()));
        assert_eq!(resolve_exports(&exports, "./package.json", REQUIRE_CONDITIONS), Some("./package.json".to_string()));
        assert_eq!(resolve_exports(&exports, "./missing", REQUIRE_CONDITIONS), None);

        assert_eq!(resolve_exports(&json!("./main.js"), ".", REQUIRE_CONDITIONS), Some("./main.js".to_string()));
        assert_eq!(resolve_exports(&json!("./main.js"), "./package.json", REQUIRE_CONDITIONS), None);
        // Package order decides, not a fixed priority.
        assert_eq!(
            resolve_exports(&json!({ "require": "./cjs.js", "node": "./node.js" }), ".", REQUIRE_CONDITIONS),
            Some("./cjs.js".to_string())
        );
        assert_eq!(
            resolve_exports(&json!({ "node": "./node.js", "require": "./cjs.js" }), ".", REQUIRE_CONDITIONS),
            Some("./node.js".to_string())
        );
    }

    #[test]
    fn test_manifest_root_dir() {
        assert_eq!(manifest_root_dir("/app/node_modules/x/package.json"), "/app/node_modules/x");
        assert_eq!(manifest_root_dir("C:/app/node_modules/@org/ui/package.json"), "C:/app/node_modules/@org/ui");
        assert_eq!(manifest_root_dir("/package.json"), "/");
    }

    #[test]
    fn test_locates_plain_package() {
        let dir = tempfile::tempdir().unwrap();
        let package_dir = install(dir.path(), "plain", json!({ "name": "plain" }));

        let locator = DependencyLocator::default();
        assert_eq!(
            locator.locate_package_manifest("plain", dir.path()).unwrap(),
            posix(&package_dir.join(PACKAGE_MANIFEST))
        );
        assert_eq!(locator.locate_root_dir("plain", dir.path()).unwrap(), posix(&package_dir));
    }

    #[test]
    fn test_walks_up_from_nested_root() {
        let dir = tempfile::tempdir().unwrap();
        let package_dir = install(dir.path(), "@org/ui", json!({ "name": "@org/ui" }));
        let nested = dir.path().join("packages").join("app");
        fs::create_dir_all(&nested).unwrap();

        let locator = DependencyLocator::default();
        assert_eq!(locator.locate_root_dir("@org/ui", &nested).unwrap(), posix(&package_dir));
    }

    #[test]
    fn test_hidden_manifest_falls_back_to_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let package_dir = install(
            dir.path(),
            "sealed",
            json!({ "name": "sealed", "version": "1.2.3", "exports": { ".": "./index.js" } }),
        );

        let err = NodeResolver::require()
            .resolve("sealed/package.json", dir.path())
            .unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::PackagePathNotExported);
        assert!(err.message.starts_with("Package subpath './package.json' is not defined by \"exports\" in "));

        let locator = DependencyLocator::default();
        assert_eq!(
            locator.locate_package_manifest("sealed", dir.path()).unwrap(),
            posix(&package_dir.join(PACKAGE_MANIFEST))
        );
        let manifest = locator.read_package_manifest("sealed", dir.path()).unwrap();
        assert_eq!(manifest["version"], json!("1.2.3"));
    }

    #[test]
    fn test_missing_package_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let result = DependencyLocator::default().locate_package_manifest("absent", dir.path());
        assert!(matches!(
            result,
            Err(LoaderError::Resolve(ResolveError { code: ResolveErrorCode::ModuleNotFound, .. }))
        ));
    }

    #[test]
    fn test_diagnostic_with_one_absolute_path() {
        let locator = not_exported(
            "Package subpath './package.json' is not defined by \"exports\" in /app/node_modules/x/package.json",
        );
        assert_eq!(
            locator.locate_package_manifest("x", Path::new("/app")).unwrap(),
            "/app/node_modules/x/package.json"
        );
    }

    #[test]
    fn test_diagnostic_with_windows_path() {
        let locator = not_exported(
            "Package subpath './package.json' is not defined by \"exports\" in C:\\app\\node_modules\\x\\package.json",
        );
        assert_eq!(
            locator.locate_package_manifest("x", Path::new("C:\\app")).unwrap(),
            "C:/app/node_modules/x/package.json"
        );
    }

    #[test]
    fn test_diagnostic_without_exactly_one_path_is_internal() {
        let none = not_exported("Package subpath is not defined");
        assert!(matches!(
            none.locate_package_manifest("x", Path::new("/app")),
            Err(LoaderError::Core(CoreError::Internal(_)))
        ));

        let two = not_exported("/a/package.json and /b/package.json");
        assert!(matches!(
            two.locate_package_manifest("x", Path::new("/app")),
            Err(LoaderError::Core(CoreError::Internal(_)))
        ));

        let relative = not_exported("defined in node_modules/x/package.json");
        assert!(matches!(
            relative.locate_package_manifest("x", Path::new("/app")),
            Err(LoaderError::Core(CoreError::Internal(_)))
        ));
    }

    #[test]
    fn test_other_resolve_errors_are_not_parsed() {
        let locator = DependencyLocator::new(FailingResolver(ResolveError::new(
            ResolveErrorCode::ModuleNotFound,
            "Cannot find module /app/node_modules/x/package.json",
        )));
        assert!(matches!(
            locator.locate_package_manifest("x", Path::new("/app")),
            Err(LoaderError::Resolve(_))
        ));
    }

    #[test]
    fn test_invalid_name_is_internal() {
        let locator = DependencyLocator::new(FixedResolver("/app/node_modules/x/package.json".into()));
        assert!(matches!(
            locator.locate_package_manifest("../x", Path::new("/app")),
            Err(LoaderError::Core(CoreError::Internal(_)))
        ));
    }

    #[test]
    fn test_resolution_must_end_in_manifest() {
        let locator = DependencyLocator::new(FixedResolver("/app/node_modules/x/index.js".into()));
        assert!(matches!(
            locator.locate_package_manifest("x", Path::new("/app")),
            Err(LoaderError::Core(CoreError::Internal(_)))
        ));
    }

    #[test]
    fn test_non_object_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let package_dir = dir.path().join("node_modules").join("odd");
        fs::create_dir_all(&package_dir).unwrap();
        let manifest_path = package_dir.join(PACKAGE_MANIFEST);
        fs::write(&manifest_path, "[]").unwrap();

        let locator = DependencyLocator::new(FixedResolver(manifest_path));
        assert!(matches!(
            locator.read_package_manifest("odd", dir.path()),
            Err(LoaderError::ManifestRead { .. })
        ));
    }
}
