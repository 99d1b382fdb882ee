//! Package names and manifest paths.

use crate::artifact::{is_absolute_posix, to_posix_path};
use crate::error::{CoreError, Result};

/// File name of a package manifest.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Returns true for `name` or `@scope/name`, each part made of letters,
/// digits, `-`, `_` and `.`, not starting with a dot.
pub fn is_package_name(name: &str) -> bool {
    fn is_part(part: &str) -> bool {
        !part.is_empty()
            && !part.starts_with('.')
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, rest)) => is_part(scope) && is_part(rest),
            None => false,
        },
        None => is_part(name),
    }
}

/// Pull the manifest path out of a resolver diagnostic.
///
/// The diagnostic for a package whose export map hides its manifest embeds
/// the manifest's absolute path as a whitespace-delimited word. Exactly one
/// such word must be present and it must be absolute.
pub fn manifest_path_from_diagnostic(message: &str) -> Result<String> {
    let matches: Vec<&str> = message
        .split_whitespace()
        .filter(|word| word.ends_with(PACKAGE_MANIFEST))
        .collect();

    let [path] = matches.as_slice() else {
        return Err(CoreError::Internal(format!(
            "expected exactly one manifest path in resolver message, found {}: {message}",
            matches.len()
        )));
    };
    if !is_absolute_posix(&to_posix_path(path)) {
        return Err(CoreError::Internal(format!(
            "manifest path `{path}` in resolver message is not absolute"
        )));
    }

    Ok((*path).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_names() {
        assert!(is_package_name("react"));
        assert!(is_package_name("vite-plugin-ssr"));
        assert!(is_package_name("@brillout/stem-react"));
        assert!(is_package_name("lodash.merge"));
        assert!(is_package_name("My_Pkg2"));

        assert!(!is_package_name(""));
        assert!(!is_package_name("@scope"));
        assert!(!is_package_name("@/name"));
        assert!(!is_package_name("react/package.json"));
        assert!(!is_package_name("../escape"));
        assert!(!is_package_name("has space"));
    }

    #[test]
    fn test_manifest_path_from_node_message() {
        let message = "Package subpath './package.json' is not defined by \"exports\" in /home/dev/app/node_modules/@brillout/stem-react/package.json";
        assert_eq!(
            manifest_path_from_diagnostic(message).unwrap(),
            "/home/dev/app/node_modules/@brillout/stem-react/package.json"
        );
    }

    #[test]
    fn test_manifest_path_windows_message() {
        let message = "not defined by \"exports\" in C:\\app\\node_modules\\x\\package.json";
        assert_eq!(
            manifest_path_from_diagnostic(message).unwrap(),
            "C:\\app\\node_modules\\x\\package.json"
        );
    }

    #[test]
    fn test_manifest_path_requires_exactly_one_match() {
        assert!(matches!(
            manifest_path_from_diagnostic("no path here"),
            Err(CoreError::Internal(_))
        ));
        assert!(matches!(
            manifest_path_from_diagnostic("/a/package.json and /b/package.json"),
            Err(CoreError::Internal(_))
        ));
    }

    #[test]
    fn test_manifest_path_must_be_absolute() {
        assert!(matches!(
            manifest_path_from_diagnostic("subpath './package.json' not exported"),
            Err(CoreError::Internal(_))
        ));
    }
}
