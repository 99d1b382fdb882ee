//! Forward-slash paths and naming of ephemeral build artifacts.

use rand::{distr::Alphanumeric, Rng};

use crate::error::{CoreError, Result};

/// Length of the random tag in artifact file names.
pub const BUILD_TAG_LENGTH: usize = 12;

/// Extension of generated artifacts, always loaded as ES modules.
pub const ARTIFACT_EXTENSION: &str = "mjs";

const BUILD_TAG_PREFIX: &str = "[build:";

/// An absolute path using forward slashes only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbsolutePosixPath(String);

impl AbsolutePosixPath {
    /// Fails with [`CoreError::Internal`]: callers must normalize paths first.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.contains('\\') {
            return Err(CoreError::Internal(format!(
                "path `{path}` is not forward-slash normalized"
            )));
        }
        if !is_absolute_posix(&path) {
            return Err(CoreError::Internal(format!("path `{path}` is not absolute")));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part, `/` for files at the root.
    pub fn dirname(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((dir, _)) if dir.ends_with(':') => &self.0[..dir.len() + 1],
            Some((dir, _)) => dir,
        }
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Append `name` to this path, treated as a directory.
    pub fn join(&self, name: &str) -> Self {
        if self.0.ends_with('/') {
            Self(format!("{}{name}", self.0))
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }
}

impl std::fmt::Display for AbsolutePosixPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AbsolutePosixPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Replace backslashes with forward slashes.
pub fn to_posix_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// `/abs` on Unix or `C:/abs` on Windows.
pub fn is_absolute_posix(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

/// Generate a random alphanumeric tag.
pub fn random_tag(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Temporary path for the artifact generated from `source`.
///
/// The artifact sits next to its source so relative imports keep resolving.
pub fn artifact_path(source: &AbsolutePosixPath) -> AbsolutePosixPath {
    artifact_path_with_tag(source, &random_tag(BUILD_TAG_LENGTH))
}

pub fn artifact_path_with_tag(source: &AbsolutePosixPath, tag: &str) -> AbsolutePosixPath {
    let dir = AbsolutePosixPath(source.dirname().to_string());
    dir.join(&format!(
        "{BUILD_TAG_PREFIX}{tag}]{}.{ARTIFACT_EXTENSION}",
        source.file_name()
    ))
}

/// Returns true if `file_name` looks like a name produced by [`artifact_path`].
pub fn is_artifact_file_name(file_name: &str) -> bool {
    file_name.starts_with(BUILD_TAG_PREFIX)
        && file_name.ends_with(&format!(".{ARTIFACT_EXTENSION}"))
        && file_name[BUILD_TAG_PREFIX.len()..].contains(']')
}
