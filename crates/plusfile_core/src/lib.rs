//! Pure plus-file logic - no I/O, no async, no side effects.
//!
//! This crate provides:
//! - Shape assertions over untyped JSON values
//! - Validation and merge of the two plugin configuration sources
//! - Import statement rewriting for page-declaration files
//! - Naming of ephemeral build artifacts and manifest path helpers
//!
//! # Example
//!
//! ```
//! use plusfile_core::{merge_config, rewrite_imports};
//! use serde_json::json;
//!
//! let config = merge_config(
//!     &json!({ "prerender": true, "pageFiles": { "include": ["a"] } }),
//!     &json!({ "pageFiles": { "include": ["b"] } }),
//! ).unwrap();
//! assert_eq!(config.page_files.include, vec!["a", "b"]);
//!
//! let code = rewrite_imports("import { Layout } from './Layout'");
//! assert_eq!(code, "const Layout = \"import:./Layout:Layout\";");
//! ```

mod artifact;
mod config;
mod error;
mod imports;
mod package;
mod shape;

pub use artifact::{
    artifact_path, artifact_path_with_tag, is_absolute_posix, is_artifact_file_name, random_tag,
    to_posix_path, AbsolutePosixPath, ARTIFACT_EXTENSION, BUILD_TAG_LENGTH,
};
pub use config::{
    assert_config, assert_resolved_config, config_file_format, merge_config, merge_sources,
    plugin_options_format, ConfigSource, InputFormat, NormalizedConfig, PageFilesConfig,
    PrerenderOptions,
};
pub use error::{CoreError, Result};
pub use imports::{import_string, parse_import_string, rewrite_imports, IMPORT_STRING_PREFIX};
pub use package::{is_package_name, manifest_path_from_diagnostic, PACKAGE_MANIFEST};
pub use shape::{assert_invariant, assert_usage, has_prop, is_object, PropType};
