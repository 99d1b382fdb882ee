//! Plus-file Loader - Imperative Shell.
//!
//! This crate orchestrates I/O operations using pure functions from
//! `plusfile_core`. It transforms plus files with esbuild, writes the result
//! to an ephemeral artifact next to the source, evaluates it in a fresh
//! `deno_core` runtime on a worker pool and captures its exports.
//!
//! # Architecture
//!
//! - **Functional Core** (`plusfile_core`): Config validation, import rewriting, artifact naming
//! - **Imperative Shell** (this crate): Compiler process, artifact files, threading, JsRuntime execution
//!
//! # Example
//!
//! ```ignore
//! use plusfile_loader::{LoaderConfig, PlusFileLoader};
//!
//! // Spawns the module workers
//! let loader = PlusFileLoader::from_config(&LoaderConfig::with_defaults(2).unwrap()).unwrap();
//!
//! // Compiles, evaluates and removes the artifact again
//! let outcome = loader
//!     .transpile_and_load_page_config("/app/pages/index/+config.ts")
//!     .await
//!     .unwrap();
//! match outcome.into_result() {
//!     Ok(exports) => println!("{}", serde_json::Value::Object(exports)),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! ```

mod compiler;
mod config;
mod deps;
mod ephemeral;
mod error;
mod loader;
mod pool;
mod runtime;
mod worker;

/// Exports of an evaluated module, keyed by export name.
pub type Exports = serde_json::Map<String, serde_json::Value>;

// Re-export core types for convenience
pub use plusfile_core::{
    merge_config, merge_sources, AbsolutePosixPath, ConfigSource, CoreError, NormalizedConfig,
};

// Export shell types
pub use compiler::{
    transform, CompileError, CompileOptions, CompileOutput, Compiler, EsbuildCompiler, Format,
    Platform, SourceMap, TransformOptions, NODE_TARGETS,
};
pub use config::LoaderConfig;
pub use deps::{
    manifest_root_dir, DependencyLocator, NodeResolver, ResolveError, ResolveErrorCode, Resolver,
    IMPORT_CONDITIONS, REQUIRE_CONDITIONS,
};
pub use ephemeral::EphemeralArtifact;
pub use error::{LoadFailure, LoaderError, Result};
pub use loader::{LoadOutcome, ModuleRunner, PlusFileLoader};
pub use pool::{ModulePool, ModulePoolStats};
