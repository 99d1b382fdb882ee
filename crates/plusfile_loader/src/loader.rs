//! Transform a plus file, run the result once and capture its exports.

use std::path::Path;

use async_trait::async_trait;
use plusfile_core::{artifact_path, rewrite_imports, AbsolutePosixPath};

use crate::{
    compiler::{transform, Compiler, EsbuildCompiler, TransformOptions},
    config::LoaderConfig,
    ephemeral::EphemeralArtifact,
    error::{LoadFailure, Result},
    pool::ModulePool,
    Exports,
};

/// Loads an executable module from disk and returns its exports.
#[async_trait]
pub trait ModuleRunner: Send + Sync {
    async fn import(&self, artifact: &Path) -> std::result::Result<Exports, LoadFailure>;
}

/// Result of loading one plus file: its exports or why there are none.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Exports),
    Failed(LoadFailure),
}

impl LoadOutcome {
    pub fn exports(&self) -> Option<&Exports> {
        match self {
            LoadOutcome::Loaded(exports) => Some(exports),
            LoadOutcome::Failed(_) => None,
        }
    }

    pub fn err(&self) -> Option<&LoadFailure> {
        match self {
            LoadOutcome::Loaded(_) => None,
            LoadOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> std::result::Result<Exports, LoadFailure> {
        match self {
            LoadOutcome::Loaded(exports) => Ok(exports),
            LoadOutcome::Failed(failure) => Err(failure),
        }
    }
}

impl From<std::result::Result<Exports, LoadFailure>> for LoadOutcome {
    fn from(result: std::result::Result<Exports, LoadFailure>) -> Self {
        match result {
            Ok(exports) => LoadOutcome::Loaded(exports),
            Err(failure) => LoadOutcome::Failed(failure),
        }
    }
}

/// Transforms plus files and loads them through a [`ModuleRunner`].
///
/// Safe to share between concurrent loads: every load writes its own
/// uniquely named artifact and removes it before returning.
pub struct PlusFileLoader<C, R> {
    compiler: C,
    runner: R,
}

impl PlusFileLoader<EsbuildCompiler, ModulePool> {
    /// esbuild compiler and a module pool sized by `config`.
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        Ok(Self::new(
            EsbuildCompiler::new(config.esbuild_path.clone()),
            ModulePool::new(config)?,
        ))
    }
}

impl<C: Compiler, R: ModuleRunner> PlusFileLoader<C, R> {
    pub fn new(compiler: C, runner: R) -> Self {
        Self { compiler, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Load a page-declaration file (`+config`): imports are not bundled but
    /// replaced by import strings.
    pub async fn transpile_and_load_page_config(&self, file_path: &str) -> Result<LoadOutcome> {
        self.load_transformed(file_path, true).await
    }

    /// Load a config value file: local imports are bundled.
    pub async fn transpile_and_load_config_value_file(&self, file_path: &str) -> Result<LoadOutcome> {
        self.load_transformed(file_path, false).await
    }

    /// Transform `file_path`, evaluate it and capture its exports.
    ///
    /// `file_path` must be absolute and use forward slashes, anything else is
    /// a caller bug. Compiler and evaluation failures are returned as
    /// [`LoadOutcome::Failed`]; errors are reserved for broken invariants and
    /// artifact I/O. The artifact is removed before this returns.
    pub async fn load_transformed(&self, file_path: &str, is_page_config: bool) -> Result<LoadOutcome> {
        let source = AbsolutePosixPath::new(file_path)?;

        let options = TransformOptions {
            bundle_dependencies: !is_page_config,
        };
        let code = match transform(&self.compiler, &source, options).await {
            Ok(code) => code,
            Err(failure) => return Ok(LoadOutcome::Failed(failure)),
        };
        let code = if is_page_config {
            rewrite_imports(&code)
        } else {
            code
        };

        let artifact = EphemeralArtifact::create(&artifact_path(&source), &code)?;
        let imported = self.runner.import(artifact.path()).await;
        artifact.release()?;

        match &imported {
            Ok(exports) => tracing::debug!(file = %source, exports = exports.len(), "Loaded plus file"),
            Err(failure) => tracing::debug!(file = %source, error = %failure, "Plus file failed to load"),
        }

        Ok(imported.into())
    }
}
