//! Single-file transformation through an external compiler.

use std::path::PathBuf;

use async_trait::async_trait;
use plusfile_core::AbsolutePosixPath;
use thiserror::Error;
use tokio::process::Command;

use crate::error::LoadFailure;

/// Runtime versions the generated code must run on.
pub const NODE_TARGETS: &[&str] = &["node14.18", "node16"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMap {
    Inline,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Esm,
}

/// Options of one compilation. Output is always returned in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    pub platform: Platform,
    pub entry_point: String,
    pub sourcemap: SourceMap,
    pub target: Vec<String>,
    pub format: Format,
    /// Inline transitive imports.
    pub bundle: bool,
    /// Keep imports of installed packages external when bundling.
    pub packages_external: bool,
    pub minify: bool,
}

impl CompileOptions {
    /// Options used for plus files.
    pub fn for_entry(entry_point: &AbsolutePosixPath, bundle_dependencies: bool) -> Self {
        Self {
            platform: Platform::Node,
            entry_point: entry_point.as_str().to_string(),
            sourcemap: SourceMap::Inline,
            target: NODE_TARGETS.iter().map(|t| t.to_string()).collect(),
            format: Format::Esm,
            bundle: bundle_dependencies,
            packages_external: bundle_dependencies,
            minify: false,
        }
    }

    /// Command line arguments for the esbuild executable.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            self.entry_point.clone(),
            match self.platform {
                Platform::Node => "--platform=node".to_string(),
            },
        ];
        if self.sourcemap == SourceMap::Inline {
            args.push("--sourcemap=inline".to_string());
        }
        if !self.target.is_empty() {
            args.push(format!("--target={}", self.target.join(",")));
        }
        args.push(match self.format {
            Format::Esm => "--format=esm".to_string(),
        });
        args.push("--log-level=error".to_string());
        if self.bundle {
            args.push("--bundle".to_string());
            if self.packages_external {
                args.push("--packages=external".to_string());
            }
        }
        if self.minify {
            args.push("--minify".to_string());
        }
        args
    }
}

/// Generated code of one compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOutput {
    pub text: String,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Diagnostics(String),

    #[error("Compiler output is not valid UTF-8: {0}")]
    Output(String),
}

/// External single-file compiler.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, options: &CompileOptions) -> Result<CompileOutput, CompileError>;
}

/// Compiles by running the esbuild executable; output is read from stdout.
#[derive(Clone, Debug)]
pub struct EsbuildCompiler {
    program: PathBuf,
}

impl EsbuildCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for EsbuildCompiler {
    fn default() -> Self {
        Self::new("esbuild")
    }
}

#[async_trait]
impl Compiler for EsbuildCompiler {
    async fn compile(&self, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
        let output = Command::new(&self.program)
            .args(options.to_args())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompileError::Diagnostics(format!(
                "esbuild exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(output.stdout).map_err(|e| CompileError::Output(e.to_string()))?;
        Ok(CompileOutput { text })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TransformOptions {
    pub bundle_dependencies: bool,
}

/// Turn `file` into executable ES module code.
///
/// Compiler failures come back as [`LoadFailure::Transform`].
pub async fn transform<C: Compiler + ?Sized>(
    compiler: &C,
    file: &AbsolutePosixPath,
    options: TransformOptions,
) -> Result<String, LoadFailure> {
    tracing::debug!(
        file = %file,
        bundle = options.bundle_dependencies,
        "Transforming plus file"
    );

    let compile_options = CompileOptions::for_entry(file, options.bundle_dependencies);
    match compiler.compile(&compile_options).await {
        Ok(output) => Ok(output.text),
        Err(e) => {
            tracing::debug!(file = %file, error = %e, "Transform failed");
            Err(LoadFailure::Transform(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingCompiler {
        seen: Mutex<Vec<CompileOptions>>,
        fail: bool,
    }

    #[async_trait]
    impl Compiler for RecordingCompiler {
        async fn compile(&self, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
            self.seen.lock().unwrap().push(options.clone());
            if self.fail {
                return Err(CompileError::Diagnostics("Expected \";\" but found \"}\"".to_string()));
            }
            Ok(CompileOutput {
                text: "export default 1;\n".to_string(),
            })
        }
    }

    fn entry() -> AbsolutePosixPath {
        AbsolutePosixPath::new("/app/pages/+title.ts").unwrap()
    }

    #[test]
    fn test_args_without_bundling() {
        let args = CompileOptions::for_entry(&entry(), false).to_args();
        assert_eq!(
            args,
            vec![
                "/app/pages/+title.ts",
                "--platform=node",
                "--sourcemap=inline",
                "--target=node14.18,node16",
                "--format=esm",
                "--log-level=error",
            ]
        );
    }

    #[test]
    fn test_args_with_bundling() {
        let args = CompileOptions::for_entry(&entry(), true).to_args();
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--packages=external".to_string()));
        assert!(!args.contains(&"--minify".to_string()));
    }

    #[tokio::test]
    async fn test_transform_passes_bundle_flag() {
        let compiler = RecordingCompiler {
            seen: Mutex::new(Vec::new()),
            fail: false,
        };
        let code = transform(&compiler, &entry(), TransformOptions { bundle_dependencies: true })
            .await
            .unwrap();
        assert_eq!(code, "export default 1;\n");

        let seen = compiler.seen.lock().unwrap();
        assert!(seen[0].bundle);
        assert!(seen[0].packages_external);
        assert_eq!(seen[0].format, Format::Esm);
        assert_eq!(seen[0].sourcemap, SourceMap::Inline);
    }

    #[tokio::test]
    async fn test_transform_failure_is_captured() {
        let compiler = RecordingCompiler {
            seen: Mutex::new(Vec::new()),
            fail: true,
        };
        let result =
            transform(&compiler, &entry(), TransformOptions { bundle_dependencies: false }).await;
        assert!(matches!(result, Err(LoadFailure::Transform(msg)) if msg.contains("Expected")));
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_transform_failure() {
        let compiler = EsbuildCompiler::new("/nonexistent/plusfile-esbuild");
        let result =
            transform(&compiler, &entry(), TransformOptions { bundle_dependencies: false }).await;
        assert!(matches!(result, Err(LoadFailure::Transform(msg)) if msg.contains("Failed to run")));
    }
}
