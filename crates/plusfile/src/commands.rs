//! Subcommand implementations. Each returns the JSON document to print.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use plusfile_core::{merge_config, to_posix_path};
use plusfile_loader::{manifest_root_dir, DependencyLocator, LoaderConfig, PlusFileLoader};
use serde_json::{json, Map, Value};

/// Key of the plugin section in a resolved build config.
const CONFIG_FILE_KEY: &str = "vitePluginSsr";

/// Validate and merge invocation options with the config file section.
pub fn merge(options: &str, config_file: Option<&Path>) -> Result<Value> {
    let from_invocation: Value =
        serde_json::from_str(options).context("--options is not valid JSON")?;

    let from_file = match config_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let resolved: Value = serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            resolved
                .get(CONFIG_FILE_KEY)
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()))
        }
        None => Value::Object(Map::new()),
    };

    let merged = merge_config(&from_invocation, &from_file)?;
    Ok(serde_json::to_value(merged)?)
}

/// Load one plus file and return its exports.
pub async fn load(config: &LoaderConfig, file: &Path, page_config: bool) -> Result<Value> {
    let file = absolute(file)?;
    let file = to_posix_path(&file.to_string_lossy());

    let loader = PlusFileLoader::from_config(config)?;
    let outcome = loader.load_transformed(&file, page_config).await?;

    match outcome.into_result() {
        Ok(exports) => Ok(Value::Object(exports)),
        Err(failure) => bail!("{file}: {failure}"),
    }
}

/// Locate a package's manifest and root directory.
pub fn locate(package: &str, root: &Path) -> Result<Value> {
    let root = absolute(root)?;
    let locator = DependencyLocator::default();

    let manifest = locator.locate_package_manifest(package, &root)?;
    let root_dir = manifest_root_dir(&manifest);

    tracing::debug!(package, manifest = %manifest, "Located package");
    Ok(json!({ "manifest": manifest, "rootDir": root_dir }))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(cwd.join(path))
}
