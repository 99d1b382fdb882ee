mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plusfile_loader::LoaderConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// plusfile - Validate plugin config, load plus files and locate dependencies
#[derive(Parser, Debug)]
#[command(name = "plusfile")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge plugin options with a resolved config file and print the result
    Merge {
        /// Plugin options as a JSON object
        #[arg(long, default_value = "{}")]
        options: String,

        /// JSON config file whose `vitePluginSsr` key holds the file options
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Transform and evaluate a plus file, then print its exports
    Load {
        /// Absolute path of the plus file
        file: PathBuf,

        /// Treat the file as a page declaration (`+config`): imports become import strings
        #[arg(long)]
        page_config: bool,

        /// Number of module worker threads
        #[arg(long, env = "PLUSFILE_WORKERS")]
        workers: Option<usize>,

        /// esbuild executable
        #[arg(long, env = "PLUSFILE_ESBUILD")]
        esbuild: Option<PathBuf>,
    },

    /// Print where a package's manifest and root directory are
    Locate {
        /// Package name, e.g. `react` or `@org/ui`
        package: String,

        /// Directory to resolve from
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plusfile=info,plusfile_loader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = match cli.command {
        Command::Merge { options, config } => commands::merge(&options, config.as_deref())?,
        Command::Load {
            file,
            page_config,
            workers,
            esbuild,
        } => {
            let config = loader_config(workers, esbuild)?;
            commands::load(&config, &file, page_config).await?
        }
        Command::Locate { package, root } => commands::locate(&package, &root)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Environment settings, overridden by flags.
fn loader_config(workers: Option<usize>, esbuild: Option<PathBuf>) -> Result<LoaderConfig> {
    let from_env = LoaderConfig::from_env()?;
    let config = LoaderConfig::new(
        workers.unwrap_or(from_env.worker_count),
        from_env.max_pending,
        esbuild.unwrap_or(from_env.esbuild_path),
    )?;

    tracing::debug!(
        workers = config.worker_count,
        esbuild = %config.esbuild_path.display(),
        "Loader configured"
    );
    Ok(config)
}
