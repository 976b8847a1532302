use clap::{Parser, Subcommand};
use env_logger::{Env, WriteStyle};
use log::{error, warn};
use plugged::{create_branch, setup, stage_changes, update_version, Config, Error};
use std::process::exit;

/// Automate boring tasks related to working with plugins
#[derive(Parser)]
#[command(name = "plugged", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a new branch in the plugin repo
    #[command(visible_alias = "nb")]
    NewBranch {
        /// Name of the new branch
        #[arg(default_value = "")]
        name: String,
    },
    /// Copy all your changes to the plugin repo
    #[command(visible_alias = "sc")]
    StageChanges,
    /// Update the version number in package.json and files specified by --files
    #[command(visible_alias = "uv")]
    UpdateVersion {
        /// One of major, minor or patch
        #[arg(default_value = "")]
        level: String,
        /// Comma separated list of other files to change the version in
        #[arg(short, long)]
        files: Option<String>,
    },
    /// Create the directories plugged needs
    Setup,
}

fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .write_style(WriteStyle::Auto)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logger();

    match run(cli.command).await {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(err) if err.is_guard() => warn!("{err}"),
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    }
}

/// Runs the command returning whether it fully succeeded
async fn run(command: Commands) -> Result<bool, Error> {
    let root = Config::from_env()?;
    match command {
        Commands::NewBranch { name } => {
            create_branch(&root, &name)?;
        }
        Commands::StageChanges => {
            let report = stage_changes(&root).await?;
            for failure in &report.failures {
                error!("Failed to stage {}: {}", failure.path.display(), failure.error);
            }
            if !report.is_complete() {
                error!(
                    "{} entries could not be staged into {}",
                    report.failures.len(),
                    report.plugin_dir.display()
                );
                return Ok(false);
            }
        }
        Commands::UpdateVersion { level, files } => {
            update_version(&root, &level, files.as_deref()).await?;
        }
        Commands::Setup => {
            setup(&root).await?;
        }
    }
    Ok(true)
}
