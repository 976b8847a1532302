use derive_more::{Display, From};
use std::path::PathBuf;

pub mod config;
pub mod fs;
pub mod git;
pub mod paths;
pub mod stage;
pub mod version;

pub use config::{Config, ConfigError};
pub use git::{create_branch, RepositoryError};
pub use paths::PathError;
pub use stage::{setup, stage_changes, StageError, StageReport};
pub use version::{update_version, Level, Version, VersionBump, VersionError};

/// Manifest file updated by default when bumping versions
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Organisation plugin repositories are cloned from
pub const DEFAULT_CLONE_BASE_URL: &str = "https://github.com/designcontainer";

/// Everything an operation needs to know about where it runs. Built
/// from the environment by [`Config::from_env`] or directly in tests.
#[derive(Debug, Clone)]
pub struct RootContext {
    /// Directory holding every plugin repository clone
    pub plugins_root: PathBuf,
    /// The site repository's copy of the plugin
    pub working_dir: PathBuf,
    /// Manifest file relative to the working directory
    pub manifest: PathBuf,
    pub clone_base_url: String,
}

impl RootContext {
    pub fn new(plugins_root: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_root: plugins_root.into(),
            working_dir: working_dir.into(),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            clone_base_url: DEFAULT_CLONE_BASE_URL.to_string(),
        }
    }

    /// The plugin repository matching the working directory
    pub fn plugin_dir(&self) -> paths::PathResult<PathBuf> {
        paths::plugin_dir(&self.plugins_root, &self.working_dir)
    }

    pub fn plugin_name(&self) -> paths::PathResult<String> {
        paths::plugin_name(&self.working_dir)
    }

    /// The git command that creates the plugin clone when it is missing
    pub fn clone_command(&self) -> paths::PathResult<String> {
        let name = self.plugin_name()?;
        Ok(format!(
            "git clone {}/{name} {}",
            self.clone_base_url,
            self.plugins_root.join(&name).display()
        ))
    }
}

#[derive(Debug, From, Display)]
pub enum Error {
    Config(ConfigError),
    Path(PathError),
    Repository(RepositoryError),
    Stage(StageError),
    Version(VersionError),
}

impl Error {
    /// Guard errors mean the command refused to run and left
    /// everything untouched, they are not failures of the tool
    pub fn is_guard(&self) -> bool {
        match self {
            Error::Repository(err) => err.is_guard(),
            Error::Stage(err) => err.is_guard(),
            Error::Version(err) => err.is_guard(),
            Error::Config(_) | Error::Path(_) => false,
        }
    }
}
