use derive_more::{Display, From};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, From, Display)]
pub enum PathError {
    #[display(fmt = "Unable to determine the current working directory: {}", _0)]
    IO(io::Error),
    #[display(fmt = "Unable to determine the home directory of the current user")]
    #[from(ignore)]
    MissingHome,
    #[display(fmt = "Working directory {} has no base name to derive a plugin from", _0)]
    #[from(ignore)]
    MissingBaseName(String),
}

pub type PathResult<T> = Result<T, PathError>;

/// Name of the directory inside the home directory that holds
/// all the plugin repositories
pub const PLUGINS_DIR_NAME: &str = "plugins";

/// Finds the home directory of the current user
pub fn home_dir() -> PathResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(PathError::MissingHome)
}

/// The default root where every plugin repository is cloned (~/plugins)
pub fn default_plugins_root() -> PathResult<PathBuf> {
    Ok(home_dir()?.join(PLUGINS_DIR_NAME))
}

/// Resolves the plugin repository matching the provided working
/// directory. The plugin repository shares the base name of the
/// working directory and lives directly under `plugins_root`.
///
/// Nothing is checked on disk, callers decide what a missing
/// directory means for them.
pub fn plugin_dir(plugins_root: &Path, working_dir: &Path) -> PathResult<PathBuf> {
    let name = plugin_name(working_dir)?;
    Ok(plugins_root.join(name))
}

/// The base name of the working directory, which doubles as the
/// name of the plugin repository
pub fn plugin_name(working_dir: &Path) -> PathResult<String> {
    working_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| PathError::MissingBaseName(working_dir.display().to_string()))
}
