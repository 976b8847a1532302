use crate::paths::{default_plugins_root, PathError};
use crate::RootContext;
use derive_more::{Display, From};
use log::debug;
use std::env;
use std::path::PathBuf;

/// Overrides the directory plugin repositories are cloned into
pub const PLUGINS_ROOT_ENV: &str = "PLUGGED_PLUGINS_ROOT";
/// Overrides the manifest file holding the version
pub const MANIFEST_ENV: &str = "PLUGGED_MANIFEST";
/// Overrides the base url printed in clone instructions
pub const CLONE_URL_ENV: &str = "PLUGGED_CLONE_URL";

#[derive(Debug, From, Display)]
pub enum ConfigError {
    #[display(fmt = "Unable to resolve configured paths: {}", _0)]
    Path(PathError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub struct Config;

impl Config {
    /// Builds the root context from the process environment, loading
    /// a `.env` file first when one is present
    pub fn from_env() -> ConfigResult<RootContext> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let working_dir = env::current_dir().map_err(PathError::IO)?;
        Self::from_vars(working_dir, |key| env::var(key).ok())
    }

    /// Builds the root context using `lookup` to read variables
    fn from_vars(
        working_dir: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<RootContext> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let plugins_root = match var(PLUGINS_ROOT_ENV) {
            Some(value) => PathBuf::from(value),
            None => default_plugins_root()?,
        };

        let mut context = RootContext::new(plugins_root, working_dir);
        if let Some(manifest) = var(MANIFEST_ENV) {
            context.manifest = PathBuf::from(manifest);
        }
        if let Some(url) = var(CLONE_URL_ENV) {
            context.clone_base_url = url.trim_end_matches('/').to_string();
        }

        debug!("Using plugins root {}", context.plugins_root.display());
        Ok(context)
    }
}
