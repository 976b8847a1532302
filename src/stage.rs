use crate::fs::{copy_recursive, remove_existing, FsFailure};
use crate::git::is_valid_git;
use crate::paths::PathError;
use crate::RootContext;
use derive_more::{Display, From};
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{canonicalize, create_dir_all, read_dir};

/// Names at the top of a plugin that staging never deletes or overwrites
pub const IGNORED_NAMES: [&str; 4] = [".git", ".gitignore", "node_modules", ".env"];

#[derive(Debug, From, Display)]
pub enum StageError {
    #[display(fmt = "Unable to resolve the plugin directory: {}", _0)]
    Path(PathError),
    #[display(fmt = "IO Error occurred while listing {}: {}", path, source)]
    #[from(ignore)]
    List { path: String, source: io::Error },
    #[display(fmt = "IO Error occurred while creating {}: {}", path, source)]
    #[from(ignore)]
    Create { path: String, source: io::Error },
    #[display(fmt = "{} does not exist.\nRun `$ {}`", path, clone_command)]
    #[from(ignore)]
    MissingPluginDir { path: String, clone_command: String },
    #[display(
        fmt = "{} is the plugin repository itself.\nRun this from the plugin directory of the site repository.",
        _0
    )]
    #[from(ignore)]
    SameDirectory(String),
}

impl StageError {
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            StageError::MissingPluginDir { .. } | StageError::SameDirectory(_)
        )
    }
}

pub type StageResult<T> = Result<T, StageError>;

/// Outcome of a staging run. Individual deletes and copies that failed
/// do not stop the run, they are collected in `failures` so the caller
/// can decide whether a partial stage is acceptable.
#[derive(Debug)]
pub struct StageReport {
    pub plugin_dir: PathBuf,
    /// Top level entries removed from the plugin directory
    pub removed: usize,
    /// Files copied into the plugin directory
    pub copied: usize,
    pub failures: Vec<FsFailure>,
}

impl StageReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn is_ignored(name: &str) -> bool {
    IGNORED_NAMES.contains(&name)
}

/// Replaces the contents of the plugin repository with the contents
/// of the working directory, leaving the ignored names untouched on
/// both sides
pub async fn stage_changes(root: &RootContext) -> StageResult<StageReport> {
    let plugin_dir = root.plugin_dir()?;
    if !plugin_dir.exists() {
        return Err(StageError::MissingPluginDir {
            path: plugin_dir.display().to_string(),
            clone_command: root.clone_command()?,
        });
    }
    if same_directory(&plugin_dir, &root.working_dir).await {
        return Err(StageError::SameDirectory(plugin_dir.display().to_string()));
    }
    if !is_valid_git(&plugin_dir) {
        warn!("{} is not a git clone", plugin_dir.display());
    }

    let mut failures = Vec::new();

    let mut removed = 0;
    for (name, path) in list_entries(&plugin_dir).await? {
        debug!("Removing {name}");
        match remove_existing(&path).await {
            Ok(_) => removed += 1,
            Err(error) => failures.push(FsFailure { path, error }),
        }
    }

    let mut copied = 0;
    for (name, path) in list_entries(&root.working_dir).await? {
        debug!("Copying {name}");
        let (count, errors) = copy_recursive(&path, &plugin_dir.join(&name)).await;
        copied += count;
        failures.extend(errors);
    }

    info!(
        "Staged changes. They are ready to be committed in {}",
        plugin_dir.display()
    );
    Ok(StageReport {
        plugin_dir,
        removed,
        copied,
        failures,
    })
}

/// Whether both paths resolve to the same directory on disk
async fn same_directory(left: &Path, right: &Path) -> bool {
    match (canonicalize(left).await, canonicalize(right).await) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Lists the entries directly inside `dir` that staging is allowed to touch
async fn list_entries(dir: &Path) -> StageResult<Vec<(String, PathBuf)>> {
    let list_error = |source| StageError::List {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = Vec::new();
    let mut reader = read_dir(dir).await.map_err(list_error)?;
    while let Some(entry) = reader.next_entry().await.map_err(list_error)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_ignored(&name) {
            entries.push((name, entry.path()));
        }
    }
    entries.sort();
    Ok(entries)
}

/// Creates the plugins root when it does not exist yet. Returns
/// whether the directory had to be created.
pub async fn setup(root: &RootContext) -> StageResult<bool> {
    let path = &root.plugins_root;
    if path.is_dir() {
        info!("Setup complete.");
        return Ok(false);
    }

    info!("{} does not exist. Creating it.", path.display());
    create_dir_all(path)
        .await
        .map_err(|source| StageError::Create {
            path: path.display().to_string(),
            source,
        })?;
    info!("Setup complete.");
    Ok(true)
}
