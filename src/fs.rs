use async_walkdir::WalkDir;
use futures::StreamExt;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{copy, create_dir_all, remove_dir_all, remove_file, symlink_metadata};
#[cfg(unix)]
use tokio::fs::{read_link, symlink};

/// A single filesystem operation that failed while the surrounding
/// batch carried on
#[derive(Debug)]
pub struct FsFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Safely creates a directory ensuring that if a non directory
/// exists at the path its removed and the directory is created
pub async fn create_directory(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        if !path.is_dir() {
            remove_file(path).await?;
            create_dir_all(path).await?;
        }
    } else {
        create_dir_all(path).await?;
    }
    Ok(())
}

/// Removes any existing file, symlink or directory at the provided
/// path. Symlinks are removed themselves, never their targets.
pub async fn remove_existing(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    let metadata = match symlink_metadata(path).await {
        Ok(value) => value,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        remove_dir_all(path).await
    } else {
        remove_file(path).await
    }
}

/// Copies `from` to `to`, recursing into directories. Every entry is
/// attempted and the ones that failed are returned. Returns the
/// number of files copied alongside the failures.
pub async fn copy_recursive(from: &Path, to: &Path) -> (usize, Vec<FsFailure>) {
    let mut failures = Vec::new();

    let metadata = match symlink_metadata(from).await {
        Ok(value) => value,
        Err(error) => {
            failures.push(FsFailure {
                path: from.to_path_buf(),
                error,
            });
            return (0, failures);
        }
    };

    if metadata.file_type().is_symlink() {
        if let Err(error) = copy_symlink(from, to).await {
            failures.push(FsFailure {
                path: from.to_path_buf(),
                error,
            });
        }
        return (0, failures);
    }

    if !metadata.is_dir() {
        return match copy(from, to).await {
            Ok(_) => (1, failures),
            Err(error) => {
                failures.push(FsFailure {
                    path: from.to_path_buf(),
                    error,
                });
                (0, failures)
            }
        };
    }

    if let Err(error) = create_directory(to).await {
        failures.push(FsFailure {
            path: to.to_path_buf(),
            error,
        });
        return (0, failures);
    }

    let mut copied = 0;
    let mut entries = WalkDir::new(from);
    while let Some(entry) = entries.next().await {
        let entry = match entry {
            Ok(value) => value,
            Err(error) => {
                failures.push(FsFailure {
                    path: from.to_path_buf(),
                    error,
                });
                continue;
            }
        };

        let source = entry.path();
        let target = match source.strip_prefix(from) {
            Ok(relative) => to.join(relative),
            Err(_) => continue,
        };

        let result = match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => create_directory(&target).await,
            Ok(file_type) if file_type.is_symlink() => copy_symlink(&source, &target).await,
            Ok(_) => copy_file(&source, &target).await.map(|_| copied += 1),
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            failures.push(FsFailure {
                path: source,
                error,
            });
        }
    }

    debug!("Copied {copied} files from {}", from.display());
    (copied, failures)
}

/// Copies a single file making sure its parent directory exists,
/// the walk does not promise parents are visited first
async fn copy_file(from: &Path, to: &Path) -> io::Result<u64> {
    if let Some(parent) = to.parent() {
        create_dir_all(parent).await?;
    }
    copy(from, to).await
}

/// Recreates the symlink at `from` as `to` pointing at the same target
#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = read_link(from).await?;
    if let Some(parent) = to.parent() {
        create_dir_all(parent).await?;
    }
    remove_existing(to).await?;
    symlink(target, to).await
}

#[cfg(not(unix))]
async fn copy_symlink(from: &Path, _to: &Path) -> io::Result<()> {
    debug!("Skipping symlink {}", from.display());
    Ok(())
}
