use crate::paths::PathError;
use crate::RootContext;
use derive_more::{Display, From};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs::{read_to_string, write};

#[derive(Debug, From, Display)]
pub enum VersionError {
    #[display(fmt = "Unable to resolve the plugin directory: {}", _0)]
    Path(PathError),
    #[display(fmt = "Invalid level. Use one of the following: major, minor, patch.")]
    #[from(ignore)]
    InvalidLevel(String),
    #[display(fmt = "IO Error occurred while reading {}: {}", path, source)]
    #[from(ignore)]
    Read { path: String, source: io::Error },
    #[display(fmt = "IO Error occurred while writing {}: {}", path, source)]
    #[from(ignore)]
    Write { path: String, source: io::Error },
    #[display(fmt = "Unable to parse manifest {}: {}", path, source)]
    #[from(ignore)]
    Manifest {
        path: String,
        source: serde_json::Error,
    },
    #[display(fmt = "Manifest {} has no \"version\" field holding {}", path, version)]
    #[from(ignore)]
    MissingField { path: String, version: String },
    #[display(fmt = "Version {} does not have exactly three segments", _0)]
    #[from(ignore)]
    Segments(String),
    #[display(fmt = "Version segment {} of {} is not a number", segment, version)]
    #[from(ignore)]
    NotNumeric { version: String, segment: String },
    #[display(fmt = "Version segment {} of {} is too large to bump", segment, version)]
    #[from(ignore)]
    Overflow { version: String, segment: String },
    #[display(fmt = "{} does not contain version {}", path, version)]
    #[from(ignore)]
    VersionNotFound { path: String, version: String },
}

impl VersionError {
    pub fn is_guard(&self) -> bool {
        matches!(self, VersionError::InvalidLevel(_))
    }
}

pub type VersionResult<T> = Result<T, VersionError>;

/// The segment of a version to increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Major,
    Minor,
    Patch,
}

impl Level {
    fn index(self) -> usize {
        match self {
            Level::Major => 0,
            Level::Minor => 1,
            Level::Patch => 2,
        }
    }
}

impl FromStr for Level {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "major" => Ok(Level::Major),
            "minor" => Ok(Level::Minor),
            "patch" => Ok(Level::Patch),
            other => Err(VersionError::InvalidLevel(other.to_string())),
        }
    }
}

/// A `major.minor.patch` version. Segments are kept as written so
/// the ones that are not bumped come out exactly as they went in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    segments: [String; 3],
}

impl Version {
    /// Increments the segment selected by `level`. The segments
    /// after it keep their value, bumping 1.2.3 by minor gives 1.3.3
    pub fn bump(&self, level: Level) -> VersionResult<Version> {
        let index = level.index();
        let segment = &self.segments[index];
        let value: u64 = segment.parse().map_err(|_| VersionError::NotNumeric {
            version: self.to_string(),
            segment: segment.clone(),
        })?;

        let value = value.checked_add(1).ok_or_else(|| VersionError::Overflow {
            version: self.to_string(),
            segment: segment.clone(),
        })?;

        let mut segments = self.segments.clone();
        segments[index] = value.to_string();
        Ok(Version { segments })
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split('.').collect();
        match parts.as_slice() {
            [major, minor, patch] => Ok(Version {
                segments: [major.to_string(), minor.to_string(), patch.to_string()],
            }),
            _ => Err(VersionError::Segments(value.to_string())),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

lazy_static! {
    /// The `: "..."` following a `"version"` key, capturing the value
    static ref VERSION_VALUE: Regex = Regex::new(r#"^\s*:\s*"([^"\\]*)""#).unwrap();
}

#[derive(Deserialize)]
struct ManifestVersion {
    version: String,
}

/// Finds the byte range of the value of the `version` member of the
/// top level object. Members of nested objects are skipped.
fn top_level_version(text: &str) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b'"' => {
                let start = index + 1;
                let end = string_end(bytes, start)?;
                if depth == 1 && &text[start..end] == "version" {
                    let rest = end + 1;
                    if let Some(value) = VERSION_VALUE
                        .captures(&text[rest..])
                        .and_then(|captures| captures.get(1))
                    {
                        return Some(rest + value.start()..rest + value.end());
                    }
                }
                index = end;
            }
            _ => {}
        }
        index += 1;
    }
    None
}

/// Index of the quote closing the string whose contents begin at `start`
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut index = start;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            b'"' => return Some(index),
            _ => index += 1,
        }
    }
    None
}

/// Replaces the value of the top level `version` field with `new` when
/// it holds `old`, leaving every other byte of the manifest as it was
pub fn replace_version_field(text: &str, old: &str, new: &str) -> Option<String> {
    let value = top_level_version(text)?;
    if &text[value.clone()] != old {
        return None;
    }

    let mut out = String::with_capacity(text.len() + new.len());
    out.push_str(&text[..value.start]);
    out.push_str(new);
    out.push_str(&text[value.end..]);
    Some(out)
}

/// Replaces the first occurrence of `old` anywhere in the text
pub fn replace_first(text: &str, old: &str, new: &str) -> Option<String> {
    text.find(old).map(|_| text.replacen(old, new, 1))
}

/// Result of bumping the version of a plugin
#[derive(Debug)]
pub struct VersionBump {
    pub old: Version,
    pub new: Version,
    /// Files rewritten in the working directory
    pub files: Vec<PathBuf>,
}

/// Bumps the version in the manifest and each comma separated file in
/// `files`, then mirrors the rewritten files into the plugin repository.
///
/// Every file is read and checked before anything is written, so an
/// invalid level, a broken manifest, or an extra file missing the old
/// version leaves all files unchanged.
pub async fn update_version(
    root: &RootContext,
    level: &str,
    files: Option<&str>,
) -> VersionResult<VersionBump> {
    let level = Level::from_str(level.trim())?;

    let manifest = root.manifest.clone();
    let manifest_text = read_file(&root.working_dir.join(&manifest)).await?;
    let fields: ManifestVersion =
        serde_json::from_str(&manifest_text).map_err(|source| VersionError::Manifest {
            path: manifest.display().to_string(),
            source,
        })?;

    let old = Version::from_str(&fields.version)?;
    let new = old.bump(level)?;
    let (old_text, new_text) = (old.to_string(), new.to_string());

    let manifest_text = replace_version_field(&manifest_text, &old_text, &new_text)
        .ok_or_else(|| VersionError::MissingField {
            path: manifest.display().to_string(),
            version: old_text.clone(),
        })?;

    let mut updates = vec![(manifest, manifest_text)];
    for file in split_files(files) {
        let text = read_file(&root.working_dir.join(&file)).await?;
        let text = replace_first(&text, &old_text, &new_text).ok_or_else(|| {
            VersionError::VersionNotFound {
                path: file.display().to_string(),
                version: old_text.clone(),
            }
        })?;
        updates.push((file, text));
    }

    let plugin_dir = root.plugin_dir()?;
    let mirror = plugin_dir.is_dir();
    if !mirror {
        warn!(
            "{} does not exist, only updating the working directory",
            plugin_dir.display()
        );
    }

    for (file, text) in &updates {
        write_file(&root.working_dir.join(file), text).await?;
        if mirror {
            mirror_file(&plugin_dir, file, text).await?;
        }
    }

    info!("Updated version from {old} to {new}.");
    Ok(VersionBump {
        old,
        new,
        files: updates.into_iter().map(|(file, _)| file).collect(),
    })
}

/// Splits the comma separated `--files` list, skipping blank entries
fn split_files(files: Option<&str>) -> Vec<PathBuf> {
    files
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|file| !file.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Writes the file at the same relative path inside the plugin
/// repository. Absolute paths and paths whose parent does not exist
/// in the plugin repository are skipped.
async fn mirror_file(plugin_dir: &Path, file: &Path, text: &str) -> VersionResult<()> {
    if file.is_absolute() {
        debug!("Not mirroring absolute path {}", file.display());
        return Ok(());
    }

    let target = plugin_dir.join(file);
    match target.parent() {
        Some(parent) if parent.is_dir() => write_file(&target, text).await,
        _ => {
            warn!("Skipping {}, its directory is missing", target.display());
            Ok(())
        }
    }
}

async fn read_file(path: &Path) -> VersionResult<String> {
    read_to_string(path)
        .await
        .map_err(|source| VersionError::Read {
            path: path.display().to_string(),
            source,
        })
}

async fn write_file(path: &Path, text: &str) -> VersionResult<()> {
    debug!("Writing {}", path.display());
    write(path, text).await.map_err(|source| VersionError::Write {
        path: path.display().to_string(),
        source,
    })
}
