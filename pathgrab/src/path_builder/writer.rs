use crate::error::{PathGrabError, Result};
use crate::util::{normalize_path, split_extensions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when a built output path already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Fail,
    Skip,
    Overwrite,
    Append,
}

impl FromStr for ConflictPolicy {
    type Err = PathGrabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail" => Ok(ConflictPolicy::Fail),
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "append" => Ok(ConflictPolicy::Append),
            other => Err(PathGrabError::Configuration(format!(
                "Unknown conflict policy '{other}'"
            ))),
        }
    }
}

/// Payload for a materialised path.
#[derive(Debug, Clone, Copy)]
pub enum Contents<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
    /// Create a symbolic link pointing at this target
    Link(&'a Path),
    /// Copy an existing file
    CopyOf(&'a Path),
}

/// Write `contents` to `path` (joined onto `root` when relative), creating
/// parent directories. Returns the path written, or `None` when skipped.
pub fn write_contents_to_file(
    path: &str,
    contents: Contents<'_>,
    root: Option<&Path>,
    conflicts: ConflictPolicy,
) -> Result<Option<PathBuf>> {
    let mut target = match root {
        Some(root) if Path::new(path).is_relative() => root.join(path),
        _ => PathBuf::from(path),
    };

    if target.exists() || target.is_symlink() {
        match conflicts {
            ConflictPolicy::Fail => {
                return Err(PathGrabError::Configuration(format!(
                    "A file at path {} already exists",
                    target.display()
                )));
            }
            ConflictPolicy::Skip => {
                log::warn!(
                    "A file at path {} already exists, skipping writing file",
                    target.display()
                );
                return Ok(None);
            }
            ConflictPolicy::Overwrite => {
                if target.is_dir() {
                    log::warn!(
                        "New path {} is a directory, not overwriting it",
                        target.display()
                    );
                    return Ok(None);
                }
                std::fs::remove_file(&target)?;
            }
            ConflictPolicy::Append => {
                target = next_free_path(&target);
            }
        }
    }

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match contents {
        Contents::Bytes(bytes) => std::fs::write(&target, bytes)?,
        Contents::Text(text) => std::fs::write(&target, text)?,
        Contents::CopyOf(source) => {
            std::fs::copy(source, &target)?;
        }
        Contents::Link(source) => symlink(source, &target)?,
    }

    log::debug!("Wrote {}", target.display());
    Ok(Some(target))
}

/// `dir/name.ext` -> `dir/name_1.ext`, `dir/name_2.ext`, ... first free one.
fn next_free_path(path: &Path) -> PathBuf {
    let text = normalize_path(&path.to_string_lossy());
    let (stem, exts) = split_extensions(&text);
    let suffix = if exts.is_empty() {
        String::new()
    } else {
        format!(".{}", exts.join("."))
    };

    let mut i = 1u64;
    loop {
        let candidate = PathBuf::from(format!("{stem}_{i}{suffix}"));
        if !candidate.exists() && !candidate.is_symlink() {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, target)
}
