//! # Directory and File Utilities
//!
//! Directory listing, collision-free output paths, trash handling and JSON
//! sidecar files. Every other module writes through [`resolve_output_path`]
//! so nothing is overwritten unless the caller asks for it.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{FsError, MediaError, Result};

/// Extensions treated as still images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Extensions treated as videos
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Upper bound on `_<n>` suffixes tried before giving up
const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 100_000;

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List regular, non-hidden files with one of `extensions`, sorted by file name.
///
/// Sorting is lexicographic, which is numeric order only for zero-padded names.
pub fn list_files_with_extensions<P: AsRef<Path>>(directory: P, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let directory = directory.as_ref();
    if !directory.exists() {
        return Err(MediaError::SourceNotFound {
            path: directory.display().to_string(),
        }.into());
    }
    if !directory.is_dir() {
        return Err(FsError::NotADirectory {
            path: directory.display().to_string(),
        }.into());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden_file(&path) && has_extension(&path, extensions) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} files in {}", files.len(), directory.display());
    Ok(files)
}

/// All still images in a directory
pub fn list_images<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    list_files_with_extensions(directory, IMAGE_EXTENSIONS)
}

/// All PNG files in a directory (frame sequences)
pub fn list_pngs<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    list_files_with_extensions(directory, &["png"])
}

/// All videos in a directory
pub fn list_videos<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    list_files_with_extensions(directory, VIDEO_EXTENSIONS)
}

/// Create a directory and all of its parents
pub fn create_directory<P: AsRef<Path>>(directory: P) -> Result<()> {
    let directory = directory.as_ref();
    if !directory.exists() {
        std::fs::create_dir_all(directory)?;
        debug!("Created directory {}", directory.display());
    } else if !directory.is_dir() {
        return Err(FsError::NotADirectory {
            path: directory.display().to_string(),
        }.into());
    }
    Ok(())
}

/// File stem as an owned string (empty when the path has none)
pub fn file_stem_string(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First free path of the form `<stem>_<n>.<ext>` next to `path`.
///
/// Returns `path` itself when nothing exists there yet.
pub fn find_unique_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = file_stem_string(path);
    let extension = path.extension().map(|ext| ext.to_string_lossy().into_owned());

    for n in 1..=MAX_DISAMBIGUATION_ATTEMPTS {
        let file_name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = parent.join(file_name);
        if !candidate.exists() {
            debug!("{} exists, using {}", path.display(), candidate.display());
            return Ok(candidate);
        }
    }

    Err(FsError::PathCollision {
        path: path.display().to_string(),
    }.into())
}

/// Path to write to: `path` itself when overwriting is allowed, otherwise a
/// disambiguated sibling.
pub fn resolve_output_path<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<PathBuf> {
    if overwrite {
        Ok(path.as_ref().to_path_buf())
    } else {
        find_unique_path(path)
    }
}

/// Move a file into `trash_dir`, keeping its name (disambiguated if needed)
pub fn move_to_trash<P: AsRef<Path>, T: AsRef<Path>>(path: P, trash_dir: T) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::SourceNotFound {
            path: path.display().to_string(),
        }.into());
    }

    create_directory(trash_dir.as_ref())?;
    let file_name = path.file_name().ok_or_else(|| MediaError::SourceNotFound {
        path: path.display().to_string(),
    })?;
    let destination = find_unique_path(trash_dir.as_ref().join(file_name))?;

    if std::fs::rename(path, &destination).is_err() {
        // rename fails across file systems
        std::fs::copy(path, &destination)?;
        std::fs::remove_file(path)?;
    }

    debug!("Moved {} to {}", path.display(), destination.display());
    Ok(destination)
}

/// Delete every file directly inside `directory`.
///
/// This is a best-effort cleanup step: failures are logged and swallowed.
/// Returns the number of files removed.
pub fn purge_directory<P: AsRef<Path>>(directory: P) -> usize {
    let directory = directory.as_ref();
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not clean up {}: {}", directory.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(
                "Error when cleaning up {}: {} (check the directory permissions)",
                path.display(),
                e
            ),
        }
    }
    removed
}

/// Read a JSON sidecar file
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|_| MediaError::SourceNotFound {
        path: path.display().to_string(),
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a JSON sidecar file; returns the path actually written
pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P, overwrite: bool) -> Result<PathBuf> {
    let target = resolve_output_path(path, overwrite)?;
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            create_directory(parent)?;
        }
    }
    std::fs::write(&target, serde_json::to_string_pretty(value)?)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_listing_is_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["00000002.png", "00000000.png", "00000001.PNG", ".hidden.png", "notes.txt", "clip.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pngs = list_pngs(dir.path()).unwrap();
        let names: Vec<String> = pngs.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["00000000.png", "00000001.PNG", "00000002.png"]);

        let videos = list_videos(dir.path()).unwrap();
        assert_eq!(videos.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_source_not_found() {
        let err = list_images("/no/such/frames").unwrap_err();
        assert!(matches!(err, crate::EditorError::Media(MediaError::SourceNotFound { .. })));
    }

    #[test]
    fn test_saving_twice_yields_two_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("comp.png");

        let first = resolve_output_path(&target, false).unwrap();
        std::fs::write(&first, b"first").unwrap();
        let second = resolve_output_path(&target, false).unwrap();
        std::fs::write(&second, b"second").unwrap();

        assert_ne!(first, second);
        assert_eq!(second, dir.path().join("comp_1.png"));
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
    }

    #[test]
    fn test_overwrite_keeps_path() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("comp.png");
        std::fs::write(&target, b"old").unwrap();
        assert_eq!(resolve_output_path(&target, true).unwrap(), target);
    }

    #[test]
    fn test_move_to_trash() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("intermediate.mp4");
        std::fs::write(&source, b"data").unwrap();
        let trash = dir.path().join("trash");

        let moved = move_to_trash(&source, &trash).unwrap();
        assert!(!source.exists());
        assert_eq!(moved, trash.join("intermediate.mp4"));
    }

    #[test]
    fn test_purge_keeps_subdirectories() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();
        std::fs::write(dir.path().join("b.png"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(purge_directory(dir.path()), 2);
        assert!(dir.path().join("nested").exists());
        assert_eq!(purge_directory(dir.path().join("missing")), 0);
    }

    #[test]
    fn test_json_sidecar_roundtrip() {
        let dir = tempdir().unwrap();
        let mut labels = BTreeMap::new();
        labels.insert("0".to_string(), "approach".to_string());

        let written = save_json(&labels, dir.path().join("keys.json"), false).unwrap();
        let loaded: BTreeMap<String, String> = load_json(&written).unwrap();
        assert_eq!(loaded, labels);
    }
}
