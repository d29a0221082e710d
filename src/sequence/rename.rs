use std::path::Path;

use tracing::info;

use crate::error::{FsError, MediaError, Result};
use crate::files;
use crate::progress::progress_bar;
use crate::video::types::frame_file_name;

/// Copy the PNGs of `source_dir`, in file-name order, to
/// `<target_dir>/<index:08>.png`.
///
/// Existing targets are a collision unless `overwrite` is set. Returns the
/// number of frames copied.
pub fn rename_frames(source_dir: &Path, target_dir: &Path, overwrite: bool) -> Result<usize> {
    let frames = files::list_pngs(source_dir)?;
    if frames.is_empty() {
        return Err(MediaError::EmptySequence {
            path: source_dir.display().to_string(),
        }.into());
    }
    files::create_directory(target_dir)?;

    info!("Renumbering {} frames into {}", frames.len(), target_dir.display());
    let bar = progress_bar(Some(frames.len() as u64), "renaming");
    for (index, source) in frames.iter().enumerate() {
        let target = target_dir.join(frame_file_name("", index));
        if !overwrite && target.exists() {
            return Err(FsError::PathCollision {
                path: target.display().to_string(),
            }.into());
        }
        std::fs::copy(source, &target)?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(frames.len())
}
