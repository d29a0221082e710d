use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::primitives;
use crate::imaging::stitch::stitch_image_files;
use crate::imaging::text::TextPainter;
use crate::progress::progress_bar;
use crate::video::types::frame_file_name;

/// Zip two frame lists, repeating the last frame of the shorter one
pub fn pad_pairs(left: &[PathBuf], right: &[PathBuf]) -> Vec<(PathBuf, PathBuf)> {
    let (Some(last_left), Some(last_right)) = (left.last(), right.last()) else {
        return Vec::new();
    };
    let count = left.len().max(right.len());

    (0..count)
        .map(|i| {
            let l = left.get(i).unwrap_or(last_left);
            let r = right.get(i).unwrap_or(last_right);
            (l.clone(), r.clone())
        })
        .collect()
}

/// Stitch frame `i` of `left_dir` next to frame `i` of `right_dir` into
/// `<target_dir>/<i:08>.png`.
///
/// With a painter, each half gets its file stem as a subtitle. Returns the
/// number of frames written.
pub fn compose_pairs(
    left_dir: &Path,
    right_dir: &Path,
    target_dir: &Path,
    painter: Option<&TextPainter>,
    subtitle_fraction: f32,
    overwrite: bool,
) -> Result<usize> {
    let left = files::list_pngs(left_dir)?;
    let right = files::list_pngs(right_dir)?;
    for (dir, frames) in [(left_dir, &left), (right_dir, &right)] {
        if frames.is_empty() {
            return Err(MediaError::EmptySequence {
                path: dir.display().to_string(),
            }.into());
        }
    }
    if left.len() != right.len() {
        info!(
            "Frame counts differ ({} vs {}); repeating the last frame of the shorter side",
            left.len(),
            right.len()
        );
    }

    files::create_directory(target_dir)?;
    let pairs = pad_pairs(&left, &right);
    let bar = progress_bar(Some(pairs.len() as u64), "composing");
    for (i, (l, r)) in pairs.iter().enumerate() {
        let composed = stitch_image_files(&[l.clone(), r.clone()], painter, subtitle_fraction)?;
        primitives::save_sequence_frame(&composed, &target_dir.join(frame_file_name("", i)), overwrite)?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!("Wrote {} side-by-side frames to {}", pairs.len(), target_dir.display());
    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::Frame;
    use tempfile::tempdir;

    #[test]
    fn test_shorter_side_repeats_its_last_frame() {
        let left: Vec<PathBuf> = ["l0", "l1", "l2"].iter().map(PathBuf::from).collect();
        let right: Vec<PathBuf> = ["r0"].iter().map(PathBuf::from).collect();

        let pairs = pad_pairs(&left, &right);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[2], (PathBuf::from("l2"), PathBuf::from("r0")));

        let pairs = pad_pairs(&right, &left);
        assert_eq!(pairs[2], (PathBuf::from("r0"), PathBuf::from("l2")));

        assert!(pad_pairs(&left, &[]).is_empty());
    }

    #[test]
    fn test_compose_pairs_writes_stitched_frames() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let target = tempdir().unwrap();
        for i in 0..2 {
            Frame::new_black(8, 6).as_image().save(left.path().join(format!("{:08}.png", i))).unwrap();
        }
        Frame::new_filled(4, 3, [255, 0, 0]).as_image().save(right.path().join("00000000.png")).unwrap();

        let written = compose_pairs(left.path(), right.path(), target.path(), None, 0.1, false).unwrap();
        assert_eq!(written, 2);

        let frame = Frame::open(target.path().join("00000001.png")).unwrap();
        // right half scaled up to the left height: 4x3 -> 8x6
        assert_eq!(frame.dimensions(), (16, 6));
        assert_eq!(frame.get_pixel(1, 1), [0, 0, 0]);
    }
}
