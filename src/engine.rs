use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    edits::{BatchEditor, BatchReport, EditPipeline, EditRegistry},
    error::{EditorError, FsError, LayoutError, MediaError, Result},
    files,
    imaging::{
        primitives::{self, SaveOptions},
        qr::qr_code,
        stitch::stitch_image_files,
        text::{TextFont, TextPainter},
    },
    sequence::{self, FrameAnnotator, KeyframeMap},
    video::{
        types::parse_fps_suffix, AssemblyOptions, CompositionPlan, EncodedVideo, ExtractionReport,
        FfmpegTool, FrameAssembler, FrameExtractor, VideoStitcher,
    },
};

/// Run blocking frame work on tokio's blocking pool
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| EditorError::generic(format!("worker task failed: {}", e)))?
}

/// Options for annotating a frame directory
#[derive(Debug, Clone, Default)]
pub struct AnnotateOptions {
    /// JSON keyframe sidecar
    pub keyframes: Option<PathBuf>,

    /// Frame rate for the time stamps; falls back to the directory suffix,
    /// then the configured default
    pub fps: Option<f64>,

    /// Resize each annotated frame to `(width, height)`
    pub resize: Option<(u32, u32)>,
}

/// Orchestrates every workflow from one explicit configuration
///
/// The engine owns the configuration, the ffmpeg handle and the text painter.
/// Each public method is one command of the CLI.
pub struct EditorEngine {
    config: Config,
    tool: FfmpegTool,
    painter: Option<Arc<TextPainter>>,
    overwrite: bool,
}

impl EditorEngine {
    /// Create an engine. A configured font that cannot be loaded is an error;
    /// a missing system font only disables the text features.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let tool = FfmpegTool::from_config(&config.video);

        let painter = match TextFont::locate(config.paths.font_path.as_deref()) {
            Ok(font) => {
                debug!("Using font {}", font.path().display());
                Some(Arc::new(TextPainter::new(font, &config.imaging)))
            }
            Err(e) if config.paths.font_path.is_some() => return Err(e),
            Err(e) => {
                debug!("Text overlays unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            config,
            tool,
            painter,
            overwrite: false,
        })
    }

    /// Replace existing outputs instead of writing `<stem>_<n>` siblings
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn painter(&self) -> Option<&TextPainter> {
        self.painter.as_deref()
    }

    fn require_painter(&self) -> Result<Arc<TextPainter>> {
        self.painter.clone().ok_or_else(|| {
            LayoutError::FontUnavailable {
                details: "set paths.font_path in the configuration".to_string(),
            }
            .into()
        })
    }

    fn painter_if(&self, wanted: bool) -> Result<Option<Arc<TextPainter>>> {
        if wanted {
            self.require_painter().map(Some)
        } else {
            Ok(None)
        }
    }

    fn require_directory(path: &Path) -> Result<()> {
        if path.is_dir() {
            Ok(())
        } else {
            Err(FsError::NotADirectory {
                path: path.display().to_string(),
            }.into())
        }
    }

    // ==========================================
    // VIDEO
    // ==========================================

    /// Decode `video` into `<target.parent>/<target.stem>_<fps>FPS/`
    pub async fn extract_frames(&self, video: &Path, target: &Path, prefix: &str) -> Result<ExtractionReport> {
        self.tool.ensure_available()?;
        let extractor = FrameExtractor::new(self.tool.clone()).with_overwrite(self.overwrite);
        let (video, target, prefix) = (video.to_path_buf(), target.to_path_buf(), prefix.to_string());

        let report = blocking(move || extractor.extract(&video, &target, &prefix)).await?;
        info!(
            "Extracted {} frames at {} fps into {}",
            report.frame_count,
            report.fps,
            report.directory.display()
        );
        Ok(report)
    }

    /// Encode a frame directory into `<target_dir>/<name>.mp4`
    pub async fn assemble_video(&self, frames_dir: &Path, target_dir: &Path, options: AssemblyOptions) -> Result<EncodedVideo> {
        options.validate()?;
        self.tool.ensure_available()?;
        Self::require_directory(frames_dir)?;
        let painter = self.painter_if(options.subtitles)?;
        let assembler = FrameAssembler::new(
            self.tool.clone(),
            self.config.video.clone(),
            self.config.imaging.subtitle_height_fraction,
        )
        .with_overwrite(self.overwrite);
        let (frames_dir, target_dir) = (frames_dir.to_path_buf(), target_dir.to_path_buf());

        blocking(move || assembler.assemble(&frames_dir, &target_dir, &options, painter.as_deref())).await
    }

    /// Compose the plan's videos side by side into `output`
    pub async fn stitch_videos(&self, plan: &CompositionPlan, output: &Path) -> Result<EncodedVideo> {
        self.tool.ensure_available()?;
        if plan.has_subtitles() {
            self.require_painter()?;
        }
        let stitcher = VideoStitcher::new(self.tool.clone(), &self.config).with_overwrite(self.overwrite);

        let encoded = stitcher.stitch(plan, output, self.painter()).await?;
        info!(
            "Side-by-side video written: {} ({}x{}, {:.2}s)",
            encoded.path.display(),
            encoded.width,
            encoded.height,
            encoded.duration
        );
        Ok(encoded)
    }

    /// Re-encode `video` at `fps`, optionally moving the original to the trash
    pub async fn convert_fps(&self, video: &Path, fps: f64, trash_original: bool) -> Result<PathBuf> {
        self.tool.ensure_available()?;
        let output = self.tool.convert_frame_rate(video, fps, self.overwrite).await?;
        if trash_original {
            let trashed = files::move_to_trash(video, &self.config.paths.trash_dir)?;
            info!("Moved original to {}", trashed.display());
        }
        Ok(output)
    }

    // ==========================================
    // IMAGES
    // ==========================================

    /// Stitch every image of `source_dir` into one PNG at `output`
    pub async fn stitch_images(&self, source_dir: &Path, output: &Path, subtitles: bool) -> Result<PathBuf> {
        Self::require_directory(source_dir)?;
        let painter = self.painter_if(subtitles)?;
        let fraction = self.config.imaging.subtitle_height_fraction;
        let save_options = SaveOptions {
            dpi: None,
            overwrite: self.overwrite,
        };
        let (source_dir, output) = (source_dir.to_path_buf(), output.to_path_buf());

        blocking(move || {
            let images = files::list_images(&source_dir)?;
            if images.is_empty() {
                return Err(MediaError::EmptySequence {
                    path: source_dir.display().to_string(),
                }.into());
            }
            info!("Stitching {} images from {}", images.len(), source_dir.display());
            let stitched = stitch_image_files(&images, painter.as_deref(), fraction)?;
            primitives::save(&stitched, &output, &save_options)
        })
        .await
    }

    /// Stitch two frame directories pairwise into `target_dir`
    pub async fn compose_pairs(&self, left_dir: &Path, right_dir: &Path, target_dir: &Path, subtitles: bool) -> Result<usize> {
        Self::require_directory(left_dir)?;
        Self::require_directory(right_dir)?;
        let painter = self.painter_if(subtitles)?;
        let fraction = self.config.imaging.subtitle_height_fraction;
        let overwrite = self.overwrite;
        let (left, right, target) = (left_dir.to_path_buf(), right_dir.to_path_buf(), target_dir.to_path_buf());

        blocking(move || sequence::compose_pairs(&left, &right, &target, painter.as_deref(), fraction, overwrite)).await
    }

    /// Apply `--edit` steps to every image of `source_dir`
    pub async fn edit_images(&self, source_dir: &Path, target_dir: &Path, pipeline: &EditPipeline) -> Result<BatchReport> {
        if pipeline.is_empty() {
            return Err(MediaError::InvalidParameters {
                details: "no edits given".to_string(),
            }.into());
        }
        let resolved = pipeline.resolve(&EditRegistry::new())?;
        let painter = self.painter.clone();
        let editor = BatchEditor::new(
            resolved,
            self.config.batch.workers,
            self.config.imaging.subtitle_height_fraction,
        )
        .with_save_options(SaveOptions {
            dpi: None,
            overwrite: self.overwrite,
        });
        let (source, target) = (source_dir.to_path_buf(), target_dir.to_path_buf());

        blocking(move || editor.run(&source, &target, painter.as_deref())).await
    }

    /// Copy the PNGs of `source_dir` to `<target_dir>/<index:08>.png`
    pub async fn rename_frames(&self, source_dir: &Path, target_dir: &Path) -> Result<usize> {
        Self::require_directory(source_dir)?;
        let overwrite = self.overwrite;
        let (source, target) = (source_dir.to_path_buf(), target_dir.to_path_buf());

        blocking(move || sequence::rename_frames(&source, &target, overwrite)).await
    }

    /// Write the frame-info box onto every frame of `source_dir`
    pub async fn annotate_frames(&self, source_dir: &Path, target_dir: &Path, options: AnnotateOptions) -> Result<usize> {
        Self::require_directory(source_dir)?;
        let fps = options
            .fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .or_else(|| {
                source_dir
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(parse_fps_suffix)
            })
            .unwrap_or(self.config.video.default_fps);

        self.annotate_with_fps(source_dir, target_dir, &options, fps).await
    }

    async fn annotate_with_fps(&self, source_dir: &Path, target_dir: &Path, options: &AnnotateOptions, fps: f64) -> Result<usize> {
        let painter = self.require_painter()?;
        let keyframes = match &options.keyframes {
            Some(path) => KeyframeMap::load(path)?,
            None => KeyframeMap::new(),
        };
        let imaging = self.config.imaging.clone();
        let (resize, overwrite) = (options.resize, self.overwrite);
        let (source, target) = (source_dir.to_path_buf(), target_dir.to_path_buf());

        blocking(move || {
            FrameAnnotator::new(&painter, &imaging)
                .with_resize(resize)
                .with_overwrite(overwrite)
                .annotate_directory(&source, &target, &keyframes, fps)
        })
        .await
    }

    /// Extract `video` into the temp directory, annotate the frames into
    /// `target_dir`, then purge the temporary frames
    pub async fn extract_annotated(&self, video: &Path, target_dir: &Path, options: AnnotateOptions) -> Result<usize> {
        self.require_painter()?;
        self.tool.ensure_available()?;

        let scratch = self.config.paths.tmp_dir.join(files::file_stem_string(video));
        let extractor = FrameExtractor::new(self.tool.clone()).with_overwrite(true);
        let video_path = video.to_path_buf();
        let report = blocking(move || extractor.extract(&video_path, &scratch, "")).await?;

        let fps = options.fps.filter(|fps| fps.is_finite() && *fps > 0.0).unwrap_or(report.fps);
        let annotated = self.annotate_with_fps(&report.directory, target_dir, &options, fps).await;

        let removed = files::purge_directory(&report.directory);
        debug!("Removed {} temporary frames", removed);
        if let Err(e) = std::fs::remove_dir(&report.directory) {
            warn!("Could not remove {}: {}", report.directory.display(), e);
        }

        annotated
    }

    // ==========================================
    // PRINT
    // ==========================================

    /// Render `content` as a QR code PNG
    pub async fn qr(&self, content: &str, output: &Path, module_size: u32) -> Result<PathBuf> {
        let frame = qr_code(content, module_size)?;
        let written = primitives::save(
            &frame,
            output,
            &SaveOptions {
                dpi: Some(self.config.imaging.dpi),
                overwrite: self.overwrite,
            },
        )?;
        info!("QR code written to {}", written.display());
        Ok(written)
    }

    /// Lay out the products of a JSON file on A4 label sheets
    pub async fn labels(&self, products: &Path, target_dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
        let painter = self.require_painter()?;
        let products = sequence::load_products(products)?;
        let dpi = self.config.imaging.dpi;
        let (target, name) = (target_dir.to_path_buf(), name.to_string());

        let sheets = blocking(move || sequence::render_label_sheets(&products, &painter, dpi, &target, &name)).await?;
        info!("Wrote {} label sheet(s)", sheets.len());
        Ok(sheets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::Frame;
    use tempfile::tempdir;

    fn engine() -> EditorEngine {
        EditorEngine::new(Config::default()).unwrap()
    }

    #[test]
    fn test_missing_configured_font_is_an_error() {
        let mut config = Config::default();
        config.paths.font_path = Some(PathBuf::from("/no/such/font.ttf"));
        assert!(EditorEngine::new(config).is_err());
    }

    #[tokio::test]
    async fn test_edit_images() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        Frame::new_black(6, 4).as_image().save(source.path().join("a.png")).unwrap();

        let pipeline = EditPipeline::parse(&["rotate:degrees=270"]).unwrap();
        let report = engine().edit_images(source.path(), target.path(), &pipeline).await.unwrap();
        assert_eq!(report.processed.len(), 1);
        assert_eq!(Frame::open(target.path().join("a.png")).unwrap().dimensions(), (4, 6));

        let unknown = EditPipeline::parse(&["blur"]).unwrap();
        assert!(engine().edit_images(source.path(), target.path(), &unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_stitch_images() {
        let source = tempdir().unwrap();
        let out = tempdir().unwrap();
        Frame::new_black(10, 10).as_image().save(source.path().join("a.png")).unwrap();
        Frame::new_black(5, 5).as_image().save(source.path().join("b.jpg")).unwrap();

        let output = out.path().join("stitched.png");
        let written = engine().stitch_images(source.path(), &output, false).await.unwrap();
        assert_eq!(Frame::open(&written).unwrap().dimensions(), (20, 10));

        // a second run does not overwrite
        let again = engine().stitch_images(source.path(), &output, false).await.unwrap();
        assert!(again.ends_with("stitched_1.png"));
    }

    #[tokio::test]
    async fn test_rename_requires_directory() {
        let err = engine()
            .rename_frames(Path::new("/no/such/dir"), Path::new("/tmp/out"))
            .await
            .unwrap_err();
        assert!(matches!(err, EditorError::Fs(FsError::NotADirectory { .. })));
    }

    #[tokio::test]
    async fn test_assemble_rejects_bad_freeze_before_running_ffmpeg() {
        let frames = tempdir().unwrap();
        let out = tempdir().unwrap();
        let options = AssemblyOptions {
            freeze: crate::video::FreezePolicy::new([0], false, -2.0),
            ..AssemblyOptions::default()
        };
        let err = engine()
            .assemble_video(frames.path(), out.path(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, EditorError::Media(MediaError::InvalidParameters { .. })));
    }

    #[tokio::test]
    async fn test_qr() {
        let out = tempdir().unwrap();
        let written = engine().qr("hello", &out.path().join("qr.png"), 3).await.unwrap();
        let frame = Frame::open(&written).unwrap();
        assert_eq!(frame.width(), frame.height());
    }
}
