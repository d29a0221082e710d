use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::edits::pipeline::ResolvedPipeline;
use crate::edits::traits::EditContext;
use crate::error::{EditorError, FsError, MediaError, Result};
use crate::files;
use crate::imaging::primitives::{self, SaveOptions};
use crate::imaging::text::TextPainter;
use crate::progress::progress_bar;
use crate::video::types::Frame;

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files written, in input order
    pub processed: Vec<PathBuf>,

    /// Inputs that failed, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies one pipeline to every image of a directory on a worker pool
pub struct BatchEditor {
    pipeline: ResolvedPipeline,
    workers: usize,
    subtitle_fraction: f32,
    save_options: SaveOptions,
}

impl BatchEditor {
    pub fn new(pipeline: ResolvedPipeline, workers: usize, subtitle_fraction: f32) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
            subtitle_fraction,
            save_options: SaveOptions::default(),
        }
    }

    pub fn with_save_options(mut self, save_options: SaveOptions) -> Self {
        self.save_options = save_options;
        self
    }

    /// Edit every image in `source_dir` and write the results into `target_dir`
    /// under the same file names.
    ///
    /// A file that fails is recorded in the report; the others still run.
    pub fn run(&self, source_dir: &Path, target_dir: &Path, painter: Option<&TextPainter>) -> Result<BatchReport> {
        if !source_dir.is_dir() {
            return Err(FsError::NotADirectory {
                path: source_dir.display().to_string(),
            }.into());
        }
        let inputs = files::list_images(source_dir)?;
        if inputs.is_empty() {
            return Err(MediaError::EmptySequence {
                path: source_dir.display().to_string(),
            }.into());
        }
        files::create_directory(target_dir)?;

        info!(
            "Editing {} images with [{}] on {} workers",
            inputs.len(),
            self.pipeline.names().join(", "),
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| EditorError::generic(format!("failed to start worker pool: {}", e)))?;

        let bar = progress_bar(Some(inputs.len() as u64), "editing");
        let results: Vec<(PathBuf, Result<PathBuf>)> = pool.install(|| {
            inputs
                .par_iter()
                .map(|input| {
                    let outcome = self.edit_one(input, target_dir, painter);
                    bar.inc(1);
                    (input.clone(), outcome)
                })
                .collect()
        });
        bar.finish_and_clear();

        let mut report = BatchReport::default();
        for (input, outcome) in results {
            match outcome {
                Ok(written) => report.processed.push(written),
                Err(e) => {
                    warn!("Failed to edit {}: {}", input.display(), e);
                    report.failures.push((input, e.to_string()));
                }
            }
        }

        info!("Edited {} of {} images", report.processed.len(), report.total());
        Ok(report)
    }

    fn edit_one(&self, input: &Path, target_dir: &Path, painter: Option<&TextPainter>) -> Result<PathBuf> {
        let mut frame = Frame::open(input)?;
        let context = EditContext {
            source: input,
            painter,
            subtitle_fraction: self.subtitle_fraction,
        };
        self.pipeline.apply(&mut frame, &context)?;

        let file_name = input.file_name().ok_or_else(|| MediaError::SourceNotFound {
            path: input.display().to_string(),
        })?;
        let written = primitives::save(&frame, &target_dir.join(file_name), &self.save_options)?;
        debug!("{} -> {}", input.display(), written.display());
        Ok(written)
    }
}
