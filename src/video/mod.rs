//! # Video Processing Module
//!
//! Frame extraction, frame-sequence assembly and side-by-side stitching. All
//! decoding and encoding is done by an external ffmpeg process.

pub mod assembler;
pub mod extractor;
pub mod filter_graph;
pub mod stitcher;
pub mod tool;
pub mod types;

pub use assembler::{AssemblyOptions, FrameAssembler, FrameSink, FreezePolicy};
pub use extractor::{ExtractionReport, FrameExtractor};
pub use stitcher::{CompositionPlan, StitchSource, VideoStitcher};
pub use tool::FfmpegTool;
pub use types::{EncodedVideo, Frame, FrameSequence, VideoAsset};
