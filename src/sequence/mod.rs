//! # Frame-Sequence Operations
//!
//! Directory-wide work on numbered frames: renumbering, keyframe titles,
//! frame-info annotation, side-by-side pairs and printable label sheets.

pub mod annotate;
pub mod keyframes;
pub mod labels;
pub mod pairs;
pub mod rename;

pub use annotate::{plan_annotations, FrameAnnotator, FrameInfo};
pub use keyframes::KeyframeMap;
pub use labels::{load_products, render_label_sheets, Product, SheetLayout};
pub use pairs::{compose_pairs, pad_pairs};
pub use rename::rename_frames;
