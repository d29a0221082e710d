//! # Batch Image Edits
//!
//! Named edit operations looked up in an [`EditRegistry`], chained into an
//! [`EditPipeline`] and applied to every image of a directory by the
//! [`BatchEditor`].
//!
//! ## Available Edits
//!
//! - **rotate**: counter-clockwise by a multiple of 90 degrees
//! - **invert**: negative of every channel
//! - **strip-metadata**: re-encode pixels only
//! - **resize**: exact size, one side with aspect kept, or a scale factor
//! - **subtitle**: file name on a black bar at the bottom
//! - **grayscale**

pub mod batch;
pub mod builtin;
pub mod pipeline;
pub mod registry;
pub mod traits;

pub use batch::{BatchEditor, BatchReport};
pub use pipeline::{EditPipeline, EditStep, ResolvedPipeline};
pub use registry::EditRegistry;
pub use traits::{ConfigValue, EditConfig, EditContext, ImageEdit};
