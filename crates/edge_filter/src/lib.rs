//! Edge extraction for Edge Overlay
//!
//! Turns raw BGRA screen frames into translucent edge images and derives
//! adaptive Canny thresholds from frame content.

pub mod blur;
pub mod canny;
pub mod morphology;
pub mod pipeline;
pub mod settings;
pub mod threshold;

pub use pipeline::{CompositedImage, EdgeFilterPipeline, FrameView};
pub use settings::{EdgeSettings, SharedSettings};
pub use threshold::{auto_adjust, estimate_thresholds, Thresholds};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeFilterError {
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Frame has zero width or height")]
    EmptyFrame,
}

pub type EdgeFilterResult<T> = Result<T, EdgeFilterError>;
