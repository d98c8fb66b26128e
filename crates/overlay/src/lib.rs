//! Overlay for Edge Overlay
//!
//! Region tracking, the window picker and overlay interaction state are
//! platform independent; the layered Win32 window that hosts them is
//! Windows only.

pub mod compose;
pub mod picker;
pub mod region;
pub mod surface;

#[cfg(windows)]
pub mod render;
#[cfg(windows)]
pub mod window;
#[cfg(windows)]
pub mod wm;

pub use compose::Canvas;
pub use picker::{Highlight, PickerOutcome, PickerState, WindowId, WindowPicker, WindowQuery};
pub use region::{CaptureRegion, RegionTracker};
pub use surface::{CursorShape, EscapeAction, OverlaySurface, RenderPlan, ResizeEdges};

#[cfg(windows)]
pub use window::{post_signal, OverlaySignal, OverlayWindow};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("Overlay window already exists")]
    AlreadyCreated,

    #[error("Render failed: {0}")]
    Render(String),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
