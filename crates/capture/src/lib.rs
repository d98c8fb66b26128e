//! Screen capture for Edge Overlay
//!
//! Frame sources bound to one monitor, the single-slot frame mailbox and the
//! background capture loop that filters and publishes frames.

pub mod frame;
pub mod mailbox;
pub mod monitor;
pub mod source;
pub mod worker;

#[cfg(windows)]
pub mod d3d11;
#[cfg(windows)]
pub mod wgc;

pub use frame::FrameData;
pub use mailbox::FrameMailbox;
pub use monitor::MonitorInfo;
pub use source::{FrameSource, FrameSourceFactory};
pub use worker::{CaptureControl, CaptureHandle, CaptureLoop, CaptureLoopConfig};

#[cfg(windows)]
pub use d3d11::D3D11Device;
#[cfg(windows)]
pub use monitor::enumerate_monitors;
#[cfg(windows)]
pub use wgc::{WgcFrameSource, WgcSourceFactory};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("D3D11 error: {0}")]
    D3D11(String),

    #[error("Capture not supported")]
    NotSupported,

    #[error("Monitor {0} not found")]
    MonitorNotFound(usize),

    #[error("Invalid capture rectangle {0:?}")]
    InvalidRect(Rect),

    #[error("Capture device lost")]
    DeviceLost,

    #[error("Failed to start capture thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// How the capture loop reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Skip this tick and keep the source.
    Transient,
    /// The source is unusable; drop it and wait for a retarget.
    Unavailable,
}

impl CaptureError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRect(_) => ErrorClass::Transient,
            #[cfg(windows)]
            Self::Windows(_) => ErrorClass::Transient,
            Self::D3D11(_)
            | Self::NotSupported
            | Self::MonitorNotFound(_)
            | Self::DeviceLost
            | Self::Thread(_) => ErrorClass::Unavailable,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Rectangle in physical pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning `left..right`, `top..bottom`. Inverted edges
    /// produce an empty rectangle.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && self.right() > other.x &&
        self.y < other.bottom() && self.bottom() > other.y
    }

    /// Overlapping area, `None` when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect::from_edges(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        ))
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}
