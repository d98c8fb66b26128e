//! Capture backend abstraction

use crate::{CaptureResult, FrameData, Rect};

/// A capture backend bound to a single monitor.
pub trait FrameSource {
    /// Index of the monitor this source captures.
    fn monitor_index(&self) -> usize;

    /// Monitor size in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Grab `rect` (monitor-local) from the newest frame.
    ///
    /// `Ok(None)` means no new frame arrived since the last call; it is not
    /// end of stream.
    fn grab(&mut self, rect: Rect) -> CaptureResult<Option<FrameData>>;
}

/// Creates sources on the capture thread.
///
/// Only the factory crosses threads. Sources are created, used and dropped
/// on the capture thread, so they do not need to be `Send`.
pub trait FrameSourceFactory: Send + 'static {
    type Source: FrameSource;

    /// Per-thread backend setup, run once on the capture thread.
    fn init_thread(&mut self) -> CaptureResult<()> {
        Ok(())
    }

    fn create(&mut self, monitor_index: usize) -> CaptureResult<Self::Source>;
}
