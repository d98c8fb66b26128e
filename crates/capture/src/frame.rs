//! Captured frame buffers

use edge_filter::FrameView;

/// Frame data from capture, tightly packed BGRA8
#[derive(Debug, Clone)]
pub struct FrameData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            data,
            width,
            height,
        }
    }

    /// Borrow as input for the edge pipeline.
    pub fn view(&self) -> FrameView<'_> {
        FrameView::new(&self.data, self.width, self.height)
    }
}
