//! Per-tick frame transform

use crate::blur::gaussian_blur_5x5;
use crate::canny::{canny, CannyScratch};
use crate::morphology::dilate_square;
use crate::settings::{EdgeSettings, SharedSettings};
use crate::threshold::auto_adjust;
use crate::{EdgeFilterError, EdgeFilterResult};
use image::{GrayImage, Rgba, RgbaImage};

/// Colorized edge image handed to the overlay. Edge pixels carry the edge
/// color and opacity, everything else is transparent black.
pub type CompositedImage = RgbaImage;

/// Borrowed, tightly packed BGRA8 frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> FrameView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self { data, width, height }
    }

    fn validate(&self) -> EdgeFilterResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EdgeFilterError::EmptyFrame);
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return Err(EdgeFilterError::BufferSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Grayscale, blur, Canny, dilation and colorization, in that order.
///
/// Intermediate buffers live on the pipeline and are reused while the frame
/// size stays the same; only the returned image is allocated per call.
#[derive(Debug, Default)]
pub struct EdgeFilterPipeline {
    gray: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    dilated: GrayImage,
    blur_scratch: Vec<u16>,
    dilate_scratch: Vec<u8>,
    canny_scratch: CannyScratch,
}

impl EdgeFilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick against the shared settings.
    ///
    /// Auto-threshold runs when realtime mode is on or `auto_once` is set.
    /// It runs after grayscale conversion and before edge detection, so the
    /// thresholds it stores are the ones used for this frame.
    pub fn process(
        &mut self,
        frame: FrameView<'_>,
        settings: &SharedSettings,
        auto_once: bool,
    ) -> EdgeFilterResult<CompositedImage> {
        frame.validate()?;
        bgra_to_gray(frame, &mut self.gray);

        let mut snapshot = settings.snapshot();
        if snapshot.realtime_auto || auto_once {
            let thresholds = auto_adjust(&self.gray, settings);
            snapshot.threshold_low = thresholds.low;
            snapshot.threshold_high = thresholds.high;
        }

        Ok(self.finish(&snapshot))
    }

    /// Run one tick against fixed settings, without auto-threshold.
    pub fn process_with(
        &mut self,
        frame: FrameView<'_>,
        settings: &EdgeSettings,
    ) -> EdgeFilterResult<CompositedImage> {
        frame.validate()?;
        bgra_to_gray(frame, &mut self.gray);
        Ok(self.finish(settings))
    }

    fn finish(&mut self, settings: &EdgeSettings) -> CompositedImage {
        gaussian_blur_5x5(&self.gray, &mut self.blurred, &mut self.blur_scratch);
        canny(
            &self.blurred,
            settings.thresholds(),
            &mut self.edges,
            &mut self.canny_scratch,
        );

        let mask = if settings.thickness > 1 {
            dilate_square(
                &self.edges,
                u32::from(settings.thickness),
                &mut self.dilated,
                &mut self.dilate_scratch,
            );
            &self.dilated
        } else {
            &self.edges
        };

        colorize(mask, settings.color, settings.opacity)
    }
}

/// BT.601 luma in 14-bit fixed point.
fn bgra_to_gray(frame: FrameView<'_>, gray: &mut GrayImage) {
    const B: u32 = 1868;
    const G: u32 = 9617;
    const R: u32 = 4899;
    const SHIFT: u32 = 14;

    if gray.dimensions() != (frame.width, frame.height) {
        *gray = GrayImage::new(frame.width, frame.height);
    }

    let out: &mut [u8] = gray;
    for (dst, px) in out.iter_mut().zip(frame.data.chunks_exact(4)) {
        let y = u32::from(px[0]) * B + u32::from(px[1]) * G + u32::from(px[2]) * R;
        *dst = ((y + (1 << (SHIFT - 1))) >> SHIFT) as u8;
    }
}

fn colorize(mask: &GrayImage, color: [u8; 3], opacity: u8) -> CompositedImage {
    let edge = Rgba([color[0], color[1], color[2], opacity]);
    let clear = Rgba([0, 0, 0, 0]);

    let (width, height) = mask.dimensions();
    let mut image = RgbaImage::new(width, height);
    for (dst, src) in image.pixels_mut().zip(mask.pixels()) {
        *dst = if src.0[0] != 0 { edge } else { clear };
    }
    image
}
