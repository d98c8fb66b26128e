//! Adaptive Canny thresholds from the median intensity

use crate::settings::SharedSettings;
use image::GrayImage;
use tracing::debug;

/// Frames wider than this are sampled sparsely before taking the median.
pub const DOWNSAMPLE_WIDTH_LIMIT: u32 = 320;

/// Nearest-neighbor scale applied to wide frames.
pub const DOWNSAMPLE_FACTOR: f64 = 0.2;

/// Canny hysteresis thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub low: u8,
    pub high: u8,
}

impl Thresholds {
    /// `(min, max)` ordering used by the edge detector.
    pub fn ordered(self) -> (u8, u8) {
        if self.low > self.high {
            (self.high, self.low)
        } else {
            (self.low, self.high)
        }
    }
}

/// Thresholds at `(1 - sigma) * v` and `(1 + sigma) * v`, clamped to
/// `0..=255` and floored.
pub fn thresholds_from_median(median: f64, sigma: f32) -> Thresholds {
    let sigma = f64::from(sigma);
    let low = ((1.0 - sigma) * median).clamp(0.0, 255.0).floor();
    let high = ((1.0 + sigma) * median).clamp(0.0, 255.0).floor();

    Thresholds {
        low: low as u8,
        high: high as u8,
    }
}

/// Estimate thresholds for a grayscale frame.
pub fn estimate_thresholds(gray: &GrayImage, sigma: f32) -> Thresholds {
    thresholds_from_median(median_intensity(gray), sigma)
}

/// Estimate thresholds and store them in the shared settings.
///
/// Both the one-shot request and the realtime mode go through here.
pub fn auto_adjust(gray: &GrayImage, settings: &SharedSettings) -> Thresholds {
    let sigma = settings.snapshot().auto_sigma;
    let thresholds = estimate_thresholds(gray, sigma);
    settings.set_thresholds(thresholds);
    debug!(low = thresholds.low, high = thresholds.high, "auto threshold");
    thresholds
}

/// Median pixel value, averaging the two middle values for even counts.
///
/// Wide frames are reduced with nearest-neighbor sampling first to bound the
/// cost; the reduced image is never materialized.
pub fn median_intensity(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut histogram = [0u64; 256];

    if width > DOWNSAMPLE_WIDTH_LIMIT {
        let (out_width, out_height) = downsampled_size(width, height);
        let scale = 1.0 / DOWNSAMPLE_FACTOR;
        for dy in 0..out_height {
            let sy = source_index(dy, scale, height);
            for dx in 0..out_width {
                let sx = source_index(dx, scale, width);
                histogram[gray.get_pixel(sx, sy).0[0] as usize] += 1;
            }
        }
    } else {
        for pixel in gray.as_raw() {
            histogram[*pixel as usize] += 1;
        }
    }

    median_from_histogram(&histogram)
}

fn downsampled_size(width: u32, height: u32) -> (u32, u32) {
    let scaled = |n: u32| ((f64::from(n) * DOWNSAMPLE_FACTOR).round() as u32).max(1);
    (scaled(width), scaled(height))
}

fn source_index(dst: u32, scale: f64, len: u32) -> u32 {
    ((f64::from(dst) * scale).floor() as u32).min(len - 1)
}

fn median_from_histogram(histogram: &[u64; 256]) -> f64 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let nth = |rank: u64| -> u8 {
        let mut seen = 0;
        for (value, count) in histogram.iter().enumerate() {
            seen += count;
            if seen > rank {
                return value as u8;
            }
        }
        u8::MAX
    };

    if total % 2 == 1 {
        f64::from(nth(total / 2))
    } else {
        (f64::from(nth(total / 2 - 1)) + f64::from(nth(total / 2))) / 2.0
    }
}
