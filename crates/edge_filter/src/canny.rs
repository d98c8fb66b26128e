//! Canny edge detector
//!
//! 3x3 Sobel gradients with the L1 magnitude `|dx| + |dy|`, non-maximum
//! suppression along the quantized gradient direction and 8-connected
//! hysteresis. Edge pixels are written as 255, everything else as 0.

use crate::threshold::Thresholds;
use image::GrayImage;

/// tan(22.5°) in Q15
const TAN_22_5_Q15: i64 = 13573;
const SHIFT: u32 = 15;

const NOT_EDGE: u8 = 1;
const WEAK: u8 = 0;
const STRONG: u8 = 2;

/// Buffers reused between calls.
#[derive(Debug, Default)]
pub struct CannyScratch {
    dx: Vec<i32>,
    dy: Vec<i32>,
    /// Magnitude with a one-pixel zero border.
    magnitude: Vec<i32>,
    /// Classification with a one-pixel `NOT_EDGE` border.
    map: Vec<u8>,
    stack: Vec<usize>,
}

impl CannyScratch {
    fn prepare(&mut self, width: usize, height: usize) {
        let padded = (width + 2) * (height + 2);

        self.dx.clear();
        self.dx.resize(width * height, 0);
        self.dy.clear();
        self.dy.resize(width * height, 0);
        self.magnitude.clear();
        self.magnitude.resize(padded, 0);
        self.map.clear();
        self.map.resize(padded, NOT_EDGE);
        self.stack.clear();
    }
}

/// Detect edges in `src`, writing the binary mask into `dst`.
///
/// An inverted pair (`low > high`) is swapped before use.
pub fn canny(src: &GrayImage, thresholds: Thresholds, dst: &mut GrayImage, scratch: &mut CannyScratch) {
    let (width, height) = src.dimensions();
    if dst.dimensions() != (width, height) {
        *dst = GrayImage::new(width, height);
    }
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return;
    }

    let (low, high) = thresholds.ordered();
    let (low, high) = (i32::from(low), i32::from(high));

    scratch.prepare(w, h);
    sobel(src.as_raw(), w, h, &mut scratch.dx, &mut scratch.dy);

    let stride = w + 2;
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            scratch.magnitude[(y + 1) * stride + x + 1] = scratch.dx[i].abs() + scratch.dy[i].abs();
        }
    }

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let p = (y + 1) * stride + x + 1;
            let m = scratch.magnitude[p];

            if m <= low || !is_local_maximum(&scratch.magnitude, p, stride, scratch.dx[i], scratch.dy[i]) {
                continue;
            }

            if m > high {
                scratch.map[p] = STRONG;
                scratch.stack.push(p);
            } else {
                scratch.map[p] = WEAK;
            }
        }
    }

    let neighbors: [isize; 8] = {
        let s = stride as isize;
        [-s - 1, -s, -s + 1, -1, 1, s - 1, s, s + 1]
    };
    while let Some(p) = scratch.stack.pop() {
        for offset in neighbors {
            let n = (p as isize + offset) as usize;
            if scratch.map[n] == WEAK {
                scratch.map[n] = STRONG;
                scratch.stack.push(n);
            }
        }
    }

    let out: &mut [u8] = dst;
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = if scratch.map[(y + 1) * stride + x + 1] == STRONG {
                u8::MAX
            } else {
                0
            };
        }
    }
}

fn is_local_maximum(magnitude: &[i32], p: usize, stride: usize, dx: i32, dy: i32) -> bool {
    let m = magnitude[p];
    let xs = i64::from(dx.abs());
    let ys = i64::from(dy.abs()) << SHIFT;
    let tg22x = xs * TAN_22_5_Q15;

    if ys < tg22x {
        // horizontal gradient
        return m > magnitude[p - 1] && m >= magnitude[p + 1];
    }

    let tg67x = tg22x + (xs << (SHIFT + 1));
    if ys > tg67x {
        // vertical gradient
        return m > magnitude[p - stride] && m >= magnitude[p + stride];
    }

    // diagonal, sign picks which pair of corners
    let (before, after) = if (dx ^ dy) < 0 {
        (p - stride + 1, p + stride - 1)
    } else {
        (p - stride - 1, p + stride + 1)
    };
    m > magnitude[before] && m > magnitude[after]
}

/// 3x3 Sobel derivatives with replicated borders.
fn sobel(src: &[u8], w: usize, h: usize, dx: &mut [i32], dy: &mut [i32]) {
    let at = |x: isize, y: isize| -> i32 {
        let x = x.clamp(0, w as isize - 1) as usize;
        let y = y.clamp(0, h as isize - 1) as usize;
        i32::from(src[y * w + x])
    };

    for y in 0..h as isize {
        for x in 0..w as isize {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y as usize * w + x as usize;
            dx[i] = gx;
            dy[i] = gy;
        }
    }
}
