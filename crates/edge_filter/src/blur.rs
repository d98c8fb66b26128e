//! 5x5 Gaussian blur

use image::GrayImage;

/// Binomial taps of the 5-tap Gaussian with the default sigma for this size.
const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];

/// Combined weight of the separable 2D kernel (16 * 16).
const NORM_SHIFT: u32 = 8;

/// Mirror an out-of-range coordinate without repeating the border pixel
/// (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect_101(index: i64, len: usize) -> usize {
    let len = len as i64;
    if len == 1 {
        return 0;
    }

    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as usize;
        }
    }
}

/// Blur `src` into `dst` with a 5x5 Gaussian.
///
/// `scratch` holds the horizontal pass and is grown as needed, so repeated
/// calls on same-sized frames do not allocate.
pub fn gaussian_blur_5x5(src: &GrayImage, dst: &mut GrayImage, scratch: &mut Vec<u16>) {
    let (width, height) = src.dimensions();
    if dst.dimensions() != (width, height) {
        *dst = GrayImage::new(width, height);
    }
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return;
    }

    scratch.clear();
    scratch.resize(w * h, 0);

    let src = src.as_raw();
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        let out = &mut scratch[y * w..(y + 1) * w];
        for x in 0..w {
            let mut sum = 0u32;
            for (k, weight) in KERNEL.iter().enumerate() {
                let sx = reflect_101(x as i64 + k as i64 - 2, w);
                sum += weight * u32::from(row[sx]);
            }
            out[x] = sum as u16;
        }
    }

    let dst: &mut [u8] = dst;
    for y in 0..h {
        let rows: [usize; 5] =
            std::array::from_fn(|k| reflect_101(y as i64 + k as i64 - 2, h) * w);
        for x in 0..w {
            let mut sum = 0u32;
            for (k, weight) in KERNEL.iter().enumerate() {
                sum += weight * u32::from(scratch[rows[k] + x]);
            }
            dst[y * w + x] = ((sum + (1 << (NORM_SHIFT - 1))) >> NORM_SHIFT) as u8;
        }
    }
}
