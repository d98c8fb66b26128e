//! Binary dilation with a square structuring element

use image::GrayImage;

/// Dilate `src` into `dst` with a `size`x`size` square, one iteration.
///
/// The element is anchored at `size / 2`, so even sizes reach one pixel
/// further up and left than down and right. Pixels outside the image never
/// contribute.
pub fn dilate_square(src: &GrayImage, size: u32, dst: &mut GrayImage, scratch: &mut Vec<u8>) {
    let (width, height) = src.dimensions();
    if dst.dimensions() != (width, height) {
        *dst = GrayImage::new(width, height);
    }
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return;
    }

    let size = size.max(1) as isize;
    let before = size / 2;
    let after = size - 1 - before;

    scratch.clear();
    scratch.resize(w * h, 0);

    let src = src.as_raw();
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = (x as isize - before).max(0) as usize;
            let hi = (x as isize + after).min(w as isize - 1) as usize;
            scratch[y * w + x] = row[lo..=hi].iter().copied().max().unwrap_or(0);
        }
    }

    let out: &mut [u8] = dst;
    for y in 0..h {
        let lo = (y as isize - before).max(0) as usize;
        let hi = (y as isize + after).min(h as isize - 1) as usize;
        for x in 0..w {
            out[y * w + x] = (lo..=hi).map(|sy| scratch[sy * w + x]).max().unwrap_or(0);
        }
    }
}
