//! Software compositing into a premultiplied BGRA buffer for per-pixel
//! alpha layered windows

use crate::surface::RenderPlan;
use capture::Rect;
use edge_filter::CompositedImage;

/// Background alpha while the overlay must receive pointer input. Fully
/// transparent pixels of a layered window are not hit-tested.
pub const INPUT_ALPHA: u8 = 1;

pub const BORDER_WIDTH: u32 = 5;
pub const BORDER_COLOR: [u8; 3] = [255, 255, 0];

pub const HIGHLIGHT_WIDTH: u32 = 2;
pub const HIGHLIGHT_COLOR: [u8; 3] = [255, 0, 0];

pub const CAPTION_TEXT: &str = "[Ctrl+F9] Toggle view | [Ctrl+F10] Edit mode";
pub const CAPTION_COLOR: [u8; 3] = [255, 255, 0];
pub const CAPTION_BOX: Rect = Rect {
    x: 10,
    y: 8,
    width: 340,
    height: 22,
};
const CAPTION_BACKGROUND: [u8; 3] = [32, 32, 32];

/// Top-down premultiplied BGRA pixels.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Premultiplied BGRA at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Resize, keeping the allocation when it is large enough.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.resize(width as usize * height as usize * 4, 0);
    }

    /// Fill with black at `alpha`.
    pub fn clear(&mut self, alpha: u8) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, alpha]);
        }
    }

    /// Copy non-transparent pixels of a straight-alpha RGBA image, top-left
    /// aligned and clipped.
    pub fn blit(&mut self, image: &CompositedImage) {
        let width = image.width().min(self.width);
        let height = image.height().min(self.height);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b, a] = image.get_pixel(x, y).0;
                if a == 0 {
                    continue;
                }
                let i = self.offset(x, y);
                self.pixels[i..i + 4].copy_from_slice(&premultiply([r, g, b], a));
            }
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 3], alpha: u8) {
        let Some(area) = rect.intersection(&self.bounds()) else {
            return;
        };
        let px = premultiply(color, alpha);
        for y in area.y..area.bottom() {
            let start = self.offset(area.x as u32, y as u32);
            let end = start + area.width as usize * 4;
            for dst in self.pixels[start..end].chunks_exact_mut(4) {
                dst.copy_from_slice(&px);
            }
        }
    }

    /// Opaque outline of `width` pixels drawn inside `rect`.
    pub fn stroke_rect(&mut self, rect: Rect, width: u32, color: [u8; 3]) {
        let w = width.min(rect.width).min(rect.height);
        if w == 0 {
            return;
        }
        let side = w as i32;
        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, w), color, 255);
        self.fill_rect(
            Rect::new(rect.x, rect.bottom() - side, rect.width, w),
            color,
            255,
        );
        self.fill_rect(Rect::new(rect.x, rect.y, w, rect.height), color, 255);
        self.fill_rect(
            Rect::new(rect.right() - side, rect.y, w, rect.height),
            color,
            255,
        );
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// Force alpha to 255 inside `rect` of a BGRA buffer `width` pixels wide.
/// GDI text output clears alpha where it draws.
pub fn seal_alpha(pixels: &mut [u8], width: u32, rect: Rect) {
    let height = (pixels.len() / 4) as u32 / width.max(1);
    let Some(area) = rect.intersection(&Rect::new(0, 0, width, height)) else {
        return;
    };
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            pixels[(y as usize * width as usize + x as usize) * 4 + 3] = 255;
        }
    }
}

fn premultiply([r, g, b]: [u8; 3], a: u8) -> [u8; 4] {
    let mul = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
    [mul(b), mul(g), mul(r), a]
}

/// Draw `plan` onto `canvas`. Returns the caption box when the caller should
/// render [`CAPTION_TEXT`] into it.
pub fn compose(canvas: &mut Canvas, plan: &RenderPlan) -> Option<Rect> {
    match plan {
        RenderPlan::Hidden => {
            canvas.clear(0);
            None
        }
        RenderPlan::Selecting { highlight } => {
            canvas.clear(INPUT_ALPHA);
            if let Some(rect) = highlight {
                canvas.stroke_rect(*rect, HIGHLIGHT_WIDTH, HIGHLIGHT_COLOR);
            }
            None
        }
        RenderPlan::Overlay { image, decorations } => {
            canvas.clear(if *decorations { INPUT_ALPHA } else { 0 });
            if let Some(image) = image {
                canvas.blit(image);
            }
            if !*decorations {
                return None;
            }
            let bounds = canvas.bounds();
            canvas.stroke_rect(bounds, BORDER_WIDTH, BORDER_COLOR);
            canvas.fill_rect(CAPTION_BOX, CAPTION_BACKGROUND, 255);
            Some(CAPTION_BOX)
        }
    }
}
