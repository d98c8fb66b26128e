//! Presents a composed canvas through `UpdateLayeredWindow`

use crate::compose::{seal_alpha, Canvas, CAPTION_COLOR, CAPTION_TEXT};
use crate::{OverlayError, OverlayResult};
use capture::Rect;
use std::mem::size_of;
use windows::Win32::Foundation::{COLORREF, HANDLE, HWND, POINT, SIZE};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GdiFlush, GetStockObject,
    SelectObject, SetBkMode, SetTextColor, TextOutW, AC_SRC_ALPHA, AC_SRC_OVER, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION, DEFAULT_GUI_FONT, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ, TRANSPARENT,
};
use windows::Win32::UI::WindowsAndMessaging::{UpdateLayeredWindow, ULW_ALPHA};

struct DibSection {
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    bits: *mut u8,
    width: u32,
    height: u32,
}

/// Memory DC with a top-down 32-bit DIB matching the window size.
pub struct LayeredRenderer {
    mem_dc: HDC,
    dib: Option<DibSection>,
}

impl LayeredRenderer {
    pub fn new() -> OverlayResult<Self> {
        let mem_dc = unsafe { CreateCompatibleDC(HDC::default()) };
        if mem_dc.is_invalid() {
            return Err(OverlayError::Render("CreateCompatibleDC failed".into()));
        }
        unsafe {
            SelectObject(mem_dc, GetStockObject(DEFAULT_GUI_FONT));
        }
        Ok(Self { mem_dc, dib: None })
    }

    fn ensure_size(&mut self, width: u32, height: u32) -> OverlayResult<()> {
        if let Some(dib) = &self.dib {
            if dib.width == width && dib.height == height {
                return Ok(());
            }
        }
        self.release_dib();

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            bmiColors: [Default::default()],
        };

        let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
        unsafe {
            let bitmap = CreateDIBSection(
                self.mem_dc,
                &bmi,
                DIB_RGB_COLORS,
                &mut bits,
                HANDLE::default(),
                0,
            )?;
            if bits.is_null() {
                let _ = DeleteObject(bitmap);
                return Err(OverlayError::Render("DIB section has no pixels".into()));
            }
            let previous = SelectObject(self.mem_dc, bitmap);
            self.dib = Some(DibSection {
                bitmap,
                previous,
                bits: bits as *mut u8,
                width,
                height,
            });
        }
        Ok(())
    }

    fn release_dib(&mut self) {
        if let Some(dib) = self.dib.take() {
            unsafe {
                SelectObject(self.mem_dc, dib.previous);
                let _ = DeleteObject(dib.bitmap);
            }
        }
    }

    /// Push `canvas` to the window at `geometry`, drawing the caption text
    /// into `caption` if given.
    pub fn present(
        &mut self,
        hwnd: HWND,
        geometry: Rect,
        canvas: &Canvas,
        caption: Option<Rect>,
    ) -> OverlayResult<()> {
        if canvas.width() == 0 || canvas.height() == 0 {
            return Ok(());
        }
        self.ensure_size(canvas.width(), canvas.height())?;
        let Some(dib) = &self.dib else {
            return Ok(());
        };

        let len = canvas.pixels().len();
        unsafe {
            let target = std::slice::from_raw_parts_mut(dib.bits, len);
            target.copy_from_slice(canvas.pixels());

            if let Some(caption) = caption {
                self.draw_caption(caption, target, dib.width);
            }

            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };
            let position = POINT {
                x: geometry.x,
                y: geometry.y,
            };
            let size = SIZE {
                cx: canvas.width() as i32,
                cy: canvas.height() as i32,
            };
            let origin = POINT::default();

            UpdateLayeredWindow(
                hwnd,
                HDC::default(),
                Some(&position),
                Some(&size),
                self.mem_dc,
                Some(&origin),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            )?;
        }
        Ok(())
    }

    unsafe fn draw_caption(&self, caption: Rect, pixels: &mut [u8], width: u32) {
        let text: Vec<u16> = CAPTION_TEXT.encode_utf16().collect();
        let [r, g, b] = CAPTION_COLOR;

        SetBkMode(self.mem_dc, TRANSPARENT);
        SetTextColor(
            self.mem_dc,
            COLORREF(u32::from(r) | u32::from(g) << 8 | u32::from(b) << 16),
        );
        let _ = TextOutW(self.mem_dc, caption.x + 6, caption.y + 4, &text);
        let _ = GdiFlush();

        seal_alpha(pixels, width, caption);
    }
}

impl Drop for LayeredRenderer {
    fn drop(&mut self) {
        self.release_dib();
        unsafe {
            let _ = DeleteDC(self.mem_dc);
        }
    }
}
