//! Win32 window manager queries

use crate::picker::{WindowId, WindowQuery};
use capture::Rect;
use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON};
use windows::Win32::UI::WindowsAndMessaging::{
    GetAncestor, GetCursorPos, GetSystemMetrics, GetWindow, GetWindowRect, IsWindowVisible,
    WindowFromPoint, GA_ROOT, GW_HWNDNEXT, SM_CXSCREEN, SM_CXVIRTUALSCREEN, SM_CYSCREEN,
    SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
};

pub(crate) fn hwnd(id: WindowId) -> HWND {
    HWND(id.0 as *mut std::ffi::c_void)
}

pub(crate) fn window_id(hwnd: HWND) -> WindowId {
    WindowId(hwnd.0 as isize)
}

/// Bounds of the whole virtual desktop
pub fn virtual_desktop_rect() -> Rect {
    unsafe {
        Rect::new(
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN).max(0) as u32,
            GetSystemMetrics(SM_CYVIRTUALSCREEN).max(0) as u32,
        )
    }
}

/// Centered half-size rectangle on the primary screen.
pub fn default_overlay_rect() -> Rect {
    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    Rect::new(
        width / 4,
        height / 4,
        (width / 2).max(1) as u32,
        (height / 2).max(1) as u32,
    )
}

fn rect_of(hwnd: HWND) -> Option<Rect> {
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect).ok()? };
    Some(Rect::from_edges(rect.left, rect.top, rect.right, rect.bottom))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowQuery;

impl WindowQuery for Win32WindowQuery {
    fn cursor_position(&self) -> Option<(i32, i32)> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point).ok()? };
        Some((point.x, point.y))
    }

    fn window_at(&self, x: i32, y: i32, exclude: WindowId) -> Option<WindowId> {
        let point = POINT { x, y };
        let excluded = hwnd(exclude);

        unsafe {
            let hit = WindowFromPoint(point);
            if hit.0.is_null() {
                return None;
            }
            let root = GetAncestor(hit, GA_ROOT);
            if root != excluded && hit != excluded {
                return Some(window_id(hit));
            }

            // The overlay covers the desktop while picking; walk the
            // z-order below it.
            let mut current = excluded;
            loop {
                current = match GetWindow(current, GW_HWNDNEXT) {
                    Ok(next) if !next.0.is_null() => next,
                    _ => return None,
                };
                if current == excluded || !IsWindowVisible(current).as_bool() {
                    continue;
                }
                if rect_of(current).is_some_and(|r| r.contains(x, y)) {
                    return Some(window_id(current));
                }
            }
        }
    }

    fn root_ancestor(&self, window: WindowId) -> WindowId {
        let root = unsafe { GetAncestor(hwnd(window), GA_ROOT) };
        if root.0.is_null() {
            window
        } else {
            window_id(root)
        }
    }

    fn window_rect(&self, window: WindowId) -> Option<Rect> {
        rect_of(hwnd(window))
    }

    fn primary_button_down(&self) -> bool {
        unsafe { GetAsyncKeyState(i32::from(VK_LBUTTON.0)) < 0 }
    }
}
