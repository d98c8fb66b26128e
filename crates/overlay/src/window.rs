//! Layered overlay window
//!
//! A per-pixel-alpha popup that is topmost, excluded from screen capture and
//! driven entirely by an [`OverlaySurface`] kept in thread-local state. Other
//! threads talk to it through posted messages only.

use crate::compose::{compose, Canvas};
use crate::render::LayeredRenderer;
use crate::surface::{CursorShape, EscapeAction, OverlaySurface};
use crate::wm::{default_overlay_rect, virtual_desktop_rect, window_id, Win32WindowQuery};
use crate::{OverlayError, OverlayResult};
use capture::{enumerate_monitors, CaptureHandle, FrameMailbox, Rect};
use std::cell::RefCell;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetCursorPos, GetWindowLongPtrW, KillTimer,
    LoadCursorW, PostMessageW, RegisterClassExW, SetCursor, SetForegroundWindow, SetTimer,
    SetWindowDisplayAffinity, SetWindowLongPtrW, ShowWindow, GWL_EXSTYLE, HTCLIENT, IDC_ARROW,
    IDC_CROSS, IDC_SIZENESW, IDC_SIZENS, IDC_SIZENWSE, IDC_SIZEWE, SW_HIDE, SW_SHOWNOACTIVATE,
    WDA_EXCLUDEFROMCAPTURE, WM_APP, WM_DESTROY, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MOUSEMOVE, WM_SETCURSOR, WM_TIMER, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_TOOLWINDOW,
    WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

/// How often the capture region is re-derived from the window position.
pub const REGION_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// How often the picker samples the cursor while selecting.
pub const PICKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

const CLASS_NAME: PCWSTR = w!("EdgeOverlayWindow");

const REGION_TIMER: usize = 1;
const PICKER_TIMER: usize = 2;

const WM_APP_FRAME: u32 = WM_APP + 1;
const WM_APP_SIGNAL: u32 = WM_APP + 2;

const VK_ESCAPE: usize = 0x1B;

/// Requests other threads and windows may send to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlaySignal {
    ToggleVisibility,
    ToggleInteractive,
    SelectWindow,
    Escape,
}

impl OverlaySignal {
    fn to_wparam(self) -> WPARAM {
        WPARAM(match self {
            Self::ToggleVisibility => 0,
            Self::ToggleInteractive => 1,
            Self::SelectWindow => 2,
            Self::Escape => 3,
        })
    }

    fn from_wparam(wparam: WPARAM) -> Option<Self> {
        match wparam.0 {
            0 => Some(Self::ToggleVisibility),
            1 => Some(Self::ToggleInteractive),
            2 => Some(Self::SelectWindow),
            3 => Some(Self::Escape),
            _ => None,
        }
    }
}

/// Post `signal` to the overlay window. Safe from any thread.
pub fn post_signal(hwnd: isize, signal: OverlaySignal) -> bool {
    unsafe {
        PostMessageW(
            HWND(hwnd as *mut std::ffi::c_void),
            WM_APP_SIGNAL,
            signal.to_wparam(),
            LPARAM(0),
        )
        .is_ok()
    }
}

thread_local! {
    static OVERLAY_STATE: RefCell<Option<OverlayState>> = const { RefCell::new(None) };
}

struct OverlayState {
    surface: OverlaySurface<CaptureHandle>,
    canvas: Canvas,
    renderer: LayeredRenderer,
    mailbox: Arc<FrameMailbox>,
    query: Win32WindowQuery,
    panel: Option<isize>,
    panel_shown: Option<bool>,
}

/// Run `f` against the overlay state. Messages delivered re-entrantly
/// while the state is borrowed are skipped.
fn with_state<R>(f: impl FnOnce(&mut OverlayState) -> R) -> Option<R> {
    OVERLAY_STATE.with(|cell| {
        let mut slot = cell.try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    })
}

static REGISTER: Once = Once::new();

fn register_class() -> OverlayResult<HINSTANCE> {
    let hinstance = unsafe { HINSTANCE(GetModuleHandleW(None)?.0) };
    REGISTER.call_once(|| unsafe {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(wnd_proc),
            hInstance: hinstance,
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        let _ = RegisterClassExW(&wc);
    });
    Ok(hinstance)
}

/// The overlay window. Lives on the thread that created it; that thread
/// must pump messages.
pub struct OverlayWindow {
    hwnd: isize,
    mailbox: Arc<FrameMailbox>,
}

impl OverlayWindow {
    /// Create and show the overlay at `geometry` (half of the primary
    /// screen if `None`).
    #[instrument(skip(capture, mailbox))]
    pub fn create(
        geometry: Option<Rect>,
        capture: CaptureHandle,
        mailbox: Arc<FrameMailbox>,
    ) -> OverlayResult<Self> {
        if OVERLAY_STATE.with(|cell| cell.borrow().is_some()) {
            return Err(OverlayError::AlreadyCreated);
        }

        let hinstance = register_class()?;
        let renderer = LayeredRenderer::new()?;
        let geometry = geometry.unwrap_or_else(default_overlay_rect);

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
                CLASS_NAME,
                w!("Edge Overlay"),
                WS_POPUP,
                geometry.x,
                geometry.y,
                geometry.width as i32,
                geometry.height as i32,
                None,
                None,
                hinstance,
                None,
            )?
        };

        unsafe {
            if let Err(e) = SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE) {
                warn!("overlay will show up in its own capture: {e}");
            }
        }

        let mut surface = OverlaySurface::new(geometry, capture);
        surface.set_own_window(window_id(hwnd));

        let state = OverlayState {
            surface,
            canvas: Canvas::default(),
            renderer,
            mailbox: mailbox.clone(),
            query: Win32WindowQuery,
            panel: None,
            panel_shown: None,
        };
        OVERLAY_STATE.with(|cell| *cell.borrow_mut() = Some(state));

        let raw = hwnd.0 as isize;
        mailbox.set_notifier(move || unsafe {
            let _ = PostMessageW(
                HWND(raw as *mut std::ffi::c_void),
                WM_APP_FRAME,
                WPARAM(0),
                LPARAM(0),
            );
        });

        unsafe {
            SetTimer(hwnd, REGION_TIMER, REGION_POLL_INTERVAL.as_millis() as u32, None);
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }
        with_state(|state| {
            state.surface.track_region(&enumerate_monitors());
            refresh(hwnd, state);
        });

        info!(hwnd = raw, ?geometry, "overlay created");
        Ok(Self { hwnd: raw, mailbox })
    }

    pub fn hwnd(&self) -> isize {
        self.hwnd
    }

    /// Settings panel window whose visibility follows the overlay mode.
    pub fn attach_panel(&self, panel: isize) {
        let hwnd = self.handle();
        with_state(|state| {
            state.panel = Some(panel);
            state.panel_shown = None;
            refresh(hwnd, state);
        });
    }

    fn handle(&self) -> HWND {
        HWND(self.hwnd as *mut std::ffi::c_void)
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        self.mailbox.set_notifier(|| {});
        let hwnd = self.handle();
        unsafe {
            let _ = KillTimer(hwnd, REGION_TIMER);
            let _ = KillTimer(hwnd, PICKER_TIMER);
            let _ = DestroyWindow(hwnd);
        }
        OVERLAY_STATE.with(|cell| cell.borrow_mut().take());
        debug!("overlay destroyed");
    }
}

/// Recompose and present, then bring window style and panel in line.
fn refresh(hwnd: HWND, state: &mut OverlayState) {
    let geometry = state.surface.geometry();
    state.canvas.resize(geometry.width, geometry.height);

    let plan = state.surface.render_plan();
    let caption = compose(&mut state.canvas, &plan);
    if let Err(e) = state
        .renderer
        .present(hwnd, geometry, &state.canvas, caption)
    {
        warn!("overlay present failed: {e}");
    }

    apply_input_mode(hwnd, state.surface.is_interactive());
    sync_panel(state);
}

fn apply_input_mode(hwnd: HWND, interactive: bool) {
    unsafe {
        let style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
        let transparent = WS_EX_TRANSPARENT.0 as isize;
        let wanted = if interactive {
            style & !transparent
        } else {
            style | transparent
        };
        if wanted != style {
            SetWindowLongPtrW(hwnd, GWL_EXSTYLE, wanted);
        }
    }
}

fn sync_panel(state: &mut OverlayState) {
    let Some(panel) = state.panel else {
        return;
    };
    let wanted = state.surface.panel_visible();
    if state.panel_shown == Some(wanted) {
        return;
    }
    unsafe {
        let _ = ShowWindow(
            HWND(panel as *mut std::ffi::c_void),
            if wanted { SW_SHOWNOACTIVATE } else { SW_HIDE },
        );
    }
    state.panel_shown = Some(wanted);
}

fn cursor_position() -> Option<(i32, i32)> {
    let mut point = POINT::default();
    unsafe { GetCursorPos(&mut point).ok()? };
    Some((point.x, point.y))
}

fn handle_signal(hwnd: HWND, signal: OverlaySignal) {
    debug!(?signal, "overlay signal");
    with_state(|state| {
        match signal {
            OverlaySignal::ToggleVisibility => {
                state.surface.toggle_visibility(&enumerate_monitors());
            }
            OverlaySignal::ToggleInteractive => state.surface.toggle_interactive(),
            OverlaySignal::SelectWindow => {
                if state.surface.begin_selection(virtual_desktop_rect()) {
                    unsafe {
                        SetTimer(hwnd, PICKER_TIMER, PICKER_POLL_INTERVAL.as_millis() as u32, None);
                        let _ = SetForegroundWindow(hwnd);
                    }
                }
            }
            OverlaySignal::Escape => {
                if state.surface.escape() == EscapeAction::SelectionCancelled {
                    end_selection(hwnd, state);
                }
            }
        }
        refresh(hwnd, state);
    });
}

fn end_selection(hwnd: HWND, state: &mut OverlayState) {
    unsafe {
        let _ = KillTimer(hwnd, PICKER_TIMER);
    }
    state.surface.track_region(&enumerate_monitors());
}

fn handle_timer(hwnd: HWND, id: usize) {
    with_state(|state| match id {
        REGION_TIMER => {
            state.surface.track_region(&enumerate_monitors());
        }
        PICKER_TIMER => {
            if !state.surface.is_selecting() {
                unsafe {
                    let _ = KillTimer(hwnd, PICKER_TIMER);
                }
                return;
            }
            if state.surface.poll_selection(&state.query) {
                end_selection(hwnd, state);
            }
            refresh(hwnd, state);
        }
        _ => {}
    });
}

fn set_cursor(shape: CursorShape) {
    let id = match shape {
        CursorShape::Arrow => IDC_ARROW,
        CursorShape::Crosshair => IDC_CROSS,
        CursorShape::SizeWestEast => IDC_SIZEWE,
        CursorShape::SizeNorthSouth => IDC_SIZENS,
        CursorShape::SizeNwSe => IDC_SIZENWSE,
        CursorShape::SizeNeSw => IDC_SIZENESW,
    };
    unsafe {
        if let Ok(cursor) = LoadCursorW(None, id) {
            SetCursor(cursor);
        }
    }
}

unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_APP_FRAME => {
            with_state(|state| {
                if let Some(image) = state.mailbox.take() {
                    state.surface.set_frame(image);
                    refresh(hwnd, state);
                }
            });
            LRESULT(0)
        }

        WM_APP_SIGNAL => {
            if let Some(signal) = OverlaySignal::from_wparam(wparam) {
                handle_signal(hwnd, signal);
            }
            LRESULT(0)
        }

        WM_TIMER => {
            handle_timer(hwnd, wparam.0);
            LRESULT(0)
        }

        WM_LBUTTONDOWN => {
            if let Some((x, y)) = cursor_position() {
                if with_state(|state| state.surface.pointer_down(x, y)) == Some(true) {
                    SetCapture(hwnd);
                }
            }
            LRESULT(0)
        }

        WM_MOUSEMOVE => {
            if let Some((x, y)) = cursor_position() {
                with_state(|state| {
                    if state.surface.pointer_move(x, y) {
                        refresh(hwnd, state);
                        state.surface.track_region(&enumerate_monitors());
                    }
                });
            }
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            with_state(|state| state.surface.pointer_up());
            let _ = ReleaseCapture();
            LRESULT(0)
        }

        WM_SETCURSOR if (lparam.0 & 0xFFFF) as u32 == HTCLIENT => {
            let shape = cursor_position()
                .and_then(|(x, y)| with_state(|state| state.surface.cursor_at(x, y)));
            match shape {
                Some(shape) => {
                    set_cursor(shape);
                    LRESULT(1)
                }
                None => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }

        WM_KEYDOWN if wparam.0 == VK_ESCAPE => {
            handle_signal(hwnd, OverlaySignal::Escape);
            LRESULT(0)
        }

        WM_DESTROY => {
            let _ = KillTimer(hwnd, REGION_TIMER);
            let _ = KillTimer(hwnd, PICKER_TIMER);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
