//! Foreign window selection
//!
//! `Idle -> Selecting -> (commit | cancel) -> Idle`. While selecting, every
//! poll resolves the root window under the cursor and highlights it; a fresh
//! press of the primary button on a highlighted window commits its rectangle.

use capture::Rect;
use tracing::{debug, info};

/// Smallest overlay side a snap may produce.
pub const MIN_SNAP_SIZE: u32 = 100;

/// Native window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

/// Window manager queries the picker needs.
pub trait WindowQuery {
    /// Global cursor position.
    fn cursor_position(&self) -> Option<(i32, i32)>;

    /// Topmost window containing the point, never `exclude`.
    fn window_at(&self, x: i32, y: i32, exclude: WindowId) -> Option<WindowId>;

    /// Top-level ancestor; a top-level window is its own root.
    fn root_ancestor(&self, window: WindowId) -> WindowId;

    /// Screen rectangle, `None` if the window is gone.
    fn window_rect(&self, window: WindowId) -> Option<Rect>;

    fn primary_button_down(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub window: WindowId,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    Idle,
    Selecting {
        prior: Rect,
        highlight: Option<Highlight>,
        /// Button was up on the previous poll, so a press seen now is a
        /// fresh click.
        armed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Continue,
    /// Snap target, already raised to the minimum size.
    Committed(Rect),
}

#[derive(Debug)]
pub struct WindowPicker {
    own_window: WindowId,
    state: PickerState,
}

impl WindowPicker {
    pub fn new(own_window: WindowId) -> Self {
        Self {
            own_window,
            state: PickerState::Idle,
        }
    }

    pub fn set_own_window(&mut self, own_window: WindowId) {
        self.own_window = own_window;
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, PickerState::Selecting { .. })
    }

    pub fn highlight(&self) -> Option<Highlight> {
        match self.state {
            PickerState::Selecting { highlight, .. } => highlight,
            PickerState::Idle => None,
        }
    }

    /// Start selecting, remembering `prior` for cancellation. Returns
    /// `false` if a selection is already running.
    pub fn begin(&mut self, prior: Rect) -> bool {
        if self.is_selecting() {
            return false;
        }
        info!(?prior, "window selection started");
        self.state = PickerState::Selecting {
            prior,
            highlight: None,
            armed: false,
        };
        true
    }

    pub fn poll(&mut self, query: &dyn WindowQuery) -> PickerOutcome {
        let own_window = self.own_window;
        let PickerState::Selecting {
            highlight, armed, ..
        } = &mut self.state
        else {
            return PickerOutcome::Continue;
        };

        let pressed = query.primary_button_down();

        if let Some((x, y)) = query.cursor_position() {
            let target = query
                .window_at(x, y, own_window)
                .map(|window| query.root_ancestor(window))
                .filter(|window| *window != own_window);

            let next = target.and_then(|window| {
                query
                    .window_rect(window)
                    .map(|rect| Highlight { window, rect })
            });
            if next != *highlight {
                debug!(?next, "highlight changed");
            }
            *highlight = next;
        }

        if !pressed {
            *armed = true;
            return PickerOutcome::Continue;
        }

        match (*armed, *highlight) {
            (true, Some(target)) => {
                let snapped = with_min_size(target.rect);
                info!(window = target.window.0, rect = ?snapped, "window selected");
                self.state = PickerState::Idle;
                PickerOutcome::Committed(snapped)
            }
            _ => {
                // This press is spent; only a later release re-arms.
                *armed = false;
                PickerOutcome::Continue
            }
        }
    }

    /// Abort, returning the geometry to restore.
    pub fn cancel(&mut self) -> Option<Rect> {
        match std::mem::replace(&mut self.state, PickerState::Idle) {
            PickerState::Selecting { prior, .. } => {
                info!("window selection cancelled");
                Some(prior)
            }
            PickerState::Idle => None,
        }
    }
}

/// Grow `rect` to at least [`MIN_SNAP_SIZE`], keeping its top-left corner.
pub fn with_min_size(rect: Rect) -> Rect {
    Rect::new(
        rect.x,
        rect.y,
        rect.width.max(MIN_SNAP_SIZE),
        rect.height.max(MIN_SNAP_SIZE),
    )
}
