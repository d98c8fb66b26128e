//! Overlay interaction state
//!
//! Everything the overlay window does that is not Win32 plumbing: geometry,
//! visibility and click-through mode, move/resize sessions, the window
//! picker and what to draw. The Win32 layer feeds it input and applies the
//! geometry it reports.

use crate::picker::{PickerOutcome, WindowId, WindowPicker, WindowQuery};
use crate::region::{CaptureRegion, RegionTracker};
use capture::{CaptureControl, MonitorInfo, Rect};
use edge_filter::CompositedImage;
use std::sync::Arc;
use tracing::debug;

/// Width of the grab zone along each edge, in pixels.
pub const RESIZE_MARGIN: i32 = 30;
/// Smallest overlay size reachable by resizing.
pub const MIN_OVERLAY_SIZE: u32 = 100;

/// Set of window edges under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeEdges(u8);

impl ResizeEdges {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1);
    pub const RIGHT: Self = Self(2);
    pub const TOP: Self = Self(4);
    pub const BOTTOM: Self = Self(8);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Edges hit by a point in window-local coordinates.
    pub fn hit(local_x: i32, local_y: i32, width: u32, height: u32) -> Self {
        let mut edges = 0;
        if local_x < RESIZE_MARGIN {
            edges |= Self::LEFT.0;
        }
        if local_x > width as i32 - RESIZE_MARGIN {
            edges |= Self::RIGHT.0;
        }
        if local_y < RESIZE_MARGIN {
            edges |= Self::TOP.0;
        }
        if local_y > height as i32 - RESIZE_MARGIN {
            edges |= Self::BOTTOM.0;
        }
        Self(edges)
    }

    pub fn cursor(self) -> CursorShape {
        let horizontal = self.contains(Self::LEFT) || self.contains(Self::RIGHT);
        let vertical = self.contains(Self::TOP) || self.contains(Self::BOTTOM);
        match (horizontal, vertical) {
            (false, false) => CursorShape::Arrow,
            (true, false) => CursorShape::SizeWestEast,
            (false, true) => CursorShape::SizeNorthSouth,
            (true, true) => {
                let main_diagonal = (self.contains(Self::LEFT) && self.contains(Self::TOP))
                    || (self.contains(Self::RIGHT) && self.contains(Self::BOTTOM));
                if main_diagonal {
                    CursorShape::SizeNwSe
                } else {
                    CursorShape::SizeNeSw
                }
            }
        }
    }
}

impl std::ops::BitOr for ResizeEdges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Arrow,
    Crosshair,
    SizeWestEast,
    SizeNorthSouth,
    SizeNwSe,
    SizeNeSw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerSession {
    Move { last: (i32, i32) },
    Resize { edges: ResizeEdges, last: (i32, i32) },
}

/// Result of the escape key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeAction {
    SelectionCancelled,
    PanelClosed,
}

/// What the window should show, in window-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    Hidden,
    Selecting {
        highlight: Option<Rect>,
    },
    Overlay {
        image: Option<Arc<CompositedImage>>,
        /// Border, caption and a hit-testable background.
        decorations: bool,
    },
}

pub struct OverlaySurface<C: CaptureControl> {
    geometry: Rect,
    visible: bool,
    interactive: bool,
    panel_open: bool,
    session: Option<PointerSession>,
    picker: WindowPicker,
    tracker: RegionTracker,
    image: Option<Arc<CompositedImage>>,
    capture: C,
}

impl<C: CaptureControl> OverlaySurface<C> {
    /// Starts visible and interactive.
    pub fn new(geometry: Rect, capture: C) -> Self {
        Self {
            geometry,
            visible: true,
            interactive: true,
            panel_open: true,
            session: None,
            picker: WindowPicker::new(WindowId(0)),
            tracker: RegionTracker::new(),
            image: None,
            capture,
        }
    }

    pub fn set_own_window(&mut self, window: WindowId) {
        self.picker.set_own_window(window);
    }

    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_selecting(&self) -> bool {
        self.picker.is_selecting()
    }

    /// Whether the settings panel should be on screen.
    pub fn panel_visible(&self) -> bool {
        self.visible && self.interactive && self.panel_open && !self.is_selecting()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn region(&self) -> Option<CaptureRegion> {
        self.tracker.current()
    }

    /// Show or hide. Hiding pauses capture and drops the displayed frame;
    /// showing resumes capture and re-sends the region.
    pub fn toggle_visibility(&mut self, monitors: &[MonitorInfo]) {
        if self.is_selecting() {
            return;
        }
        self.visible = !self.visible;
        debug!(visible = self.visible, "visibility toggled");

        if self.visible {
            self.capture.set_paused(false);
            self.track_region(monitors);
        } else {
            self.capture.set_paused(true);
            self.image = None;
            self.session = None;
        }
    }

    /// Switch between interactive and click-through.
    pub fn toggle_interactive(&mut self) {
        if self.is_selecting() {
            return;
        }
        self.interactive = !self.interactive;
        self.panel_open = self.interactive;
        self.session = None;
        debug!(interactive = self.interactive, "input mode toggled");
    }

    /// Recompute the capture region and hand it to the capture loop.
    pub fn track_region(&mut self, monitors: &[MonitorInfo]) -> Option<CaptureRegion> {
        if !self.visible || self.is_selecting() {
            return None;
        }
        let region = self.tracker.update(self.geometry, monitors)?;
        self.capture
            .set_region_and_monitor(region.monitor_index, region.rect);
        Some(region)
    }

    /// Latest frame from the capture loop.
    pub fn set_frame(&mut self, image: Arc<CompositedImage>) {
        if self.visible && !self.is_selecting() {
            self.image = Some(image);
        }
    }

    pub fn cursor_at(&self, x: i32, y: i32) -> CursorShape {
        if self.is_selecting() {
            return CursorShape::Crosshair;
        }
        if !self.interactive {
            return CursorShape::Arrow;
        }
        self.edges_at(x, y).cursor()
    }

    fn edges_at(&self, x: i32, y: i32) -> ResizeEdges {
        ResizeEdges::hit(
            x - self.geometry.x,
            y - self.geometry.y,
            self.geometry.width,
            self.geometry.height,
        )
    }

    /// Primary button pressed at global `(x, y)`. Returns `true` when a
    /// move or resize session started.
    pub fn pointer_down(&mut self, x: i32, y: i32) -> bool {
        if !self.interactive || !self.visible || self.is_selecting() {
            return false;
        }
        let edges = self.edges_at(x, y);
        self.session = Some(if edges.is_empty() {
            PointerSession::Move { last: (x, y) }
        } else {
            PointerSession::Resize { edges, last: (x, y) }
        });
        true
    }

    /// Pointer moved to global `(x, y)`. Returns `true` when the geometry
    /// changed.
    pub fn pointer_move(&mut self, x: i32, y: i32) -> bool {
        let Some(session) = self.session else {
            return false;
        };

        let before = self.geometry;
        self.session = Some(match session {
            PointerSession::Move { last } => {
                self.geometry = before.offset(x - last.0, y - last.1);
                PointerSession::Move { last: (x, y) }
            }
            PointerSession::Resize { edges, last } => {
                self.geometry = resize(before, edges, x - last.0, y - last.1);
                PointerSession::Resize { edges, last: (x, y) }
            }
        });
        self.geometry != before
    }

    pub fn pointer_up(&mut self) {
        self.session = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Enter window selection covering `desktop`. No-op while a selection
    /// is already running.
    pub fn begin_selection(&mut self, desktop: Rect) -> bool {
        if !self.visible || !self.picker.begin(self.geometry) {
            return false;
        }
        self.capture.set_paused(true);
        self.image = None;
        self.session = None;
        self.interactive = true;
        self.geometry = desktop;
        true
    }

    /// Poll the picker. Returns `true` when the selection ended with a snap.
    pub fn poll_selection(&mut self, query: &dyn WindowQuery) -> bool {
        match self.picker.poll(query) {
            PickerOutcome::Continue => false,
            PickerOutcome::Committed(target) => {
                self.finish_selection(target);
                true
            }
        }
    }

    pub fn cancel_selection(&mut self) -> bool {
        match self.picker.cancel() {
            Some(prior) => {
                self.finish_selection(prior);
                true
            }
            None => false,
        }
    }

    fn finish_selection(&mut self, geometry: Rect) {
        self.geometry = geometry;
        self.interactive = true;
        self.panel_open = true;
        self.capture.set_paused(false);
    }

    pub fn escape(&mut self) -> EscapeAction {
        if self.cancel_selection() {
            EscapeAction::SelectionCancelled
        } else {
            self.panel_open = false;
            EscapeAction::PanelClosed
        }
    }

    pub fn render_plan(&self) -> RenderPlan {
        if !self.visible {
            return RenderPlan::Hidden;
        }
        if self.is_selecting() {
            let highlight = self
                .picker
                .highlight()
                .map(|h| h.rect.offset(-self.geometry.x, -self.geometry.y));
            return RenderPlan::Selecting { highlight };
        }
        RenderPlan::Overlay {
            image: self.image.clone(),
            decorations: self.interactive,
        }
    }
}

/// Move the edges in `edges` by the pointer delta. A dragged edge stops
/// [`MIN_OVERLAY_SIZE`] short of the opposite one.
pub fn resize(geometry: Rect, edges: ResizeEdges, dx: i32, dy: i32) -> Rect {
    let min = MIN_OVERLAY_SIZE as i32;
    let (mut left, mut top) = (geometry.x, geometry.y);
    let (mut right, mut bottom) = (geometry.right(), geometry.bottom());

    if edges.contains(ResizeEdges::LEFT) {
        left = (left + dx).min(right - min);
    }
    if edges.contains(ResizeEdges::RIGHT) {
        right = (right + dx).max(left + min);
    }
    if edges.contains(ResizeEdges::TOP) {
        top = (top + dy).min(bottom - min);
    }
    if edges.contains(ResizeEdges::BOTTOM) {
        bottom = (bottom + dy).max(top + min);
    }

    Rect::from_edges(left, top, right, bottom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_hit_uses_margin() {
        let hit = |x, y| ResizeEdges::hit(x, y, 400, 300);
        assert_eq!(hit(200, 150), ResizeEdges::NONE);
        assert_eq!(hit(29, 150), ResizeEdges::LEFT);
        assert_eq!(hit(30, 150), ResizeEdges::NONE);
        assert_eq!(hit(370, 150), ResizeEdges::NONE);
        assert_eq!(hit(371, 150), ResizeEdges::RIGHT);
        assert_eq!(hit(5, 295), ResizeEdges::LEFT | ResizeEdges::BOTTOM);
    }

    #[test]
    fn cursor_shapes_follow_edges() {
        assert_eq!(ResizeEdges::NONE.cursor(), CursorShape::Arrow);
        assert_eq!(ResizeEdges::RIGHT.cursor(), CursorShape::SizeWestEast);
        assert_eq!(ResizeEdges::TOP.cursor(), CursorShape::SizeNorthSouth);
        assert_eq!(
            (ResizeEdges::LEFT | ResizeEdges::TOP).cursor(),
            CursorShape::SizeNwSe
        );
        assert_eq!(
            (ResizeEdges::RIGHT | ResizeEdges::TOP).cursor(),
            CursorShape::SizeNeSw
        );
    }

    #[test]
    fn resize_moves_only_grabbed_edges() {
        let g = Rect::new(100, 100, 400, 300);
        assert_eq!(
            resize(g, ResizeEdges::RIGHT | ResizeEdges::BOTTOM, 50, -20),
            Rect::new(100, 100, 450, 280)
        );
        assert_eq!(
            resize(g, ResizeEdges::LEFT, -30, 99),
            Rect::new(70, 100, 430, 300)
        );
    }

    #[test]
    fn resize_stops_at_minimum_size() {
        let g = Rect::new(100, 100, 400, 300);
        assert_eq!(
            resize(g, ResizeEdges::LEFT | ResizeEdges::TOP, 1000, 1000),
            Rect::new(400, 300, MIN_OVERLAY_SIZE, MIN_OVERLAY_SIZE)
        );
        assert_eq!(
            resize(g, ResizeEdges::RIGHT, -1000, 0),
            Rect::new(100, 100, MIN_OVERLAY_SIZE, 300)
        );
    }
}
