//! Maps overlay geometry to a monitor-local capture region

use capture::{MonitorInfo, Rect};
use tracing::debug;

/// Region handed to the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub monitor_index: usize,
    /// In the monitor's own pixel space.
    pub rect: Rect,
}

/// Monitor containing `(x, y)`, else the primary, else the first one.
pub fn monitor_at(monitors: &[MonitorInfo], x: i32, y: i32) -> Option<&MonitorInfo> {
    monitors
        .iter()
        .find(|m| m.rect.contains(x, y))
        .or_else(|| monitors.iter().find(|m| m.is_primary))
        .or_else(|| monitors.first())
}

/// Keeps the last region that was successfully derived from the overlay.
#[derive(Debug, Default)]
pub struct RegionTracker {
    current: Option<CaptureRegion>,
}

impl RegionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<CaptureRegion> {
        self.current
    }

    /// Recompute from `geometry` (desktop coordinates).
    ///
    /// Returns the region to send to the capture loop, or `None` when the
    /// overlay does not overlap its monitor; the previous region is then
    /// kept as is.
    pub fn update(&mut self, geometry: Rect, monitors: &[MonitorInfo]) -> Option<CaptureRegion> {
        let (cx, cy) = geometry.center();
        let monitor = monitor_at(monitors, cx, cy)?;

        let Some(visible) = geometry.intersection(&monitor.rect) else {
            debug!(?geometry, "overlay is off-screen, keeping previous region");
            return None;
        };

        let region = CaptureRegion {
            monitor_index: monitor.index,
            rect: visible.offset(-monitor.rect.x, -monitor.rect.y),
        };
        if self.current != Some(region) {
            debug!(monitor = region.monitor_index, rect = ?region.rect, "capture region changed");
        }
        self.current = Some(region);
        Some(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitors() -> Vec<MonitorInfo> {
        vec![
            MonitorInfo::new(0, Rect::new(0, 0, 1920, 1080), true),
            MonitorInfo::new(1, Rect::new(1920, 0, 1280, 1024), false),
            MonitorInfo::new(2, Rect::new(-1600, 100, 1600, 900), false),
        ]
    }

    #[test]
    fn picks_monitor_under_center() {
        let mut tracker = RegionTracker::new();
        let region = tracker
            .update(Rect::new(2000, 100, 400, 300), &monitors())
            .unwrap();
        assert_eq!(region.monitor_index, 1);
        assert_eq!(region.rect, Rect::new(80, 100, 400, 300));
    }

    #[test]
    fn straddling_overlay_is_clipped_to_its_monitor() {
        let mut tracker = RegionTracker::new();
        // Center (1900, 500) lies on monitor 0.
        let region = tracker
            .update(Rect::new(1700, 400, 400, 200), &monitors())
            .unwrap();
        assert_eq!(region.monitor_index, 0);
        assert_eq!(region.rect, Rect::new(1700, 400, 220, 200));
    }

    #[test]
    fn negative_origin_monitor_uses_local_coordinates() {
        let mut tracker = RegionTracker::new();
        let region = tracker
            .update(Rect::new(-1500, 50, 600, 400), &monitors())
            .unwrap();
        assert_eq!(region.monitor_index, 2);
        assert_eq!(region.rect, Rect::new(100, 0, 600, 350));
    }

    #[test]
    fn center_outside_all_monitors_falls_back_to_primary() {
        let monitors = monitors();
        let fallback = monitor_at(&monitors, 5000, 5000).unwrap();
        assert_eq!(fallback.index, 0);

        let mut tracker = RegionTracker::new();
        // Center is in the gap below monitor 1, overlap is with the primary.
        let region = tracker
            .update(Rect::new(1800, 1000, 400, 200), &monitors)
            .unwrap();
        assert_eq!(region.monitor_index, 0);
        assert_eq!(region.rect, Rect::new(1800, 1000, 120, 80));
    }

    #[test]
    fn off_screen_overlay_keeps_previous_region() {
        let mut tracker = RegionTracker::new();
        let first = tracker
            .update(Rect::new(100, 100, 300, 200), &monitors())
            .unwrap();

        assert_eq!(tracker.update(Rect::new(9000, 9000, 300, 200), &monitors()), None);
        assert_eq!(tracker.current(), Some(first));
    }

    #[test]
    fn no_monitors_yields_nothing() {
        let mut tracker = RegionTracker::new();
        assert_eq!(tracker.update(Rect::new(0, 0, 10, 10), &[]), None);
        assert_eq!(tracker.current(), None);
    }
}
