//! Shared edge settings

use crate::threshold::Thresholds;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Tick interval used when the refresh rate is zero.
pub const FALLBACK_TICK: Duration = Duration::from_millis(16);

pub const MIN_THICKNESS: u8 = 1;
pub const MAX_THICKNESS: u8 = 5;

/// Parameters read by the capture loop every tick and by the overlay on
/// every paint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSettings {
    /// Canny low threshold
    pub threshold_low: u8,
    /// Canny high threshold
    pub threshold_high: u8,
    /// Edge color as RGB
    pub color: [u8; 3],
    /// Side of the square dilation element, 1..=5
    pub thickness: u8,
    /// Alpha written to edge pixels
    pub opacity: u8,
    /// Target frames per second, 0 selects [`FALLBACK_TICK`]
    pub refresh_rate: u32,
    /// Spread around the median used by auto-threshold, 0.0..=1.0
    pub auto_sigma: f32,
    /// Run auto-threshold on every tick
    pub realtime_auto: bool,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            threshold_low: 50,
            threshold_high: 150,
            color: [0, 255, 0],
            thickness: 1,
            opacity: 255,
            refresh_rate: 60,
            auto_sigma: 0.33,
            realtime_auto: false,
        }
    }
}

impl EdgeSettings {
    /// Sleep between two capture ticks.
    pub fn tick_interval(&self) -> Duration {
        if self.refresh_rate > 0 {
            Duration::from_millis((1000 / u64::from(self.refresh_rate)).max(1))
        } else {
            FALLBACK_TICK
        }
    }

    /// Clamp fields with a restricted range back into it.
    pub fn normalized(mut self) -> Self {
        self.thickness = self.thickness.clamp(MIN_THICKNESS, MAX_THICKNESS);
        self.auto_sigma = if self.auto_sigma.is_finite() {
            self.auto_sigma.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            low: self.threshold_low,
            high: self.threshold_high,
        }
    }
}

/// Settings shared between the capture thread, the overlay and the
/// settings panel.
///
/// Readers always copy a whole [`EdgeSettings`] out, so a threshold pair
/// written by one update is never observed half-applied.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<EdgeSettings>>,
}

impl SharedSettings {
    pub fn new(settings: EdgeSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings.normalized())),
        }
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> EdgeSettings {
        *self.inner.read()
    }

    /// Edit the settings in place.
    pub fn update(&self, edit: impl FnOnce(&mut EdgeSettings)) {
        let mut guard = self.inner.write();
        edit(&mut guard);
        *guard = guard.normalized();
    }

    /// Replace both thresholds in one write.
    pub fn set_thresholds(&self, thresholds: Thresholds) {
        let mut guard = self.inner.write();
        guard.threshold_low = thresholds.low;
        guard.threshold_high = thresholds.high;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_refresh_rate_uses_fallback_tick() {
        let settings = EdgeSettings {
            refresh_rate: 0,
            ..Default::default()
        };
        assert_eq!(settings.tick_interval(), FALLBACK_TICK);
        assert!(settings.tick_interval() > Duration::ZERO);
    }

    #[test]
    fn tick_interval_never_drops_below_one_millisecond() {
        let mut settings = EdgeSettings::default();
        assert_eq!(settings.tick_interval(), Duration::from_millis(16));

        settings.refresh_rate = 5000;
        assert_eq!(settings.tick_interval(), Duration::from_millis(1));

        settings.refresh_rate = 7;
        assert_eq!(settings.tick_interval(), Duration::from_millis(142));
    }

    #[test]
    fn update_clamps_thickness_and_sigma() {
        let shared = SharedSettings::default();
        shared.update(|s| {
            s.thickness = 9;
            s.auto_sigma = 1.7;
        });
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.thickness, MAX_THICKNESS);
        assert_eq!(snapshot.auto_sigma, 1.0);

        shared.update(|s| s.thickness = 0);
        assert_eq!(shared.snapshot().thickness, MIN_THICKNESS);
    }

    #[test]
    fn clones_share_state() {
        let shared = SharedSettings::default();
        let other = shared.clone();
        other.set_thresholds(Thresholds { low: 12, high: 34 });
        let snapshot = shared.snapshot();
        assert_eq!((snapshot.threshold_low, snapshot.threshold_high), (12, 34));
    }
}
