//! Settings panel using egui
//!
//! A thin front-end over [`SharedSettings`]: every frame re-reads the shared
//! values so thresholds written by auto-adjust show up immediately, and
//! writes back only what the user changed.

use capture::CaptureHandle;
use eframe::egui;
use edge_filter::settings::{MAX_THICKNESS, MIN_THICKNESS};
use edge_filter::{EdgeSettings, SharedSettings};
use overlay::{post_signal, OverlaySignal, OverlayWindow};
use tracing::{debug, warn};

pub struct SettingsPanel {
    settings: SharedSettings,
    capture: CaptureHandle,
    overlay: OverlayWindow,
    panel_attached: bool,
}

impl SettingsPanel {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        settings: SharedSettings,
        capture: CaptureHandle,
        overlay: OverlayWindow,
    ) -> Self {
        Self {
            settings,
            capture,
            overlay,
            panel_attached: false,
        }
    }

    /// Hand our native window to the overlay so it can show and hide it
    /// with the overlay mode.
    fn attach_to_overlay(&mut self, frame: &eframe::Frame) {
        use raw_window_handle::{HasWindowHandle, RawWindowHandle};

        if self.panel_attached {
            return;
        }
        if let Ok(handle) = frame.window_handle() {
            if let RawWindowHandle::Win32(win32) = handle.as_raw() {
                self.overlay.attach_panel(win32.hwnd.get());
                self.panel_attached = true;
                debug!("settings panel attached to overlay");
            }
        }
    }

    fn signal(&self, signal: OverlaySignal) {
        if !post_signal(self.overlay.hwnd(), signal) {
            warn!(?signal, "overlay did not accept signal");
        }
    }
}

fn threshold_controls(ui: &mut egui::Ui, edited: &mut EdgeSettings) {
    ui.add(egui::Slider::new(&mut edited.threshold_low, 0..=255).text("Low threshold"));
    ui.add(egui::Slider::new(&mut edited.threshold_high, 0..=255).text("High threshold"));
}

fn appearance_controls(ui: &mut egui::Ui, edited: &mut EdgeSettings) {
    ui.horizontal(|ui| {
        ui.label("Thickness");
        ui.add(
            egui::DragValue::new(&mut edited.thickness)
                .clamp_range(MIN_THICKNESS..=MAX_THICKNESS),
        );
    });
    ui.add(egui::Slider::new(&mut edited.opacity, 0..=255).text("Opacity"));
    ui.horizontal(|ui| {
        ui.label("Color");
        ui.color_edit_button_srgb(&mut edited.color);
    });
}

/// Copy the fields the user touched this frame, leaving values written
/// concurrently by the capture loop alone.
fn apply_changes(settings: &mut EdgeSettings, before: &EdgeSettings, after: &EdgeSettings) {
    macro_rules! copy_changed {
        ($($field:ident),*) => {
            $(if before.$field != after.$field {
                settings.$field = after.$field;
            })*
        };
    }
    copy_changed!(
        threshold_low,
        threshold_high,
        color,
        thickness,
        opacity,
        refresh_rate,
        auto_sigma,
        realtime_auto
    );
}

impl eframe::App for SettingsPanel {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.attach_to_overlay(frame);

        let current = self.settings.snapshot();
        let mut edited = current;
        let mut run_once = false;
        let mut select_window = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Edge Overlay");
            ui.separator();

            ui.label(egui::RichText::new("Auto threshold").strong());
            ui.add(egui::Slider::new(&mut edited.auto_sigma, 0.0..=1.0).text("Sigma"));
            ui.horizontal(|ui| {
                run_once = ui.button("Run once").clicked();
                ui.checkbox(&mut edited.realtime_auto, "Realtime");
            });

            ui.add_space(8.0);
            ui.label(egui::RichText::new("Edges").strong());
            ui.add_enabled_ui(!edited.realtime_auto, |ui| threshold_controls(ui, &mut edited));
            appearance_controls(ui, &mut edited);

            ui.add_space(8.0);
            ui.separator();
            select_window = ui.button("Select window").clicked();
            ui.label(
                egui::RichText::new("Click a window to snap the overlay to it, Esc to cancel")
                    .small()
                    .weak(),
            );
        });

        if edited != current {
            self.settings
                .update(|settings| apply_changes(settings, &current, &edited));
        }
        if run_once {
            self.capture.request_auto_adjust();
        }
        if select_window {
            self.signal(OverlaySignal::SelectWindow);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.signal(OverlaySignal::Escape);
        }

        // Pick up thresholds written by the capture loop.
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}
