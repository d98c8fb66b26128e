//! Edge Overlay - live edge view of whatever lies under a floating window

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
#[cfg(windows)]
mod hotkey;
mod logger;
#[cfg(windows)]
mod ui;

use crate::config::AppConfig;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    logger::init(config.log_level)?;
    for (key, value) in &config.rejected {
        warn!("Ignoring {key}={value:?}");
    }

    run(config)
}

#[cfg(windows)]
fn run(config: AppConfig) -> anyhow::Result<()> {
    use crate::hotkey::HotkeyListener;
    use crate::ui::SettingsPanel;
    use capture::{CaptureLoop, CaptureLoopConfig, FrameMailbox, WgcSourceFactory};
    use edge_filter::SharedSettings;
    use overlay::OverlayWindow;
    use std::sync::Arc;
    use windows::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    // Physical pixels everywhere, so window rects line up with captured frames.
    unsafe {
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }

    let settings = SharedSettings::new(config.settings);
    let mailbox = Arc::new(FrameMailbox::new());

    let mut capture = CaptureLoop::spawn(
        WgcSourceFactory,
        settings.clone(),
        mailbox.clone(),
        CaptureLoopConfig {
            initial_monitor: config.initial_monitor,
            ..Default::default()
        },
    )?;

    let overlay = OverlayWindow::create(None, capture.handle(), mailbox)?;
    let mut hotkeys = HotkeyListener::start(overlay.hwnd())?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([320.0, 420.0])
            .with_min_inner_size([280.0, 360.0])
            .with_title("Edge Overlay")
            .with_always_on_top(),
        ..Default::default()
    };

    let handle = capture.handle();
    let result = eframe::run_native(
        "Edge Overlay",
        native_options,
        Box::new(move |cc| Ok(Box::new(SettingsPanel::new(cc, settings, handle, overlay)))),
    );

    hotkeys.stop();
    capture.shutdown();
    info!("Edge Overlay exited");

    result.map_err(|e| anyhow::anyhow!("Settings panel failed: {e}"))
}

#[cfg(not(windows))]
fn run(_config: AppConfig) -> anyhow::Result<()> {
    tracing::error!("Edge Overlay needs Windows Graphics Capture");
    anyhow::bail!("unsupported platform")
}
