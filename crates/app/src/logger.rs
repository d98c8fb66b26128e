//! Logging setup

use anyhow::Context;
use tracing::subscriber::set_global_default;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt};

/// Install the global subscriber. Call once, before anything logs.
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    let filter = tracing_subscriber::filter::Targets::new()
        .with_default(level)
        .with_target("winit", LevelFilter::WARN)
        .with_target("eframe", LevelFilter::WARN)
        .with_target("egui_glow", LevelFilter::WARN);

    let std_logger = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    let collector = tracing_subscriber::registry().with(std_logger).with(filter);

    set_global_default(collector).context("logger already installed")
}
