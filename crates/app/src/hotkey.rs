//! Global hotkeys
//!
//! - Ctrl+F9: show or hide the overlay
//! - Ctrl+F10: switch between edit mode and click-through
//!
//! Presses are forwarded to the overlay window as posted messages, so the
//! listener thread never touches overlay state.

use crossbeam_channel::{bounded, select, Sender};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use overlay::{post_signal, OverlaySignal};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

fn toggle_visibility_hotkey() -> HotKey {
    HotKey::new(Some(Modifiers::CONTROL), Code::F9)
}

fn toggle_interactive_hotkey() -> HotKey {
    HotKey::new(Some(Modifiers::CONTROL), Code::F10)
}

/// Overlay request bound to a hotkey id.
pub fn signal_for(id: u32) -> Option<OverlaySignal> {
    if id == toggle_visibility_hotkey().id() {
        Some(OverlaySignal::ToggleVisibility)
    } else if id == toggle_interactive_hotkey().id() {
        Some(OverlaySignal::ToggleInteractive)
    } else {
        None
    }
}

/// Registered hotkeys plus the thread forwarding them. Must be created on
/// the thread that pumps window messages.
pub struct HotkeyListener {
    manager: GlobalHotKeyManager,
    hotkeys: [HotKey; 2],
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    pub fn start(overlay_hwnd: isize) -> anyhow::Result<Self> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow::anyhow!("Failed to create hotkey manager: {e}"))?;

        let hotkeys = [toggle_visibility_hotkey(), toggle_interactive_hotkey()];
        for hotkey in hotkeys {
            manager
                .register(hotkey)
                .map_err(|e| anyhow::anyhow!("Failed to register {hotkey:?}: {e}"))?;
        }
        info!("Registered global hotkeys: Ctrl+F9 (toggle view), Ctrl+F10 (edit mode)");

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let events = GlobalHotKeyEvent::receiver().clone();

        let thread = thread::Builder::new()
            .name("hotkeys".into())
            .spawn(move || loop {
                select! {
                    recv(events) -> event => {
                        let Ok(event) = event else { break };
                        if event.state != HotKeyState::Pressed {
                            continue;
                        }
                        let Some(signal) = signal_for(event.id) else {
                            continue;
                        };
                        debug!(?signal, "hotkey pressed");
                        if !post_signal(overlay_hwnd, signal) {
                            warn!(?signal, "overlay did not accept hotkey signal");
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })?;

        Ok(Self {
            manager,
            hotkeys,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        // Dropping the sender wakes the listener.
        self.stop.take();
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = thread.join();
        if let Err(e) = self.manager.unregister_all(&self.hotkeys) {
            warn!("Failed to unregister hotkeys: {e}");
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}
