//! Background capture loop
//!
//! One thread owns the frame source and the edge pipeline. The interactive
//! side steers it through a [`CaptureHandle`]: the pause flag is read at the
//! top of every tick, retargets and one-shot auto-adjust requests travel over
//! a command channel and are applied on the loop thread.

use crate::{
    CaptureError, CaptureResult, ErrorClass, FrameMailbox, FrameSource, FrameSourceFactory, Rect,
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use edge_filter::{EdgeFilterPipeline, SharedSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep while paused or without a source/region.
pub const IDLE_SLEEP: Duration = Duration::from_millis(100);
/// Sleep after a degenerate region or a backend error.
pub const RETRY_SLEEP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct CaptureLoopConfig {
    pub initial_monitor: usize,
    pub idle_sleep: Duration,
    pub retry_sleep: Duration,
}

impl Default for CaptureLoopConfig {
    fn default() -> Self {
        Self {
            initial_monitor: 0,
            idle_sleep: IDLE_SLEEP,
            retry_sleep: RETRY_SLEEP,
        }
    }
}

/// What the interactive side may ask of the capture loop.
pub trait CaptureControl {
    fn set_paused(&self, paused: bool);

    /// Always replaces the region. The source is recreated only when
    /// `monitor_index` differs from the bound one, or when no source is
    /// active.
    fn set_region_and_monitor(&self, monitor_index: usize, rect: Rect);
}

impl<C: CaptureControl + ?Sized> CaptureControl for Arc<C> {
    fn set_paused(&self, paused: bool) {
        (**self).set_paused(paused);
    }

    fn set_region_and_monitor(&self, monitor_index: usize, rect: Rect) {
        (**self).set_region_and_monitor(monitor_index, rect);
    }
}

#[derive(Debug)]
enum Command {
    Retarget { monitor_index: usize, rect: Rect },
    AutoAdjustOnce,
}

#[derive(Debug)]
struct LoopFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

/// Cloneable control surface for a running [`CaptureLoop`].
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    flags: Arc<LoopFlags>,
    commands: Sender<Command>,
}

impl CaptureHandle {
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Run auto-threshold on the next processed frame only.
    pub fn request_auto_adjust(&self) {
        self.send(Command::AutoAdjustOnce);
    }

    fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            debug!(command = ?e.into_inner(), "capture loop has exited, command dropped");
        }
    }
}

impl CaptureControl for CaptureHandle {
    fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    fn set_region_and_monitor(&self, monitor_index: usize, rect: Rect) {
        self.send(Command::Retarget { monitor_index, rect });
    }
}

/// Owner of the capture thread. Dropping it shuts the loop down and waits
/// for the source to be released.
pub struct CaptureLoop {
    handle: CaptureHandle,
    mailbox: Arc<FrameMailbox>,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureLoop {
    pub fn spawn<F: FrameSourceFactory>(
        factory: F,
        settings: SharedSettings,
        mailbox: Arc<FrameMailbox>,
        config: CaptureLoopConfig,
    ) -> CaptureResult<Self> {
        let flags = Arc::new(LoopFlags {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        });
        let (command_tx, command_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let worker_flags = flags.clone();
        let worker_mailbox = mailbox.clone();

        // The worker, and with it every source, is built on the loop thread.
        let thread = thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || {
                Worker {
                    factory,
                    source: None,
                    monitor_index: config.initial_monitor,
                    region: None,
                    auto_once: false,
                    pipeline: EdgeFilterPipeline::new(),
                    flags: worker_flags,
                    settings,
                    mailbox: worker_mailbox,
                    commands: command_rx,
                    shutdown: shutdown_rx,
                    config,
                }
                .run()
            })?;

        Ok(Self {
            handle: CaptureHandle {
                flags,
                commands: command_tx,
            },
            mailbox,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    pub fn mailbox(&self) -> &Arc<FrameMailbox> {
        &self.mailbox
    }

    pub fn is_running(&self) -> bool {
        self.handle.flags.running.load(Ordering::SeqCst)
    }

    /// Stop after the in-flight tick and release the source.
    pub fn shutdown(&mut self) {
        self.handle.flags.running.store(false, Ordering::SeqCst);
        // Dropping the sender wakes a sleeping loop.
        self.shutdown_tx.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("capture thread panicked");
            }
        }
    }
}

impl CaptureControl for CaptureLoop {
    fn set_paused(&self, paused: bool) {
        self.handle.set_paused(paused);
    }

    fn set_region_and_monitor(&self, monitor_index: usize, rect: Rect) {
        self.handle.set_region_and_monitor(monitor_index, rect);
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Tick {
    Sleep(Duration),
    Again,
}

struct Worker<F: FrameSourceFactory> {
    factory: F,
    source: Option<F::Source>,
    monitor_index: usize,
    region: Option<Rect>,
    auto_once: bool,
    pipeline: EdgeFilterPipeline,
    flags: Arc<LoopFlags>,
    settings: SharedSettings,
    mailbox: Arc<FrameMailbox>,
    commands: Receiver<Command>,
    shutdown: Receiver<()>,
    config: CaptureLoopConfig,
}

impl<F: FrameSourceFactory> Worker<F> {
    fn run(mut self) {
        if let Err(e) = self.factory.init_thread() {
            error!("capture backend setup failed: {e}");
        }
        self.bind(self.monitor_index);
        info!(monitor = self.monitor_index, "capture loop started");

        while self.flags.running.load(Ordering::SeqCst) {
            self.drain_commands();

            match self.tick() {
                Tick::Again => thread::yield_now(),
                Tick::Sleep(duration) => {
                    if !self.sleep(duration) {
                        break;
                    }
                }
            }
        }

        self.source = None;
        info!("capture loop stopped");
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Retarget { monitor_index, rect } => {
                    self.region = Some(rect);
                    let bound = self.source.as_ref().map(FrameSource::monitor_index);
                    if bound != Some(monitor_index) {
                        self.bind(monitor_index);
                    }
                }
                Command::AutoAdjustOnce => self.auto_once = true,
            }
        }
    }

    /// Swap the source to `monitor_index`. The old source is released
    /// before the new one is created.
    fn bind(&mut self, monitor_index: usize) {
        self.source = None;
        self.monitor_index = monitor_index;

        match self.factory.create(monitor_index) {
            Ok(source) => {
                let (width, height) = source.dimensions();
                info!(monitor = monitor_index, width, height, "capture source ready");
                self.source = Some(source);
            }
            Err(e) => warn!(monitor = monitor_index, "capture source unavailable: {e}"),
        }
    }

    fn tick(&mut self) -> Tick {
        if self.flags.paused.load(Ordering::SeqCst) {
            return Tick::Sleep(self.config.idle_sleep);
        }
        let Some(source) = self.source.as_mut() else {
            return Tick::Sleep(self.config.idle_sleep);
        };
        let Some(region) = self.region else {
            return Tick::Sleep(self.config.idle_sleep);
        };
        if region.is_empty() {
            return Tick::Sleep(self.config.retry_sleep);
        }

        let (width, height) = source.dimensions();
        let Some(rect) = region.intersection(&Rect::new(0, 0, width, height)) else {
            return Tick::Sleep(self.config.retry_sleep);
        };

        let frame = match source.grab(rect) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Tick::Again,
            Err(e) => return self.on_grab_error(e),
        };

        let auto_once = std::mem::take(&mut self.auto_once);
        match self.pipeline.process(frame.view(), &self.settings, auto_once) {
            Ok(image) => self.mailbox.publish(image),
            Err(e) => warn!("edge filter failed: {e}"),
        }

        Tick::Sleep(self.settings.snapshot().tick_interval())
    }

    fn on_grab_error(&mut self, error: CaptureError) -> Tick {
        match error.class() {
            ErrorClass::Transient => debug!("capture skipped: {error}"),
            ErrorClass::Unavailable => {
                warn!(monitor = self.monitor_index, "capture source lost: {error}");
                self.source = None;
            }
        }
        Tick::Sleep(self.config.retry_sleep)
    }

    /// Returns `false` when shutdown was requested during the sleep.
    fn sleep(&self, duration: Duration) -> bool {
        match self.shutdown.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}
