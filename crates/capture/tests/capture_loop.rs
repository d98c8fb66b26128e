use capture::{
    CaptureControl, CaptureError, CaptureLoop, CaptureLoopConfig, CaptureResult, FrameData,
    FrameMailbox, FrameSource, FrameSourceFactory, Rect,
};
use edge_filter::{EdgeSettings, SharedSettings, Thresholds};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const GRAY: u8 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrabMode {
    Frames,
    /// `Ok(None)` for the first `n` grabs of each source.
    EmptyFirst(usize),
    DeviceLost,
}

#[derive(Default)]
struct Probe {
    grabs: AtomicUsize,
    live: AtomicUsize,
    overlapped: AtomicBool,
    created: Mutex<Vec<usize>>,
    grabbed_rects: Mutex<Vec<Rect>>,
}

struct FakeFactory {
    probe: Arc<Probe>,
    dimensions: (u32, u32),
    failures_left: usize,
    mode: GrabMode,
}

impl FakeFactory {
    fn new(probe: &Arc<Probe>) -> Self {
        Self {
            probe: probe.clone(),
            dimensions: (100, 80),
            failures_left: 0,
            mode: GrabMode::Frames,
        }
    }
}

struct FakeSource {
    probe: Arc<Probe>,
    index: usize,
    dimensions: (u32, u32),
    mode: GrabMode,
    grabs: usize,
}

impl FrameSourceFactory for FakeFactory {
    type Source = FakeSource;

    fn create(&mut self, monitor_index: usize) -> CaptureResult<FakeSource> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(CaptureError::MonitorNotFound(monitor_index));
        }
        if self.probe.live.fetch_add(1, Ordering::SeqCst) != 0 {
            self.probe.overlapped.store(true, Ordering::SeqCst);
        }
        self.probe.created.lock().push(monitor_index);
        Ok(FakeSource {
            probe: self.probe.clone(),
            index: monitor_index,
            dimensions: self.dimensions,
            mode: self.mode,
            grabs: 0,
        })
    }
}

impl FrameSource for FakeSource {
    fn monitor_index(&self) -> usize {
        self.index
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn grab(&mut self, rect: Rect) -> CaptureResult<Option<FrameData>> {
        self.probe.grabs.fetch_add(1, Ordering::SeqCst);
        self.probe.grabbed_rects.lock().push(rect);
        self.grabs += 1;

        match self.mode {
            GrabMode::DeviceLost => return Err(CaptureError::DeviceLost),
            GrabMode::EmptyFirst(n) if self.grabs <= n => return Ok(None),
            _ => {}
        }

        let data = [GRAY, GRAY, GRAY, 255].repeat((rect.width * rect.height) as usize);
        Ok(Some(FrameData::new(data, rect.width, rect.height)))
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.probe.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn spawn(factory: FakeFactory, settings: &SharedSettings) -> CaptureLoop {
    let config = CaptureLoopConfig {
        idle_sleep: Duration::from_millis(10),
        retry_sleep: Duration::from_millis(5),
        ..Default::default()
    };
    CaptureLoop::spawn(factory, settings.clone(), Arc::new(FrameMailbox::new()), config).unwrap()
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn paused_loop_never_grabs() {
    let probe = Arc::new(Probe::default());
    let capture = spawn(FakeFactory::new(&probe), &SharedSettings::default());

    capture.set_paused(true);
    capture.set_region_and_monitor(0, Rect::new(0, 0, 40, 40));
    thread::sleep(Duration::from_millis(150));

    assert_eq!(probe.grabs.load(Ordering::SeqCst), 0);
    assert!(capture.mailbox().latest().is_none());

    capture.set_paused(false);
    wait_until("first frame", || capture.mailbox().published_count() > 0);
    assert!(probe.grabs.load(Ordering::SeqCst) > 0);
}

#[test]
fn no_region_means_no_grab() {
    let probe = Arc::new(Probe::default());
    let _capture = spawn(FakeFactory::new(&probe), &SharedSettings::default());

    wait_until("initial source", || probe.created.lock().len() == 1);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(probe.grabs.load(Ordering::SeqCst), 0);
}

#[test]
fn region_is_clamped_to_monitor() {
    let probe = Arc::new(Probe::default());
    let capture = spawn(FakeFactory::new(&probe), &SharedSettings::default());

    capture.set_region_and_monitor(0, Rect::new(50, 40, 100, 100));
    wait_until("first frame", || capture.mailbox().latest().is_some());

    let image = capture.mailbox().latest().unwrap();
    assert_eq!(image.dimensions(), (50, 40));
    assert_eq!(probe.grabbed_rects.lock()[0], Rect::new(50, 40, 50, 40));
}

#[test]
fn region_outside_monitor_is_skipped() {
    let probe = Arc::new(Probe::default());
    let capture = spawn(FakeFactory::new(&probe), &SharedSettings::default());

    capture.set_region_and_monitor(0, Rect::new(200, 200, 50, 50));
    capture.set_region_and_monitor(0, Rect::new(10, 10, 0, 30));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(probe.grabs.load(Ordering::SeqCst), 0);
}

#[test]
fn source_is_recreated_only_on_monitor_change() {
    let probe = Arc::new(Probe::default());
    let capture = spawn(FakeFactory::new(&probe), &SharedSettings::default());

    capture.set_region_and_monitor(0, Rect::new(0, 0, 20, 20));
    capture.set_region_and_monitor(0, Rect::new(5, 5, 30, 30));
    wait_until("frames on monitor 0", || {
        probe.grabbed_rects.lock().contains(&Rect::new(5, 5, 30, 30))
    });
    assert_eq!(*probe.created.lock(), vec![0]);

    capture.set_region_and_monitor(1, Rect::new(0, 0, 20, 20));
    wait_until("source on monitor 1", || probe.created.lock().len() == 2);
    assert_eq!(*probe.created.lock(), vec![0, 1]);
    assert!(!probe.overlapped.load(Ordering::SeqCst));
}

#[test]
fn failed_creation_idles_until_retarget() {
    let probe = Arc::new(Probe::default());
    let mut factory = FakeFactory::new(&probe);
    factory.failures_left = 1;
    let capture = spawn(factory, &SharedSettings::default());

    thread::sleep(Duration::from_millis(50));
    assert!(probe.created.lock().is_empty());

    // Same monitor index, but nothing is bound so creation is retried.
    capture.set_region_and_monitor(0, Rect::new(0, 0, 16, 16));
    wait_until("frame after retry", || capture.mailbox().published_count() > 0);
    assert_eq!(*probe.created.lock(), vec![0]);
}

#[test]
fn empty_grab_is_not_a_failure() {
    let probe = Arc::new(Probe::default());
    let mut factory = FakeFactory::new(&probe);
    factory.mode = GrabMode::EmptyFirst(5);
    let capture = spawn(factory, &SharedSettings::default());

    capture.set_region_and_monitor(0, Rect::new(0, 0, 16, 16));
    wait_until("frame after empty polls", || capture.mailbox().published_count() > 0);

    assert!(probe.grabs.load(Ordering::SeqCst) >= 6);
    assert_eq!(probe.created.lock().len(), 1);
}

#[test]
fn lost_device_drops_source() {
    let probe = Arc::new(Probe::default());
    let mut factory = FakeFactory::new(&probe);
    factory.mode = GrabMode::DeviceLost;
    let capture = spawn(factory, &SharedSettings::default());

    capture.set_region_and_monitor(0, Rect::new(0, 0, 16, 16));
    wait_until("source released", || {
        probe.grabs.load(Ordering::SeqCst) > 0 && probe.live.load(Ordering::SeqCst) == 0
    });
    assert!(capture.mailbox().latest().is_none());

    capture.set_region_and_monitor(0, Rect::new(0, 0, 16, 16));
    wait_until("source recreated", || probe.created.lock().len() == 2);
}

#[test]
fn one_shot_auto_adjust_runs_once() {
    let settings = SharedSettings::new(EdgeSettings {
        threshold_low: 0,
        threshold_high: 0,
        auto_sigma: 0.0,
        ..Default::default()
    });
    let probe = Arc::new(Probe::default());
    let capture = spawn(FakeFactory::new(&probe), &settings);

    capture.set_region_and_monitor(0, Rect::new(0, 0, 16, 16));
    wait_until("first frame", || capture.mailbox().published_count() > 0);
    assert_eq!(settings.snapshot().thresholds(), Thresholds { low: 0, high: 0 });

    capture.handle().request_auto_adjust();
    wait_until("thresholds updated", || {
        settings.snapshot().thresholds() == Thresholds { low: GRAY, high: GRAY }
    });

    // A manual edit afterwards sticks because the request was consumed.
    settings.set_thresholds(Thresholds { low: 10, high: 20 });
    let seen = capture.mailbox().published_count();
    wait_until("more frames", || capture.mailbox().published_count() > seen + 2);
    assert_eq!(settings.snapshot().thresholds(), Thresholds { low: 10, high: 20 });
}

#[test]
fn shutdown_interrupts_sleep_and_releases_source() {
    let settings = SharedSettings::new(EdgeSettings {
        refresh_rate: 1,
        ..Default::default()
    });
    let probe = Arc::new(Probe::default());
    let mut capture = spawn(FakeFactory::new(&probe), &settings);

    capture.set_region_and_monitor(0, Rect::new(0, 0, 16, 16));
    wait_until("first frame", || capture.mailbox().published_count() > 0);

    let started = Instant::now();
    capture.shutdown();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!capture.is_running());
    assert_eq!(probe.live.load(Ordering::SeqCst), 0);
}

/// Source holding thread-bound state, like a COM-backed capture session.
struct ThreadBoundSource {
    frames: std::rc::Rc<std::cell::Cell<usize>>,
}

impl FrameSource for ThreadBoundSource {
    fn monitor_index(&self) -> usize {
        0
    }

    fn dimensions(&self) -> (u32, u32) {
        (32, 32)
    }

    fn grab(&mut self, rect: Rect) -> CaptureResult<Option<FrameData>> {
        self.frames.set(self.frames.get() + 1);
        let data = [GRAY, GRAY, GRAY, 255].repeat((rect.width * rect.height) as usize);
        Ok(Some(FrameData::new(data, rect.width, rect.height)))
    }
}

#[derive(Default)]
struct ThreadBoundFactory {
    created_on: Arc<Mutex<Vec<String>>>,
}

impl FrameSourceFactory for ThreadBoundFactory {
    type Source = ThreadBoundSource;

    fn create(&mut self, _monitor_index: usize) -> CaptureResult<ThreadBoundSource> {
        let name = thread::current().name().unwrap_or_default().to_string();
        self.created_on.lock().push(name);
        Ok(ThreadBoundSource {
            frames: Default::default(),
        })
    }
}

#[test]
fn sources_that_are_not_send_live_on_the_loop_thread() {
    let factory = ThreadBoundFactory::default();
    let created_on = factory.created_on.clone();
    let mailbox = Arc::new(FrameMailbox::new());
    let capture = CaptureLoop::spawn(
        factory,
        SharedSettings::default(),
        mailbox.clone(),
        CaptureLoopConfig::default(),
    )
    .unwrap();

    capture.set_region_and_monitor(0, Rect::new(0, 0, 8, 8));
    wait_until("first frame", || mailbox.published_count() > 0);
    assert_eq!(*created_on.lock(), vec!["capture-loop".to_string()]);
}

#[test]
fn commands_after_shutdown_are_dropped() {
    let probe = Arc::new(Probe::default());
    let mut capture = spawn(FakeFactory::new(&probe), &SharedSettings::default());
    let handle = capture.handle();
    capture.shutdown();

    handle.set_region_and_monitor(1, Rect::new(0, 0, 16, 16));
    handle.request_auto_adjust();
    handle.set_paused(true);
    assert!(handle.is_paused());
    assert_eq!(*probe.created.lock(), vec![0]);
    assert_eq!(probe.grabs.load(Ordering::SeqCst), 0);
}
