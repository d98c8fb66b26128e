//! Latest-frame handoff between the capture thread and the overlay

use edge_filter::CompositedImage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Notifier = Box<dyn Fn() + Send + Sync>;

/// One-element mailbox. Publishing replaces whatever is stored; there is
/// never more than one frame outstanding and a slow reader just misses
/// intermediate frames.
#[derive(Default)]
pub struct FrameMailbox {
    slot: Mutex<Option<Arc<CompositedImage>>>,
    published: AtomicU64,
    notifier: Mutex<Option<Notifier>>,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every publish, from the publishing thread.
    pub fn set_notifier(&self, notifier: impl Fn() + Send + Sync + 'static) {
        *self.notifier.lock() = Some(Box::new(notifier));
    }

    pub fn publish(&self, image: CompositedImage) {
        *self.slot.lock() = Some(Arc::new(image));
        self.published.fetch_add(1, Ordering::Release);

        if let Some(notify) = self.notifier.lock().as_ref() {
            notify();
        }
    }

    /// Remove and return the stored frame.
    pub fn take(&self) -> Option<Arc<CompositedImage>> {
        self.slot.lock().take()
    }

    /// Stored frame without removing it.
    pub fn latest(&self) -> Option<Arc<CompositedImage>> {
        self.slot.lock().clone()
    }

    pub fn clear(&self) {
        self.slot.lock().take();
    }

    /// Number of frames published so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for FrameMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMailbox")
            .field("occupied", &self.slot.lock().is_some())
            .field("published", &self.published_count())
            .finish()
    }
}
