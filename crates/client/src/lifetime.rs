//! Event lifetime extension.
//!
//! A strategy may keep working after it has produced a response (writing a
//! revalidated response back to the cache, for example). That work is
//! registered on the event's `Lifetime`, and whoever owns the event awaits
//! `settled()` before considering it finished.

use std::future::Future;

use tokio_util::task::TaskTracker;

/// Handle that keeps background work attached to one event.
#[derive(Debug, Clone, Default)]
pub struct Lifetime {
    tracker: TaskTracker,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` in the background, attached to this lifetime.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(work);
    }

    /// Number of background tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every task registered so far.
    ///
    /// The lifetime stays usable afterwards.
    pub async fn settled(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
