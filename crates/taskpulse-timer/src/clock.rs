//! Shared tick source: one periodic tokio task for the whole process.
//!
//! `acquire` starts it if it is not already running, `release` stops it.
//! The running flag is the join handle itself, so a second `acquire` can
//! never spawn a second loop.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

pub struct TickSource {
    period: Duration,
    handle: Option<JoinHandle<()>>,
    starts: u64,
}

impl TickSource {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
            starts: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// How many times the loop has been (re)started.
    pub fn start_count(&self) -> u64 {
        self.starts
    }

    /// Start ticking unless already running. Returns `true` if a loop was
    /// spawned. The first tick fires one period from now.
    pub fn acquire<F, Fut>(&mut self, on_tick: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                on_tick().await;
            }
        }));
        self.starts += 1;
        tracing::debug!("⏰ Tick source started ({}ms)", period.as_millis());
        true
    }

    /// Stop ticking. Returns `true` if a loop was running.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!("⏰ Tick source stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for TickSource {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
