// Polling waits with optional timeout and cancellation
//
// Every wait in this crate is a loop on the calling thread: evaluate a
// condition, sleep for a short interval, repeat. `Wait` bounds that loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::POLL_INTERVAL;
use crate::error::Result;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Met,
    TimedOut,
    Cancelled,
}

impl WaitOutcome {
    pub fn is_met(self) -> bool {
        self == WaitOutcome::Met
    }
}

/// Shared flag that stops a running wait from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct Wait {
    interval: Duration,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl Default for Wait {
    fn default() -> Self {
        Self::forever()
    }
}

impl Wait {
    /// No timeout, no cancellation
    pub fn forever() -> Self {
        Self {
            interval: POLL_INTERVAL,
            timeout: None,
            cancel: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Poll `condition` until it holds, the timeout passes or the token is cancelled.
    ///
    /// The condition is checked before anything else, so one that already
    /// holds returns `Met` even with a zero timeout. Errors from the
    /// condition end the wait immediately.
    pub fn poll_until<F>(&self, mut condition: F) -> Result<WaitOutcome>
    where
        F: FnMut() -> Result<bool>,
    {
        let started = Instant::now();
        loop {
            if condition()? {
                return Ok(WaitOutcome::Met);
            }
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Ok(WaitOutcome::Cancelled);
            }
            if self.timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
                return Ok(WaitOutcome::TimedOut);
            }
            thread::sleep(self.interval);
        }
    }
}
