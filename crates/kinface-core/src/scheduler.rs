//! One-shot delayed capture trigger.
//!
//! The scheduler holds no timer of its own. It records a deadline, and the
//! event loop that owns the session queues an expiry at that deadline next to
//! frame events, so capture and frames stay totally ordered.

use std::time::{Duration, Instant};

/// Delay between pressing "train" and the capture being armed.
pub const DEFAULT_CAPTURE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct CaptureScheduler {
    delay: Duration,
    deadline: Option<Instant>,
    armed: bool,
}

impl Default for CaptureScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_DELAY)
    }
}

impl CaptureScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            armed: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Start the countdown. Arming while a countdown is pending restarts it.
    pub fn arm(&mut self, now: Instant) -> Instant {
        let deadline = now + self.delay;
        if self.deadline.replace(deadline).is_some() {
            tracing::debug!("capture countdown restarted");
        }
        deadline
    }

    /// Fire the countdown if it has expired. Returns true exactly once per
    /// expiry.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.armed = true;
                true
            }
            _ => false,
        }
    }

    /// Pending expiry, if a countdown is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True only while the countdown is running.
    pub fn in_progress(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once the countdown has expired and no sample has been taken yet.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Clear the armed flag after one sample has been taken.
    pub fn consume(&mut self) {
        self.armed = false;
    }
}
