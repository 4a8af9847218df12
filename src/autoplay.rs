//! Repeating "next move" timer, driven by the host's event loop.
//!
//! The driver owns no thread. The host calls [`Autoplay::poll`] with the
//! current time and advances one move whenever it returns true.

use std::time::{Duration, Instant};

use crate::log;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(700);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayState {
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Autoplay {
    interval: Duration,
    /// Set while running.
    next_tick: Option<Instant>,
}

impl Default for Autoplay {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Autoplay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> AutoplayState {
        if self.next_tick.is_some() {
            AutoplayState::Running
        } else {
            AutoplayState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Flips between running and stopped and returns the new state.
    /// Stopping cancels every pending tick.
    pub fn toggle(&mut self, now: Instant) -> AutoplayState {
        if self.is_running() {
            self.stop();
        } else {
            self.start(now);
        }
        self.state()
    }

    pub fn start(&mut self, now: Instant) {
        if self.next_tick.is_none() {
            log::info(format!("autoplay started ({} ms)", self.interval.as_millis()));
            self.next_tick = Some(now + self.interval);
        }
    }

    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            log::info("autoplay stopped");
        }
    }

    /// True when a tick is due at `now`. At most one tick is reported per
    /// call; a host that fell behind resumes one interval after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_tick else {
            return false;
        };
        if now < due {
            return false;
        }
        let following = due + self.interval;
        self.next_tick = Some(if following > now {
            following
        } else {
            now + self.interval
        });
        true
    }
}
