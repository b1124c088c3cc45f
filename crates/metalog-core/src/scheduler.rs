use serde::Serialize;
use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshTrigger {
    Startup,
    Timer,
    Manual,
}

impl RefreshTrigger {
    pub fn label(self) -> &'static str {
        match self {
            RefreshTrigger::Startup => "startup",
            RefreshTrigger::Timer => "timer",
            RefreshTrigger::Manual => "manual",
        }
    }
}

/// Decides when the next refresh cascade is due. Pure bookkeeping over
/// `Instant`s; the event loop owns the actual sleeping.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    period: Duration,
    last_refresh: Option<Instant>,
    manual_pending: bool,
    completed: u64,
}

impl RefreshScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            last_refresh: None,
            manual_pending: false,
            completed: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn request_manual(&mut self) {
        self.manual_pending = true;
    }

    /// The trigger that should run now, if any. Manual requests win over the
    /// timer so the report names what the operator asked for.
    pub fn due(&self, now: Instant) -> Option<RefreshTrigger> {
        let Some(last) = self.last_refresh else {
            return Some(RefreshTrigger::Startup);
        };
        if self.manual_pending {
            return Some(RefreshTrigger::Manual);
        }
        if now.saturating_duration_since(last) >= self.period {
            return Some(RefreshTrigger::Timer);
        }
        None
    }

    /// Every completed refresh restarts the period.
    pub fn complete(&mut self, now: Instant) {
        self.last_refresh = Some(now);
        self.manual_pending = false;
        self.completed += 1;
    }

    pub fn next_deadline(&self, now: Instant) -> Instant {
        match self.last_refresh {
            Some(_) if self.manual_pending => now,
            Some(last) => last + self.period,
            None => now,
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_PERIOD)
    }
}
