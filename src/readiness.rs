use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use once_cell::sync::Lazy;

pub const DEFAULT_WARM_UP_SECONDS: f64 = 20.0;

/// Wall-clock seconds since the Unix epoch.
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Timestamp captured once, the first time the clock is touched.
#[derive(Debug, Clone, Copy)]
pub struct ProcessClock {
    started_at: f64,
}

impl ProcessClock {
    pub fn global() -> &'static ProcessClock {
        static INSTANCE: Lazy<ProcessClock> = Lazy::new(|| ProcessClock {
            started_at: now_seconds(),
        });
        &INSTANCE
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn uptime(&self, now: f64) -> f64 {
        now - self.started_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready,
    NotReady { elapsed: f64 },
}

impl Readiness {
    pub fn message(&self) -> String {
        match self {
            Readiness::Ready => "ready".to_string(),
            Readiness::NotReady { elapsed } => format!("not ready ({elapsed})"),
        }
    }
}

/// Reports ready once `threshold` seconds have passed since `started_at`.
/// Once ready, stays ready even if the wall clock steps backwards.
#[derive(Debug)]
pub struct ReadinessGate {
    started_at: f64,
    threshold: f64,
    latched: AtomicBool,
}

impl ReadinessGate {
    pub fn new(started_at: f64, threshold: f64) -> Self {
        Self {
            started_at,
            threshold,
            latched: AtomicBool::new(false),
        }
    }

    pub fn from_clock(clock: &ProcessClock, threshold: f64) -> Self {
        Self::new(clock.started_at(), threshold)
    }

    pub fn is_ready(&self, now: f64) -> bool {
        matches!(self.check(now), Readiness::Ready)
    }

    pub fn check(&self, now: f64) -> Readiness {
        if self.latched.load(Ordering::Acquire) {
            return Readiness::Ready;
        }
        let elapsed = now - self.started_at;
        if elapsed >= self.threshold {
            self.latched.store(true, Ordering::Release);
            Readiness::Ready
        } else {
            Readiness::NotReady { elapsed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_before_threshold() {
        let gate = ReadinessGate::new(1_000.0, 20.0);
        assert_eq!(gate.check(1_005.5), Readiness::NotReady { elapsed: 5.5 });
        assert_eq!(gate.check(1_005.5).message(), "not ready (5.5)");
        assert!(!gate.is_ready(1_019.99));
    }

    #[test]
    fn ready_at_threshold_and_stays_ready() {
        let gate = ReadinessGate::new(1_000.0, 20.0);
        assert!(gate.is_ready(1_020.0));
        assert!(gate.is_ready(1_001.0));
        assert_eq!(gate.check(999.0).message(), "ready");
    }

    #[test]
    fn global_clock_is_captured_once() {
        let first = ProcessClock::global().started_at();
        let second = ProcessClock::global().started_at();
        assert_eq!(first, second);
        assert!(ProcessClock::global().uptime(now_seconds()) >= 0.0);
    }
}
