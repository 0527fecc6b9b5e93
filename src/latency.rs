use std::time::Duration;

use rand::Rng;

/// Inclusive bounds of a simulated stage delay. `min == max` is a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyWindow {
    pub min: Duration,
    pub max: Duration,
}

impl LatencyWindow {
    pub const fn fixed_ms(ms: u64) -> Self {
        Self {
            min: Duration::from_millis(ms),
            max: Duration::from_millis(ms),
        }
    }

    pub const fn uniform_ms(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn pick(&self, rng: &mut impl Rng) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let nanos = rng.gen_range(self.min.as_nanos() as u64..=self.max.as_nanos() as u64);
        Duration::from_nanos(nanos)
    }
}

pub trait LatencySource: Send + Sync {
    /// Blocks the calling thread for a duration drawn from `window`.
    fn simulate(&self, window: LatencyWindow) -> Duration;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SleepLatency;

impl LatencySource for SleepLatency {
    fn simulate(&self, window: LatencyWindow) -> Duration {
        let delay = window.pick(&mut rand::thread_rng());
        std::thread::sleep(delay);
        delay
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoLatency;

impl LatencySource for NoLatency {
    fn simulate(&self, _window: LatencyWindow) -> Duration {
        Duration::ZERO
    }
}
