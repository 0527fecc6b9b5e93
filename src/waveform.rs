use rand::Rng;
use serde::Serialize;

pub const WINDOW_SECONDS: f64 = 15.0;
pub const NOISE_BOUND: f64 = 5.0;
pub const METRIC_NAME: &str = "studentx_sine_metric";
const METRIC_HELP: &str = "A smooth sine-wave metric with noise";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    pub value: f64,
    /// Start of the window the sample belongs to, not the sampling instant.
    pub timestamp_ms: i64,
}

impl MetricSample {
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# HELP {METRIC_NAME} {METRIC_HELP}\n"));
        output.push_str(&format!("# TYPE {METRIC_NAME} gauge\n"));
        output.push_str(&format!(
            "{METRIC_NAME} {} {}\n",
            self.value, self.timestamp_ms
        ));
        output
    }
}

fn window_index(now: f64) -> i64 {
    (now / WINDOW_SECONDS).floor() as i64
}

/// Noise-free sine value in `[0, 100]` for the window containing `now`.
pub fn base_value(now: f64) -> f64 {
    let x = window_index(now) as f64 / 10.0;
    x.sin() * 50.0 + 50.0
}

pub fn sample(now: f64) -> MetricSample {
    let noise = rand::thread_rng().gen_range(-NOISE_BOUND..=NOISE_BOUND);
    sample_with_noise(now, noise)
}

pub fn sample_with_noise(now: f64, noise: f64) -> MetricSample {
    let t = window_index(now);
    let value = round2(base_value(now) + noise);
    MetricSample {
        value,
        timestamp_ms: t * (WINDOW_SECONDS as i64) * 1_000,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_window_start() {
        let sample = sample_with_noise(31.9, 0.0);
        assert_eq!(sample.timestamp_ms, 30_000);
        let sample = sample_with_noise(1_700_000_007.0, 0.0);
        assert_eq!(sample.timestamp_ms, 113_333_333 * 15_000);
    }

    #[test]
    fn zero_noise_matches_base_rounded() {
        // window 157 -> x = 15.7
        let now = 157.0 * 15.0 + 3.0;
        let expected = ((15.7f64.sin() * 50.0 + 50.0) * 100.0).round() / 100.0;
        assert_eq!(sample_with_noise(now, 0.0).value, expected);
    }

    #[test]
    fn samples_in_same_window_stay_near_base() {
        let now = 1_700_000_000.0;
        let base = base_value(now);
        for _ in 0..200 {
            let s = sample(now);
            assert!((s.value - base).abs() <= NOISE_BOUND + 0.01);
            assert!(s.value >= -NOISE_BOUND - 0.01 && s.value <= 100.0 + NOISE_BOUND + 0.01);
        }
        assert_eq!(sample(now).timestamp_ms, sample(now + 0.5).timestamp_ms);
    }

    #[test]
    fn value_has_two_decimals() {
        let s = sample_with_noise(0.0, 1.23456);
        assert_eq!(s.value, 51.23);
    }

    #[test]
    fn exposition_has_help_type_and_sample() {
        let text = sample_with_noise(15.0, 0.0).to_prometheus();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "# HELP studentx_sine_metric A smooth sine-wave metric with noise"
        );
        assert_eq!(lines[1], "# TYPE studentx_sine_metric gauge");
        assert!(lines[2].starts_with("studentx_sine_metric "));
        assert!(lines[2].ends_with(" 15000"));
        assert!(text.ends_with('\n'));
    }
}
