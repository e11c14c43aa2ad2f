//! Local progress interpolation.
//!
//! Authoritative progress arrives coarsely, so between updates the runner
//! ticks a `ProgressSimulator` and feeds its increments into the session
//! machine, which applies the clamping rules.

use tokio::time::Instant;

/// Convert elapsed wall-clock time into a percentage-of-target increment.
pub fn increment_pct(elapsed_secs: f64, speed_multiplier: u32, target_seconds: f64) -> f64 {
    if target_seconds <= 0.0 || elapsed_secs <= 0.0 {
        return 0.0;
    }
    elapsed_secs * f64::from(speed_multiplier) / target_seconds * 100.0
}

/// Measures elapsed time between ticks.
#[derive(Debug)]
pub struct ProgressSimulator {
    speed_multiplier: u32,
    target_seconds: f64,
    last_tick: Instant,
}

impl ProgressSimulator {
    pub fn new(speed_multiplier: u32, target_seconds: f64) -> Self {
        Self {
            speed_multiplier: speed_multiplier.max(1),
            target_seconds,
            last_tick: Instant::now(),
        }
    }

    /// Percentage gained since the previous call (or since construction).
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        increment_pct(elapsed.as_secs_f64(), self.speed_multiplier, self.target_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_increment_math() {
        // 6s at 1x of a 600s quest is 1%
        assert!((increment_pct(6.0, 1, 600.0) - 1.0).abs() < 1e-9);
        assert!((increment_pct(6.0, 7, 600.0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_target_disables_math() {
        assert_eq!(increment_pct(10.0, 1, 0.0), 0.0);
        assert_eq!(increment_pct(-1.0, 1, 60.0), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_measures_elapsed_time() {
        let mut sim = ProgressSimulator::new(2, 100.0);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!((sim.tick() - 10.0).abs() < 1e-6);

        // Nothing elapsed since the previous tick
        assert_eq!(sim.tick(), 0.0);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!((sim.tick() - 1.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_floor_is_one() {
        let mut sim = ProgressSimulator::new(0, 100.0);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((sim.tick() - 1.0).abs() < 1e-6);
    }
}
