use std::time::Duration;
use std::time::Instant;

/// Wall-clock frame timer. Paused time is excluded from [`total_time`](Self::total_time).
#[derive(Clone, Debug)]
pub struct GameTimer {
    base: Instant,
    previous: Instant,
    stopped_at: Option<Instant>,
    paused: Duration,
    delta: Duration,
}

impl Default for GameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            base: now,
            previous: now,
            stopped_at: None,
            paused: Duration::ZERO,
            delta: Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn stop(&mut self) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    pub fn start(&mut self) {
        if let Some(stopped_at) = self.stopped_at.take() {
            let now = Instant::now();
            self.paused += now - stopped_at;
            self.previous = now;
        }
    }

    pub fn tick(&mut self) {
        if self.stopped_at.is_some() {
            self.delta = Duration::ZERO;
            return;
        }
        let now = Instant::now();
        self.delta = now.saturating_duration_since(self.previous);
        self.previous = now;
    }

    /// Step by a fixed amount instead of reading the clock.
    pub fn tick_fixed(&mut self, delta: Duration) {
        self.delta = delta;
        self.previous += delta;
    }

    pub fn delta_time(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn total_time(&self) -> f32 {
        let end = self.stopped_at.unwrap_or(self.previous);
        end.saturating_duration_since(self.base)
            .saturating_sub(self.paused)
            .as_secs_f32()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fixed_ticks_accumulate() {
        let mut timer = GameTimer::new();
        for _ in 0..4 {
            timer.tick_fixed(Duration::from_millis(250));
        }
        assert_relative_eq!(timer.delta_time(), 0.25);
        assert_relative_eq!(timer.total_time(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn stopped_timer_reports_no_delta() {
        let mut timer = GameTimer::new();
        timer.stop();
        timer.tick();
        assert_eq!(timer.delta_time(), 0.0);
        assert!(timer.is_stopped());
        timer.start();
        assert!(!timer.is_stopped());
    }
}
