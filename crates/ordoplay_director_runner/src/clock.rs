// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-step tick clock.

/// Most ticks run for one wall-clock frame before the backlog is dropped
pub const MAX_TICKS_PER_FRAME: u32 = 8;

/// Turns wall-clock frame time into fixed-length director ticks
#[derive(Debug, Clone)]
pub struct TickClock {
    tick_seconds: f64,
    accumulated: f64,
    /// Ticks handed out so far
    pub ticks: u64,
    /// Simulated seconds handed out so far
    pub elapsed: f64,
}

impl TickClock {
    pub fn new(tick_seconds: f32) -> Self {
        Self {
            tick_seconds: f64::from(tick_seconds),
            accumulated: 0.0,
            ticks: 0,
            elapsed: 0.0,
        }
    }

    /// Length of one tick in seconds
    pub fn tick_seconds(&self) -> f32 {
        self.tick_seconds as f32
    }

    /// Add a frame's worth of wall-clock time and return the number of
    /// ticks due
    pub fn advance(&mut self, frame_seconds: f64) -> u32 {
        self.accumulated += frame_seconds;

        let mut due = 0;
        while self.accumulated >= self.tick_seconds {
            self.accumulated -= self.tick_seconds;
            due += 1;

            if due >= MAX_TICKS_PER_FRAME {
                self.accumulated = 0.0;
                break;
            }
        }
        due
    }

    /// Record one tick as run
    pub fn tick(&mut self) {
        self.ticks += 1;
        self.elapsed += self.tick_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut clock = TickClock::new(0.25);
        assert_eq!(clock.advance(0.1), 0);
        assert_eq!(clock.advance(0.2), 1);
        assert_eq!(clock.advance(0.5), 2);
    }

    #[test]
    fn test_backlog_is_capped() {
        let mut clock = TickClock::new(0.01);
        assert_eq!(clock.advance(10.0), MAX_TICKS_PER_FRAME);
        assert_eq!(clock.advance(0.0), 0);
    }

    #[test]
    fn test_tick_counts_time() {
        let mut clock = TickClock::new(0.5);
        clock.tick();
        clock.tick();
        assert_eq!(clock.ticks, 2);
        assert!((clock.elapsed - 1.0).abs() < 1e-9);
    }
}
