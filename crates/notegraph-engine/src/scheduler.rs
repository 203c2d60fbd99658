//! Tick scheduling abstraction.
//!
//! The engine never reads a clock itself; every `tick` receives a
//! millisecond timestamp from a [`TickSource`]. Real surfaces wrap their
//! frame callback, tests drive [`ManualTicks`] deterministically.

/// Supplies monotonic millisecond timestamps to the engine loop.
pub trait TickSource {
    fn now_ms(&mut self) -> u64;
}

/// Hand-advanced clock for headless use.
#[derive(Debug, Default)]
pub struct ManualTicks {
    now: u64,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: u64) -> Self {
        Self { now }
    }

    /// Move time forward and return the new timestamp.
    pub fn advance(&mut self, ms: u64) -> u64 {
        self.now += ms;
        self.now
    }
}

impl TickSource for ManualTicks {
    fn now_ms(&mut self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_ticks_advance() {
        let mut ticks = ManualTicks::starting_at(100);
        assert_eq!(ticks.now_ms(), 100);
        assert_eq!(ticks.advance(16), 116);
        assert_eq!(ticks.now_ms(), 116);
    }
}
