use crate::units::Time;
use std::time::{Duration, Instant};

/// Bookkeeping for the control loop, handed to every component as part of
/// its environment.
#[derive(Debug, Clone)]
pub struct FlightInfo {
    pub cycle: u64,
    pub relative_time: Time,
    pub real_time_start: Instant,
    pub real_time: Duration,
}

impl Default for FlightInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightInfo {
    pub fn new() -> Self {
        FlightInfo {
            cycle: 0,
            relative_time: Time::from_secs(0.0),
            real_time_start: Instant::now(),
            real_time: Duration::ZERO,
        }
    }

    pub fn step(&mut self, dt: Time) {
        self.cycle += 1;
        self.relative_time += dt;
        self.real_time = Instant::now().duration_since(self.real_time_start);
    }
}
