//! A lightweight uom-ish set of the quantities the flight software deals in.

use std::ops::{Add, AddAssign};
use std::time::Duration;

use serde::Serialize;

#[derive(Copy, Clone, PartialEq, PartialOrd, Default, Serialize)]
pub struct Time {
    seconds: f64,
}

impl std::fmt::Debug for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} s", self.seconds)
    }
}

impl Time {
    pub fn from_secs(seconds: f64) -> Time {
        Time { seconds }
    }

    pub fn from_duration(duration: Duration) -> Time {
        Time {
            seconds: duration.as_secs_f64(),
        }
    }

    pub fn as_secs(&self) -> f64 {
        self.seconds
    }
}

impl Add<Time> for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Self::Output {
        Time::from_secs(self.as_secs() + rhs.as_secs())
    }
}

impl AddAssign<Time> for Time {
    fn add_assign(&mut self, rhs: Time) {
        self.seconds += rhs.as_secs()
    }
}

#[derive(Copy, Clone, PartialEq, PartialOrd, Default, Serialize)]
pub struct Angle {
    degrees: f64,
}

impl std::fmt::Debug for Angle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees)
    }
}

impl Angle {
    pub fn from_degrees(degrees: f64) -> Angle {
        Angle { degrees }
    }

    pub fn from_radians(radians: f64) -> Angle {
        Angle {
            degrees: radians.to_degrees(),
        }
    }

    pub fn as_degrees(&self) -> f64 {
        self.degrees
    }

    /// Wrap into [0, 360)
    pub fn normalized(&self) -> Angle {
        let d = self.degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        Angle::from_degrees(if d >= 360.0 { 0.0 } else { d })
    }
}

#[derive(Copy, Clone, PartialEq, PartialOrd, Default, Serialize)]
pub struct AngularVelocity {
    radians_per_second: f64,
}

impl std::fmt::Debug for AngularVelocity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rad/s", self.radians_per_second)
    }
}

impl AngularVelocity {
    pub fn from_radians_per_second(radians_per_second: f64) -> AngularVelocity {
        AngularVelocity { radians_per_second }
    }

    pub fn as_radians_per_second(&self) -> f64 {
        self.radians_per_second
    }
}

impl Add<AngularVelocity> for AngularVelocity {
    type Output = AngularVelocity;

    fn add(self, rhs: AngularVelocity) -> Self::Output {
        AngularVelocity::from_radians_per_second(
            self.as_radians_per_second() + rhs.as_radians_per_second(),
        )
    }
}
