extern crate nalgebra as na;

pub mod ais;
pub mod eps;
pub mod imu;
pub mod mission;
pub mod mode;
pub mod prelude;
