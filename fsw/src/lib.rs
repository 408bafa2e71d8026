pub extern crate nalgebra as na;

pub mod adcs;
pub mod cdh;
pub mod channel;
pub mod flight_info;
pub mod interfaces;
pub mod payload;
pub mod scenario;
pub mod system;
pub mod units;

pub trait FlightComponent<'a> {
    /// The type for state that is shared between multiple components; e.g. the board peripherals.
    type SharedState;

    /// The type for the environment structure that is scoped to this component.
    type Environment;

    fn init(&mut self, _env: &'a Self::Environment, _shared_state: &mut Self::SharedState) {}

    fn reset(&mut self, _env: &'a Self::Environment, _shared_state: &mut Self::SharedState) {}

    fn step(
        &mut self,
        dt: units::Time,
        env: &'a Self::Environment,
        shared_state: &mut Self::SharedState,
    );
}
