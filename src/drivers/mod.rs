//! Actuator drivers.

pub mod peltier;
