//! Hypotherm control core.
//!
//! Drives a thermoelectric plate that cools an anaesthetised mouse to a
//! hypothermic setpoint and holds it there: asymmetric heating/cooling
//! PID with mode arbitration, safety governor, output shaping, step
//! response autotuning, a Normal/Failsafe/Panic supervisor and a
//! post-boot output clamp.
//!
//! Everything hardware-facing goes through the port traits in
//! [`app::ports`]; the host simulator and the tests plug in the adapters
//! from [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod safety;
