//! Control law for the thermoelectric plate.
//!
//! ```text
//!  input ─▶ rate/margin/range guards ─▶ ModeArbiter ─▶ PID (heat | cool)
//!                                                          │
//!  actuator ◀── OutputShaper ◀── proximity attenuation ◀───┘
//! ```
//!
//! The safety supervisor runs before any of this (see
//! [`AppService::tick`](crate::app::service::AppService::tick)).

pub mod arbiter;
pub mod autotune;
pub mod controller;
pub mod limits;
pub mod pid;
pub mod shaper;

pub use arbiter::Mode;
pub use controller::{ControllerState, TemperatureController, TickOutcome};
pub use limits::{OutputLimits, StartupClamp};
