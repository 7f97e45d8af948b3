//! Safety layer.
//!
//! Two independent mechanisms stop actuation:
//!
//! - [`supervisor`]: the Normal / Failsafe / Panic state machine driven
//!   by external triggers (host heartbeat, breathing, manual). It runs
//!   first on every tick and overrides everything below it.
//! - [`governor`]: per-tick guards on the plate temperature (rate,
//!   margin, range) that latch the controller's emergency stop.

pub mod governor;
pub mod supervisor;

pub use governor::SafetyGovernor;
pub use supervisor::{FailsafeReason, SafetySupervisor, SupervisorMode, Transition};
