//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, stream to the host,
//! record in a test.

use serde::Serialize;

use crate::config::{ControlParameters, ParamField, PidGains};
use crate::control::autotune::AutotuneStatus;
use crate::control::{ControllerState, Mode, OutputLimits};
use crate::error::{AutotuneError, CommandError, SafetyTrip};
use crate::safety::supervisor::ReasonText;
use crate::safety::{FailsafeReason, SupervisorMode};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service finished booting with the loaded parameters.
    Started,

    /// Periodic status snapshot.
    Telemetry(StatusSnapshot),

    /// A safety guard (or the host) latched the emergency stop.
    SafetyTrip(SafetyTrip),

    /// The emergency stop latch was cleared by the host.
    EmergencyStopCleared,

    /// The safety supervisor changed mode.
    SupervisorChanged {
        from: SupervisorMode,
        to: SupervisorMode,
    },

    /// Autotune finished and the gains were adopted for `mode`.
    /// `fallback` is set when the defaults were used instead of a fit.
    AutotuneFinished {
        mode: Mode,
        gains: PidGains,
        fallback: Option<AutotuneError>,
    },

    /// Autotune stopped without adopting gains.
    AutotuneAborted(AutotuneError),

    /// Entering Failsafe or Panic cancelled the running profile.
    ProfileCancelled,

    /// A host command failed validation; nothing changed.
    CommandRejected(CommandError),

    /// A stored parameter was missing its valid value and was reset.
    ConfigRepaired(ParamField),

    /// Dirty parameters were written to storage.
    ConfigSaved,

    /// The post-boot output ceiling was lifted.
    StartupClampReleased,
}

/// A point-in-time status snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub uptime_ms: u64,
    pub supervisor: SupervisorMode,
    pub failsafe_reason: Option<FailsafeReason>,
    pub panic_reason: Option<ReasonText>,
    pub breath_check_enabled: bool,
    pub controller: ControllerState,
    pub mode: Mode,
    pub params: ControlParameters,
    pub effective_limits: OutputLimits,
    pub startup_clamp_active: bool,
    pub autotune: AutotuneStatus,
    pub autotune_samples: usize,
    /// Percent actually written to the actuator on the last tick.
    pub applied_output: f32,
}
