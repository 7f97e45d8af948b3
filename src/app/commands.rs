//! Inbound commands to the application service.
//!
//! These represent host requests and supervisor triggers that the
//! [`AppService`](super::service::AppService) interprets at a tick
//! boundary. Parsing them off the wire is the host link's job.

use crate::config::{ControlParameters, MAX_GAIN, ParamField, PidGains};
use crate::control::Mode;
use crate::error::CommandError;
use crate::safety::supervisor::ReasonText;

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    // ── Host control ──────────────────────────────────────────
    Start,
    Stop,
    SetTargetTemp(f32),
    SetHeatingPid(PidGains),
    SetCoolingPid(PidGains),
    SetOutputLimits { cooling: f32, heating: f32 },
    SetSafetyParams { deadband: f32, margin: f32 },
    SetCoolingRateLimit(f32),
    /// `true` latches the emergency stop, `false` clears it.
    SetEmergencyStop(bool),
    /// `step_percent = None` uses the configured default step.
    StartAutotune {
        step_percent: Option<f32>,
        direction: Mode,
        target_delta: f32,
    },
    AbortAutotune,

    // ── Supervisor triggers ───────────────────────────────────
    TriggerFailsafe(ReasonText),
    ClearFailsafe,
    TriggerPanic(ReasonText),
    ClearPanic,
    HeartbeatReceived,
    SetBreathCheckEnabled(bool),
    /// Breath-rate estimator reports that breathing stopped.
    BreathStopped,
}

/// Largest autotune swing accepted as a stop condition (°C).
const MAX_AUTOTUNE_DELTA: f32 = 20.0;

pub(crate) fn validate_target(value: f32, min: f32, max: f32) -> Result<f32, CommandError> {
    if !value.is_finite() {
        return Err(CommandError::TargetTemperature("must be a finite number"));
    }
    if !(min..=max).contains(&value) {
        return Err(CommandError::TargetTemperature("outside the safe plate band"));
    }
    Ok(value)
}

pub(crate) fn validate_gains(gains: PidGains) -> Result<PidGains, CommandError> {
    for g in [gains.kp, gains.ki, gains.kd] {
        if !g.is_finite() {
            return Err(CommandError::Gains("gains must be finite"));
        }
        if !(0.0..=MAX_GAIN).contains(&g) {
            return Err(CommandError::Gains("gains must be within 0-100"));
        }
    }
    if gains.is_all_zero() {
        return Err(CommandError::Gains("at least one gain must be non-zero"));
    }
    Ok(gains)
}

/// Returns the limits with magnitudes clamped to 100 %.
pub(crate) fn validate_limits(cooling: f32, heating: f32) -> Result<(f32, f32), CommandError> {
    if !cooling.is_finite() || !heating.is_finite() {
        return Err(CommandError::OutputLimits("limits must be finite"));
    }
    if cooling >= 0.0 {
        return Err(CommandError::OutputLimits("cooling limit must be negative"));
    }
    if heating <= 0.0 {
        return Err(CommandError::OutputLimits("heating limit must be positive"));
    }
    let (cooling, heating) = (cooling.max(-100.0), heating.min(100.0));
    if !ParamField::CoolingLimit.accepts(cooling) || !ParamField::HeatingLimit.accepts(heating) {
        return Err(CommandError::OutputLimits("limit magnitude must be at least 1 percent"));
    }
    Ok((cooling, heating))
}

pub(crate) fn validate_safety(deadband: f32, margin: f32) -> Result<(f32, f32), CommandError> {
    if !ParamField::Deadband.accepts(deadband) {
        return Err(CommandError::SafetyParams("deadband must be within 0-5 C"));
    }
    if !ParamField::SafetyMargin.accepts(margin) {
        return Err(CommandError::SafetyParams("safety margin must be within 0-10 C"));
    }
    Ok((deadband, margin))
}

pub(crate) fn validate_cooling_rate(rate: f32) -> Result<f32, CommandError> {
    if !ParamField::MaxCoolingRate.accepts(rate) {
        return Err(CommandError::CoolingRate("must be within 0.05-10 C/s"));
    }
    Ok(rate)
}

pub(crate) fn validate_autotune(step: f32, target_delta: f32) -> Result<(f32, f32), CommandError> {
    if !step.is_finite() || step <= 0.0 || step > 100.0 {
        return Err(CommandError::Autotune("step must be within (0, 100] percent"));
    }
    if !target_delta.is_finite() || target_delta <= 0.0 || target_delta > MAX_AUTOTUNE_DELTA {
        return Err(CommandError::Autotune("target delta must be within (0, 20] C"));
    }
    Ok((step, target_delta))
}

/// Apply validated limits to a copy of `params`.
pub(crate) fn with_limits(mut params: ControlParameters, cooling: f32, heating: f32) -> ControlParameters {
    params.cooling_limit = cooling;
    params.heating_limit = heating;
    params
}
