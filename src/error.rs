//! Unified error types for the Hypotherm control core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level handling uniform. All variants are `Copy` so they can be
//! passed through the supervisor and event sink without allocation.
//!
//! Nothing in the tick path returns these to the caller: safety trips and
//! autotune failures are converted into zero-output states and surfaced
//! as [`AppEvent`](crate::app::events::AppEvent)s.

use core::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A latched safety guard tripped.
    Safety(SafetyTrip),
    /// A host command carried an invalid parameter.
    Command(CommandError),
    /// An autotune run ended without adopting computed gains.
    Autotune(AutotuneError),
    /// Configuration could not be loaded or stored.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Autotune(e) => write!(f, "autotune: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Safety trips
// ---------------------------------------------------------------------------

/// Reasons the safety governor latches the emergency stop.
///
/// A trip forces zero output on the tick it is detected and stays latched
/// until an explicit `SetEmergencyStop(false)` command clears it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SafetyTrip {
    /// Plate temperature fell faster than `max_cooling_rate` (°C/s).
    RateExceeded { rate: f32, limit: f32 },
    /// Cooling drove the plate below `setpoint - safety_margin`.
    BelowSafetyMargin { input: f32, floor: f32 },
    /// Plate temperature left the absolute safe band.
    OutOfRange { input: f32 },
    /// Host requested the stop.
    Manual,
}

impl fmt::Display for SafetyTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateExceeded { rate, limit } => {
                write!(f, "cooling rate {rate:.2} C/s exceeds -{limit:.2} C/s")
            }
            Self::BelowSafetyMargin { input, floor } => {
                write!(f, "temperature {input:.2} C below safety floor {floor:.2} C")
            }
            Self::OutOfRange { input } => write!(f, "temperature {input:.2} C outside safe band"),
            Self::Manual => write!(f, "manual emergency stop"),
        }
    }
}

impl core::error::Error for SafetyTrip {}

impl From<SafetyTrip> for Error {
    fn from(e: SafetyTrip) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// A host command was rejected. No state was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandError {
    TargetTemperature(&'static str),
    Gains(&'static str),
    OutputLimits(&'static str),
    SafetyParams(&'static str),
    CoolingRate(&'static str),
    Autotune(&'static str),
    /// The command is not allowed while the supervisor is not Normal.
    SupervisorLocked,
    /// The command inbox is full.
    InboxFull,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetTemperature(msg) => write!(f, "target temperature: {msg}"),
            Self::Gains(msg) => write!(f, "PID gains: {msg}"),
            Self::OutputLimits(msg) => write!(f, "output limits: {msg}"),
            Self::SafetyParams(msg) => write!(f, "safety params: {msg}"),
            Self::CoolingRate(msg) => write!(f, "cooling rate limit: {msg}"),
            Self::Autotune(msg) => write!(f, "autotune: {msg}"),
            Self::SupervisorLocked => write!(f, "rejected while failsafe or panic is active"),
            Self::InboxFull => write!(f, "command inbox full"),
        }
    }
}

impl core::error::Error for CommandError {}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Autotune errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutotuneError {
    /// The run exceeded its time budget.
    Timeout,
    /// Cancelled by the host or by the supervisor.
    Cancelled,
    /// A safety guard tripped during the experiment.
    SafetyTrip,
    /// Too few samples were collected to analyse the step response.
    InsufficientData,
    /// The plate did not respond measurably to the step.
    NoResponse,
}

impl fmt::Display for AutotuneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::SafetyTrip => write!(f, "aborted by safety trip"),
            Self::InsufficientData => write!(f, "insufficient data"),
            Self::NoResponse => write!(f, "no measurable temperature change"),
        }
    }
}

impl core::error::Error for AutotuneError {}

impl From<AutotuneError> for Error {
    fn from(e: AutotuneError) -> Self {
        Self::Autotune(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
