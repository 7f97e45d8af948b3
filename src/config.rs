//! Controller configuration.
//!
//! [`ControlParameters`] are the user-tunable values persisted through
//! [`ConfigPort`] one field at a time. [`CoreConfig`] holds the timing and
//! design constants of the control core; it is not user-tunable at runtime.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{ConfigError, ConfigPort, EventSink};
use crate::error::Error;

/// Proportional, integral and derivative gains for one PID instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    /// Aggressive heating tunings.
    pub const HEATING_DEFAULT: Self = Self::new(2.0, 0.5, 1.0);
    /// Conservative cooling tunings: lower gain, more derivative damping.
    pub const COOLING_DEFAULT: Self = Self::new(1.0, 0.2, 2.0);

    pub fn is_all_zero(&self) -> bool {
        self.kp == 0.0 && self.ki == 0.0 && self.kd == 0.0
    }
}

/// Upper bound accepted for any single gain.
pub const MAX_GAIN: f32 = 100.0;

/// Tunable control parameters, owned by the control law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParameters {
    pub heating: PidGains,
    pub cooling: PidGains,
    /// Upper output bound in percent, `(0, 100]`.
    pub heating_limit: f32,
    /// Lower output bound in percent, `[-100, 0)`.
    pub cooling_limit: f32,
    /// Band around the setpoint (°C) in which the active mode is retained.
    pub deadband: f32,
    /// Minimum headroom below target (°C) tolerated while cooling.
    pub safety_margin: f32,
    /// Cooling rate (°C/s) above which the emergency stop latches.
    pub max_cooling_rate: f32,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            heating: PidGains::HEATING_DEFAULT,
            cooling: PidGains::COOLING_DEFAULT,
            heating_limit: 100.0,
            cooling_limit: -100.0,
            deadband: 0.5,
            safety_margin: 1.5,
            max_cooling_rate: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted fields
// ---------------------------------------------------------------------------

/// One individually persisted field of [`ControlParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParamField {
    HeatingKp,
    HeatingKi,
    HeatingKd,
    CoolingKp,
    CoolingKi,
    CoolingKd,
    HeatingLimit,
    CoolingLimit,
    Deadband,
    SafetyMargin,
    MaxCoolingRate,
}

impl ParamField {
    pub const ALL: [Self; 11] = [
        Self::HeatingKp,
        Self::HeatingKi,
        Self::HeatingKd,
        Self::CoolingKp,
        Self::CoolingKi,
        Self::CoolingKd,
        Self::HeatingLimit,
        Self::CoolingLimit,
        Self::Deadband,
        Self::SafetyMargin,
        Self::MaxCoolingRate,
    ];

    /// Storage key (kept short for flash key-length limits).
    pub const fn key(self) -> &'static str {
        match self {
            Self::HeatingKp => "h_kp",
            Self::HeatingKi => "h_ki",
            Self::HeatingKd => "h_kd",
            Self::CoolingKp => "c_kp",
            Self::CoolingKi => "c_ki",
            Self::CoolingKd => "c_kd",
            Self::HeatingLimit => "h_lim",
            Self::CoolingLimit => "c_lim",
            Self::Deadband => "dband",
            Self::SafetyMargin => "margin",
            Self::MaxCoolingRate => "max_rate",
        }
    }

    /// Inclusive valid range for a stored value.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Self::HeatingKp
            | Self::HeatingKi
            | Self::HeatingKd
            | Self::CoolingKp
            | Self::CoolingKi
            | Self::CoolingKd => (0.0, MAX_GAIN),
            Self::HeatingLimit => (1.0, 100.0),
            Self::CoolingLimit => (-100.0, -1.0),
            Self::Deadband => (0.0, 5.0),
            Self::SafetyMargin => (0.0, 10.0),
            Self::MaxCoolingRate => (0.05, 10.0),
        }
    }

    pub fn accepts(self, value: f32) -> bool {
        let (min, max) = self.range();
        value.is_finite() && (min..=max).contains(&value)
    }

    pub fn get(self, p: &ControlParameters) -> f32 {
        match self {
            Self::HeatingKp => p.heating.kp,
            Self::HeatingKi => p.heating.ki,
            Self::HeatingKd => p.heating.kd,
            Self::CoolingKp => p.cooling.kp,
            Self::CoolingKi => p.cooling.ki,
            Self::CoolingKd => p.cooling.kd,
            Self::HeatingLimit => p.heating_limit,
            Self::CoolingLimit => p.cooling_limit,
            Self::Deadband => p.deadband,
            Self::SafetyMargin => p.safety_margin,
            Self::MaxCoolingRate => p.max_cooling_rate,
        }
    }

    pub fn set(self, p: &mut ControlParameters, value: f32) {
        match self {
            Self::HeatingKp => p.heating.kp = value,
            Self::HeatingKi => p.heating.ki = value,
            Self::HeatingKd => p.heating.kd = value,
            Self::CoolingKp => p.cooling.kp = value,
            Self::CoolingKi => p.cooling.ki = value,
            Self::CoolingKd => p.cooling.kd = value,
            Self::HeatingLimit => p.heating_limit = value,
            Self::CoolingLimit => p.cooling_limit = value,
            Self::Deadband => p.deadband = value,
            Self::SafetyMargin => p.safety_margin = value,
            Self::MaxCoolingRate => p.max_cooling_rate = value,
        }
    }

    pub fn default_value(self) -> f32 {
        self.get(&ControlParameters::default())
    }
}

impl ControlParameters {
    /// Load every field from `store`, substituting and re-persisting safe
    /// defaults for anything missing, corrupt, out of range, or an
    /// all-zero gain triplet. Never fails.
    pub fn load(store: &mut impl ConfigPort, sink: &mut impl EventSink) -> Self {
        let mut params = Self::default();
        let mut repaired: heapless::Vec<ParamField, 11> = heapless::Vec::new();
        let mut missing: heapless::Vec<ParamField, 11> = heapless::Vec::new();

        for field in ParamField::ALL {
            match store.load_field(field) {
                Ok(value) if field.accepts(value) => field.set(&mut params, value),
                Ok(value) => {
                    warn!("config: {} = {} out of range, using default", field.key(), value);
                    let _ = repaired.push(field);
                }
                Err(ConfigError::NotFound) => {
                    let _ = missing.push(field);
                }
                Err(e) => {
                    warn!("config: {} unreadable ({}), using default", field.key(), e);
                    let _ = repaired.push(field);
                }
            }
        }

        if params.heating.is_all_zero() {
            warn!("config: heating gains all zero, using defaults");
            params.heating = PidGains::HEATING_DEFAULT;
            for f in [ParamField::HeatingKp, ParamField::HeatingKi, ParamField::HeatingKd] {
                let _ = repaired.push(f);
            }
        }
        if params.cooling.is_all_zero() {
            warn!("config: cooling gains all zero, using defaults");
            params.cooling = PidGains::COOLING_DEFAULT;
            for f in [ParamField::CoolingKp, ParamField::CoolingKi, ParamField::CoolingKd] {
                let _ = repaired.push(f);
            }
        }

        if !missing.is_empty() {
            info!("config: {} field(s) not stored yet, writing defaults", missing.len());
        }
        for field in missing.iter().chain(repaired.iter()) {
            if let Err(e) = store.save_field(*field, field.get(&params)) {
                warn!("config: failed to re-persist {}: {}", field.key(), e);
            }
        }
        for field in &repaired {
            sink.emit(&AppEvent::ConfigRepaired(*field));
        }

        params
    }

    /// Persist every field. Stops at the first storage failure.
    pub fn save(&self, store: &mut impl ConfigPort) -> Result<(), ConfigError> {
        for field in ParamField::ALL {
            store.save_field(field, field.get(self))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Core timing and design constants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    // --- Timing ---
    /// Control tick interval (milliseconds)
    pub tick_interval_ms: u32,
    /// Host heartbeat timeout (milliseconds); 0 disables supervision
    pub heartbeat_timeout_ms: u32,
    /// Telemetry emit interval (milliseconds)
    pub telemetry_interval_ms: u32,

    // --- Startup clamp ---
    /// Output ceiling applied right after boot (percent)
    pub startup_ceiling_percent: f32,
    /// How long the startup ceiling holds (milliseconds)
    pub startup_clamp_ms: u32,

    // --- Safety ---
    /// Absolute safe plate band (°C)
    pub safe_min_c: f32,
    pub safe_max_c: f32,
    /// Distance to target (°C) inside which cooling output is attenuated
    pub proximity_band_c: f32,

    // --- Shaping ---
    /// Exponential smoothing factor applied to the raw output
    pub smoothing_alpha: f32,

    // --- Autotune ---
    /// Default open-loop step (percent duty)
    pub autotune_step_percent: f32,
    /// Sampling interval (milliseconds)
    pub autotune_sample_interval_ms: u32,
    /// Run timeout (milliseconds)
    pub autotune_timeout_ms: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,        // 10 Hz
            heartbeat_timeout_ms: 5_000,
            telemetry_interval_ms: 1_000, // 1 Hz

            startup_ceiling_percent: 20.0,
            startup_clamp_ms: 60_000,

            safe_min_c: 10.0,
            safe_max_c: 45.0,
            proximity_band_c: 2.0,

            smoothing_alpha: 0.8,

            autotune_step_percent: 21.0,
            autotune_sample_interval_ms: 500,
            autotune_timeout_ms: 300_000,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(10..=1_000).contains(&self.tick_interval_ms) {
            return Err(Error::Config("tick_interval_ms must be 10-1000"));
        }
        if !(0.0..=100.0).contains(&self.startup_ceiling_percent) {
            return Err(Error::Config("startup_ceiling_percent must be 0-100"));
        }
        if self.safe_min_c >= self.safe_max_c {
            return Err(Error::Config("safe_min_c must be below safe_max_c"));
        }
        if !(0.0..1.0).contains(&self.smoothing_alpha) {
            return Err(Error::Config("smoothing_alpha must be in [0, 1)"));
        }
        if self.proximity_band_c <= 0.0 {
            return Err(Error::Config("proximity_band_c must be positive"));
        }
        if !(0.0..=100.0).contains(&self.autotune_step_percent) || self.autotune_step_percent == 0.0 {
            return Err(Error::Config("autotune_step_percent must be in (0, 100]"));
        }
        if self.autotune_sample_interval_ms == 0 || self.autotune_timeout_ms == 0 {
            return Err(Error::Config("autotune intervals must be non-zero"));
        }
        Ok(())
    }
}
