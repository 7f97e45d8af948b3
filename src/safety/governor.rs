//! Safety governor: per-tick guards on the plate temperature.
//!
//! Guards run in a fixed order, and the first one to fire wins:
//!
//! 1. **Rate**: `temperature_rate < -max_cooling_rate`
//! 2. **Margin**: cooling and `input ≤ setpoint - safety_margin`
//! 3. **Range**: `input` outside the absolute safe band (NaN included)
//!
//! A trip is latched by the caller into `ControllerState::emergency_stop`.
//! The governor itself holds no state beyond its configuration.

use crate::config::{ControlParameters, CoreConfig};
use crate::control::ControllerState;
use crate::error::SafetyTrip;

#[derive(Debug, Clone)]
pub struct SafetyGovernor {
    safe_min_c: f32,
    safe_max_c: f32,
    proximity_band_c: f32,
}

impl SafetyGovernor {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            safe_min_c: config.safe_min_c,
            safe_max_c: config.safe_max_c,
            proximity_band_c: config.proximity_band_c,
        }
    }

    /// Closed-loop guards: rate, then margin, then range.
    pub fn evaluate(&self, state: &ControllerState, params: &ControlParameters) -> Option<SafetyTrip> {
        self.check_rate(state.temperature_rate, params)
            .or_else(|| {
                self.check_margin(state.input, state.setpoint, state.cooling_mode, params)
            })
            .or_else(|| self.check_range(state.input))
    }

    /// Guards that still apply while autotune drives the plate open-loop.
    pub fn evaluate_open_loop(
        &self,
        state: &ControllerState,
        params: &ControlParameters,
    ) -> Option<SafetyTrip> {
        self.check_rate(state.temperature_rate, params)
            .or_else(|| self.check_range(state.input))
    }

    pub fn check_rate(&self, rate: f32, params: &ControlParameters) -> Option<SafetyTrip> {
        (rate < -params.max_cooling_rate).then_some(SafetyTrip::RateExceeded {
            rate,
            limit: params.max_cooling_rate,
        })
    }

    pub fn check_margin(
        &self,
        input: f32,
        setpoint: f32,
        cooling: bool,
        params: &ControlParameters,
    ) -> Option<SafetyTrip> {
        let floor = setpoint - params.safety_margin;
        (cooling && input <= floor).then_some(SafetyTrip::BelowSafetyMargin { input, floor })
    }

    pub fn check_range(&self, input: f32) -> Option<SafetyTrip> {
        (!(self.safe_min_c..=self.safe_max_c).contains(&input))
            .then_some(SafetyTrip::OutOfRange { input })
    }

    /// Scale cooling output linearly toward zero inside the proximity band.
    /// Heating output passes through unchanged.
    pub fn attenuate(&self, raw: f32, input: f32, setpoint: f32, cooling: bool) -> f32 {
        if !cooling {
            return raw;
        }
        let distance = input - setpoint;
        if distance >= self.proximity_band_c {
            return raw;
        }
        raw * (distance / self.proximity_band_c).clamp(0.0, 1.0)
    }
}
