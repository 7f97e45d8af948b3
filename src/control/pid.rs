//! PID controller for one thermal direction.
//!
//! The plate runs two instances of this type, one tuned for heating and
//! one for cooling. An instance only integrates while enabled; disabling
//! it clears the integral so an idle mode never winds up.

use crate::config::PidGains;

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f32,
    prev_error: Option<f32>,
    output_min: f32,
    output_max: f32,
    enabled: bool,
}

impl PidController {
    pub fn new(gains: PidGains, output_min: f32, output_max: f32) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: None,
            output_min,
            output_max,
            enabled: false,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start integrating from a clean state.
    pub fn enable(&mut self) {
        if !self.enabled {
            self.reset();
            self.enabled = true;
        }
    }

    /// Stop integrating and drop accumulated state.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.reset();
    }

    /// Compute PID output for `error = setpoint - input`.
    ///
    /// Returns 0 while disabled.
    pub fn compute(&mut self, error: f32, dt: f32) -> f32 {
        if !self.enabled {
            return 0.0;
        }

        // Proportional
        let p = self.gains.kp * error;

        // Integral (with anti-windup)
        if dt > 0.0 {
            self.integral += error * dt;
        }
        let i = self.gains.ki * self.integral;

        // Derivative, zero on the first sample after enable
        let derivative = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };
        let d = self.gains.kd * derivative;

        self.prev_error = Some(error);

        let unclamped = p + i + d;
        let output = unclamped.clamp(self.output_min, self.output_max);

        // Anti-windup: if output is saturated, stop integrating
        if output != unclamped && dt > 0.0 {
            self.integral -= error * dt;
        }

        output
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }
}
