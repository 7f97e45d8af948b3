//! Heating/cooling mode arbitration with deadband hysteresis.
//!
//! Owns both PID instances. Exactly one of them is enabled while the
//! controller is armed; the other is disabled and holds no integral.

use serde::Serialize;

use super::limits::OutputLimits;
use super::pid::PidController;
use crate::config::{ControlParameters, PidGains};

/// Which PID instance drives the plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Heating,
    Cooling,
}

impl Mode {
    pub fn is_cooling(self) -> bool {
        matches!(self, Self::Cooling)
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Heating => write!(f, "heating"),
            Self::Cooling => write!(f, "cooling"),
        }
    }
}

pub struct ModeArbiter {
    mode: Mode,
    armed: bool,
    heating: PidController,
    cooling: PidController,
}

impl ModeArbiter {
    pub fn new(params: &ControlParameters) -> Self {
        Self {
            mode: Mode::Heating,
            armed: false,
            heating: PidController::new(params.heating, 0.0, params.heating_limit),
            cooling: PidController::new(params.cooling, params.cooling_limit, 0.0),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn gains(&self, mode: Mode) -> PidGains {
        self.pid(mode).gains()
    }

    pub fn set_gains(&mut self, mode: Mode, gains: PidGains) {
        self.pid_mut(mode).set_gains(gains);
    }

    /// Apply output bounds: heating in `[0, heat]`, cooling in `[cool, 0]`.
    pub fn set_limits(&mut self, limits: OutputLimits) {
        self.heating.set_limits(0.0, limits.heating);
        self.cooling.set_limits(limits.cooling, 0.0);
    }

    /// Enable the PID for the current mode.
    pub fn arm(&mut self) {
        self.armed = true;
        self.pid_mut(self.mode).enable();
    }

    /// Disable both instances.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.heating.disable();
        self.cooling.disable();
    }

    /// Select the mode for `error = setpoint - input`.
    ///
    /// Returns `true` if the mode switched.
    pub fn select(&mut self, error: f32, deadband: f32) -> bool {
        let next = if error < -deadband {
            Mode::Cooling
        } else if error > deadband {
            Mode::Heating
        } else {
            return false;
        };
        if next == self.mode {
            return false;
        }

        self.pid_mut(self.mode).disable();
        self.mode = next;
        if self.armed {
            // Re-enable from a clean state with this mode's tunings.
            self.pid_mut(next).enable();
        }
        true
    }

    /// Run both instances; the disabled one yields 0.
    /// Returns `(heating_output, cooling_output)`.
    pub fn compute(&mut self, error: f32, dt: f32) -> (f32, f32) {
        (
            self.heating.compute(error, dt),
            self.cooling.compute(error, dt),
        )
    }

    pub fn is_enabled(&self, mode: Mode) -> bool {
        self.pid(mode).is_enabled()
    }

    fn pid(&self, mode: Mode) -> &PidController {
        match mode {
            Mode::Heating => &self.heating,
            Mode::Cooling => &self.cooling,
        }
    }

    fn pid_mut(&mut self, mode: Mode) -> &mut PidController {
        match mode {
            Mode::Heating => &mut self.heating,
            Mode::Cooling => &mut self.cooling,
        }
    }
}
