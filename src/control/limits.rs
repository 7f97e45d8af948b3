//! Effective output limits and the post-boot output ceiling.

use log::info;
use serde::Serialize;

use crate::config::ControlParameters;

/// Output bounds in percent actually enforced on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputLimits {
    /// `≤ 0`
    pub cooling: f32,
    /// `≥ 0`
    pub heating: f32,
}

impl OutputLimits {
    pub fn from_params(params: &ControlParameters) -> Self {
        Self {
            cooling: params.cooling_limit.clamp(-100.0, 0.0),
            heating: params.heating_limit.clamp(0.0, 100.0),
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.cooling, self.heating)
    }
}

/// Holds the output at a fixed ceiling for a window after boot.
///
/// The persisted limits stay untouched and visible; only the effective
/// limit handed to the control law is reduced.
#[derive(Debug, Clone)]
pub struct StartupClamp {
    boot_ms: u64,
    ceiling: f32,
    duration_ms: u64,
    released: bool,
}

impl StartupClamp {
    pub fn new(boot_ms: u64, ceiling_percent: f32, duration_ms: u32) -> Self {
        Self {
            boot_ms,
            ceiling: ceiling_percent.clamp(0.0, 100.0),
            duration_ms: u64::from(duration_ms),
            released: duration_ms == 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.released
    }

    /// Release the clamp once its window has elapsed.
    /// Returns `true` exactly once, on the releasing call.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.released && now_ms.saturating_sub(self.boot_ms) >= self.duration_ms {
            self.released = true;
            info!("startup clamp released after {} ms", self.duration_ms);
            return true;
        }
        false
    }

    /// Limits to enforce on this tick.
    pub fn effective(&self, params: &ControlParameters) -> OutputLimits {
        let persisted = OutputLimits::from_params(params);
        if self.released {
            return persisted;
        }
        OutputLimits {
            cooling: persisted.cooling.max(-self.ceiling),
            heating: persisted.heating.min(self.ceiling),
        }
    }
}
