//! Asymmetric dual-mode temperature controller.
//!
//! [`TemperatureController`] owns the control parameters, the per-tick
//! [`ControllerState`], the mode arbiter with its two PID instances, the
//! safety governor and the output shaper. One call to [`update`] is one
//! control tick; the safety supervisor has already cleared the tick by
//! the time it runs.
//!
//! [`update`]: TemperatureController::update

use log::{error, info};
use serde::Serialize;

use super::arbiter::{Mode, ModeArbiter};
use super::limits::OutputLimits;
use super::shaper::OutputShaper;
use crate::config::{ControlParameters, CoreConfig, PidGains};
use crate::error::SafetyTrip;
use crate::safety::governor::SafetyGovernor;

/// Live controller state, mutated once per tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerState {
    /// Latest plate temperature (°C).
    pub input: f32,
    pub setpoint: f32,
    pub cooling_output: f32,
    pub heating_output: f32,
    pub raw_output: f32,
    /// Post-shaping output in percent, positive = heating.
    pub final_output: f32,
    /// Controller armed.
    pub active: bool,
    pub cooling_mode: bool,
    /// Latched safety trip; independent of the supervisor.
    pub emergency_stop: bool,
    pub trip: Option<SafetyTrip>,
    pub last_temperature: Option<f32>,
    pub last_update_time: Option<u64>,
    /// °C/s, negative while cooling.
    pub temperature_rate: f32,
}

/// Result of one controller tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// Output to send to the actuator, in percent.
    pub output: f32,
    /// Set only on the tick a guard newly latched the emergency stop.
    pub trip: Option<SafetyTrip>,
}

impl TickOutcome {
    const IDLE: Self = Self {
        output: 0.0,
        trip: None,
    };
}

pub struct TemperatureController {
    params: ControlParameters,
    state: ControllerState,
    arbiter: ModeArbiter,
    governor: SafetyGovernor,
    shaper: OutputShaper,
}

impl TemperatureController {
    pub fn new(params: ControlParameters, config: &CoreConfig) -> Self {
        let arbiter = ModeArbiter::new(&params);
        Self {
            state: ControllerState {
                setpoint: 37.0,
                ..ControllerState::default()
            },
            params,
            arbiter,
            governor: SafetyGovernor::new(config),
            shaper: OutputShaper::new(config.smoothing_alpha),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Arm the controller. The emergency-stop latch is left as is.
    pub fn start(&mut self) {
        if self.state.active {
            return;
        }
        self.state.active = true;
        self.shaper.reset();
        if !self.state.emergency_stop {
            self.arbiter.arm();
        }
        info!("controller armed, setpoint {:.2} C", self.state.setpoint);
    }

    /// Disarm and zero every output.
    pub fn stop(&mut self) {
        if self.state.active {
            info!("controller stopped");
        }
        self.state.active = false;
        self.arbiter.disarm();
        self.zero_outputs();
    }

    pub fn set_target(&mut self, setpoint: f32) {
        self.state.setpoint = setpoint;
    }

    // ── Parameters ────────────────────────────────────────────

    pub fn params(&self) -> &ControlParameters {
        &self.params
    }

    /// Replace the parameters; gains take effect on the next compute.
    pub fn set_params(&mut self, params: ControlParameters) {
        self.params = params;
        self.arbiter.set_gains(Mode::Heating, params.heating);
        self.arbiter.set_gains(Mode::Cooling, params.cooling);
    }

    pub fn set_gains(&mut self, mode: Mode, gains: PidGains) {
        match mode {
            Mode::Heating => self.params.heating = gains,
            Mode::Cooling => self.params.cooling = gains,
        }
        self.arbiter.set_gains(mode, gains);
    }

    // ── Emergency stop ────────────────────────────────────────

    pub fn latch_emergency_stop(&mut self, trip: SafetyTrip) {
        if !self.state.emergency_stop {
            error!("EMERGENCY STOP: {trip}");
        }
        self.state.emergency_stop = true;
        self.state.trip = Some(trip);
        self.arbiter.disarm();
        self.zero_outputs();
    }

    pub fn clear_emergency_stop(&mut self) -> bool {
        if !self.state.emergency_stop {
            return false;
        }
        self.state.emergency_stop = false;
        self.state.trip = None;
        self.shaper.reset();
        if self.state.active {
            self.arbiter.arm();
        }
        info!("emergency stop cleared");
        true
    }

    // ── Open-loop override (autotune) ─────────────────────────

    /// Drop closed-loop state before an open-loop experiment.
    pub fn suspend(&mut self) {
        self.arbiter.disarm();
        self.shaper.reset();
    }

    /// Resume closed-loop control from a clean state.
    pub fn resume(&mut self) {
        self.shaper.reset();
        self.state.final_output = 0.0;
        if self.state.active && !self.state.emergency_stop {
            self.arbiter.arm();
        }
    }

    /// Drive a fixed open-loop output, still subject to the rate and
    /// range guards.
    pub fn drive_open_loop(
        &mut self,
        input: f32,
        now_ms: u64,
        output: f32,
        limits: OutputLimits,
    ) -> TickOutcome {
        self.track(input, now_ms);
        if self.state.emergency_stop {
            return TickOutcome::IDLE;
        }
        if let Some(trip) = self.governor.evaluate_open_loop(&self.state, &self.params) {
            self.latch_emergency_stop(trip);
            return TickOutcome {
                output: 0.0,
                trip: Some(trip),
            };
        }
        let output = limits.clamp(output);
        self.state.heating_output = 0.0;
        self.state.cooling_output = 0.0;
        self.state.raw_output = output;
        self.state.final_output = output;
        TickOutcome { output, trip: None }
    }

    // ── Closed-loop tick ──────────────────────────────────────

    /// One control tick: guards → arbitration → PID → attenuation → shaping.
    pub fn update(&mut self, input: f32, now_ms: u64, limits: OutputLimits) -> TickOutcome {
        let dt = self.track(input, now_ms);

        if !self.state.active || self.state.emergency_stop {
            self.zero_outputs();
            return TickOutcome::IDLE;
        }

        if let Some(trip) = self.governor.evaluate(&self.state, &self.params) {
            self.latch_emergency_stop(trip);
            return TickOutcome {
                output: 0.0,
                trip: Some(trip),
            };
        }

        let error = self.state.setpoint - input;
        if self.arbiter.select(error, self.params.deadband) {
            info!(
                "mode -> {} (error {:+.2} C, deadband {:.2} C)",
                self.arbiter.mode(),
                error,
                self.params.deadband
            );
        }
        let mode = self.arbiter.mode();
        self.state.cooling_mode = mode.is_cooling();

        self.arbiter.set_limits(limits);
        let (heating, cooling) = self.arbiter.compute(error, dt);
        self.state.heating_output = heating;
        self.state.cooling_output = cooling;

        let raw = if mode.is_cooling() { cooling } else { heating };
        let raw = self
            .governor
            .attenuate(raw, input, self.state.setpoint, mode.is_cooling());
        self.state.raw_output = limits.clamp(raw);

        let output = self
            .shaper
            .shape(self.state.raw_output, limits.cooling, limits.heating);
        self.state.final_output = output;

        TickOutcome { output, trip: None }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.arbiter.mode()
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.state.emergency_stop
    }

    // ── Internal ──────────────────────────────────────────────

    /// Record the sample and update the derivative used by the rate
    /// guard. Returns the elapsed time in seconds (0 on the first sample).
    fn track(&mut self, input: f32, now_ms: u64) -> f32 {
        let dt = match self.state.last_update_time {
            Some(last) if now_ms > last => (now_ms - last) as f32 / 1000.0,
            _ => 0.0,
        };
        self.state.temperature_rate = match self.state.last_temperature {
            Some(prev) if dt > 0.0 => (input - prev) / dt,
            _ => 0.0,
        };
        self.state.input = input;
        self.state.last_temperature = Some(input);
        self.state.last_update_time = Some(now_ms);
        dt
    }

    fn zero_outputs(&mut self) {
        self.shaper.reset();
        self.state.heating_output = 0.0;
        self.state.cooling_output = 0.0;
        self.state.raw_output = 0.0;
        self.state.final_output = 0.0;
    }
}
