//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the temperature controller, the safety supervisor,
//! the autotuner and the startup clamp. It exposes a hardware-agnostic
//! API; all I/O flows through port traits injected at call sites, so the
//! whole service runs against mock adapters in tests.
//!
//! ```text
//!  ClockPort  ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  SensorPort ──▶ │          AppService          │
//! ActuatorPort ◀──│ Supervisor · PID · Autotune  │ ◀── AppCommand
//!                 └──────────────────────────────┘
//! ```
//!
//! Tick order: supervisor → sense → startup clamp → control law (or
//! autotune step) → actuator → telemetry. While the supervisor is not
//! Normal the tick stops after sensing and drives the plate neutral.

use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{info, warn};

use crate::config::{ControlParameters, CoreConfig};
use crate::control::autotune::{AutotuneOutcome, AutotuneRequest, Autotuner};
use crate::control::{ControllerState, Mode, OutputLimits, StartupClamp, TemperatureController};
use crate::error::{AutotuneError, CommandError, SafetyTrip};
use crate::safety::{FailsafeReason, SafetySupervisor, SupervisorMode, Transition};

use super::commands::{
    AppCommand, validate_autotune, validate_cooling_rate, validate_gains, validate_limits,
    validate_safety, validate_target, with_limits,
};
use super::events::{AppEvent, StatusSnapshot};
use super::inbox::CommandInbox;
use super::ports::{ActuatorPort, ClockPort, ConfigPort, EventSink, SensorPort};

/// Quiet period after the last parameter change before auto-save fires.
pub const AUTO_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: CoreConfig,
    controller: TemperatureController,
    supervisor: SafetySupervisor,
    autotuner: Autotuner,
    startup_clamp: StartupClamp,
    boot_ms: u64,
    tick_count: u64,
    last_tick_ms: u64,
    /// Latest plate reading, kept even while the control law is skipped.
    last_input: Option<f32>,
    /// Percent written to the actuator by the last apply.
    applied_output: f32,
    last_telemetry_ms: Option<u64>,
    params_dirty: bool,
    dirty_since_ms: u64,
}

impl AppService {
    /// Construct the service. The actuator is untouched until [`start`].
    ///
    /// [`start`]: Self::start
    pub fn new(config: CoreConfig, params: ControlParameters, boot_ms: u64) -> Self {
        let controller = TemperatureController::new(params, &config);
        let supervisor = SafetySupervisor::new(config.heartbeat_timeout_ms);
        let autotuner = Autotuner::new(&config);
        let startup_clamp = StartupClamp::new(
            boot_ms,
            config.startup_ceiling_percent,
            config.startup_clamp_ms,
        );
        Self {
            config,
            controller,
            supervisor,
            autotuner,
            startup_clamp,
            boot_ms,
            tick_count: 0,
            last_tick_ms: boot_ms,
            last_input: None,
            applied_output: 0.0,
            last_telemetry_ms: None,
            params_dirty: false,
            dirty_since_ms: 0,
        }
    }

    /// Load parameters (self-healing), construct and start the service.
    pub fn boot(
        config: CoreConfig,
        store: &mut impl ConfigPort,
        clock: &impl ClockPort,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Self {
        let params = ControlParameters::load(store, sink);
        let mut app = Self::new(config, params, clock.now_ms());
        app.start(hw, sink);
        app
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the plate neutral and announce the service.
    pub fn start(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        self.apply_output(hw, 0.0);
        sink.emit(&AppEvent::Started);
        info!(
            "AppService started (output ceiling {:.0}% for {} ms)",
            self.config.startup_ceiling_percent, self.config.startup_clamp_ms
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`] to avoid a double mutable borrow.
    pub fn tick(
        &mut self,
        clock: &impl ClockPort,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        let now = clock.now_ms();
        self.tick_count += 1;
        self.last_tick_ms = now;

        // 1. Supervisor first
        let transition = self.supervisor.poll(now);
        self.apply_transition(transition, hw, sink);

        // 2. Startup clamp, released on time in every supervisor mode
        self.poll_startup_clamp(now, sink);

        // 3. Sense
        let input = hw.read_plate_temperature();
        self.last_input = Some(input);

        // 4. Failsafe / panic override everything below
        if !self.supervisor.is_normal() {
            self.apply_output(hw, 0.0);
            self.emit_telemetry_if_due(now, sink);
            return;
        }

        let limits = self.startup_clamp.effective(self.controller.params());

        // 5. Control law or open-loop experiment
        let output = if self.autotuner.is_running() {
            self.autotune_step(input, now, limits, sink)
        } else {
            let outcome = self.controller.update(input, now, limits);
            if let Some(trip) = outcome.trip {
                sink.emit(&AppEvent::SafetyTrip(trip));
            }
            outcome.output
        };

        // 6. Actuate
        self.apply_output(hw, output);
        self.emit_telemetry_if_due(now, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one host or supervisor command. A rejected command
    /// changes nothing and is reported as [`AppEvent::CommandRejected`].
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        clock: &impl ClockPort,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let now = clock.now_ms();
        self.poll_startup_clamp(now, sink);
        let result = self.apply_command(cmd, now, hw, sink);
        if let Err(e) = result {
            warn!("command rejected: {e}");
            sink.emit(&AppEvent::CommandRejected(e));
        }
        result
    }

    /// Handle every queued command. Call at a tick boundary.
    /// Returns the number of commands taken from the inbox.
    pub fn drain_inbox<M: RawMutex, const N: usize>(
        &mut self,
        inbox: &CommandInbox<M, N>,
        clock: &impl ClockPort,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> usize {
        let mut handled = 0;
        while let Some(cmd) = inbox.take() {
            // Rejections are already reported through the sink.
            let _ = self.handle_command(cmd, clock, hw, sink);
            handled += 1;
        }
        handled
    }

    fn apply_command(
        &mut self,
        cmd: AppCommand,
        now: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        match cmd {
            AppCommand::Start => {
                self.require_normal()?;
                self.controller.start();
            }
            AppCommand::Stop => {
                self.cancel_autotune(AutotuneError::Cancelled, sink);
                self.controller.stop();
                self.apply_output(hw, 0.0);
            }
            AppCommand::SetTargetTemp(value) => {
                let value = validate_target(value, self.config.safe_min_c, self.config.safe_max_c)?;
                self.controller.set_target(value);
                info!("target -> {value:.2} C");
            }
            AppCommand::SetHeatingPid(gains) => {
                let gains = validate_gains(gains)?;
                self.controller.set_gains(Mode::Heating, gains);
                self.mark_params_dirty(now);
            }
            AppCommand::SetCoolingPid(gains) => {
                let gains = validate_gains(gains)?;
                self.controller.set_gains(Mode::Cooling, gains);
                self.mark_params_dirty(now);
            }
            AppCommand::SetOutputLimits { cooling, heating } => {
                let (cooling, heating) = validate_limits(cooling, heating)?;
                let params = with_limits(*self.controller.params(), cooling, heating);
                self.controller.set_params(params);
                self.mark_params_dirty(now);
            }
            AppCommand::SetSafetyParams { deadband, margin } => {
                let (deadband, margin) = validate_safety(deadband, margin)?;
                let mut params = *self.controller.params();
                params.deadband = deadband;
                params.safety_margin = margin;
                self.controller.set_params(params);
                self.mark_params_dirty(now);
            }
            AppCommand::SetCoolingRateLimit(rate) => {
                let rate = validate_cooling_rate(rate)?;
                let mut params = *self.controller.params();
                params.max_cooling_rate = rate;
                self.controller.set_params(params);
                self.mark_params_dirty(now);
            }
            AppCommand::SetEmergencyStop(true) => {
                self.controller.latch_emergency_stop(SafetyTrip::Manual);
                self.cancel_autotune(AutotuneError::SafetyTrip, sink);
                self.apply_output(hw, 0.0);
                sink.emit(&AppEvent::SafetyTrip(SafetyTrip::Manual));
            }
            AppCommand::SetEmergencyStop(false) => {
                if self.controller.clear_emergency_stop() {
                    sink.emit(&AppEvent::EmergencyStopCleared);
                }
            }
            AppCommand::StartAutotune {
                step_percent,
                direction,
                target_delta,
            } => self.start_autotune(step_percent, direction, target_delta, now)?,
            AppCommand::AbortAutotune => {
                if self.cancel_autotune(AutotuneError::Cancelled, sink) {
                    self.apply_output(hw, 0.0);
                }
            }
            AppCommand::TriggerFailsafe(reason) => {
                let t = self.supervisor.trigger_failsafe(FailsafeReason::Manual(reason));
                self.apply_transition(t, hw, sink);
            }
            AppCommand::ClearFailsafe => {
                let t = self.supervisor.clear_failsafe();
                self.apply_transition(t, hw, sink);
            }
            AppCommand::TriggerPanic(reason) => {
                let t = self.supervisor.trigger_panic(reason.as_str());
                self.apply_transition(t, hw, sink);
            }
            AppCommand::ClearPanic => {
                let t = self.supervisor.clear_panic();
                self.apply_transition(t, hw, sink);
            }
            AppCommand::HeartbeatReceived => {
                let t = self.supervisor.heartbeat_received(now);
                self.apply_transition(t, hw, sink);
            }
            AppCommand::SetBreathCheckEnabled(enabled) => {
                let t = self.supervisor.set_breath_check_enabled(enabled);
                self.apply_transition(t, hw, sink);
            }
            AppCommand::BreathStopped => {
                let t = self.supervisor.breath_stopped();
                self.apply_transition(t, hw, sink);
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a status snapshot from the live state.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_ms: self.last_tick_ms.saturating_sub(self.boot_ms),
            supervisor: self.supervisor.mode(),
            failsafe_reason: self.supervisor.failsafe_reason().cloned(),
            panic_reason: self
                .supervisor
                .panic_reason()
                .map(crate::safety::supervisor::reason_text),
            breath_check_enabled: self.supervisor.breath_check_enabled(),
            controller: self.controller.state().clone(),
            mode: self.controller.mode(),
            params: *self.controller.params(),
            effective_limits: self.effective_limits(),
            startup_clamp_active: self.startup_clamp.is_active(),
            autotune: self.autotuner.status(),
            autotune_samples: self.autotuner.sample_count(),
            applied_output: self.applied_output,
        }
    }

    pub fn supervisor_mode(&self) -> SupervisorMode {
        self.supervisor.mode()
    }

    pub fn supervisor(&self) -> &SafetySupervisor {
        &self.supervisor
    }

    pub fn controller_state(&self) -> &ControllerState {
        self.controller.state()
    }

    pub fn params(&self) -> &ControlParameters {
        self.controller.params()
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn autotuner(&self) -> &Autotuner {
        &self.autotuner
    }

    /// Limits the control law is held to right now.
    pub fn effective_limits(&self) -> OutputLimits {
        self.startup_clamp.effective(self.controller.params())
    }

    pub fn startup_clamp_active(&self) -> bool {
        self.startup_clamp.is_active()
    }

    /// Percent last written to the actuator.
    pub fn applied_output(&self) -> f32 {
        self.applied_output
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn require_normal(&self) -> Result<(), CommandError> {
        if self.supervisor.is_normal() {
            Ok(())
        } else {
            Err(CommandError::SupervisorLocked)
        }
    }

    fn start_autotune(
        &mut self,
        step_percent: Option<f32>,
        direction: Mode,
        target_delta: f32,
        now: u64,
    ) -> Result<(), CommandError> {
        self.require_normal()?;
        if self.autotuner.is_running() {
            info!("autotune already running, start ignored");
            return Ok(());
        }
        if self.controller.is_emergency_stopped() {
            return Err(CommandError::Autotune("emergency stop latched"));
        }
        let step = step_percent.unwrap_or(self.config.autotune_step_percent);
        let (step_percent, target_delta) = validate_autotune(step, target_delta)?;
        let Some(baseline) = self.last_input.filter(|t| t.is_finite()) else {
            return Err(CommandError::Autotune("no plate temperature yet"));
        };
        // Process gain is taken against this step: store the one applied.
        let limits = self.effective_limits();
        let ceiling = match direction {
            Mode::Heating => limits.heating,
            Mode::Cooling => -limits.cooling,
        };
        if ceiling <= 0.0 {
            return Err(CommandError::Autotune("output limit is zero"));
        }
        let step_percent = if step_percent > ceiling {
            info!("autotune step {step_percent:.1}% held to the {ceiling:.1}% output limit");
            ceiling
        } else {
            step_percent
        };

        self.controller.suspend();
        self.autotuner.start(
            AutotuneRequest {
                step_percent,
                direction,
                target_delta,
            },
            baseline,
            now,
        );
        Ok(())
    }

    /// One open-loop autotune tick. Returns the output to apply.
    fn autotune_step(
        &mut self,
        input: f32,
        now: u64,
        limits: OutputLimits,
        sink: &mut impl EventSink,
    ) -> f32 {
        let step = self.autotuner.output();
        let outcome = self.controller.drive_open_loop(input, now, step, limits);
        if let Some(trip) = outcome.trip {
            sink.emit(&AppEvent::SafetyTrip(trip));
            self.cancel_autotune(AutotuneError::SafetyTrip, sink);
            return 0.0;
        }
        if outcome.output.abs() + 1e-3 < step.abs() {
            warn!(
                "output limit narrowed to {:.1}% under a {:.1}% autotune step",
                outcome.output.abs(),
                step.abs()
            );
            self.cancel_autotune(AutotuneError::Cancelled, sink);
            return 0.0;
        }

        match self.autotuner.update(input, now) {
            None => outcome.output,
            Some(AutotuneOutcome::Done(result)) => {
                self.controller.set_gains(result.mode, result.gains);
                self.mark_params_dirty(now);
                self.controller.resume();
                sink.emit(&AppEvent::AutotuneFinished {
                    mode: result.mode,
                    gains: result.gains,
                    fallback: result.fallback,
                });
                0.0
            }
            Some(AutotuneOutcome::Aborted(reason)) => {
                self.controller.resume();
                sink.emit(&AppEvent::AutotuneAborted(reason));
                0.0
            }
        }
    }

    fn poll_startup_clamp(&mut self, now: u64, sink: &mut impl EventSink) {
        if self.startup_clamp.poll(now) {
            sink.emit(&AppEvent::StartupClampReleased);
        }
    }

    /// Abort a running experiment and hand control back to the loop.
    fn cancel_autotune(&mut self, reason: AutotuneError, sink: &mut impl EventSink) -> bool {
        if !self.autotuner.abort(reason) {
            return false;
        }
        self.controller.resume();
        sink.emit(&AppEvent::AutotuneAborted(reason));
        true
    }

    /// React to a supervisor edge in the same call that caused it.
    fn apply_transition(
        &mut self,
        transition: Option<Transition>,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        let Some(t) = transition else {
            return;
        };
        sink.emit(&AppEvent::SupervisorChanged {
            from: t.from,
            to: t.to,
        });
        if t.enters_safe_state() {
            let profile_running = self.controller.is_active() || self.autotuner.is_running();
            self.cancel_autotune(AutotuneError::Cancelled, sink);
            self.controller.stop();
            if profile_running {
                warn!("profile cancelled by {:?}", t.to);
                sink.emit(&AppEvent::ProfileCancelled);
            }
        }
        // Neutral on entry and on recovery; the host restarts explicitly.
        self.apply_output(hw, 0.0);
    }

    /// Scale a percent command to the driver's duty range and write it.
    fn apply_output(&mut self, hw: &mut impl ActuatorPort, percent: f32) {
        let percent = if percent.is_finite() {
            percent.clamp(-100.0, 100.0)
        } else {
            0.0
        };
        let full_scale = f32::from(hw.max_duty().min(0x7FFF));
        let duty = (percent / 100.0 * full_scale).round() as i16;
        if duty == 0 {
            hw.neutral();
        } else {
            hw.set_output(duty);
        }
        self.applied_output = percent;
    }

    fn emit_telemetry_if_due(&mut self, now: u64, sink: &mut impl EventSink) {
        let interval = u64::from(self.config.telemetry_interval_ms);
        if interval == 0 {
            return;
        }
        if self
            .last_telemetry_ms
            .is_some_and(|last| now.saturating_sub(last) < interval)
        {
            return;
        }
        self.last_telemetry_ms = Some(now);
        sink.emit(&AppEvent::Telemetry(self.status()));
    }

    // ── Parameter dirty-flag management ───────────────────────

    fn mark_params_dirty(&mut self, now: u64) {
        if !self.params_dirty {
            self.params_dirty = true;
            self.dirty_since_ms = now;
        }
    }

    /// Save once the parameters have been quiet for
    /// [`AUTO_SAVE_DELAY_MS`]. Returns `true` if they were saved.
    pub fn auto_save_if_needed(
        &mut self,
        now_ms: u64,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.params_dirty || now_ms.saturating_sub(self.dirty_since_ms) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        self.persist_if_dirty(store, sink)
    }

    /// Write dirty parameters now. Call outside the tick (idle loop or
    /// before shutdown). Returns `true` if they were saved.
    pub fn persist_if_dirty(
        &mut self,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.params_dirty {
            return false;
        }
        match self.controller.params().save(store) {
            Ok(()) => {
                self.params_dirty = false;
                info!("control parameters saved");
                sink.emit(&AppEvent::ConfigSaved);
                true
            }
            Err(e) => {
                warn!("parameter save failed: {e}");
                false
            }
        }
    }

    /// Whether the parameters have unsaved changes.
    pub fn is_params_dirty(&self) -> bool {
        self.params_dirty
    }
}
