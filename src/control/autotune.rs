//! Step-response autotune.
//!
//! Applies a fixed open-loop output step, logs the plate response and
//! derives PID gains for the mode under test from a first-order plus
//! dead-time model:
//!
//! ```text
//!  Idle ──start──▶ Running ──log full / target reached──▶ Done
//!                     │
//!                     └──timeout / abort / safety trip──▶ Aborted
//! ```
//!
//! Dead time is not measured; a fixed small value is assumed when
//! applying the Ziegler-Nichols open-loop rule.

use log::{info, warn};
use serde::Serialize;

use super::arbiter::Mode;
use crate::config::{CoreConfig, PidGains};
use crate::error::AutotuneError;

/// Sample log capacity (120 s at the default 500 ms interval).
pub const LOG_CAPACITY: usize = 240;

/// Assumed plant dead time (seconds).
const DEAD_TIME_S: f32 = 1.0;

const MIN_SAMPLES: usize = 10;

/// Smallest temperature swing (°C) treated as a real response.
const MIN_RESPONSE_C: f32 = 0.2;

const KP_RANGE: (f32, f32) = (0.1, 50.0);
const KI_RANGE: (f32, f32) = (0.0, 10.0);
const KD_RANGE: (f32, f32) = (0.0, 50.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutotuneStatus {
    Idle,
    Running,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AutotuneSample {
    pub elapsed_ms: u32,
    pub temperature: f32,
}

/// Parameters of one experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutotuneRequest {
    /// Open-loop step magnitude in percent duty.
    pub step_percent: f32,
    /// Mode under test; also the sign of the step.
    pub direction: Mode,
    /// Temperature swing (°C) from baseline that ends the run early.
    pub target_delta: f32,
}

/// Gains produced by a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AutotuneResult {
    pub mode: Mode,
    pub gains: PidGains,
    /// °C per percent duty.
    pub process_gain: f32,
    pub time_constant_s: f32,
    /// Set when the analysis fell back to default gains.
    pub fallback: Option<AutotuneError>,
}

/// Terminal transition reported by [`Autotuner::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutotuneOutcome {
    Done(AutotuneResult),
    Aborted(AutotuneError),
}

pub struct Autotuner {
    status: AutotuneStatus,
    samples: heapless::Vec<AutotuneSample, LOG_CAPACITY>,
    start_time: u64,
    last_sample_ms: u64,
    baseline: f32,
    request: Option<AutotuneRequest>,
    sample_interval_ms: u64,
    timeout_ms: u64,
    last_result: Option<AutotuneResult>,
}

impl Autotuner {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            status: AutotuneStatus::Idle,
            samples: heapless::Vec::new(),
            start_time: 0,
            last_sample_ms: 0,
            baseline: 0.0,
            request: None,
            sample_interval_ms: u64::from(config.autotune_sample_interval_ms),
            timeout_ms: u64::from(config.autotune_timeout_ms),
            last_result: None,
        }
    }

    /// Begin a run from `baseline`. Returns `false` (and changes nothing)
    /// if a run is already in progress.
    pub fn start(&mut self, request: AutotuneRequest, baseline: f32, now_ms: u64) -> bool {
        if self.status == AutotuneStatus::Running {
            return false;
        }
        self.samples.clear();
        let logged = self
            .samples
            .push(AutotuneSample {
                elapsed_ms: 0,
                temperature: baseline,
            })
            .is_ok();
        debug_assert!(logged, "baseline sample must fit an empty log");
        self.status = AutotuneStatus::Running;
        self.start_time = now_ms;
        self.last_sample_ms = now_ms;
        self.baseline = baseline;
        self.request = Some(request);
        info!(
            "autotune started: {} step {:.1}% from {:.2} C",
            request.direction, request.step_percent, baseline
        );
        true
    }

    /// Abort a running experiment. Returns `false` if nothing was running.
    pub fn abort(&mut self, reason: AutotuneError) -> bool {
        if self.status != AutotuneStatus::Running {
            return false;
        }
        warn!("autotune aborted: {reason}");
        self.finish(AutotuneStatus::Aborted);
        true
    }

    /// Signed open-loop output while running, 0 otherwise.
    pub fn output(&self) -> f32 {
        match (self.status, self.request) {
            (AutotuneStatus::Running, Some(req)) => match req.direction {
                Mode::Heating => req.step_percent,
                Mode::Cooling => -req.step_percent,
            },
            _ => 0.0,
        }
    }

    /// Advance the experiment with the latest plate temperature.
    pub fn update(&mut self, temperature: f32, now_ms: u64) -> Option<AutotuneOutcome> {
        if self.status != AutotuneStatus::Running {
            return None;
        }
        let request = self.request?;
        let elapsed = now_ms.saturating_sub(self.start_time);

        if elapsed > self.timeout_ms {
            warn!("autotune timed out after {} ms", elapsed);
            self.finish(AutotuneStatus::Aborted);
            return Some(AutotuneOutcome::Aborted(AutotuneError::Timeout));
        }

        if now_ms.saturating_sub(self.last_sample_ms) < self.sample_interval_ms {
            return None;
        }
        self.last_sample_ms = now_ms;
        let dropped = self
            .samples
            .push(AutotuneSample {
                elapsed_ms: elapsed.min(u64::from(u32::MAX)) as u32,
                temperature,
            })
            .is_err();
        if dropped {
            warn!("autotune log full, sample at {} ms not recorded", elapsed);
        }

        let reached = (temperature - self.baseline).abs() >= request.target_delta;
        if dropped || self.samples.is_full() || reached {
            let result = self.analyse(request);
            info!(
                "autotune done: {} kp={:.3} ki={:.3} kd={:.3}{}",
                result.mode,
                result.gains.kp,
                result.gains.ki,
                result.gains.kd,
                if result.fallback.is_some() { " (fallback)" } else { "" }
            );
            self.last_result = Some(result);
            self.finish(AutotuneStatus::Done);
            return Some(AutotuneOutcome::Done(result));
        }
        None
    }

    pub fn status(&self) -> AutotuneStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == AutotuneStatus::Running
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn last_result(&self) -> Option<&AutotuneResult> {
        self.last_result.as_ref()
    }

    // ── Internal ──────────────────────────────────────────────

    fn finish(&mut self, status: AutotuneStatus) {
        self.status = status;
        self.request = None;
        self.samples.clear();
    }

    fn analyse(&self, request: AutotuneRequest) -> AutotuneResult {
        let fallback = |reason| AutotuneResult {
            mode: request.direction,
            gains: match request.direction {
                Mode::Heating => PidGains::HEATING_DEFAULT,
                Mode::Cooling => PidGains::COOLING_DEFAULT,
            },
            process_gain: 0.0,
            time_constant_s: 0.0,
            fallback: Some(reason),
        };

        if self.samples.len() < MIN_SAMPLES {
            return fallback(AutotuneError::InsufficientData);
        }
        let Some(last) = self.samples.last() else {
            return fallback(AutotuneError::InsufficientData);
        };
        let delta = (last.temperature - self.baseline).abs();
        if !delta.is_finite() || delta < MIN_RESPONSE_C || request.step_percent <= 0.0 {
            return fallback(AutotuneError::NoResponse);
        }

        let process_gain = delta / request.step_percent;
        let threshold = 0.63 * delta;
        let t63_ms = self
            .samples
            .iter()
            .find(|s| (s.temperature - self.baseline).abs() >= threshold)
            .map_or(last.elapsed_ms, |s| s.elapsed_ms);
        let t63 = (t63_ms as f32 / 1000.0).max(self.sample_interval_ms as f32 / 1000.0);
        let tau = t63 / 0.63;

        let kp = 1.2 * tau / (process_gain * DEAD_TIME_S);
        let ti = 2.0 * DEAD_TIME_S;
        let td = 0.5 * DEAD_TIME_S;
        let gains = PidGains::new(
            kp.clamp(KP_RANGE.0, KP_RANGE.1),
            (kp / ti).clamp(KI_RANGE.0, KI_RANGE.1),
            (kp * td).clamp(KD_RANGE.0, KD_RANGE.1),
        );

        AutotuneResult {
            mode: request.direction,
            gains,
            process_gain,
            time_constant_s: tau,
            fallback: None,
        }
    }
}
