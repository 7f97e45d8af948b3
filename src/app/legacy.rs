//! Adapter for host software written against the single-PID API.
//!
//! Older hosts know one gain triplet and one symmetric output limit.
//! Their requests are translated into [`AppCommand`]s; reads come back
//! from whichever mode is currently active.

use serde::Serialize;

use super::commands::AppCommand;
use crate::config::{ControlParameters, PidGains};
use crate::control::Mode;

/// Request shapes understood by the older host software.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegacyCommand {
    SetPid { kp: f32, ki: f32, kd: f32 },
    SetOutputLimit(f32),
    SetTargetTemp(f32),
    Start,
    Stop,
}

/// What a legacy `get_pid` returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegacyPidView {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub output_limit: f32,
}

/// Translate one legacy request. A single-PID gain write applies to
/// both modes.
pub fn translate(cmd: LegacyCommand) -> heapless::Vec<AppCommand, 2> {
    let mut out = heapless::Vec::new();
    match cmd {
        LegacyCommand::SetPid { kp, ki, kd } => {
            let gains = PidGains::new(kp, ki, kd);
            let _ = out.push(AppCommand::SetHeatingPid(gains));
            let _ = out.push(AppCommand::SetCoolingPid(gains));
        }
        LegacyCommand::SetOutputLimit(limit) => {
            let limit = limit.abs();
            let _ = out.push(AppCommand::SetOutputLimits {
                cooling: -limit,
                heating: limit,
            });
        }
        LegacyCommand::SetTargetTemp(t) => {
            let _ = out.push(AppCommand::SetTargetTemp(t));
        }
        LegacyCommand::Start => {
            let _ = out.push(AppCommand::Start);
        }
        LegacyCommand::Stop => {
            let _ = out.push(AppCommand::Stop);
        }
    }
    out
}

/// Gains of the active mode and the larger of the two limit magnitudes.
pub fn get_pid(params: &ControlParameters, mode: Mode) -> LegacyPidView {
    let gains = match mode {
        Mode::Heating => params.heating,
        Mode::Cooling => params.cooling,
    };
    LegacyPidView {
        kp: gains.kp,
        ki: gains.ki,
        kd: gains.kd,
        output_limit: params.heating_limit.max(params.cooling_limit.abs()),
    }
}
