//! Safety supervisor: Normal / Failsafe / Panic.
//!
//! The supervisor is evaluated **first on every tick**. While it is not
//! Normal the control law does not run and the actuator is held neutral.
//!
//! ```text
//!            trigger (heartbeat, breathing, manual)
//!   NORMAL ─────────────────────────────────────────▶ FAILSAFE
//!     ▲  ◀──── reason-matched recovery / clear ─────────  │
//!     │                                                   │ panic
//!     │  ◀──────────── clear_panic ──────────── PANIC ◀───┘
//!     └────────────────── panic ──────────────────▲
//! ```
//!
//! Priority is Panic > Failsafe > Normal. The two active states are one
//! enum, so they can never be set at the same time.

use core::fmt;

use log::{error, info, warn};
use serde::Serialize;

/// Bounded free-text reason attached to manual triggers.
pub type ReasonText = heapless::String<32>;

/// Copy `reason` into a [`ReasonText`], truncating on a char boundary.
pub fn reason_text(reason: &str) -> ReasonText {
    let mut out = ReasonText::new();
    for c in reason.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailsafeReason {
    HeartbeatTimeout,
    NoBreathingDetected,
    Manual(ReasonText),
}

impl fmt::Display for FailsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeartbeatTimeout => write!(f, "heartbeat_timeout"),
            Self::NoBreathingDetected => write!(f, "no_breathing_detected"),
            Self::Manual(text) => write!(f, "{text}"),
        }
    }
}

/// Supervisor state without its reason payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorMode {
    Normal,
    Failsafe,
    Panic,
}

/// An edge between two supervisor modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SupervisorMode,
    pub to: SupervisorMode,
}

impl Transition {
    /// True if this edge enters Failsafe or Panic.
    pub fn enters_safe_state(&self) -> bool {
        self.to != SupervisorMode::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Supervision {
    Normal,
    Failsafe(FailsafeReason),
    Panic(ReasonText),
}

/// Process-wide supervisor state.
#[derive(Debug, Clone)]
pub struct SafetySupervisor {
    state: Supervision,
    breath_check_enabled: bool,
    last_heartbeat_time: Option<u64>,
    heartbeat_timeout_ms: u32,
}

impl SafetySupervisor {
    pub fn new(heartbeat_timeout_ms: u32) -> Self {
        Self {
            state: Supervision::Normal,
            breath_check_enabled: true,
            last_heartbeat_time: None,
            heartbeat_timeout_ms,
        }
    }

    // ── Triggers ──────────────────────────────────────────────

    /// Normal → Failsafe. Ignored while Panic is active or if Failsafe
    /// is already active (the first reason is kept).
    pub fn trigger_failsafe(&mut self, reason: FailsafeReason) -> Option<Transition> {
        match &self.state {
            Supervision::Panic(_) => {
                warn!("failsafe trigger '{reason}' ignored: panic active");
                None
            }
            Supervision::Failsafe(_) => None,
            Supervision::Normal => {
                error!("FAILSAFE: {reason}");
                self.state = Supervision::Failsafe(reason);
                Some(Transition {
                    from: SupervisorMode::Normal,
                    to: SupervisorMode::Failsafe,
                })
            }
        }
    }

    /// Normal | Failsafe → Panic, dropping any failsafe reason.
    pub fn trigger_panic(&mut self, reason: &str) -> Option<Transition> {
        let from = self.mode();
        if from == SupervisorMode::Panic {
            return None;
        }
        error!("PANIC: {reason}");
        self.state = Supervision::Panic(reason_text(reason));
        Some(Transition {
            from,
            to: SupervisorMode::Panic,
        })
    }

    /// Failsafe → Normal on explicit request.
    pub fn clear_failsafe(&mut self) -> Option<Transition> {
        if let Supervision::Failsafe(reason) = &self.state {
            info!("failsafe '{reason}' cleared");
            return Some(self.recover(SupervisorMode::Failsafe));
        }
        None
    }

    /// Panic → Normal. The only way out of Panic.
    pub fn clear_panic(&mut self) -> Option<Transition> {
        if let Supervision::Panic(reason) = &self.state {
            info!("panic '{reason}' cleared");
            return Some(self.recover(SupervisorMode::Panic));
        }
        None
    }

    /// Record a host heartbeat. Recovers a heartbeat-timeout failsafe.
    pub fn heartbeat_received(&mut self, now_ms: u64) -> Option<Transition> {
        self.last_heartbeat_time = Some(now_ms);
        if self.state == Supervision::Failsafe(FailsafeReason::HeartbeatTimeout) {
            info!("heartbeat restored, leaving failsafe");
            return Some(self.recover(SupervisorMode::Failsafe));
        }
        None
    }

    /// Enable or disable breath supervision. Disabling recovers a
    /// breathing failsafe.
    pub fn set_breath_check_enabled(&mut self, enabled: bool) -> Option<Transition> {
        self.breath_check_enabled = enabled;
        info!("breath check {}", if enabled { "enabled" } else { "disabled" });
        if !enabled && self.state == Supervision::Failsafe(FailsafeReason::NoBreathingDetected) {
            return Some(self.recover(SupervisorMode::Failsafe));
        }
        None
    }

    /// The breath estimator reports that breathing stopped.
    pub fn breath_stopped(&mut self) -> Option<Transition> {
        if !self.breath_check_enabled {
            return None;
        }
        self.trigger_failsafe(FailsafeReason::NoBreathingDetected)
    }

    /// Tick-boundary check of the heartbeat deadline. Supervision arms on
    /// the first heartbeat; a timeout of 0 disables it.
    pub fn poll(&mut self, now_ms: u64) -> Option<Transition> {
        let last = self.last_heartbeat_time?;
        if self.heartbeat_timeout_ms == 0 {
            return None;
        }
        if now_ms.saturating_sub(last) > u64::from(self.heartbeat_timeout_ms)
            && self.state == Supervision::Normal
        {
            return self.trigger_failsafe(FailsafeReason::HeartbeatTimeout);
        }
        None
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> SupervisorMode {
        match self.state {
            Supervision::Normal => SupervisorMode::Normal,
            Supervision::Failsafe(_) => SupervisorMode::Failsafe,
            Supervision::Panic(_) => SupervisorMode::Panic,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.state == Supervision::Normal
    }

    pub fn is_failsafe_active(&self) -> bool {
        matches!(self.state, Supervision::Failsafe(_))
    }

    pub fn is_panic_active(&self) -> bool {
        matches!(self.state, Supervision::Panic(_))
    }

    pub fn failsafe_reason(&self) -> Option<&FailsafeReason> {
        match &self.state {
            Supervision::Failsafe(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn panic_reason(&self) -> Option<&str> {
        match &self.state {
            Supervision::Panic(reason) => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn breath_check_enabled(&self) -> bool {
        self.breath_check_enabled
    }

    pub fn last_heartbeat_time(&self) -> Option<u64> {
        self.last_heartbeat_time
    }

    pub fn heartbeat_timeout_ms(&self) -> u32 {
        self.heartbeat_timeout_ms
    }

    // ── Internal ──────────────────────────────────────────────

    fn recover(&mut self, from: SupervisorMode) -> Transition {
        self.state = Supervision::Normal;
        Transition {
            from,
            to: SupervisorMode::Normal,
        }
    }
}
