//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (serial console on the bench, the tracing subscriber
//! in the simulator). A host-link adapter would implement the same trait.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | sup={:?} | T={:.2}\u{00b0}C sp={:.2}\u{00b0}C rate={:+.3}\u{00b0}C/s | \
                     mode={} out={:+.1}% | limits=[{:.0},{:.0}]{} | estop={} | autotune={:?}",
                    t.supervisor,
                    t.controller.input,
                    t.controller.setpoint,
                    t.controller.temperature_rate,
                    t.mode,
                    t.applied_output,
                    t.effective_limits.cooling,
                    t.effective_limits.heating,
                    if t.startup_clamp_active { " (startup)" } else { "" },
                    t.controller.emergency_stop,
                    t.autotune,
                );
            }
            AppEvent::Started => info!("START | control core ready"),
            AppEvent::SafetyTrip(trip) => error!("TRIP  | {trip}"),
            AppEvent::EmergencyStopCleared => info!("TRIP  | emergency stop cleared"),
            AppEvent::SupervisorChanged { from, to } => {
                warn!("SUPERVISOR | {:?} -> {:?}", from, to);
            }
            AppEvent::AutotuneFinished {
                mode,
                gains,
                fallback,
            } => match fallback {
                Some(reason) => warn!(
                    "TUNE  | {mode} defaults adopted ({reason}): kp={:.3} ki={:.3} kd={:.3}",
                    gains.kp, gains.ki, gains.kd
                ),
                None => info!(
                    "TUNE  | {mode} gains adopted: kp={:.3} ki={:.3} kd={:.3}",
                    gains.kp, gains.ki, gains.kd
                ),
            },
            AppEvent::AutotuneAborted(reason) => warn!("TUNE  | aborted: {reason}"),
            AppEvent::ProfileCancelled => warn!("PROFILE | cancelled"),
            AppEvent::CommandRejected(e) => warn!("CMD   | rejected: {e}"),
            AppEvent::ConfigRepaired(field) => {
                warn!("CONFIG | {} repaired to default", field.key());
            }
            AppEvent::ConfigSaved => info!("CONFIG | saved"),
            AppEvent::StartupClampReleased => info!("CLAMP | startup ceiling released"),
        }
    }
}
