//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full output
//! history without touching real PWM or GPIO.

use std::cell::Cell;

use hypotherm::app::events::AppEvent;
use hypotherm::app::ports::{ActuatorPort, ClockPort, EventSink, SensorPort};

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    now: Cell<u64>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(ms: u64) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Output(i16),
    Neutral,
}

// ── MockPlate ─────────────────────────────────────────────────

/// Plate whose temperature the test sets directly.
pub struct MockPlate {
    pub temperature: f32,
    pub calls: Vec<ActuatorCall>,
}

#[allow(dead_code)]
impl MockPlate {
    pub fn at(temperature: f32) -> Self {
        Self {
            temperature,
            calls: Vec::new(),
        }
    }

    /// Signed duty most recently written (`Neutral` reads as 0).
    pub fn last_duty(&self) -> Option<i16> {
        self.calls.last().map(|c| match c {
            ActuatorCall::Output(d) => *d,
            ActuatorCall::Neutral => 0,
        })
    }

    pub fn is_neutral(&self) -> bool {
        self.last_duty().unwrap_or(0) == 0
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl SensorPort for MockPlate {
    fn read_plate_temperature(&mut self) -> f32 {
        self.temperature
    }
}

impl ActuatorPort for MockPlate {
    fn max_duty(&self) -> u16 {
        1000
    }

    fn set_output(&mut self, duty: i16) {
        self.calls.push(ActuatorCall::Output(duty));
    }

    fn neutral(&mut self) {
        self.calls.push(ActuatorCall::Neutral);
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn any(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
