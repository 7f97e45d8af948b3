//! AppService → controller → actuator pipeline.
//!
//! Drives the service tick by tick against a plate whose temperature the
//! test sets directly, and checks what reaches the actuator.

use hypotherm::adapters::memory_store::MemoryStorage;
use hypotherm::adapters::param_store::ParamStore;
use hypotherm::app::commands::AppCommand;
use hypotherm::app::events::AppEvent;
use hypotherm::app::inbox::CommandInbox;
use hypotherm::app::ports::ConfigPort;
use hypotherm::app::service::AppService;
use hypotherm::config::{ControlParameters, CoreConfig, ParamField};
use hypotherm::control::Mode;
use hypotherm::error::{CommandError, SafetyTrip};
use hypotherm::safety::SupervisorMode;

use crate::mock_hw::{ActuatorCall, MockClock, MockPlate, RecordingSink};

fn quiet_config() -> CoreConfig {
    CoreConfig {
        startup_clamp_ms: 0,
        telemetry_interval_ms: 0,
        ..CoreConfig::default()
    }
}

fn make_app(config: CoreConfig, plate_c: f32) -> (AppService, MockClock, MockPlate, RecordingSink) {
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(plate_c);
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(config, ControlParameters::default(), 0);
    app.start(&mut plate, &mut sink);
    (app, clock, plate, sink)
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn boot_drives_neutral_and_persists_defaults_quietly() {
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(37.0);
    let mut sink = RecordingSink::new();
    let mut store = ParamStore::new(MemoryStorage::new());

    let app = AppService::boot(quiet_config(), &mut store, &clock, &mut plate, &mut sink);

    assert_eq!(plate.calls, vec![ActuatorCall::Neutral]);
    assert!(sink.any(|e| matches!(e, AppEvent::Started)));
    assert!(!sink.any(|e| matches!(e, AppEvent::ConfigRepaired(_))));
    assert_eq!(*app.params(), ControlParameters::default());
    assert_eq!(store.storage().len(), ParamField::ALL.len());
    assert!(!app.controller_state().active, "controller waits for Start");
}

#[test]
fn idle_controller_holds_plate_neutral() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 30.0);
    for t in 0..20 {
        clock.set(t * 100);
        app.tick(&clock, &mut plate, &mut sink);
        assert!(plate.is_neutral());
    }
}

// ── Mode arbitration through the service ──────────────────────

#[test]
fn below_target_heats_with_cooling_pid_idle() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 36.0);
    app.handle_command(AppCommand::SetTargetTemp(37.0), &clock, &mut plate, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();

    app.tick(&clock, &mut plate, &mut sink);

    let s = app.controller_state();
    assert_eq!(app.mode(), Mode::Heating);
    assert!(!s.cooling_mode);
    assert_eq!(s.cooling_output, 0.0);
    assert!(s.heating_output > 0.0);
    assert!(plate.last_duty().unwrap() > 0);
}

#[test]
fn above_target_cools_with_negative_duty() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 37.0);
    app.handle_command(AppCommand::SetTargetTemp(32.0), &clock, &mut plate, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();

    app.tick(&clock, &mut plate, &mut sink);

    assert_eq!(app.mode(), Mode::Cooling);
    assert_eq!(app.controller_state().heating_output, 0.0);
    // kp·error = -5, smoothed by 0.2 → -1 % → -10 of 1000.
    assert_eq!(plate.last_duty(), Some(-10));
}

#[test]
fn stop_releases_plate_immediately() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 30.0);
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    app.tick(&clock, &mut plate, &mut sink);
    assert!(!plate.is_neutral());

    app.handle_command(AppCommand::Stop, &clock, &mut plate, &mut sink)
        .unwrap();
    assert!(plate.is_neutral());
    assert!(!app.controller_state().active);

    clock.set(100);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(plate.is_neutral());
}

// ── Command validation ────────────────────────────────────────

#[test]
fn out_of_band_target_is_rejected_without_change() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 37.0);
    let err = app
        .handle_command(AppCommand::SetTargetTemp(50.0), &clock, &mut plate, &mut sink)
        .unwrap_err();
    assert!(matches!(err, CommandError::TargetTemperature(_)));
    assert!(sink.any(|e| matches!(e, AppEvent::CommandRejected(CommandError::TargetTemperature(_)))));
    assert_eq!(app.controller_state().setpoint, 37.0);
}

#[test]
fn output_limits_are_clamped_and_marked_dirty() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 37.0);
    app.handle_command(
        AppCommand::SetOutputLimits {
            cooling: -150.0,
            heating: 80.0,
        },
        &clock,
        &mut plate,
        &mut sink,
    )
    .unwrap();
    assert_eq!(app.params().cooling_limit, -100.0);
    assert_eq!(app.params().heating_limit, 80.0);
    assert!(app.is_params_dirty());
}

#[test]
fn all_zero_gains_are_rejected() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 37.0);
    let res = app.handle_command(
        AppCommand::SetCoolingPid(hypotherm::config::PidGains::new(0.0, 0.0, 0.0)),
        &clock,
        &mut plate,
        &mut sink,
    );
    assert!(matches!(res, Err(CommandError::Gains(_))));
    assert_eq!(
        app.params().cooling,
        hypotherm::config::PidGains::COOLING_DEFAULT
    );
    assert!(!app.is_params_dirty());
}

// ── Safety governor through the service ───────────────────────

#[test]
fn undershoot_below_margin_trips_on_the_same_tick() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 34.0);
    app.handle_command(AppCommand::SetTargetTemp(32.0), &clock, &mut plate, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    app.tick(&clock, &mut plate, &mut sink);
    assert!(app.controller_state().cooling_mode);

    // setpoint - margin - 0.01, reached slowly enough to stay under the rate limit.
    plate.temperature = 32.0 - 1.5 - 0.01;
    clock.set(10_000);
    app.tick(&clock, &mut plate, &mut sink);

    let s = app.controller_state();
    assert!(s.emergency_stop);
    assert!(matches!(s.trip, Some(SafetyTrip::BelowSafetyMargin { .. })));
    assert_eq!(s.final_output, 0.0);
    assert!(plate.is_neutral());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SafetyTrip(SafetyTrip::BelowSafetyMargin { .. }))),
        1
    );
}

#[test]
fn rate_trip_stays_latched_until_cleared() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 37.0);
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    app.tick(&clock, &mut plate, &mut sink);

    // -3 C/s against a 2 C/s limit.
    plate.temperature = 36.7;
    clock.set(100);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(matches!(
        app.controller_state().trip,
        Some(SafetyTrip::RateExceeded { .. })
    ));

    plate.temperature = 30.0;
    for i in 2..60 {
        clock.set(i * 1_000);
        app.tick(&clock, &mut plate, &mut sink);
        assert!(app.controller_state().emergency_stop);
        assert!(plate.is_neutral());
    }
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SafetyTrip(_))), 1);

    app.handle_command(AppCommand::SetEmergencyStop(false), &clock, &mut plate, &mut sink)
        .unwrap();
    assert!(sink.any(|e| matches!(e, AppEvent::EmergencyStopCleared)));
    clock.set(61_000);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(!app.controller_state().emergency_stop);
    assert!(plate.last_duty().unwrap() > 0, "heating resumes toward 37 C");
}

#[test]
fn manual_emergency_stop_latches() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 30.0);
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    app.tick(&clock, &mut plate, &mut sink);

    app.handle_command(AppCommand::SetEmergencyStop(true), &clock, &mut plate, &mut sink)
        .unwrap();
    assert!(plate.is_neutral());
    assert_eq!(app.controller_state().trip, Some(SafetyTrip::Manual));

    clock.set(100);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(plate.is_neutral());
}

// ── Startup clamp ─────────────────────────────────────────────

#[test]
fn startup_clamp_holds_persisted_limit_for_sixty_seconds() {
    let mut store = ParamStore::new(MemoryStorage::new());
    store.save_field(ParamField::HeatingLimit, 60.0).unwrap();
    let config = CoreConfig {
        telemetry_interval_ms: 0,
        ..CoreConfig::default()
    };
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(20.0);
    let mut sink = RecordingSink::new();
    let mut app = AppService::boot(config, &mut store, &clock, &mut plate, &mut sink);

    assert_eq!(app.params().heating_limit, 60.0);
    assert_eq!(app.effective_limits().heating, 20.0);
    assert!(app.startup_clamp_active());

    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    for t in (0..60_000).step_by(100) {
        clock.set(t);
        app.tick(&clock, &mut plate, &mut sink);
        assert!(app.applied_output() <= 20.0);
        assert_eq!(app.params().heating_limit, 60.0, "persisted value stays visible");
    }
    assert!(!sink.any(|e| matches!(e, AppEvent::StartupClampReleased)));

    clock.set(60_000);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(!app.startup_clamp_active());
    assert_eq!(app.effective_limits().heating, 60.0);

    for t in (60_100..70_000).step_by(100) {
        clock.set(t);
        app.tick(&clock, &mut plate, &mut sink);
    }
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::StartupClampReleased)),
        1
    );
    assert!(app.applied_output() > 20.0);
}

#[test]
fn startup_clamp_releases_while_in_failsafe() {
    let mut store = ParamStore::new(MemoryStorage::new());
    store.save_field(ParamField::HeatingLimit, 60.0).unwrap();
    let config = CoreConfig {
        telemetry_interval_ms: 0,
        ..CoreConfig::default()
    };
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(30.0);
    let mut sink = RecordingSink::new();
    let mut app = AppService::boot(config, &mut store, &clock, &mut plate, &mut sink);
    app.handle_command(AppCommand::BreathStopped, &clock, &mut plate, &mut sink)
        .unwrap();

    clock.set(60_000);
    app.tick(&clock, &mut plate, &mut sink);

    assert_eq!(app.supervisor_mode(), SupervisorMode::Failsafe);
    assert!(!app.startup_clamp_active());
    assert_eq!(app.effective_limits().heating, 60.0);
    assert_eq!(app.status().effective_limits.heating, 60.0);
    assert!(!app.status().startup_clamp_active);
    assert!(sink.any(|e| matches!(e, AppEvent::StartupClampReleased)));
    assert!(plate.is_neutral());
}

#[test]
fn startup_clamp_releases_on_a_command_between_ticks() {
    let mut store = ParamStore::new(MemoryStorage::new());
    store.save_field(ParamField::HeatingLimit, 60.0).unwrap();
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(30.0);
    let mut sink = RecordingSink::new();
    let config = CoreConfig {
        telemetry_interval_ms: 0,
        ..CoreConfig::default()
    };
    let mut app = AppService::boot(config, &mut store, &clock, &mut plate, &mut sink);

    clock.set(60_000);
    app.handle_command(AppCommand::SetTargetTemp(33.0), &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.effective_limits().heating, 60.0);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::StartupClampReleased)),
        1
    );
}

// ── Inbox and telemetry ───────────────────────────────────────

#[test]
fn inbox_commands_apply_at_the_tick_boundary() {
    let (mut app, clock, mut plate, mut sink) = make_app(quiet_config(), 37.0);
    let inbox: CommandInbox = CommandInbox::new();
    inbox.post(AppCommand::SetTargetTemp(33.0)).unwrap();
    inbox.post(AppCommand::SetTargetTemp(99.0)).unwrap();
    inbox.post(AppCommand::Start).unwrap();

    assert_eq!(app.controller_state().setpoint, 37.0, "nothing applied before drain");
    let handled = app.drain_inbox(&inbox, &clock, &mut plate, &mut sink);
    assert_eq!(handled, 3);
    assert_eq!(app.controller_state().setpoint, 33.0);
    assert!(app.controller_state().active);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected(_))), 1);
    assert_eq!(app.drain_inbox(&inbox, &clock, &mut plate, &mut sink), 0);
}

#[test]
fn telemetry_follows_its_interval() {
    let config = CoreConfig {
        startup_clamp_ms: 0,
        telemetry_interval_ms: 1_000,
        ..CoreConfig::default()
    };
    let (mut app, clock, mut plate, mut sink) = make_app(config, 36.0);
    for t in (0..=2_500).step_by(100) {
        clock.set(t);
        app.tick(&clock, &mut plate, &mut sink);
    }
    // t = 0, 1000, 2000
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 3);

    let Some(AppEvent::Telemetry(last)) = sink
        .events
        .iter()
        .rev()
        .find(|e| matches!(e, AppEvent::Telemetry(_)))
    else {
        panic!("no telemetry");
    };
    assert_eq!(last.uptime_ms, 2_000);
    assert_eq!(last.controller.input, 36.0);
    let json = serde_json::to_string(last).unwrap();
    assert!(json.contains("\"supervisor\":\"Normal\""));
}
