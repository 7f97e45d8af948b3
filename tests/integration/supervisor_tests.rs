//! Supervisor override: failsafe and panic gate the whole control path.

use hypotherm::app::commands::AppCommand;
use hypotherm::app::events::AppEvent;
use hypotherm::app::service::AppService;
use hypotherm::config::{ControlParameters, CoreConfig};
use hypotherm::error::CommandError;
use hypotherm::safety::supervisor::reason_text;
use hypotherm::safety::{FailsafeReason, SupervisorMode};

use crate::mock_hw::{MockClock, MockPlate, RecordingSink};

fn running_app(plate_c: f32) -> (AppService, MockClock, MockPlate, RecordingSink) {
    let config = CoreConfig {
        startup_clamp_ms: 0,
        telemetry_interval_ms: 0,
        ..CoreConfig::default()
    };
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(plate_c);
    let mut sink = RecordingSink::new();
    let mut app = AppService::new(config, ControlParameters::default(), 0);
    app.start(&mut plate, &mut sink);
    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    app.tick(&clock, &mut plate, &mut sink);
    (app, clock, plate, sink)
}

#[test]
fn panic_then_failsafe_keeps_panic_only() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);

    app.handle_command(AppCommand::TriggerPanic(reason_text("x")), &clock, &mut plate, &mut sink)
        .unwrap();
    app.handle_command(
        AppCommand::TriggerFailsafe(reason_text("y")),
        &clock,
        &mut plate,
        &mut sink,
    )
    .unwrap();

    let sup = app.supervisor();
    assert!(sup.is_panic_active());
    assert!(!sup.is_failsafe_active());
    assert_eq!(sup.failsafe_reason(), None);
    assert_eq!(sup.panic_reason(), Some("x"));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SupervisorChanged { .. })),
        1
    );
}

#[test]
fn entering_failsafe_releases_plate_in_the_same_call() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);
    assert!(!plate.is_neutral());

    app.handle_command(AppCommand::BreathStopped, &clock, &mut plate, &mut sink)
        .unwrap();

    assert!(plate.is_neutral());
    assert_eq!(app.supervisor_mode(), SupervisorMode::Failsafe);
    assert_eq!(
        app.supervisor().failsafe_reason(),
        Some(&FailsafeReason::NoBreathingDetected)
    );
    assert!(!app.controller_state().active);
    assert!(sink.any(|e| matches!(e, AppEvent::ProfileCancelled)));
    assert!(sink.any(|e| matches!(
        e,
        AppEvent::SupervisorChanged {
            from: SupervisorMode::Normal,
            to: SupervisorMode::Failsafe
        }
    )));
}

#[test]
fn ticks_stay_neutral_while_not_normal() {
    let (mut app, clock, mut plate, mut sink) = running_app(25.0);
    app.handle_command(AppCommand::TriggerPanic(reason_text("button")), &clock, &mut plate, &mut sink)
        .unwrap();

    for t in 1..50 {
        clock.set(t * 100);
        plate.temperature = 25.0 + t as f32 * 0.01;
        app.tick(&clock, &mut plate, &mut sink);
        assert_eq!(plate.last_duty(), Some(0));
    }
}

#[test]
fn start_is_rejected_until_failsafe_clears() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);
    app.handle_command(AppCommand::BreathStopped, &clock, &mut plate, &mut sink)
        .unwrap();

    let res = app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink);
    assert_eq!(res, Err(CommandError::SupervisorLocked));
    assert!(sink.any(|e| matches!(e, AppEvent::CommandRejected(CommandError::SupervisorLocked))));

    // Disabling the breath check is the reason-matched recovery.
    app.handle_command(AppCommand::SetBreathCheckEnabled(false), &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.supervisor_mode(), SupervisorMode::Normal);

    // Recovery does not re-arm the controller on its own.
    clock.set(100);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(plate.is_neutral());

    app.handle_command(AppCommand::Start, &clock, &mut plate, &mut sink)
        .unwrap();
    clock.set(200);
    app.tick(&clock, &mut plate, &mut sink);
    assert!(!plate.is_neutral());
}

#[test]
fn breath_stop_is_ignored_while_check_disabled() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);
    app.handle_command(AppCommand::SetBreathCheckEnabled(false), &clock, &mut plate, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::BreathStopped, &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.supervisor_mode(), SupervisorMode::Normal);
    assert!(app.controller_state().active);
}

#[test]
fn heartbeat_timeout_trips_failsafe_and_heartbeat_recovers() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);
    app.handle_command(AppCommand::HeartbeatReceived, &clock, &mut plate, &mut sink)
        .unwrap();

    for t in (100..=5_000).step_by(100) {
        clock.set(t);
        app.tick(&clock, &mut plate, &mut sink);
        assert_eq!(app.supervisor_mode(), SupervisorMode::Normal);
    }

    clock.set(5_100);
    app.tick(&clock, &mut plate, &mut sink);
    assert_eq!(
        app.supervisor().failsafe_reason(),
        Some(&FailsafeReason::HeartbeatTimeout)
    );
    assert!(plate.is_neutral());

    clock.set(5_200);
    app.handle_command(AppCommand::HeartbeatReceived, &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.supervisor_mode(), SupervisorMode::Normal);
}

#[test]
fn heartbeat_does_not_clear_manual_failsafe() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);
    app.handle_command(
        AppCommand::TriggerFailsafe(reason_text("operator")),
        &clock,
        &mut plate,
        &mut sink,
    )
    .unwrap();
    app.handle_command(AppCommand::HeartbeatReceived, &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.supervisor_mode(), SupervisorMode::Failsafe);

    app.handle_command(AppCommand::ClearFailsafe, &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.supervisor_mode(), SupervisorMode::Normal);
}

#[test]
fn clearing_panic_leaves_plate_neutral() {
    let (mut app, clock, mut plate, mut sink) = running_app(30.0);
    app.handle_command(AppCommand::TriggerPanic(reason_text("x")), &clock, &mut plate, &mut sink)
        .unwrap();
    plate.clear();

    app.handle_command(AppCommand::ClearPanic, &clock, &mut plate, &mut sink)
        .unwrap();
    assert_eq!(app.supervisor_mode(), SupervisorMode::Normal);
    assert_eq!(plate.last_duty(), Some(0));
    assert!(!app.controller_state().active);
}
