//! Parameter persistence through the service and the flash-style store.

use hypotherm::adapters::memory_store::MemoryStorage;
use hypotherm::adapters::param_store::{PARAM_NAMESPACE, ParamStore};
use hypotherm::app::commands::AppCommand;
use hypotherm::app::events::AppEvent;
use hypotherm::app::legacy::{self, LegacyCommand};
use hypotherm::app::ports::ConfigPort;
use hypotherm::app::service::{AUTO_SAVE_DELAY_MS, AppService};
use hypotherm::config::{CoreConfig, ParamField, PidGains};
use hypotherm::control::Mode;

use crate::mock_hw::{MockClock, MockPlate, RecordingSink};

fn config() -> CoreConfig {
    CoreConfig {
        startup_clamp_ms: 0,
        telemetry_interval_ms: 0,
        ..CoreConfig::default()
    }
}

#[test]
fn tuned_gains_survive_a_reboot() {
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(37.0);
    let mut sink = RecordingSink::new();
    let mut store = ParamStore::new(MemoryStorage::new());
    let mut app = AppService::boot(config(), &mut store, &clock, &mut plate, &mut sink);

    let gains = PidGains::new(4.0, 0.25, 1.5);
    app.handle_command(AppCommand::SetHeatingPid(gains), &clock, &mut plate, &mut sink)
        .unwrap();
    assert!(app.is_params_dirty());

    // Debounced: nothing written until the quiet period has passed.
    assert!(!app.auto_save_if_needed(AUTO_SAVE_DELAY_MS - 1, &mut store, &mut sink));
    assert!(app.auto_save_if_needed(AUTO_SAVE_DELAY_MS, &mut store, &mut sink));
    assert!(!app.is_params_dirty());
    assert!(sink.any(|e| matches!(e, AppEvent::ConfigSaved)));
    assert_eq!(store.load_field(ParamField::HeatingKp), Ok(4.0));

    let mut sink = RecordingSink::new();
    let rebooted = AppService::boot(config(), &mut store, &clock, &mut plate, &mut sink);
    assert_eq!(rebooted.params().heating, gains);
}

#[test]
fn corrupt_field_is_repaired_on_boot() {
    let mut store = ParamStore::new(MemoryStorage::new());
    for field in ParamField::ALL {
        store.save_field(field, field.default_value()).unwrap();
    }
    store.save_field(ParamField::SafetyMargin, 42.0).unwrap();
    store
        .storage()
        .put_raw(PARAM_NAMESPACE, ParamField::CoolingKp.key(), &[0xFF]);

    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(37.0);
    let mut sink = RecordingSink::new();
    let app = AppService::boot(config(), &mut store, &clock, &mut plate, &mut sink);

    assert_eq!(app.params().safety_margin, 1.5);
    assert_eq!(app.params().cooling.kp, PidGains::COOLING_DEFAULT.kp);
    assert!(sink.any(|e| matches!(e, AppEvent::ConfigRepaired(ParamField::SafetyMargin))));
    assert!(sink.any(|e| matches!(e, AppEvent::ConfigRepaired(ParamField::CoolingKp))));
    assert_eq!(store.load_field(ParamField::SafetyMargin), Ok(1.5));
}

#[test]
fn failed_save_keeps_params_dirty() {
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(37.0);
    let mut sink = RecordingSink::new();
    let mut app = AppService::boot(
        config(),
        &mut ParamStore::new(MemoryStorage::new()),
        &clock,
        &mut plate,
        &mut sink,
    );
    app.handle_command(AppCommand::SetCoolingRateLimit(1.0), &clock, &mut plate, &mut sink)
        .unwrap();

    let mut full = ParamStore::new(MemoryStorage::with_capacity(0));
    assert!(!app.persist_if_dirty(&mut full, &mut sink));
    assert!(app.is_params_dirty());
    assert!(!sink.any(|e| matches!(e, AppEvent::ConfigSaved)));
}

#[test]
fn legacy_single_pid_requests_reach_both_modes() {
    let clock = MockClock::at(0);
    let mut plate = MockPlate::at(37.0);
    let mut sink = RecordingSink::new();
    let mut app = AppService::boot(
        config(),
        &mut ParamStore::new(MemoryStorage::new()),
        &clock,
        &mut plate,
        &mut sink,
    );

    for req in [
        LegacyCommand::SetPid {
            kp: 5.0,
            ki: 0.5,
            kd: 0.5,
        },
        LegacyCommand::SetOutputLimit(45.0),
    ] {
        for cmd in legacy::translate(req) {
            app.handle_command(cmd, &clock, &mut plate, &mut sink)
                .unwrap();
        }
    }

    assert_eq!(app.params().heating, PidGains::new(5.0, 0.5, 0.5));
    assert_eq!(app.params().cooling, PidGains::new(5.0, 0.5, 0.5));
    let view = legacy::get_pid(app.params(), Mode::Heating);
    assert_eq!(view.output_limit, 45.0);
    assert_eq!(app.params().cooling_limit, -45.0);
}
