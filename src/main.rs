//! Hypotherm host simulator.
//!
//! Runs the control core against a simulated plate, with the same
//! adapters a bench build would wire in.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimPlant          SimSink        ParamStore    SimClock /     │
//! │  (Sensor+Actuator) (EventSink)    (ConfigPort)  MonotonicClock │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Supervisor · PID · Governor · Autotune                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  CommandInbox (drained at tick boundaries)                     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use hypotherm::adapters::log_sink::LogEventSink;
use hypotherm::adapters::memory_store::MemoryStorage;
use hypotherm::adapters::param_store::ParamStore;
use hypotherm::adapters::sim_plant::SimPlant;
use hypotherm::adapters::time::{MonotonicClock, SimClock};
use hypotherm::app::commands::AppCommand;
use hypotherm::app::events::AppEvent;
use hypotherm::app::inbox::CommandInbox;
use hypotherm::app::ports::{ClockPort, EventSink};
use hypotherm::app::service::AppService;
use hypotherm::config::CoreConfig;
use hypotherm::control::Mode;
use hypotherm::control::autotune::AutotuneStatus;
use hypotherm::error::Error;

#[derive(Parser, Debug)]
#[command(name = "hypotherm-sim")]
#[command(about = "Run the hypothermia control core against a simulated plate")]
#[command(version)]
struct Cli {
    /// Target plate temperature (°C)
    #[arg(long, default_value_t = 32.0)]
    target: f32,

    /// Initial plate temperature (°C)
    #[arg(long, default_value_t = 37.0)]
    initial: f32,

    /// Room temperature (°C)
    #[arg(long, default_value_t = 22.0)]
    ambient: f32,

    /// Simulated run length in seconds
    #[arg(long, default_value_t = 600)]
    duration_s: u64,

    /// JSON file with core config overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a step-response autotune before the profile
    #[arg(long, value_enum)]
    autotune: Option<TuneDirection>,

    /// Pace ticks against the wall clock instead of running flat out
    #[arg(long)]
    realtime: bool,

    /// Print telemetry snapshots as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Stop sending heartbeats after this many seconds
    #[arg(long)]
    drop_heartbeat_after_s: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TuneDirection {
    Heating,
    Cooling,
}

impl From<TuneDirection> for Mode {
    fn from(d: TuneDirection) -> Self {
        match d {
            TuneDirection::Heating => Mode::Heating,
            TuneDirection::Cooling => Mode::Cooling,
        }
    }
}

// ── Time source ───────────────────────────────────────────────

/// A clock the simulator can wait on between ticks.
trait SimTime: ClockPort {
    fn wait(&self, ms: u64);
}

impl SimTime for SimClock {
    fn wait(&self, ms: u64) {
        self.advance(ms);
    }
}

impl SimTime for MonotonicClock {
    fn wait(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

// ── Event sink ────────────────────────────────────────────────

/// Logs every event; optionally mirrors telemetry to stdout as JSON.
struct SimSink {
    log: LogEventSink,
    json: bool,
}

impl EventSink for SimSink {
    fn emit(&mut self, event: &AppEvent) {
        self.log.emit(event);
        if !self.json {
            return;
        }
        if let AppEvent::Telemetry(snapshot) = event {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("telemetry encode failed: {e}"),
            }
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<CoreConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => CoreConfig::default(),
    };
    config.validate().context("invalid core config")?;
    Ok(config)
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let cli = Cli::parse();
    info!("hypotherm-sim v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config(cli.config.as_ref())?;

    if cli.realtime {
        run(&cli, config, &MonotonicClock::new())
    } else {
        run(&cli, config, &SimClock::new(0))
    }
}

fn run(cli: &Cli, config: CoreConfig, clock: &impl SimTime) -> Result<()> {
    let tick_ms = u64::from(config.tick_interval_ms);
    let heartbeat = config.heartbeat_timeout_ms > 0;

    // ── 3. Adapters ───────────────────────────────────────────
    let mut plant = SimPlant::new(cli.initial, cli.ambient);
    let mut store = ParamStore::new(MemoryStorage::new());
    let mut sink = SimSink {
        log: LogEventSink::new(),
        json: cli.json,
    };
    let inbox: CommandInbox = CommandInbox::new();

    // ── 4. Service ────────────────────────────────────────────
    let mut app = AppService::boot(config, &mut store, clock, &mut plant, &mut sink);

    // Prime one reading so autotune has a baseline.
    app.tick(clock, &mut plant, &mut sink);
    clock.wait(tick_ms);

    inbox.post(AppCommand::SetTargetTemp(cli.target))?;
    let mut tuning = false;
    match cli.autotune {
        Some(direction) => {
            inbox.post(AppCommand::StartAutotune {
                step_percent: None,
                direction: direction.into(),
                target_delta: 2.0,
            })?;
            tuning = true;
        }
        None => inbox.post(AppCommand::Start)?,
    }

    // ── 5. Control loop ───────────────────────────────────────
    let start = clock.now_ms();
    let end = start.saturating_add(cli.duration_s.saturating_mul(1_000));
    let heartbeat_until = cli
        .drop_heartbeat_after_s
        .map(|s| start.saturating_add(s.saturating_mul(1_000)));
    let mut last = start;

    while clock.now_ms() < end {
        let now = clock.now_ms();
        plant.advance(now.saturating_sub(last) as f32 / 1_000.0);
        last = now;

        if heartbeat && heartbeat_until.is_none_or(|until| now < until) {
            inbox.post(AppCommand::HeartbeatReceived)?;
        }

        app.drain_inbox(&inbox, clock, &mut plant, &mut sink);
        app.tick(clock, &mut plant, &mut sink);

        if tuning && app.autotuner().status() != AutotuneStatus::Running {
            tuning = false;
            inbox.post(AppCommand::Start)?;
        }

        app.auto_save_if_needed(now, &mut store, &mut sink);
        clock.wait(tick_ms);
    }

    // ── 6. Shutdown ───────────────────────────────────────────
    app.persist_if_dirty(&mut store, &mut sink);
    app.handle_command(AppCommand::Stop, clock, &mut plant, &mut sink)?;

    let state = app.controller_state();
    info!(
        "done: T={:.2} C target={:.2} C supervisor={:?} ticks={}",
        plant.temperature(),
        state.setpoint,
        app.supervisor_mode(),
        app.tick_count()
    );
    if let Some(trip) = state.trip {
        return Err(Error::Safety(trip).into());
    }
    Ok(())
}
