mod panel; // key map and setpoint handling
mod settings; // TOML configuration
mod sim; // simulated bridge and key matrix

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use embedded_hal::digital::OutputPin;
use shaker_keypad::{COLS, MatrixKeypad, ROWS};
use shaker_motor::{Drv8833, MotorControl, MotorState};
use spin_sleep::SpinSleeper;
use tracing::{debug, info, warn};
use tracing_subscriber::{self, EnvFilter};

use panel::{Outcome, Panel, action_for};
use settings::{DEFAULT_CONFIG_PATH, ShakerConfig, load_shaker_config};
use sim::{ChannelOutput, SimChannel, SimColumn, SimLine, SimMatrix, SimRow};

/// Probes on the two bridge inputs, for logging what the driver emitted.
struct BridgeProbe {
    in1: Rc<Cell<ChannelOutput>>,
    in2: Rc<Cell<ChannelOutput>>,
}

#[derive(Debug, Default)]
struct RunSummary {
    ticks: u64,
    clicks: usize,
    unmapped: usize,
    locks: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::var("SHAKER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let shaker = load_shaker_config(&path)
        .with_context(|| format!("could not load shaker configuration from {}", path))?;
    info!(
        ticks = shaker.run.ticks,
        tick_us = shaker.run.tick_us,
        presses = shaker.script.len(),
        "Orbital shaker bench started"
    );

    let (in1, in1_probe) = SimChannel::new(shaker.motor.in1_pin);
    let (in2, in2_probe) = SimChannel::new(shaker.motor.in2_pin);
    info!(in1 = in1.pin(), in2 = in2.pin(), "bridge inputs bound");
    let probe = BridgeProbe {
        in1: in1_probe,
        in2: in2_probe,
    };
    let driver_config = shaker.motor.driver_config();

    match shaker.motor.sleep_pin {
        Some(pin) => {
            let (sleep, _) = SimLine::new();
            info!(pin, "bridge sleep line bound");
            let motor = Drv8833::with_sleep(in1, in2, sleep, driver_config);
            run_bench(&shaker, motor, &probe)
        }
        None => {
            let motor = Drv8833::new(in1, in2, driver_config);
            run_bench(&shaker, motor, &probe)
        }
    }
}

fn build_keypad(shaker: &ShakerConfig, matrix: &SimMatrix) -> MatrixKeypad<SimColumn, SimRow> {
    let column_pins = shaker.keypad.columns();
    let row_pins = shaker.keypad.rows();
    for (col, pin) in column_pins.iter().enumerate() {
        if pin.is_none() {
            warn!(col, "keypad column is not wired");
        }
    }
    for (row, pin) in row_pins.iter().enumerate() {
        if pin.is_none() {
            warn!(row, "keypad row is not wired");
        }
    }

    let columns: [Option<SimColumn>; COLS] =
        std::array::from_fn(|col| column_pins[col].map(|_| matrix.column(col)));
    let rows: [Option<SimRow>; ROWS] =
        std::array::from_fn(|row| row_pins[row].map(|_| matrix.row(row)));
    MatrixKeypad::new(columns, rows, shaker.keypad.keypad_config())
}

fn run_bench<S: OutputPin>(
    shaker: &ShakerConfig,
    mut motor: Drv8833<SimChannel, SimChannel, S>,
    probe: &BridgeProbe,
) -> anyhow::Result<()> {
    let matrix = SimMatrix::new(shaker.keypad.polarity);
    let mut keypad = build_keypad(shaker, &matrix);
    let mut panel = Panel::new(shaker.motor.speed_step);

    motor.init().context("failed to initialise motor driver")?;
    keypad.init().context("failed to initialise keypad")?;

    let sleeper = SpinSleeper::default();
    let period = Duration::from_micros(shaker.run.tick_us);
    let started = Instant::now();
    let mut summary = RunSummary::default();
    let mut locked_until: Option<u64> = None;
    let mut last_state = motor.state();
    log_motor(&last_state, probe);

    for tick in 0..shaker.run.ticks {
        let tick_start = Instant::now();

        for press in &shaker.script {
            if tick == press.at_tick {
                debug!(tick, row = press.row, col = press.col, "contact closed");
                matrix.press(press.row, press.col, press.bounce_reads);
            } else if tick == press.at_tick + press.hold_ticks {
                debug!(tick, row = press.row, col = press.col, "contact opened");
                matrix.release(press.row, press.col, press.bounce_reads);
            }
        }

        if locked_until.is_some_and(|until| tick >= until) {
            locked_until = None;
            keypad.enable();
            info!(tick, "keypad unlocked");
        }

        keypad.scan_step().context("keypad scan failed")?;

        for key in keypad.take_clicks() {
            summary.clicks += 1;
            let Some(action) = action_for(key) else {
                summary.unmapped += 1;
                debug!(key = %key, "unmapped key");
                continue;
            };
            let outcome = panel
                .apply(action, &mut motor)
                .with_context(|| format!("failed to apply {} at tick {}", action, tick))?;
            if outcome == Outcome::LockRequested && locked_until.is_none() {
                summary.locks += 1;
                keypad.disable();
                locked_until = Some(tick + shaker.run.lock_ticks);
                info!(tick, lock_ticks = shaker.run.lock_ticks, "keypad locked");
            }
        }

        let state = motor.state();
        if state != last_state {
            log_motor(&state, probe);
            last_state = state;
        }

        summary.ticks += 1;
        if shaker.run.realtime {
            if let Some(remaining) = period.checked_sub(tick_start.elapsed()) {
                sleeper.sleep(remaining);
            }
        }
    }

    motor.halt().context("failed to halt motor at shutdown")?;
    let state = motor.state();
    info!(
        ticks = summary.ticks,
        clicks = summary.clicks,
        unmapped = summary.unmapped,
        locks = summary.locks,
        setpoint = panel.setpoint(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Run finished"
    );
    println!("--- run summary ---");
    println!("ticks:     {}", summary.ticks);
    println!("clicks:    {} ({} unmapped)", summary.clicks, summary.unmapped);
    println!("locks:     {}", summary.locks);
    println!("setpoint:  {}%", panel.setpoint());
    println!(
        "motor:     {} {}% ({}), {}",
        state.direction,
        state.commanded_speed,
        state.decay,
        if state.halted { "halted" } else { "running" }
    );
    println!("IN1/IN2:   {} / {}", probe.in1.get(), probe.in2.get());
    println!("live cols: {}", matrix.live_columns());
    Ok(())
}

fn log_motor(state: &MotorState, probe: &BridgeProbe) {
    info!(
        direction = %state.direction,
        decay = %state.decay,
        commanded = state.commanded_speed,
        duty = state.normalized_speed,
        halted = state.halted,
        in1 = %probe.in1.get(),
        in2 = %probe.in2.get(),
        "motor state"
    );
}
