use anyhow::{Context, ensure};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use shaker_keypad::{COLS, KeypadConfig, Polarity, ROWS};
use shaker_motor::{DecayMode, Drv8833Config};
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Pin number used in the config file for a matrix line that is not wired.
pub const UNBOUND_PIN: i64 = -1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotorSettings {
    pub in1_pin: u8,
    pub in2_pin: u8,
    /// nSLEEP line; absent when the pin is strapped high on the board.
    pub sleep_pin: Option<u8>,
    pub speed_threshold: u8,
    pub decay: DecayMode,
    /// Percent added or removed by the speed up/down keys.
    pub speed_step: u8,
}

impl Default for MotorSettings {
    fn default() -> Self {
        let driver = Drv8833Config::default();
        Self {
            in1_pin: 9,
            in2_pin: 10,
            sleep_pin: None,
            speed_threshold: driver.speed_threshold,
            decay: driver.decay,
            speed_step: 10,
        }
    }
}

impl MotorSettings {
    pub fn driver_config(&self) -> Drv8833Config {
        Drv8833Config {
            speed_threshold: self.speed_threshold,
            decay: self.decay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeypadSettings {
    pub confirmation_threshold: u8,
    pub polarity: Polarity,
    /// Column output pins, `-1` for an unwired column.
    pub column_pins: Vec<i64>,
    /// Row input pins, `-1` for an unwired row.
    pub row_pins: Vec<i64>,
}

impl Default for KeypadSettings {
    fn default() -> Self {
        let keypad = KeypadConfig::default();
        Self {
            confirmation_threshold: keypad.confirmation_threshold,
            polarity: keypad.polarity,
            column_pins: vec![2, 3, 4, 5],
            row_pins: vec![6, 7, 8, 11],
        }
    }
}

impl KeypadSettings {
    pub fn keypad_config(&self) -> KeypadConfig {
        KeypadConfig {
            confirmation_threshold: self.confirmation_threshold,
            polarity: self.polarity,
        }
    }

    pub fn columns(&self) -> [Option<u8>; COLS] {
        core::array::from_fn(|i| self.column_pins.get(i).copied().and_then(to_pin))
    }

    pub fn rows(&self) -> [Option<u8>; ROWS] {
        core::array::from_fn(|i| self.row_pins.get(i).copied().and_then(to_pin))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Loop period; one keypad column is strobed per tick.
    pub tick_us: u64,
    /// Number of ticks to simulate.
    pub ticks: u64,
    /// How long the lock key keeps the keypad disabled.
    pub lock_ticks: u64,
    /// Sleep between ticks; when false the loop runs as fast as it can.
    pub realtime: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tick_us: 1_000,
            ticks: 2_000,
            lock_ticks: 200,
            realtime: true,
        }
    }
}

/// One simulated key press.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedPress {
    pub at_tick: u64,
    pub row: usize,
    pub col: usize,
    pub hold_ticks: u64,
    /// Number of chattering reads after the contact closes and after it opens.
    #[serde(default)]
    pub bounce_reads: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShakerConfig {
    pub motor: MotorSettings,
    pub keypad: KeypadSettings,
    pub run: RunSettings,
    pub script: Vec<ScriptedPress>,
}

impl ShakerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=100).contains(&self.motor.speed_step),
            "motor.speed_step must be in 1..=100, got {}",
            self.motor.speed_step
        );
        ensure!(
            self.motor.speed_threshold <= 100,
            "motor.speed_threshold must be at most 100, got {}",
            self.motor.speed_threshold
        );
        ensure!(
            self.motor.in1_pin != self.motor.in2_pin,
            "motor.in1_pin and motor.in2_pin must differ"
        );

        check_pins("keypad.column_pins", &self.keypad.column_pins, COLS)?;
        check_pins("keypad.row_pins", &self.keypad.row_pins, ROWS)?;

        let mut used: Vec<i64> = self
            .keypad
            .column_pins
            .iter()
            .chain(self.keypad.row_pins.iter())
            .copied()
            .filter(|pin| *pin != UNBOUND_PIN)
            .collect();
        used.extend([self.motor.in1_pin, self.motor.in2_pin].map(i64::from));
        used.extend(self.motor.sleep_pin.map(i64::from));
        let total = used.len();
        used.sort_unstable();
        used.dedup();
        ensure!(used.len() == total, "a pin is assigned to more than one line");

        ensure!(self.run.tick_us > 0, "run.tick_us must be positive");
        for (i, press) in self.script.iter().enumerate() {
            ensure!(
                press.row < ROWS && press.col < COLS,
                "script[{}] key ({}, {}) is outside the 4x4 matrix",
                i,
                press.row,
                press.col
            );
        }
        Ok(())
    }
}

fn check_pins(name: &str, pins: &[i64], expected: usize) -> anyhow::Result<()> {
    ensure!(
        pins.len() == expected,
        "{} must list {} pins, got {}",
        name,
        expected,
        pins.len()
    );
    for pin in pins {
        ensure!(
            *pin == UNBOUND_PIN || (0..=i64::from(u8::MAX - 1)).contains(pin),
            "{} contains invalid pin {}",
            name,
            pin
        );
    }
    Ok(())
}

fn to_pin(raw: i64) -> Option<u8> {
    u8::try_from(raw).ok()
}

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .build();

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration from {}", path);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

/// Load, deserialize and validate the shaker configuration.
pub fn load_shaker_config(path: &str) -> anyhow::Result<ShakerConfig> {
    let shaker: ShakerConfig = load_config(path)?
        .try_deserialize()
        .with_context(|| format!("malformed configuration in {}", path))?;
    shaker.validate()?;
    Ok(shaker)
}
