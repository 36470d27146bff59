//! Simulated bench hardware.
//!
//! Every simulated line implements the `embedded-hal` traits the drivers expect, and keeps
//! its state in a shared cell so the control loop can observe what the drivers did.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use shaker_keypad::{COLS, Polarity, ROWS};

/// Timer resolution of the simulated PWM peripheral.
pub const SIM_MAX_DUTY: u16 = 4095;

/// What an H-bridge input is currently outputting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOutput {
    #[default]
    Low,
    High,
    Pwm {
        duty: u16,
        max: u16,
    },
}

impl fmt::Display for ChannelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOutput::Low => write!(f, "LOW"),
            ChannelOutput::High => write!(f, "HIGH"),
            ChannelOutput::Pwm { duty, max } => {
                write!(f, "PWM {:.1}%", f64::from(*duty) * 100.0 / f64::from(*max))
            }
        }
    }
}

/// H-bridge input that can hold a static level or a PWM duty.
pub struct SimChannel {
    pin: u8,
    output: Rc<Cell<ChannelOutput>>,
}

impl SimChannel {
    pub fn new(pin: u8) -> (Self, Rc<Cell<ChannelOutput>>) {
        let output = Rc::new(Cell::new(ChannelOutput::Low));
        (
            Self {
                pin,
                output: Rc::clone(&output),
            },
            output,
        )
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }
}

impl digital::ErrorType for SimChannel {
    type Error = Infallible;
}

impl OutputPin for SimChannel {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.output.set(ChannelOutput::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.output.set(ChannelOutput::High);
        Ok(())
    }
}

impl pwm::ErrorType for SimChannel {
    type Error = Infallible;
}

impl SetDutyCycle for SimChannel {
    fn max_duty_cycle(&self) -> u16 {
        SIM_MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.output.set(ChannelOutput::Pwm {
            duty: duty.min(SIM_MAX_DUTY),
            max: SIM_MAX_DUTY,
        });
        Ok(())
    }
}

/// Plain digital output, used for the bridge sleep line.
pub struct SimLine {
    high: Rc<Cell<bool>>,
}

impl SimLine {
    pub fn new() -> (Self, Rc<Cell<bool>>) {
        let high = Rc::new(Cell::new(false));
        (
            Self {
                high: Rc::clone(&high),
            },
            high,
        )
    }
}

impl digital::ErrorType for SimLine {
    type Error = Infallible;
}

impl OutputPin for SimLine {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high.set(true);
        Ok(())
    }
}

/// One key contact. While `chatter` is non-zero each read flips the reported level.
#[derive(Debug, Clone, Copy, Default)]
struct Contact {
    closed: bool,
    chatter: u32,
    bounce_level: bool,
}

impl Contact {
    fn read(&mut self) -> bool {
        if self.chatter == 0 {
            return self.closed;
        }
        self.chatter -= 1;
        self.bounce_level = !self.bounce_level;
        self.bounce_level
    }
}

#[derive(Debug)]
struct MatrixState {
    polarity: Polarity,
    column_high: [bool; COLS],
    contacts: [[Contact; COLS]; ROWS],
}

/// Physical key matrix shared by the simulated column and row lines.
#[derive(Clone)]
pub struct SimMatrix {
    state: Rc<RefCell<MatrixState>>,
}

impl SimMatrix {
    pub fn new(polarity: Polarity) -> Self {
        let idle = polarity.column_level(false);
        Self {
            state: Rc::new(RefCell::new(MatrixState {
                polarity,
                column_high: [idle; COLS],
                contacts: [[Contact::default(); COLS]; ROWS],
            })),
        }
    }

    pub fn column(&self, col: usize) -> SimColumn {
        SimColumn {
            col,
            matrix: self.clone(),
        }
    }

    pub fn row(&self, row: usize) -> SimRow {
        SimRow {
            row,
            matrix: self.clone(),
        }
    }

    /// Close a key contact. The first `bounce_reads` reads chatter before it settles.
    pub fn press(&self, row: usize, col: usize, bounce_reads: u32) {
        self.set_contact(row, col, true, bounce_reads);
    }

    /// Open a key contact, with the same chatter behaviour as [`SimMatrix::press`].
    pub fn release(&self, row: usize, col: usize, bounce_reads: u32) {
        self.set_contact(row, col, false, bounce_reads);
    }

    /// Number of columns currently driven live.
    pub fn live_columns(&self) -> usize {
        let state = self.state.borrow();
        let live = state.polarity.column_level(true);
        state.column_high.iter().filter(|high| **high == live).count()
    }

    fn set_contact(&self, row: usize, col: usize, closed: bool, bounce_reads: u32) {
        let mut state = self.state.borrow_mut();
        let contact = &mut state.contacts[row][col];
        contact.closed = closed;
        contact.chatter = bounce_reads;
        contact.bounce_level = closed;
    }
}

/// Strobed matrix column.
pub struct SimColumn {
    col: usize,
    matrix: SimMatrix,
}

impl digital::ErrorType for SimColumn {
    type Error = Infallible;
}

impl OutputPin for SimColumn {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.matrix.state.borrow_mut().column_high[self.col] = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.matrix.state.borrow_mut().column_high[self.col] = true;
        Ok(())
    }
}

/// Matrix row input. Reads the contacts sitting on the live columns.
pub struct SimRow {
    row: usize,
    matrix: SimMatrix,
}

impl digital::ErrorType for SimRow {
    type Error = Infallible;
}

impl InputPin for SimRow {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let mut state = self.matrix.state.borrow_mut();
        let live = state.polarity.column_level(true);
        let mut closed = false;
        for col in 0..COLS {
            if state.column_high[col] == live && state.contacts[self.row][col].read() {
                closed = true;
            }
        }
        Ok(if closed { live } else { !live })
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}
