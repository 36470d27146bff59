use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use shaker_keypad::*;

/// Column line that remembers whether it is driven high.
struct Column {
    high: Rc<Cell<bool>>,
}

impl ErrorType for Column {
    type Error = Infallible;
}

impl OutputPin for Column {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high.set(true);
        Ok(())
    }
}

/// Row line with a single key on column 0 whose contact follows `contact`.
struct Row {
    column_0: Rc<Cell<bool>>,
    contact: Rc<Cell<bool>>,
}

impl ErrorType for Row {
    type Error = Infallible;
}

impl InputPin for Row {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.column_0.get() && self.contact.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

fn main() -> Result<(), KeypadError> {
    let column_0 = Rc::new(Cell::new(false));
    let contact = Rc::new(Cell::new(false));

    let columns = [
        Some(Column {
            high: Rc::clone(&column_0),
        }),
        None,
        None,
        None,
    ];
    let rows = [
        Some(Row {
            column_0: Rc::clone(&column_0),
            contact: Rc::clone(&contact),
        }),
        None,
        None,
        None,
    ];
    let config = KeypadConfig {
        confirmation_threshold: 3,
        polarity: Polarity::ActiveHigh,
    };
    let mut keypad = MatrixKeypad::new(columns, rows, config);
    keypad.init()?;

    // Contact level seen on each full strobe cycle: chatter, then a clean hold, then release.
    let contact_per_cycle = [
        true, false, true, true, false, true, true, true, true, true, false, false, false,
    ];

    println!("Threshold: {}", keypad.confirmation_threshold());
    for (cycle, level) in contact_per_cycle.iter().enumerate() {
        contact.set(*level);
        for _ in 0..COLS {
            keypad.scan_step()?;
        }
        let button = keypad.button(0, 0).copied().unwrap_or_default();
        println!(
            "cycle {:>2}: contact={:<5} pressed={:<5} count={} click={}",
            cycle,
            level,
            button.is_pressed(),
            button.confirm_count(),
            keypad.take_click(0, 0),
        );
    }
    Ok(())
}
