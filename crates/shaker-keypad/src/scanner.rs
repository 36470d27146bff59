//! Round-robin column strobe over a 4×4 key matrix.

use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::button::{ButtonState, Transition};
use crate::error::KeypadError;
use crate::{COLS, DEFAULT_CONFIRMATION_THRESHOLD, KEYS, KeyPosition, Polarity, ROWS};

/// Static scanner parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypadConfig {
    /// Consecutive contrary reads needed before a key flips.
    pub confirmation_threshold: u8,
    /// Electrical sense of the matrix.
    pub polarity: Polarity,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            polarity: Polarity::ActiveHigh,
        }
    }
}

/// Debounced 4×4 matrix keypad.
///
/// Columns are strobed outputs and rows are inputs. A `None` entry in either array marks
/// the line as not wired: it is never driven or read, and every key on it stays released.
pub struct MatrixKeypad<C, R>
where
    C: OutputPin,
    R: InputPin,
{
    columns: [Option<C>; COLS],
    rows: [Option<R>; ROWS],
    buttons: [[ButtonState; COLS]; ROWS],
    confirmation_threshold: u8,
    polarity: Polarity,
    scan_cursor: usize,
    enabled: bool,
}

impl<C, R> MatrixKeypad<C, R>
where
    C: OutputPin,
    R: InputPin,
{
    /// Create a scanner. No line is touched until [`MatrixKeypad::init`].
    ///
    /// # Arguments
    ///
    /// * `columns`: Column output lines, `None` for an unwired column.
    /// * `rows`: Row input lines, `None` for an unwired row.
    /// * `config`: Debounce threshold and polarity.
    pub fn new(columns: [Option<C>; COLS], rows: [Option<R>; ROWS], config: KeypadConfig) -> Self {
        Self {
            columns,
            rows,
            buttons: [[ButtonState::new(); COLS]; ROWS],
            confirmation_threshold: config.confirmation_threshold,
            polarity: config.polarity,
            scan_cursor: 0,
            enabled: true,
        }
    }

    /// Drive every column idle, then make the column under the cursor live.
    ///
    /// Call once before the first [`MatrixKeypad::scan_step`], otherwise the first pass
    /// over the starting column reads it while no column is live.
    pub fn init(&mut self) -> Result<(), KeypadError> {
        for col in 0..COLS {
            self.drive_column(col, false)?;
        }
        self.drive_column(self.scan_cursor, true)
    }

    /// Scan the live column and move the strobe to the next one.
    ///
    /// Every wired row of the live column is read once and fed to its key's debouncer. The
    /// live column is then driven idle, the cursor advances (wrapping after the last
    /// column, unwired columns included), and the new column is driven live.
    ///
    /// Does nothing while the scanner is disabled. If a row read fails the error is
    /// returned before any key of the column is updated and before the cursor moves, so
    /// the same column is retried on the next call.
    pub fn scan_step(&mut self) -> Result<(), KeypadError> {
        if !self.enabled {
            return Ok(());
        }

        let col = self.scan_cursor;
        if self.columns[col].is_some() {
            // Sample the whole column before debouncing, so a failed read leaves every key
            // of the column untouched.
            let mut levels = [None; ROWS];
            for (level, pin) in levels.iter_mut().zip(self.rows.iter_mut()) {
                if let Some(pin) = pin.as_mut() {
                    *level = Some(pin.is_high().map_err(KeypadError::input)?);
                }
            }

            for (row, level_high) in levels.into_iter().enumerate() {
                let Some(level_high) = level_high else {
                    continue;
                };
                let closed = self.polarity.is_closed(level_high);

                match self.buttons[row][col].update(closed, self.confirmation_threshold) {
                    Some(Transition::Pressed) => trace!(row, col, "key pressed"),
                    Some(Transition::Released) => trace!(row, col, "key released"),
                    None => {}
                }
            }
        }

        self.drive_column(col, false)?;
        self.scan_cursor = (col + 1) % COLS;
        self.drive_column(self.scan_cursor, true)
    }

    /// Whether both lines of the key are wired. Out-of-range indices are never valid.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        row < ROWS && col < COLS && self.rows[row].is_some() && self.columns[col].is_some()
    }

    /// Resume scanning at the current cursor.
    pub fn enable(&mut self) {
        if !self.enabled {
            debug!(cursor = self.scan_cursor, "keypad enabled");
        }
        self.enabled = true;
    }

    /// Stop scanning. Key state, counters and cursor are kept as they are.
    pub fn disable(&mut self) {
        if self.enabled {
            debug!(cursor = self.scan_cursor, "keypad disabled");
        }
        self.enabled = false;
    }

    /// Whether [`MatrixKeypad::scan_step`] is currently live.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Column that the next [`MatrixKeypad::scan_step`] will read.
    #[inline]
    pub fn scan_cursor(&self) -> usize {
        self.scan_cursor
    }

    /// Consecutive contrary reads needed before a key flips.
    #[inline]
    pub fn confirmation_threshold(&self) -> u8 {
        self.confirmation_threshold
    }

    /// Electrical sense of the matrix.
    #[inline]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Debounce state of one key, `None` when out of range.
    pub fn button(&self, row: usize, col: usize) -> Option<&ButtonState> {
        self.buttons.get(row).and_then(|r| r.get(col))
    }

    /// Debounced pressed flag of one key.
    pub fn is_pressed(&self, row: usize, col: usize) -> bool {
        self.button(row, col).is_some_and(ButtonState::is_pressed)
    }

    /// Whether a click is latched on one key. Does not clear it.
    pub fn click_pending(&self, row: usize, col: usize) -> bool {
        self.button(row, col).is_some_and(ButtonState::click_pending)
    }

    /// Consume the click latch of one key.
    ///
    /// Returns `true` at most once per press: the latch is cleared by this call and is
    /// only set again by the next committed press.
    pub fn take_click(&mut self, row: usize, col: usize) -> bool {
        self.buttons
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .is_some_and(ButtonState::take_click)
    }

    /// Consume every latched click, in row-major order.
    pub fn take_clicks(&mut self) -> Vec<KeyPosition, KEYS> {
        let mut clicks = Vec::new();
        for (row, keys) in self.buttons.iter_mut().enumerate() {
            for (col, key) in keys.iter_mut().enumerate() {
                if key.take_click() {
                    // KEYS entries always fit.
                    let _ = clicks.push(KeyPosition::new(row, col));
                }
            }
        }
        clicks
    }

    /// Drop every latched click without reporting it.
    pub fn clear_clicks(&mut self) {
        self.buttons
            .iter_mut()
            .flatten()
            .for_each(|key| {
                key.take_click();
            });
    }

    /// Number of keys currently debounced as pressed.
    pub fn pressed_count(&self) -> usize {
        self.buttons
            .iter()
            .flatten()
            .filter(|key| key.is_pressed())
            .count()
    }

    /// Release the owned lines.
    pub fn release(self) -> ([Option<C>; COLS], [Option<R>; ROWS]) {
        (self.columns, self.rows)
    }

    fn drive_column(&mut self, col: usize, live: bool) -> Result<(), KeypadError> {
        let Some(pin) = self.columns[col].as_mut() else {
            return Ok(());
        };
        let result = if self.polarity.column_level(live) {
            pin.set_high()
        } else {
            pin.set_low()
        };
        result.map_err(KeypadError::output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{self, ErrorType};
    use std::cell::RefCell;
    use std::rc::Rc;

    // --- Mock Implementations ---

    /// Physical matrix shared by the mock lines.
    struct Bus {
        polarity: Polarity,
        column_high: [Option<bool>; COLS],
        closed: [[bool; COLS]; ROWS],
        reads: [usize; ROWS],
        failing_rows: [bool; ROWS],
    }

    impl Bus {
        fn live_columns(&self) -> usize {
            self.column_high
                .iter()
                .filter(|level| **level == Some(self.polarity.column_level(true)))
                .count()
        }
    }

    type SharedBus = Rc<RefCell<Bus>>;

    struct MockColumn {
        col: usize,
        bus: SharedBus,
    }

    impl ErrorType for MockColumn {
        type Error = Infallible;
    }

    impl OutputPin for MockColumn {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.bus.borrow_mut().column_high[self.col] = Some(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.bus.borrow_mut().column_high[self.col] = Some(true);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct ReadFault;

    impl digital::Error for ReadFault {
        fn kind(&self) -> digital::ErrorKind {
            digital::ErrorKind::Other
        }
    }

    struct MockRow {
        row: usize,
        bus: SharedBus,
    }

    impl ErrorType for MockRow {
        type Error = ReadFault;
    }

    impl InputPin for MockRow {
        fn is_high(&mut self) -> Result<bool, ReadFault> {
            let mut bus = self.bus.borrow_mut();
            if bus.failing_rows[self.row] {
                return Err(ReadFault);
            }
            bus.reads[self.row] += 1;
            let live = bus.polarity.column_level(true);
            let closed = (0..COLS)
                .any(|col| bus.column_high[col] == Some(live) && bus.closed[self.row][col]);
            // An open key floats to the idle level.
            Ok(if closed { live } else { !live })
        }

        fn is_low(&mut self) -> Result<bool, ReadFault> {
            self.is_high().map(|high| !high)
        }
    }

    fn keypad_with(
        columns: [bool; COLS],
        rows: [bool; ROWS],
        config: KeypadConfig,
    ) -> (MatrixKeypad<MockColumn, MockRow>, SharedBus) {
        let bus = Rc::new(RefCell::new(Bus {
            polarity: config.polarity,
            column_high: [None; COLS],
            closed: [[false; COLS]; ROWS],
            reads: [0; ROWS],
            failing_rows: [false; ROWS],
        }));
        let cols = core::array::from_fn(|col| {
            columns[col].then(|| MockColumn {
                col,
                bus: Rc::clone(&bus),
            })
        });
        let rows = core::array::from_fn(|row| {
            rows[row].then(|| MockRow {
                row,
                bus: Rc::clone(&bus),
            })
        });
        let mut keypad = MatrixKeypad::new(cols, rows, config);
        keypad.init().unwrap();
        (keypad, bus)
    }

    fn keypad(threshold: u8) -> (MatrixKeypad<MockColumn, MockRow>, SharedBus) {
        keypad_with(
            [true; COLS],
            [true; ROWS],
            KeypadConfig {
                confirmation_threshold: threshold,
                polarity: Polarity::ActiveHigh,
            },
        )
    }

    /// Run `n` full strobe cycles, so every column is read `n` times.
    fn scan_cycles(keypad: &mut MatrixKeypad<MockColumn, MockRow>, n: usize) {
        for _ in 0..n * COLS {
            keypad.scan_step().unwrap();
        }
    }

    fn set_key(bus: &SharedBus, row: usize, col: usize, closed: bool) {
        bus.borrow_mut().closed[row][col] = closed;
    }

    // --- Test Functions ---

    #[test]
    fn test_init_leaves_one_live_column() {
        let (keypad, bus) = keypad(3);
        let bus = bus.borrow();
        assert_eq!(keypad.scan_cursor(), 0);
        assert_eq!(bus.column_high, [Some(true), Some(false), Some(false), Some(false)]);
        assert_eq!(bus.live_columns(), 1);
    }

    #[test]
    fn test_one_live_column_between_steps() {
        let (mut keypad, bus) = keypad(3);
        for step in 1..=10 {
            keypad.scan_step().unwrap();
            assert_eq!(keypad.scan_cursor(), step % COLS);
            let bus = bus.borrow();
            assert_eq!(bus.live_columns(), 1);
            assert_eq!(bus.column_high[keypad.scan_cursor()], Some(true));
        }
    }

    #[test]
    fn test_press_sustained_for_threshold_commits() {
        let (mut keypad, bus) = keypad(3);
        set_key(&bus, 1, 2, true);

        scan_cycles(&mut keypad, 2);
        assert!(!keypad.is_pressed(1, 2));
        assert_eq!(keypad.button(1, 2).unwrap().confirm_count(), 2);

        scan_cycles(&mut keypad, 1);
        assert!(keypad.is_pressed(1, 2));
        assert!(keypad.click_pending(1, 2));
        assert_eq!(keypad.pressed_count(), 1);
    }

    #[test]
    fn test_press_one_short_of_threshold_is_ignored() {
        let (mut keypad, bus) = keypad(3);
        set_key(&bus, 0, 0, true);
        scan_cycles(&mut keypad, 2);
        set_key(&bus, 0, 0, false);
        scan_cycles(&mut keypad, 1);

        assert!(!keypad.is_pressed(0, 0));
        assert!(!keypad.click_pending(0, 0));
        assert_eq!(keypad.button(0, 0).unwrap().confirm_count(), 0);

        // Bounces do not add up across stable periods.
        set_key(&bus, 0, 0, true);
        scan_cycles(&mut keypad, 2);
        assert!(!keypad.is_pressed(0, 0));
    }

    #[test]
    fn test_release_sets_no_click() {
        let (mut keypad, bus) = keypad(2);
        set_key(&bus, 3, 3, true);
        scan_cycles(&mut keypad, 2);
        assert!(keypad.take_click(3, 3));

        set_key(&bus, 3, 3, false);
        scan_cycles(&mut keypad, 1);
        assert!(keypad.is_pressed(3, 3));
        scan_cycles(&mut keypad, 1);
        assert!(!keypad.is_pressed(3, 3));
        assert!(!keypad.click_pending(3, 3));
    }

    #[test]
    fn test_click_is_consumed_only_by_take() {
        let (mut keypad, bus) = keypad(1);
        set_key(&bus, 2, 1, true);
        scan_cycles(&mut keypad, 1);
        set_key(&bus, 2, 1, false);
        scan_cycles(&mut keypad, 1);

        // Scanning never clears the latch.
        scan_cycles(&mut keypad, 5);
        assert!(keypad.click_pending(2, 1));
        assert!(keypad.click_pending(2, 1));

        assert!(keypad.take_click(2, 1));
        assert!(!keypad.take_click(2, 1));
        assert!(!keypad.click_pending(2, 1));
    }

    #[test]
    fn test_take_clicks_drains_in_row_major_order() {
        let (mut keypad, bus) = keypad(1);
        set_key(&bus, 2, 0, true);
        set_key(&bus, 0, 3, true);
        set_key(&bus, 0, 1, true);
        scan_cycles(&mut keypad, 1);

        let clicks = keypad.take_clicks();
        assert_eq!(
            clicks.as_slice(),
            &[
                KeyPosition::new(0, 1),
                KeyPosition::new(0, 3),
                KeyPosition::new(2, 0)
            ]
        );
        assert!(keypad.take_clicks().is_empty());
        // Held keys stay pressed after their clicks are consumed.
        assert_eq!(keypad.pressed_count(), 3);
    }

    #[test]
    fn test_clear_clicks() {
        let (mut keypad, bus) = keypad(1);
        set_key(&bus, 1, 1, true);
        scan_cycles(&mut keypad, 1);
        keypad.clear_clicks();
        assert!(!keypad.click_pending(1, 1));
        assert!(keypad.is_pressed(1, 1));
    }

    #[test]
    fn test_is_valid() {
        let (keypad, _bus) = keypad_with(
            [true, false, true, true],
            [true, true, false, true],
            KeypadConfig::default(),
        );
        assert!(keypad.is_valid(0, 0));
        assert!(!keypad.is_valid(0, 1));
        assert!(!keypad.is_valid(2, 0));
        assert!(!keypad.is_valid(2, 1));
        assert!(keypad.is_valid(3, 3));
        assert!(!keypad.is_valid(4, 0));
        assert!(!keypad.is_valid(0, 4));
    }

    #[test]
    fn test_unbound_lines_stay_released() {
        let (mut keypad, bus) = keypad_with(
            [true, false, true, true],
            [true, true, false, true],
            KeypadConfig {
                confirmation_threshold: 1,
                polarity: Polarity::ActiveHigh,
            },
        );
        set_key(&bus, 2, 0, true);
        set_key(&bus, 0, 1, true);
        set_key(&bus, 0, 0, true);
        scan_cycles(&mut keypad, 3);

        assert!(!keypad.is_pressed(2, 0));
        assert!(!keypad.click_pending(2, 0));
        assert!(!keypad.is_pressed(0, 1));
        assert!(!keypad.click_pending(0, 1));
        assert!(keypad.is_pressed(0, 0));

        let bus = bus.borrow();
        assert_eq!(bus.reads[2], 0);
        assert_eq!(bus.column_high[1], None);
        // Three wired columns, three cycles.
        assert_eq!(bus.reads[0], 9);
    }

    #[test]
    fn test_cursor_walks_through_unbound_columns() {
        let (mut keypad, bus) = keypad_with(
            [true, false, false, true],
            [true; ROWS],
            KeypadConfig::default(),
        );
        keypad.scan_step().unwrap();
        assert_eq!(keypad.scan_cursor(), 1);
        let reads_after_first = bus.borrow().reads[0];
        keypad.scan_step().unwrap();
        keypad.scan_step().unwrap();
        assert_eq!(keypad.scan_cursor(), 3);
        assert_eq!(bus.borrow().reads[0], reads_after_first);
        // Column 3 is live while the cursor sits on it.
        assert_eq!(bus.borrow().column_high[3], Some(true));
        assert_eq!(bus.borrow().column_high[0], Some(false));
    }

    #[test]
    fn test_disable_freezes_everything() {
        let (mut keypad, bus) = keypad(3);
        set_key(&bus, 0, 2, true);
        set_key(&bus, 1, 0, true);
        scan_cycles(&mut keypad, 3);
        set_key(&bus, 0, 2, false);
        keypad.scan_step().unwrap();
        keypad.scan_step().unwrap();
        keypad.scan_step().unwrap(); // column 2 read once with the key open
        let cursor = keypad.scan_cursor();
        let snapshot: Vec<ButtonState, KEYS> = (0..ROWS)
            .flat_map(|r| (0..COLS).map(move |c| (r, c)))
            .map(|(r, c)| *keypad.button(r, c).unwrap())
            .collect();
        assert_eq!(keypad.button(0, 2).unwrap().confirm_count(), 1);

        keypad.disable();
        assert!(!keypad.is_enabled());
        let reads_before = bus.borrow().reads;
        for _ in 0..50 {
            keypad.scan_step().unwrap();
        }
        assert_eq!(keypad.scan_cursor(), cursor);
        assert_eq!(bus.borrow().reads, reads_before);
        for (i, state) in snapshot.iter().enumerate() {
            assert_eq!(keypad.button(i / COLS, i % COLS).unwrap(), state);
        }

        keypad.enable();
        keypad.scan_step().unwrap();
        assert_eq!(keypad.scan_cursor(), (cursor + 1) % COLS);
    }

    #[test]
    fn test_active_low_polarity() {
        let (mut keypad, bus) = keypad_with(
            [true; COLS],
            [true; ROWS],
            KeypadConfig {
                confirmation_threshold: 2,
                polarity: Polarity::ActiveLow,
            },
        );
        assert_eq!(
            bus.borrow().column_high,
            [Some(false), Some(true), Some(true), Some(true)]
        );
        scan_cycles(&mut keypad, 4);
        assert_eq!(keypad.pressed_count(), 0);

        set_key(&bus, 3, 1, true);
        scan_cycles(&mut keypad, 2);
        assert!(keypad.is_pressed(3, 1));
        assert!(keypad.take_click(3, 1));
        assert_eq!(keypad.pressed_count(), 1);
    }

    #[test]
    fn test_read_error_keeps_cursor() {
        let (mut keypad, bus) = keypad(3);
        keypad.scan_step().unwrap();
        bus.borrow_mut().failing_rows = [true; ROWS];
        assert_eq!(
            keypad.scan_step(),
            Err(KeypadError::Input(digital::ErrorKind::Other))
        );
        assert_eq!(keypad.scan_cursor(), 1);

        bus.borrow_mut().failing_rows = [false; ROWS];
        keypad.scan_step().unwrap();
        assert_eq!(keypad.scan_cursor(), 2);
    }

    #[test]
    fn test_failed_row_read_leaves_column_untouched() {
        let (mut keypad, bus) = keypad(2);
        set_key(&bus, 0, 0, true);

        bus.borrow_mut().failing_rows[2] = true;
        assert_eq!(
            keypad.scan_step(),
            Err(KeypadError::Input(digital::ErrorKind::Other))
        );
        assert_eq!(keypad.scan_cursor(), 0);
        assert_eq!(keypad.button(0, 0).unwrap().confirm_count(), 0);

        // One completed scan of column 0 is still one short of the threshold.
        bus.borrow_mut().failing_rows[2] = false;
        keypad.scan_step().unwrap();
        assert_eq!(keypad.button(0, 0).unwrap().confirm_count(), 1);
        assert!(!keypad.is_pressed(0, 0));
        assert!(!keypad.click_pending(0, 0));

        scan_cycles(&mut keypad, 1);
        assert!(keypad.is_pressed(0, 0));
        assert!(keypad.take_click(0, 0));
    }

    #[test]
    fn test_out_of_range_queries() {
        let (mut keypad, _bus) = keypad(1);
        assert!(!keypad.is_pressed(7, 0));
        assert!(!keypad.click_pending(0, 9));
        assert!(!keypad.take_click(4, 4));
        assert!(keypad.button(4, 0).is_none());
    }
}
