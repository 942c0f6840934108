//! `Indicator` trait for discrete on/off status lines (the two LEDs).

use latchkey_types::DriverError;

/// A discrete on/off status line.
pub trait Indicator: Send {
    /// Stable identifier used in fault reports and logs, e.g. `"led_red"`.
    fn id(&self) -> &str;

    /// Drive the line to `on` (`true` = lit).
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::HardwareFault`] if the command cannot be
    /// applied.
    fn set(&mut self, on: bool) -> Result<(), DriverError>;

    /// The line's current level (`true` = lit).
    fn is_on(&self) -> bool;
}
