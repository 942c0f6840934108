//! Digital input line sampled by the gesture detector.

/// A single digital input line (the mechanical button).
///
/// The button is wired active-low: `true` is the released (pulled-up) level,
/// `false` is pressed. The detector owns its input exclusively and samples
/// it on a fixed interval; `read` takes `&mut self` so simulated inputs can
/// advance an internal script.
pub trait DigitalInput: Send {
    /// Sample the current level. `true` = high/released, `false` = low/pressed.
    fn read(&mut self) -> bool;
}
