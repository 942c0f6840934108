//! `ServoDriver` trait for the angular door actuator.

use latchkey_types::DriverError;

/// Physical maximum travel of the supported servo class, in degrees.
pub const SERVO_MAX_ANGLE: u8 = 180;

/// A position-controlled angular actuator (the door lock servo).
///
/// The door controller is the only caller and clamps targets to its
/// configured maximum before commanding a move; drivers still reject
/// angles beyond their physical travel as a hardware fault.
pub trait ServoDriver: Send + Sync {
    /// Stable identifier used in fault reports and logs, e.g. `"door_servo"`.
    fn id(&self) -> &str;

    /// Command the actuator to `angle` degrees from its zero position.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::HardwareFault`] if the command cannot be
    /// applied (target beyond physical travel, driver in a fault state).
    fn set_angle(&mut self, angle: u8) -> Result<(), DriverError>;

    /// The most recently commanded angle in degrees.
    fn angle(&self) -> u8;
}
