//! In-process simulated drivers for headless tests and CI.
//!
//! Each simulation records the commands it receives so tests can assert on
//! the full command history (e.g. the servo motion profile), not just the
//! final state. No physical hardware is required anywhere in the workspace.

use latchkey_types::DriverError;
use tracing::debug;

use crate::indicator::Indicator;
use crate::input::DigitalInput;
use crate::servo::{SERVO_MAX_ANGLE, ServoDriver};

// ────────────────────────────────────────────────────────────────────────────
// Simulated servo
// ────────────────────────────────────────────────────────────────────────────

/// A simulated door servo that records every commanded angle.
///
/// Rejects angles beyond [`SERVO_MAX_ANGLE`] the way the physical driver
/// does, so clamping bugs in the controller surface as test failures.
pub struct SimServo {
    id: String,
    angle: u8,
    history: Vec<u8>,
}

impl SimServo {
    /// Create a simulated servo starting at `initial` degrees.
    pub fn new(id: impl Into<String>, initial: u8) -> Self {
        Self {
            id: id.into(),
            angle: initial,
            history: Vec::new(),
        }
    }

    /// Every angle commanded since construction, in order.
    pub fn history(&self) -> &[u8] {
        &self.history
    }
}

impl ServoDriver for SimServo {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_angle(&mut self, angle: u8) -> Result<(), DriverError> {
        if angle > SERVO_MAX_ANGLE {
            return Err(DriverError::HardwareFault {
                component: self.id.clone(),
                details: format!("angle {angle} beyond physical travel {SERVO_MAX_ANGLE}"),
            });
        }
        self.angle = angle;
        self.history.push(angle);
        debug!(id = %self.id, angle, "servo angle set");
        Ok(())
    }

    fn angle(&self) -> u8 {
        self.angle
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated indicator
// ────────────────────────────────────────────────────────────────────────────

/// A simulated status line that records its level. Always succeeds.
pub struct SimIndicator {
    id: String,
    on: bool,
}

impl SimIndicator {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            on: false,
        }
    }
}

impl Indicator for SimIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set(&mut self, on: bool) -> Result<(), DriverError> {
        self.on = on;
        debug!(id = %self.id, on, "indicator set");
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted input
// ────────────────────────────────────────────────────────────────────────────

/// A button input that replays a programmed level sequence, one sample per
/// `read`, then holds the final level forever.
///
/// An empty script holds the released (`true`) level.
pub struct ScriptedInput {
    levels: Vec<bool>,
    cursor: usize,
}

impl ScriptedInput {
    pub fn new(levels: Vec<bool>) -> Self {
        Self { levels, cursor: 0 }
    }

    /// A script holding `samples` consecutive reads at `level`.
    pub fn held(level: bool, samples: usize) -> Self {
        Self::new(vec![level; samples])
    }
}

impl DigitalInput for ScriptedInput {
    fn read(&mut self) -> bool {
        match self.levels.get(self.cursor) {
            Some(&level) => {
                self.cursor += 1;
                level
            }
            None => self.levels.last().copied().unwrap_or(true),
        }
    }
}
