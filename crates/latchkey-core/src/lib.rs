//! `latchkey-core` – gesture classification and device control.
//!
//! The three tasks that give the appliance its behavior. Each owns its
//! hardware exclusively and talks to the rest of the system only through
//! the fabric.
//!
//! # Modules
//!
//! - [`gesture`] – [`GestureDetector`][gesture::GestureDetector]: the
//!   polling state machine that turns raw button levels into classified
//!   gestures, plus the scan-loop task that routes each gesture kind to its
//!   configured destination channel.
//! - [`door`] – [`DoorController`][door::DoorController]: owns the servo;
//!   reacts to commands from every producer on the actuator channel,
//!   enforces the auto-revert policy, and runs the repeat-gesture
//!   credential-reset counter.
//! - [`panel`] – [`IndicatorPanel`][panel::IndicatorPanel]: reflects two
//!   status lines from the indicator channel, independent of the door's
//!   state.

pub mod door;
pub mod gesture;
pub mod panel;

pub use door::{DoorConfig, DoorController, RepeatCounter};
pub use gesture::{DetectorConfig, GestureDetector, GestureRoutes, GestureTiming};
pub use panel::IndicatorPanel;
