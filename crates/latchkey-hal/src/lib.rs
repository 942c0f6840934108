//! `latchkey-hal` – hardware trait seams.
//!
//! The controllers only ever talk to these traits, so the physical GPIO /
//! PWM drivers can be swapped for the in-process simulations without
//! touching any control logic. Pin modes and peripheral setup belong to the
//! embedding bootstrap, not to this crate.
//!
//! # Modules
//!
//! - [`input`] – [`DigitalInput`][input::DigitalInput]: one sampled button line.
//! - [`servo`] – [`ServoDriver`][servo::ServoDriver]: the angular door actuator.
//! - [`indicator`] – [`Indicator`][indicator::Indicator]: a discrete two-level status line.
//! - [`sim`] – simulated drivers that record every command for headless tests.

pub mod indicator;
pub mod input;
pub mod servo;
pub mod sim;

pub use indicator::Indicator;
pub use input::DigitalInput;
pub use servo::ServoDriver;
