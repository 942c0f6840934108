//! Two-color status indicator panel.
//!
//! Consumes the indicator channel and nothing else. Deliberately knows
//! nothing about the door: the panel and the door are independent
//! consumers of overlapping slices of the same event stream, so an
//! indicator update and a door move derived from one gesture may land in
//! either order.

use latchkey_fabric::{Inbox, RecvWait};
use latchkey_hal::Indicator;
use latchkey_types::{ChannelError, DriverError, GestureKind, Message};
use tracing::{debug, info, warn};

/// `channel_id` of the red line in [`Message::LedSet`].
pub const RED_CHANNEL: u8 = 0;
/// `channel_id` of the green line in [`Message::LedSet`].
pub const GREEN_CHANNEL: u8 = 1;

/// Owns the two status lines. Single clicks toggle red, long presses
/// toggle green, `LedSet` drives a line directly.
pub struct IndicatorPanel {
    red: Box<dyn Indicator>,
    green: Box<dyn Indicator>,
}

impl IndicatorPanel {
    pub fn new(red: Box<dyn Indicator>, green: Box<dyn Indicator>) -> Self {
        Self { red, green }
    }

    /// Current level of the red line.
    pub fn red_is_on(&self) -> bool {
        self.red.is_on()
    }

    /// Current level of the green line.
    pub fn green_is_on(&self) -> bool {
        self.green.is_on()
    }

    /// Apply one fabric message to the panel.
    pub fn handle_message(&mut self, msg: Message) -> Result<(), DriverError> {
        match msg {
            Message::LedSet { channel_id, level } => match channel_id {
                RED_CHANNEL => self.red.set(level),
                GREEN_CHANNEL => self.green.set(level),
                other => {
                    warn!(channel_id = other, "unknown indicator line, ignoring");
                    Ok(())
                }
            },
            Message::KeyEvent {
                gesture: GestureKind::SingleClick,
                ..
            } => {
                let level = !self.red.is_on();
                debug!(level, "single click: toggling red");
                self.red.set(level)
            }
            Message::KeyEvent {
                gesture: GestureKind::LongPress,
                ..
            } => {
                let level = !self.green.is_on();
                debug!(level, "long press: toggling green");
                self.green.set(level)
            }
            other => {
                debug!(?other, "message not addressed to the panel, ignoring");
                Ok(())
            }
        }
    }
}

/// Consumer loop for the indicator channel. Driver faults are logged and
/// the loop keeps running.
pub async fn run_panel(mut panel: IndicatorPanel, mut inbox: Inbox) {
    info!("indicator panel started");
    loop {
        match inbox.recv(RecvWait::Forever).await {
            Ok(msg) => {
                if let Err(err) = panel.handle_message(msg) {
                    warn!(%err, "indicator update failed");
                }
            }
            Err(ChannelError::InvalidChannel) => {
                warn!("indicator channel closed, stopping panel");
                break;
            }
            Err(_) => continue,
        }
    }
}
