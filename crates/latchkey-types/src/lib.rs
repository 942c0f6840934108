use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A classified button interaction emitted by the gesture detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureKind {
    /// One short press, confirmed after the double-click window elapsed.
    SingleClick,
    /// Two short presses within the double-click window.
    DoubleClick,
    /// A press held past the long-press threshold; reported during the hold.
    LongPress,
}

/// Door movement requested of the actuator controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum ActuatorAction {
    /// Move to the open position and arm the auto-revert timer.
    Open,
    /// Cancel any pending auto-revert and move to the closed position.
    Close,
    /// Move to a raw angle (degrees), clamped to the configured maximum.
    /// Does not change the open/closed semantic state.
    SetAngle(u8),
}

/// Door command received from the network broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorCommand {
    DoorOn,
    DoorOff,
}

/// Command routed to the provisioning layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningCommand {
    /// Forget stored network credentials and restart pairing.
    ClearCredentials,
}

/// The one message shape carried by every fabric channel.
///
/// Messages are plain values: a send copies the message into the channel
/// slot, so no ownership is ever shared across task boundaries. Consumers
/// match exhaustively on the variant and ignore kinds they do not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Drive one indicator line to a level.
    LedSet { channel_id: u8, level: bool },
    /// A classified gesture from a button source (`source_id` 0 is the
    /// local button; adapters injecting synthetic gestures use their own id).
    KeyEvent { source_id: u8, gesture: GestureKind },
    /// Direct actuator command (debug console, wireless link).
    ActuatorCommand(ActuatorAction),
    /// Door command from the network broker.
    NetworkCommand(DoorCommand),
    /// Actuator state change, consumed by the broker adapter for publishing.
    StatusUpdate { is_open: bool },
    /// Provisioning request raised by the repeat-gesture escape hatch.
    Provisioning(ProvisioningCommand),
}

/// Failures surfaced by fabric send/receive operations.
///
/// All of these are non-fatal by policy: a producer logs the drop and its
/// state machine advances; a consumer treats `Timeout` as "no traffic".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel full within the send wait budget")]
    Full,

    #[error("no message arrived within the receive wait budget")]
    Timeout,

    #[error("channel is uninitialized or its peer is gone")]
    InvalidChannel,
}

/// Failures surfaced by hardware drivers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("hardware fault on {component}: {details}")]
    HardwareFault { component: String, details: String },
}

/// Startup configuration failures. Fatal before any task runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("channel capacity must be at least 1")]
    InvalidCapacity,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
