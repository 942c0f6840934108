//! Door actuator control.
//!
//! One task owns the servo and is the single consumer of the actuator
//! channel, so commands from the local button, the wireless link, and the
//! network broker converge here without races. Policy enforced:
//!
//! - **Auto-revert**: every open arms (or rearms) a single-shot timer;
//!   if it elapses with the door still open the controller behaves exactly
//!   as if a close command had arrived.
//! - **Smooth motion**: the servo moves in fixed angular steps with a fixed
//!   inter-step delay instead of jumping, every step clamped to the
//!   configured maximum.
//! - **Repeat-gesture escape hatch**: double-click key events feed a
//!   counter; enough of them inside a reset window turns "someone keeps
//!   opening the door by hand" into an explicit credential-reset request to
//!   the provisioning layer.

use std::time::{Duration, Instant};

use latchkey_fabric::{ChannelId, Fabric, Inbox, RecvWait, SendWait};
use latchkey_hal::ServoDriver;
use latchkey_types::{
    ActuatorAction, ChannelError, DoorCommand, DriverError, GestureKind, Message,
    ProvisioningCommand,
};
use tracing::{debug, info, warn};

/// Wait budget for provisioning sends raised by the counter.
const PROVISION_SEND_WAIT: Duration = Duration::from_millis(100);

/// Door geometry, motion profile, and policy timings.
#[derive(Debug, Clone, Copy)]
pub struct DoorConfig {
    /// Servo angle of the open position, degrees.
    pub open_angle: u8,
    /// Servo angle of the closed/home position, degrees.
    pub closed_angle: u8,
    /// Maximum commandable angle; every target is clamped to this.
    pub max_angle: u8,
    /// How long the door stays open before the auto-revert closes it.
    pub open_hold: Duration,
    /// Angular step size of the smooth-motion profile, degrees.
    pub motion_step: u8,
    /// Delay between consecutive motion steps.
    pub step_delay: Duration,
    /// Repeat-gesture counter: window after which the count resets.
    pub counter_reset_window: Duration,
    /// Repeat-gesture counter: count that fires the credential reset.
    pub counter_trigger: u8,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            open_angle: 80,
            closed_angle: 135,
            max_angle: 180,
            open_hold: Duration::from_millis(2000),
            motion_step: 5,
            step_delay: Duration::from_millis(15),
            counter_reset_window: Duration::from_millis(2000),
            counter_trigger: 2,
        }
    }
}

/// Counts qualifying repeated gestures inside a rolling reset window.
///
/// Task-local; never read by anyone else. The count resets when the gap
/// since the previous increment exceeds the window, and firing resets it
/// in the same call, so no intermediate state is ever observable.
#[derive(Debug)]
pub struct RepeatCounter {
    count: u8,
    last_increment_at: Option<Instant>,
    reset_window: Duration,
    trigger: u8,
}

impl RepeatCounter {
    pub fn new(reset_window: Duration, trigger: u8) -> Self {
        Self {
            count: 0,
            last_increment_at: None,
            reset_window,
            trigger,
        }
    }

    /// Record one qualifying gesture at `now`. Returns `true` when the
    /// trigger count is reached; the counter is then already reset.
    pub fn record(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_increment_at {
            if now.duration_since(last) >= self.reset_window {
                debug!("repeat-gesture counter timed out, resetting");
                self.count = 0;
            }
        }

        self.count += 1;
        self.last_increment_at = Some(now);

        if self.count >= self.trigger {
            self.count = 0;
            self.last_increment_at = None;
            true
        } else {
            false
        }
    }

    /// Current count, for logging.
    pub fn count(&self) -> u8 {
        self.count
    }
}

/// Owns the servo and the open/closed state machine.
///
/// Two states, `Closed` and `Open`; every command is valid in either state
/// and transitions are idempotent by design.
pub struct DoorController {
    config: DoorConfig,
    servo: Box<dyn ServoDriver>,
    fabric: Fabric,
    is_open: bool,
    auto_revert_deadline: Option<tokio::time::Instant>,
    repeat: RepeatCounter,
}

impl DoorController {
    /// Build a controller over `servo`, assumed to start at the closed/home
    /// position.
    pub fn new(config: DoorConfig, servo: Box<dyn ServoDriver>, fabric: Fabric) -> Self {
        let repeat = RepeatCounter::new(config.counter_reset_window, config.counter_trigger);
        Self {
            config,
            servo,
            fabric,
            is_open: false,
            auto_revert_deadline: None,
            repeat,
        }
    }

    /// `true` while the door is in the open semantic state.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// The servo's current angle, degrees.
    pub fn current_angle(&self) -> u8 {
        self.servo.angle()
    }

    /// Deadline of the armed auto-revert timer, if any.
    pub fn revert_deadline(&self) -> Option<tokio::time::Instant> {
        self.auto_revert_deadline
    }

    /// Dispatch one fabric message.
    ///
    /// Driver faults are surfaced to the caller (the task loop logs them);
    /// the controller itself never retries – the next command simply hits
    /// the hardware again.
    pub async fn handle_message(&mut self, msg: Message) -> Result<(), DriverError> {
        match msg {
            Message::ActuatorCommand(ActuatorAction::Open) => self.handle_open().await,
            Message::ActuatorCommand(ActuatorAction::Close) => self.handle_close().await,
            Message::ActuatorCommand(ActuatorAction::SetAngle(angle)) => {
                self.handle_set_angle(angle).await
            }
            Message::NetworkCommand(DoorCommand::DoorOn) => self.handle_open().await,
            Message::NetworkCommand(DoorCommand::DoorOff) => self.handle_close().await,
            Message::KeyEvent {
                gesture: GestureKind::DoubleClick,
                source_id,
            } => {
                debug!(source_id, "double click");
                self.handle_double_click().await
            }
            other => {
                debug!(?other, "message not addressed to the door, ignoring");
                Ok(())
            }
        }
    }

    /// Move to the open position, notify, and (re)arm the auto-revert.
    pub async fn handle_open(&mut self) -> Result<(), DriverError> {
        self.move_to(self.config.open_angle).await?;
        self.is_open = true;
        self.publish_status(true).await;
        self.auto_revert_deadline = Some(tokio::time::Instant::now() + self.config.open_hold);
        info!(angle = self.config.open_angle, "door opened");
        Ok(())
    }

    /// Cancel any pending auto-revert and move to the closed position.
    ///
    /// Closing an already-closed door skips the physical move and the
    /// notification but still cancels a pending timer.
    pub async fn handle_close(&mut self) -> Result<(), DriverError> {
        self.auto_revert_deadline = None;
        if !self.is_open {
            debug!("door already closed");
            return Ok(());
        }
        self.move_to(self.config.closed_angle).await?;
        self.is_open = false;
        self.publish_status(false).await;
        info!(angle = self.config.closed_angle, "door closed");
        Ok(())
    }

    /// Direct angle command; clamps and moves without touching the
    /// open/closed semantic state.
    pub async fn handle_set_angle(&mut self, angle: u8) -> Result<(), DriverError> {
        let target = angle.min(self.config.max_angle);
        if target != angle {
            warn!(angle, target, "angle clamped to configured maximum");
        }
        self.move_to(target).await
    }

    /// The auto-revert timer elapsed with the door still open; behaves
    /// exactly like a close command.
    pub async fn on_revert_elapsed(&mut self) -> Result<(), DriverError> {
        info!("auto-revert elapsed");
        self.handle_close().await
    }

    async fn handle_double_click(&mut self) -> Result<(), DriverError> {
        self.handle_open().await?;

        if self.repeat.record(tokio::time::Instant::now().into_std()) {
            info!("repeat-gesture trigger reached, requesting credential reset");
            if let Err(err) = self
                .fabric
                .send(
                    ChannelId::Provisioning,
                    Message::Provisioning(ProvisioningCommand::ClearCredentials),
                    SendWait::Timeout(PROVISION_SEND_WAIT),
                )
                .await
            {
                warn!(%err, "credential-reset request dropped");
            }
        } else {
            debug!(count = self.repeat.count(), "repeat-gesture count");
        }
        Ok(())
    }

    /// Step the servo toward `target` in `motion_step` increments with
    /// `step_delay` between steps. Every intermediate angle is clamped;
    /// the final step lands exactly on the clamped target.
    async fn move_to(&mut self, target: u8) -> Result<(), DriverError> {
        let target = target.min(self.config.max_angle);
        let step = self.config.motion_step.max(1);
        let mut current = self.servo.angle();

        while current != target {
            let next = if target > current {
                current.saturating_add(step).min(target)
            } else {
                current.saturating_sub(step).max(target)
            };
            let next = next.min(self.config.max_angle);
            self.servo.set_angle(next)?;
            current = next;
            if current != target {
                tokio::time::sleep(self.config.step_delay).await;
            }
        }
        Ok(())
    }

    async fn publish_status(&self, is_open: bool) {
        if let Err(err) = self
            .fabric
            .send(
                ChannelId::Status,
                Message::StatusUpdate { is_open },
                SendWait::NoWait,
            )
            .await
        {
            // Not retried here: the next state change publishes again.
            warn!(is_open, %err, "status notification dropped");
        }
    }
}

/// Consumer loop for the actuator channel.
///
/// Waits for the next command or, while the door is open, for the
/// auto-revert deadline – whichever comes first. Driver faults are logged
/// and the loop keeps running; the next command retries the hardware.
pub async fn run_door(mut controller: DoorController, mut inbox: Inbox) {
    info!("door controller started");
    loop {
        let received = match controller.revert_deadline() {
            Some(deadline) => {
                tokio::select! {
                    received = inbox.recv(RecvWait::Forever) => received,
                    _ = tokio::time::sleep_until(deadline) => {
                        if let Err(err) = controller.on_revert_elapsed().await {
                            warn!(%err, "auto-revert close failed");
                        }
                        continue;
                    }
                }
            }
            None => inbox.recv(RecvWait::Forever).await,
        };

        match received {
            Ok(msg) => {
                if let Err(err) = controller.handle_message(msg).await {
                    warn!(%err, "actuator command failed");
                }
            }
            Err(ChannelError::InvalidChannel) => {
                warn!("actuator channel closed, stopping door controller");
                break;
            }
            Err(_) => continue,
        }
    }
}
