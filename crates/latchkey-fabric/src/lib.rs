//! Typed, bounded, multi-producer/single-consumer message channels.
//!
//! The fabric is the only legal way for tasks to interact: every message is
//! copied by value into a channel slot, so no mutable state ever crosses a
//! task boundary. Built on [`tokio::sync::mpsc`] bounded channels so that a
//! full channel rejects the send instead of silently dropping traffic.
//!
//! # Channels
//!
//! Traffic is partitioned into four [`ChannelId`] lanes, fixed at compile
//! time; each lane has exactly one consuming task:
//!
//! | Channel | Consumer | Typical traffic |
//! |---|---|---|
//! | [`ChannelId::Indicator`] | indicator panel | `LedSet`, click/long-press key events |
//! | [`ChannelId::Actuator`] | door controller | double-click key events, actuator and broker commands |
//! | [`ChannelId::Provisioning`] | provisioning task | credential-reset requests |
//! | [`ChannelId::Status`] | broker adapter | door state-change notifications |
//!
//! # Ordering
//!
//! FIFO per channel across all producers. No ordering is guaranteed across
//! channels: an indicator update and an actuator command derived from the
//! same gesture may be consumed in either order.

use std::time::Duration;

use latchkey_types::{ChannelError, ConfigError, Message};
use tokio::sync::mpsc;

/// Enumeration of every channel in the process. Created once at startup,
/// alive until process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// Indicator panel inbox.
    Indicator,
    /// Door controller inbox.
    Actuator,
    /// Provisioning task inbox.
    Provisioning,
    /// Broker adapter inbox for state-change notifications.
    Status,
}

/// How long a send may wait for a free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendWait {
    /// Try once; return [`ChannelError::Full`] immediately if no space.
    NoWait,
    /// Block the caller up to the duration, then [`ChannelError::Full`].
    Timeout(Duration),
    /// Block the caller until space exists. Only for producers with no
    /// other responsibilities.
    Forever,
}

/// How long a receive may wait for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvWait {
    /// Block the caller up to the duration, then [`ChannelError::Timeout`].
    Timeout(Duration),
    /// Block the caller until a message arrives.
    Forever,
}

/// Producer half of the fabric. Clone it cheaply – all clones feed the same
/// underlying channels.
#[derive(Clone, Debug)]
pub struct Fabric {
    indicator: mpsc::Sender<Message>,
    actuator: mpsc::Sender<Message>,
    provisioning: mpsc::Sender<Message>,
    status: mpsc::Sender<Message>,
}

/// Consumer half of one channel. Owned by exactly one task.
#[derive(Debug)]
pub struct Inbox {
    id: ChannelId,
    rx: mpsc::Receiver<Message>,
}

/// The four consumer ends, produced once by [`Fabric::new`] and handed out
/// to their owning tasks at spawn time.
#[derive(Debug)]
pub struct Inboxes {
    pub indicator: Inbox,
    pub actuator: Inbox,
    pub provisioning: Inbox,
    pub status: Inbox,
}

impl Fabric {
    /// Build every channel with the given `capacity` (messages per channel).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<(Self, Inboxes), ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        let (indicator_tx, indicator_rx) = mpsc::channel(capacity);
        let (actuator_tx, actuator_rx) = mpsc::channel(capacity);
        let (provisioning_tx, provisioning_rx) = mpsc::channel(capacity);
        let (status_tx, status_rx) = mpsc::channel(capacity);

        let fabric = Self {
            indicator: indicator_tx,
            actuator: actuator_tx,
            provisioning: provisioning_tx,
            status: status_tx,
        };
        let inboxes = Inboxes {
            indicator: Inbox {
                id: ChannelId::Indicator,
                rx: indicator_rx,
            },
            actuator: Inbox {
                id: ChannelId::Actuator,
                rx: actuator_rx,
            },
            provisioning: Inbox {
                id: ChannelId::Provisioning,
                rx: provisioning_rx,
            },
            status: Inbox {
                id: ChannelId::Status,
                rx: status_rx,
            },
        };
        Ok((fabric, inboxes))
    }

    /// Copy `msg` into the channel identified by `id`.
    ///
    /// Blocks only the calling task, and only for as long as `wait` allows.
    ///
    /// # Errors
    ///
    /// * [`ChannelError::Full`] – no slot freed up within the wait budget.
    /// * [`ChannelError::InvalidChannel`] – the consuming task is gone.
    pub async fn send(
        &self,
        id: ChannelId,
        msg: Message,
        wait: SendWait,
    ) -> Result<(), ChannelError> {
        let lane = self.lane(id);
        match wait {
            SendWait::NoWait => lane.try_send(msg).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::Full,
                mpsc::error::TrySendError::Closed(_) => ChannelError::InvalidChannel,
            }),
            SendWait::Timeout(dur) => lane.send_timeout(msg, dur).await.map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => ChannelError::Full,
                mpsc::error::SendTimeoutError::Closed(_) => ChannelError::InvalidChannel,
            }),
            SendWait::Forever => lane
                .send(msg)
                .await
                .map_err(|_| ChannelError::InvalidChannel),
        }
    }

    fn lane(&self, id: ChannelId) -> &mpsc::Sender<Message> {
        match id {
            ChannelId::Indicator => &self.indicator,
            ChannelId::Actuator => &self.actuator,
            ChannelId::Provisioning => &self.provisioning,
            ChannelId::Status => &self.status,
        }
    }
}

impl Inbox {
    /// Wait for the next message on this channel.
    ///
    /// Blocks only the calling task; other tasks keep running.
    ///
    /// # Errors
    ///
    /// * [`ChannelError::Timeout`] – the wait budget elapsed with no traffic.
    /// * [`ChannelError::InvalidChannel`] – every producer is gone.
    pub async fn recv(&mut self, wait: RecvWait) -> Result<Message, ChannelError> {
        match wait {
            RecvWait::Forever => self.rx.recv().await.ok_or(ChannelError::InvalidChannel),
            RecvWait::Timeout(dur) => match tokio::time::timeout(dur, self.rx.recv()).await {
                Ok(Some(msg)) => Ok(msg),
                Ok(None) => Err(ChannelError::InvalidChannel),
                Err(_) => Err(ChannelError::Timeout),
            },
        }
    }

    /// The [`ChannelId`] this inbox consumes.
    pub fn id(&self) -> ChannelId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_types::GestureKind;

    fn key_event(source_id: u8) -> Message {
        Message::KeyEvent {
            source_id,
            gesture: GestureKind::SingleClick,
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(Fabric::new(0).unwrap_err(), ConfigError::InvalidCapacity);
    }

    #[tokio::test]
    async fn send_and_receive_roundtrip() {
        let (fabric, mut inboxes) = Fabric::new(4).unwrap();
        fabric
            .send(ChannelId::Actuator, key_event(0), SendWait::NoWait)
            .await
            .unwrap();

        let msg = inboxes.actuator.recv(RecvWait::Forever).await.unwrap();
        assert_eq!(msg, key_event(0));
    }

    #[tokio::test]
    async fn fifo_order_is_preserved_across_producers() {
        let (fabric, mut inboxes) = Fabric::new(8).unwrap();
        let clone = fabric.clone();
        for i in 0..4u8 {
            let producer = if i % 2 == 0 { &fabric } else { &clone };
            producer
                .send(ChannelId::Indicator, key_event(i), SendWait::NoWait)
                .await
                .unwrap();
        }

        for i in 0..4u8 {
            let msg = inboxes.indicator.recv(RecvWait::Forever).await.unwrap();
            assert_eq!(msg, key_event(i));
        }
    }

    #[tokio::test]
    async fn full_channel_rejects_no_wait_send_without_corruption() {
        let (fabric, mut inboxes) = Fabric::new(2).unwrap();
        fabric
            .send(ChannelId::Actuator, key_event(1), SendWait::NoWait)
            .await
            .unwrap();
        fabric
            .send(ChannelId::Actuator, key_event(2), SendWait::NoWait)
            .await
            .unwrap();

        // Third send finds the channel at capacity.
        let err = fabric
            .send(ChannelId::Actuator, key_event(3), SendWait::NoWait)
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::Full);

        // The queued messages are intact and in original order.
        assert_eq!(
            inboxes.actuator.recv(RecvWait::Forever).await.unwrap(),
            key_event(1)
        );
        assert_eq!(
            inboxes.actuator.recv(RecvWait::Forever).await.unwrap(),
            key_event(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timed_send_on_full_channel_reports_full() {
        let (fabric, _inboxes) = Fabric::new(1).unwrap();
        fabric
            .send(ChannelId::Status, key_event(0), SendWait::NoWait)
            .await
            .unwrap();

        let err = fabric
            .send(
                ChannelId::Status,
                key_event(1),
                SendWait::Timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::Full);
    }

    #[tokio::test(start_paused = true)]
    async fn recv_times_out_on_idle_channel() {
        let (_fabric, mut inboxes) = Fabric::new(4).unwrap();
        let err = inboxes
            .provisioning
            .recv(RecvWait::Timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::Timeout);
    }

    #[tokio::test]
    async fn send_to_dropped_consumer_is_invalid_channel() {
        let (fabric, inboxes) = Fabric::new(4).unwrap();
        drop(inboxes);
        let err = fabric
            .send(ChannelId::Indicator, key_event(0), SendWait::NoWait)
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::InvalidChannel);
    }

    #[tokio::test]
    async fn blocking_send_completes_once_consumer_drains() {
        let (fabric, mut inboxes) = Fabric::new(1).unwrap();
        fabric
            .send(ChannelId::Actuator, key_event(0), SendWait::NoWait)
            .await
            .unwrap();

        let producer = fabric.clone();
        let sender = tokio::spawn(async move {
            producer
                .send(ChannelId::Actuator, key_event(1), SendWait::Forever)
                .await
        });

        // Draining one slot unblocks the waiting producer.
        assert_eq!(
            inboxes.actuator.recv(RecvWait::Forever).await.unwrap(),
            key_event(0)
        );
        sender.await.unwrap().unwrap();
        assert_eq!(
            inboxes.actuator.recv(RecvWait::Forever).await.unwrap(),
            key_event(1)
        );
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let (fabric, mut inboxes) = Fabric::new(1).unwrap();
        // Fill the actuator lane; the indicator lane must be unaffected.
        fabric
            .send(ChannelId::Actuator, key_event(0), SendWait::NoWait)
            .await
            .unwrap();
        fabric
            .send(ChannelId::Indicator, key_event(1), SendWait::NoWait)
            .await
            .unwrap();
        assert_eq!(
            inboxes.indicator.recv(RecvWait::Forever).await.unwrap(),
            key_event(1)
        );
    }
}
