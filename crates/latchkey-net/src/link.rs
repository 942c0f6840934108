//! Short-range wireless link command parsing.
//!
//! The link delivers an unframed byte stream. A session accumulates bytes
//! in a small rolling buffer and watches its tail for the fixed open-door
//! token; everything else is inert filler. A recognized token injects the
//! double-click equivalent into the actuator channel, so the door treats a
//! link open exactly like a local gesture (including the repeat-gesture
//! counter).

use std::time::Duration;

use latchkey_fabric::{ChannelId, Fabric, SendWait};
use latchkey_types::{GestureKind, Message};
use tracing::{info, warn};

/// The 4-character open-door token.
pub const OPEN_TOKEN: &[u8] = b"OPEN";

/// Source id stamped on key events injected by the link.
pub const LINK_SOURCE_ID: u8 = 1;

/// Rolling command buffer capacity; the buffer resets on overflow.
pub const CMD_MAX_LEN: usize = 32;

/// Positive acknowledgment sent back over the link.
pub const ACK_OK: &str = "OK\r\n";
/// Negative acknowledgment sent back over the link.
pub const ACK_ERROR: &str = "ERROR\r\n";

/// Wait budget for injecting a command before answering `ERROR`.
const INJECT_SEND_WAIT: Duration = Duration::from_millis(100);

/// Parser state for one link connection.
///
/// Create one per connection and [`reset`][LinkSession::reset] it on
/// disconnect so a token split across connections never matches.
pub struct LinkSession {
    fabric: Fabric,
    buffer: Vec<u8>,
}

impl LinkSession {
    pub fn new(fabric: Fabric) -> Self {
        Self {
            fabric,
            buffer: Vec::with_capacity(CMD_MAX_LEN),
        }
    }

    /// Consume received bytes; returns the acknowledgment to transmit when
    /// the open token was recognized, `None` otherwise.
    pub async fn feed(&mut self, data: &[u8]) -> Option<&'static str> {
        let mut ack = None;
        for &byte in data {
            if self.buffer.len() >= CMD_MAX_LEN {
                warn!("link command buffer overflow, resetting");
                self.buffer.clear();
            }
            self.buffer.push(byte);

            if self.buffer.ends_with(OPEN_TOKEN) {
                info!("open token recognized on the link");
                ack = Some(self.inject_open().await);
                self.buffer.clear();
            }
        }
        ack
    }

    /// Discard any partially accumulated command (connection dropped).
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    async fn inject_open(&self) -> &'static str {
        let msg = Message::KeyEvent {
            source_id: LINK_SOURCE_ID,
            gesture: GestureKind::DoubleClick,
        };
        match self
            .fabric
            .send(
                ChannelId::Actuator,
                msg,
                SendWait::Timeout(INJECT_SEND_WAIT),
            )
            .await
        {
            Ok(()) => ACK_OK,
            Err(err) => {
                warn!(%err, "failed to inject link open command");
                ACK_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_fabric::{Fabric, Inboxes, RecvWait};

    fn session() -> (LinkSession, Inboxes) {
        let (fabric, inboxes) = Fabric::new(4).unwrap();
        (LinkSession::new(fabric), inboxes)
    }

    async fn drain_actuator(inboxes: &mut Inboxes) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = inboxes
            .actuator
            .recv(RecvWait::Timeout(Duration::from_millis(1)))
            .await
        {
            out.push(msg);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn token_injects_double_click_and_acks_ok() {
        let (mut session, mut inboxes) = session();

        let ack = session.feed(b"OPEN").await;
        assert_eq!(ack, Some(ACK_OK));

        let injected = drain_actuator(&mut inboxes).await;
        assert_eq!(
            injected,
            vec![Message::KeyEvent {
                source_id: LINK_SOURCE_ID,
                gesture: GestureKind::DoubleClick,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_recognized_at_the_tail_of_noise() {
        let (mut session, mut inboxes) = session();
        assert_eq!(session.feed(b"hello OPEN").await, Some(ACK_OK));
        assert_eq!(drain_actuator(&mut inboxes).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn token_split_across_feeds_still_matches() {
        let (mut session, mut inboxes) = session();
        assert_eq!(session.feed(b"OP").await, None);
        assert_eq!(session.feed(b"EN").await, Some(ACK_OK));
        assert_eq!(drain_actuator(&mut inboxes).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_a_partial_token() {
        let (mut session, mut inboxes) = session();
        assert_eq!(session.feed(b"OP").await, None);
        session.reset();
        assert_eq!(session.feed(b"EN").await, None);
        assert!(drain_actuator(&mut inboxes).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_traffic_never_injects() {
        let (mut session, mut inboxes) = session();
        assert_eq!(session.feed(b"CLOSE please").await, None);
        assert!(drain_actuator(&mut inboxes).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_resets_the_buffer_without_losing_detection() {
        let (mut session, mut inboxes) = session();
        // Far more filler than the buffer holds, then a clean token.
        let mut noise = vec![b'x'; 100];
        noise.extend_from_slice(b"OPEN");
        assert_eq!(session.feed(&noise).await, Some(ACK_OK));
        assert_eq!(drain_actuator(&mut inboxes).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_actuator_channel_yields_error_ack() {
        let (fabric, mut inboxes) = Fabric::new(1).unwrap();
        let mut session = LinkSession::new(fabric.clone());

        // Occupy the only slot so the injection times out.
        fabric
            .send(
                ChannelId::Actuator,
                Message::StatusUpdate { is_open: false },
                SendWait::NoWait,
            )
            .await
            .unwrap();

        assert_eq!(session.feed(b"OPEN").await, Some(ACK_ERROR));

        // The pre-existing message is untouched.
        assert!(
            inboxes
                .actuator
                .recv(RecvWait::Timeout(Duration::from_millis(1)))
                .await
                .is_ok()
        );
    }
}
