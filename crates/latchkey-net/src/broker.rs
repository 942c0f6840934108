//! Network broker adapter.
//!
//! Translates between broker traffic and fabric messages. The wire session
//! itself lives behind [`BrokerTransport`]; this module owns everything
//! protocol-shaped: the topic layout, the literal `ON`/`OFF` payloads, the
//! retained auto-discovery announcement, and the availability value.
//!
//! Publish failures are logged and not retried here – the next state
//! change publishes again, which is the retry path.

use std::time::Duration;

use async_trait::async_trait;
use latchkey_fabric::{ChannelId, Fabric, Inbox, RecvWait, SendWait};
use latchkey_types::{ChannelError, DoorCommand, Message};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Payload announcing the device is reachable.
pub const PAYLOAD_ONLINE: &str = "online";
/// Payload announcing the device is gone (broker last-will).
pub const PAYLOAD_OFFLINE: &str = "offline";

/// Wait budget for injecting an inbound command into the fabric.
const INJECT_SEND_WAIT: Duration = Duration::from_millis(100);

/// Failure surfaced by a broker transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("broker transport error: {0}")]
pub struct TransportError(pub String);

/// One publish/subscribe session with the broker. Implementations wrap a
/// real client; tests use an in-process recorder.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Publish `payload` to `topic`; `retain` keeps it broker-side for
    /// late subscribers.
    async fn publish(&self, topic: &str, payload: &str, retain: bool)
    -> Result<(), TransportError>;
}

/// Topic layout for one device, derived from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorTopics {
    /// Inbound `ON`/`OFF` commands.
    pub command: String,
    /// Outbound `ON`/`OFF` state changes.
    pub state: String,
    /// Outbound `online`/`offline` liveness.
    pub availability: String,
    /// Retained auto-discovery announcement.
    pub discovery: String,
}

impl DoorTopics {
    pub fn new(device_id: &str) -> Self {
        Self {
            command: format!("doorlock/{device_id}/door/set"),
            state: format!("doorlock/{device_id}/door/state"),
            availability: format!("doorlock/{device_id}/availability"),
            discovery: format!("homeassistant/switch/{device_id}/door/config"),
        }
    }
}

/// A device id for installations that did not configure one: 6 hex chars,
/// stable for the process lifetime only.
pub fn generate_device_id() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Map an inbound command payload to a door command. Unknown payloads are
/// `None` (logged by the caller).
pub fn parse_command(payload: &[u8]) -> Option<DoorCommand> {
    match payload {
        b"ON" => Some(DoorCommand::DoorOn),
        b"OFF" => Some(DoorCommand::DoorOff),
        _ => None,
    }
}

/// The literal state payload for a door state.
pub fn state_payload(is_open: bool) -> &'static str {
    if is_open { "ON" } else { "OFF" }
}

/// Broker-side face of the appliance.
pub struct BrokerAdapter {
    device_id: String,
    topics: DoorTopics,
    transport: Box<dyn BrokerTransport>,
    fabric: Fabric,
}

impl BrokerAdapter {
    pub fn new(device_id: String, transport: Box<dyn BrokerTransport>, fabric: Fabric) -> Self {
        let topics = DoorTopics::new(&device_id);
        Self {
            device_id,
            topics,
            transport,
            fabric,
        }
    }

    pub fn topics(&self) -> &DoorTopics {
        &self.topics
    }

    /// The retained discovery announcement: name, topic set, payload map,
    /// and a device block, so controllers can adopt the switch unattended.
    pub fn discovery_payload(&self) -> serde_json::Value {
        json!({
            "name": "Door Switch",
            "unique_id": format!("{}_door", self.device_id),
            "command_topic": self.topics.command,
            "state_topic": self.topics.state,
            "availability_topic": self.topics.availability,
            "payload_on": "ON",
            "payload_off": "OFF",
            "payload_available": PAYLOAD_ONLINE,
            "payload_not_available": PAYLOAD_OFFLINE,
            "device": {
                "identifiers": [self.device_id],
                "name": "Latchkey Door Controller",
                "model": "latchkey",
            },
        })
    }

    /// Session-established sequence: availability, retained discovery,
    /// initial closed state.
    pub async fn announce(&self) -> Result<(), TransportError> {
        self.transport
            .publish(&self.topics.availability, PAYLOAD_ONLINE, true)
            .await?;
        self.transport
            .publish(
                &self.topics.discovery,
                &self.discovery_payload().to_string(),
                true,
            )
            .await?;
        self.transport
            .publish(&self.topics.state, state_payload(false), true)
            .await?;
        info!(device_id = %self.device_id, "announced to broker");
        Ok(())
    }

    /// Handle one inbound broker message. Commands are injected into the
    /// actuator channel; anything else is logged and dropped.
    pub async fn handle_inbound(&self, topic: &str, payload: &[u8]) {
        if topic != self.topics.command {
            debug!(topic, "ignoring traffic on unrelated topic");
            return;
        }
        let Some(command) = parse_command(payload) else {
            warn!(
                payload = %String::from_utf8_lossy(payload),
                "unknown command payload, ignoring"
            );
            return;
        };

        debug!(?command, "broker command received");
        if let Err(err) = self
            .fabric
            .send(
                ChannelId::Actuator,
                Message::NetworkCommand(command),
                SendWait::Timeout(INJECT_SEND_WAIT),
            )
            .await
        {
            warn!(?command, %err, "broker command dropped");
        }
    }
}

/// Consumer loop for the status channel: every door state change becomes a
/// retained state publish.
pub async fn run_status_publisher(adapter: BrokerAdapter, mut inbox: Inbox) {
    info!("status publisher started");
    loop {
        match inbox.recv(RecvWait::Forever).await {
            Ok(Message::StatusUpdate { is_open }) => {
                if let Err(err) = adapter
                    .transport
                    .publish(&adapter.topics.state, state_payload(is_open), true)
                    .await
                {
                    warn!(is_open, %err, "state publish failed");
                }
            }
            Ok(other) => {
                debug!(?other, "message not addressed to the publisher, ignoring");
            }
            Err(ChannelError::InvalidChannel) => {
                warn!("status channel closed, stopping publisher");
                break;
            }
            Err(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_fabric::{Fabric, Inboxes};
    use std::sync::{Arc, Mutex};

    /// Transport double recording every publish.
    #[derive(Clone, Default)]
    struct RecordingTransport {
        published: Arc<Mutex<Vec<(String, String, bool)>>>,
    }

    impl RecordingTransport {
        fn published(&self) -> Vec<(String, String, bool)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerTransport for RecordingTransport {
        async fn publish(
            &self,
            topic: &str,
            payload: &str,
            retain: bool,
        ) -> Result<(), TransportError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string(), retain));
            Ok(())
        }
    }

    fn adapter() -> (BrokerAdapter, RecordingTransport, Inboxes) {
        let (fabric, inboxes) = Fabric::new(4).unwrap();
        let transport = RecordingTransport::default();
        let adapter = BrokerAdapter::new("ab12cd".to_string(), Box::new(transport.clone()), fabric);
        (adapter, transport, inboxes)
    }

    #[test]
    fn topics_derive_from_the_device_id() {
        let topics = DoorTopics::new("ab12cd");
        assert_eq!(topics.command, "doorlock/ab12cd/door/set");
        assert_eq!(topics.state, "doorlock/ab12cd/door/state");
        assert_eq!(topics.availability, "doorlock/ab12cd/availability");
        assert_eq!(topics.discovery, "homeassistant/switch/ab12cd/door/config");
    }

    #[test]
    fn generated_device_id_is_six_hex_chars() {
        let id = generate_device_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn command_payloads_parse() {
        assert_eq!(parse_command(b"ON"), Some(DoorCommand::DoorOn));
        assert_eq!(parse_command(b"OFF"), Some(DoorCommand::DoorOff));
        assert_eq!(parse_command(b"TOGGLE"), None);
        assert_eq!(parse_command(b"on"), None);
    }

    #[test]
    fn discovery_payload_wires_the_topic_set() {
        let (adapter, _, _inboxes) = adapter();
        let payload = adapter.discovery_payload();
        assert_eq!(payload["command_topic"], "doorlock/ab12cd/door/set");
        assert_eq!(payload["state_topic"], "doorlock/ab12cd/door/state");
        assert_eq!(payload["payload_on"], "ON");
        assert_eq!(payload["payload_off"], "OFF");
        assert_eq!(payload["unique_id"], "ab12cd_door");
        assert_eq!(payload["device"]["identifiers"][0], "ab12cd");
    }

    #[tokio::test]
    async fn announce_publishes_availability_discovery_and_initial_state() {
        let (adapter, transport, _inboxes) = adapter();
        adapter.announce().await.unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 3);
        assert_eq!(
            published[0],
            (
                "doorlock/ab12cd/availability".to_string(),
                PAYLOAD_ONLINE.to_string(),
                true
            )
        );
        assert_eq!(published[1].0, "homeassistant/switch/ab12cd/door/config");
        assert_eq!(
            published[2],
            (
                "doorlock/ab12cd/door/state".to_string(),
                "OFF".to_string(),
                true
            )
        );
    }

    #[tokio::test]
    async fn inbound_on_command_reaches_the_actuator_channel() {
        let (adapter, _, mut inboxes) = adapter();
        adapter
            .handle_inbound("doorlock/ab12cd/door/set", b"ON")
            .await;

        let msg = inboxes.actuator.recv(RecvWait::Forever).await.unwrap();
        assert_eq!(msg, Message::NetworkCommand(DoorCommand::DoorOn));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_payload_and_unrelated_topic_inject_nothing() {
        let (adapter, _, mut inboxes) = adapter();
        adapter
            .handle_inbound("doorlock/ab12cd/door/set", b"HALF")
            .await;
        adapter.handle_inbound("doorlock/other/door/set", b"ON").await;

        assert!(
            inboxes
                .actuator
                .recv(RecvWait::Timeout(Duration::from_millis(1)))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn status_updates_publish_literal_states() {
        let (fabric, inboxes) = Fabric::new(4).unwrap();
        let transport = RecordingTransport::default();
        let adapter = BrokerAdapter::new(
            "ab12cd".to_string(),
            Box::new(transport.clone()),
            fabric.clone(),
        );

        let task = tokio::spawn(run_status_publisher(adapter, inboxes.status));

        fabric
            .send(
                ChannelId::Status,
                Message::StatusUpdate { is_open: true },
                SendWait::NoWait,
            )
            .await
            .unwrap();
        fabric
            .send(
                ChannelId::Status,
                Message::StatusUpdate { is_open: false },
                SendWait::NoWait,
            )
            .await
            .unwrap();

        // Yield until both publishes landed.
        for _ in 0..100 {
            if transport.published().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let published = transport.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].1, "ON");
        assert_eq!(published[1].1, "OFF");
        assert!(published.iter().all(|(topic, _, retain)| {
            topic == "doorlock/ab12cd/door/state" && *retain
        }));
        task.abort();
    }
}
