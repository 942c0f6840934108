//! `latchkeyd` – the appliance daemon.
//!
//! Builds the whole controller once, explicitly, and hands each task its
//! pieces at spawn time: the fabric producer side is cloned into every
//! producer, each inbox goes to its single consumer, and each hardware
//! driver is owned by exactly one task. No globals anywhere.
//!
//! This binary wires the simulated driver set so the full stack runs on a
//! development host; an embedding bootstrap substitutes real GPIO/PWM
//! drivers and a real broker session behind the same traits.

mod config;
mod telemetry;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use latchkey_core::door::{DoorController, run_door};
use latchkey_core::gesture::run_detector;
use latchkey_core::panel::{IndicatorPanel, RED_CHANNEL, run_panel};
use latchkey_fabric::{ChannelId, Fabric, SendWait};
use latchkey_hal::Indicator;
use latchkey_hal::sim::{ScriptedInput, SimIndicator, SimServo};
use latchkey_net::broker::{BrokerAdapter, BrokerTransport, TransportError, run_status_publisher};
use latchkey_net::provisioning::{SimCredentialStore, run_provisioning};
use latchkey_types::{ConfigError, Message};
use tracing::{info, warn};

/// Transport stand-in for hostside runs: every publish goes to the log.
struct LoggingTransport;

#[async_trait]
impl BrokerTransport for LoggingTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> Result<(), TransportError> {
        info!(topic, payload, retain, "broker publish");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    telemetry::init_tracing();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "latchkeyd.toml".to_string());
    let cfg = config::load(Path::new(&path))?.unwrap_or_else(|| {
        info!(path = %path, "no config file, using defaults");
        config::Config::default()
    });
    cfg.validate()?;

    let (fabric, inboxes) = Fabric::new(cfg.fabric.capacity)?;

    // ── Hardware ──────────────────────────────────────────────────────────
    // Simulated drivers, labelled with their configured pins so hostside
    // logs read like the appliance's.
    let button = ScriptedInput::new(Vec::new());
    let servo = SimServo::new(
        format!("servo_gpio{}", cfg.pins.servo),
        cfg.servo.closed_angle,
    );
    let mut red = SimIndicator::new(format!("led_red_gpio{}", cfg.pins.led_red));
    let mut green = SimIndicator::new(format!("led_green_gpio{}", cfg.pins.led_green));
    // Boot state: red off, green lit.
    if let Err(err) = red.set(false) {
        warn!(%err, "red indicator init failed");
    }
    if let Err(err) = green.set(true) {
        warn!(%err, "green indicator init failed");
    }

    // ── Tasks ─────────────────────────────────────────────────────────────
    let controller = DoorController::new(cfg.door_config(), Box::new(servo), fabric.clone());
    let panel = IndicatorPanel::new(Box::new(red), Box::new(green));

    tokio::spawn(run_detector(
        Box::new(button),
        fabric.clone(),
        cfg.detector_config(),
    ));
    tokio::spawn(run_door(controller, inboxes.actuator));
    tokio::spawn(run_panel(panel, inboxes.indicator));
    tokio::spawn(run_provisioning(
        Box::new(SimCredentialStore::new()),
        inboxes.provisioning,
    ));

    // ── Broker face ───────────────────────────────────────────────────────
    let device_id = if cfg.broker.device_id.is_empty() {
        let id = latchkey_net::broker::generate_device_id();
        info!(device_id = %id, "generated device id");
        id
    } else {
        cfg.broker.device_id.clone()
    };
    let adapter = BrokerAdapter::new(device_id, Box::new(LoggingTransport), fabric.clone());
    if let Err(err) = adapter.announce().await {
        warn!(%err, "broker announce failed");
    }
    tokio::spawn(run_status_publisher(adapter, inboxes.status));

    info!(
        link_device = %cfg.link.device_name,
        button_pin = cfg.pins.button,
        "latchkeyd running"
    );

    // ── Heartbeat ─────────────────────────────────────────────────────────
    // The main task doubles as the liveness blinker, as a fifth producer on
    // the indicator channel.
    let blink = Duration::from_millis(cfg.timing.heartbeat_ms);
    let mut level = false;
    loop {
        tokio::time::sleep(blink).await;
        level = !level;
        let msg = Message::LedSet {
            channel_id: RED_CHANNEL,
            level,
        };
        if let Err(err) = fabric
            .send(
                ChannelId::Indicator,
                msg,
                SendWait::Timeout(Duration::from_millis(cfg.timing.send_wait_ms)),
            )
            .await
        {
            warn!(%err, "heartbeat blink dropped");
        }
    }
}
