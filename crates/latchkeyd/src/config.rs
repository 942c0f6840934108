//! Startup configuration – reads `latchkeyd.toml`.
//!
//! Every tunable of the appliance lives here: gesture timing, servo
//! geometry, channel capacity, broker identity. Defaults match the
//! reference hardware, so an empty file (or none at all) yields a working
//! controller. Validation runs once, before any task is spawned, and a
//! bad value aborts startup – tasks never observe a half-valid config.

use std::fs;
use std::path::Path;
use std::time::Duration;

use latchkey_core::{DetectorConfig, DoorConfig, GestureRoutes, GestureTiming};
use latchkey_types::ConfigError;
use serde::{Deserialize, Serialize};

/// Channel sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Slots per channel.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Gesture detector timing, milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    #[serde(default = "default_double_click_window_ms")]
    pub double_click_window_ms: u64,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// Wait budget for delivering a classified gesture.
    #[serde(default = "default_send_wait_ms")]
    pub send_wait_ms: u64,
    /// Period of the heartbeat blink driven by the main loop.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

/// Servo geometry and motion profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoConfig {
    #[serde(default = "default_open_angle")]
    pub open_angle: u8,
    #[serde(default = "default_closed_angle")]
    pub closed_angle: u8,
    #[serde(default = "default_max_angle")]
    pub max_angle: u8,
    #[serde(default = "default_open_hold_ms")]
    pub open_hold_ms: u64,
    #[serde(default = "default_motion_step")]
    pub motion_step: u8,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

/// Repeat-gesture credential-reset counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterConfig {
    #[serde(default = "default_counter_reset_window_ms")]
    pub reset_window_ms: u64,
    #[serde(default = "default_counter_trigger")]
    pub trigger: u8,
}

/// Broker identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Device id embedded in every topic. Empty = generate at startup.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_id: String,
}

/// Short-range link identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Name the link advertises under.
    #[serde(default = "default_link_device_name")]
    pub device_name: String,
}

/// Pin assignments. The embedding bootstrap wires real GPIO drivers from
/// these; the host build uses them as driver labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinsConfig {
    #[serde(default = "default_button_pin")]
    pub button: u8,
    #[serde(default = "default_led_red_pin")]
    pub led_red: u8,
    #[serde(default = "default_led_green_pin")]
    pub led_green: u8,
    #[serde(default = "default_servo_pin")]
    pub servo: u8,
}

/// Full daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fabric: FabricConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub servo: ServoConfig,
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub pins: PinsConfig,
}

fn default_capacity() -> usize {
    10
}
fn default_long_press_ms() -> u64 {
    1000
}
fn default_double_click_window_ms() -> u64 {
    300
}
fn default_scan_interval_ms() -> u64 {
    10
}
fn default_send_wait_ms() -> u64 {
    100
}
fn default_heartbeat_ms() -> u64 {
    3000
}
fn default_open_angle() -> u8 {
    80
}
fn default_closed_angle() -> u8 {
    135
}
fn default_max_angle() -> u8 {
    180
}
fn default_open_hold_ms() -> u64 {
    2000
}
fn default_motion_step() -> u8 {
    5
}
fn default_step_delay_ms() -> u64 {
    15
}
fn default_counter_reset_window_ms() -> u64 {
    2000
}
fn default_counter_trigger() -> u8 {
    2
}
fn default_link_device_name() -> String {
    "latchkey-door".to_string()
}
fn default_button_pin() -> u8 {
    2
}
fn default_led_red_pin() -> u8 {
    11
}
fn default_led_green_pin() -> u8 {
    12
}
fn default_servo_pin() -> u8 {
    13
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            long_press_ms: default_long_press_ms(),
            double_click_window_ms: default_double_click_window_ms(),
            scan_interval_ms: default_scan_interval_ms(),
            send_wait_ms: default_send_wait_ms(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            open_angle: default_open_angle(),
            closed_angle: default_closed_angle(),
            max_angle: default_max_angle(),
            open_hold_ms: default_open_hold_ms(),
            motion_step: default_motion_step(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            reset_window_ms: default_counter_reset_window_ms(),
            trigger: default_counter_trigger(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: default_link_device_name(),
        }
    }
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            button: default_button_pin(),
            led_red: default_led_red_pin(),
            led_green: default_led_green_pin(),
            servo: default_servo_pin(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fabric: FabricConfig::default(),
            timing: TimingConfig::default(),
            servo: ServoConfig::default(),
            counter: CounterConfig::default(),
            broker: BrokerConfig::default(),
            link: LinkConfig::default(),
            pins: PinsConfig::default(),
        }
    }
}

impl Config {
    /// Reject values no task could run with.
    ///
    /// # Errors
    ///
    /// Fatal at startup; nothing has been spawned yet when this runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fabric.capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.timing.scan_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scan interval must be at least 1 ms".to_string(),
            ));
        }
        if self.servo.motion_step == 0 {
            return Err(ConfigError::Invalid(
                "motion step must be at least 1 degree".to_string(),
            ));
        }
        if self.servo.open_angle > self.servo.max_angle
            || self.servo.closed_angle > self.servo.max_angle
        {
            return Err(ConfigError::Invalid(format!(
                "open/closed angles must not exceed max angle {}",
                self.servo.max_angle
            )));
        }
        if self.counter.trigger == 0 {
            return Err(ConfigError::Invalid(
                "counter trigger must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gesture_timing(&self) -> GestureTiming {
        GestureTiming {
            long_press: Duration::from_millis(self.timing.long_press_ms),
            double_click_window: Duration::from_millis(self.timing.double_click_window_ms),
            scan_interval: Duration::from_millis(self.timing.scan_interval_ms),
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            timing: self.gesture_timing(),
            routes: GestureRoutes::default(),
            send_wait: Duration::from_millis(self.timing.send_wait_ms),
            ..DetectorConfig::default()
        }
    }

    pub fn door_config(&self) -> DoorConfig {
        DoorConfig {
            open_angle: self.servo.open_angle,
            closed_angle: self.servo.closed_angle,
            max_angle: self.servo.max_angle,
            open_hold: Duration::from_millis(self.servo.open_hold_ms),
            motion_step: self.servo.motion_step,
            step_delay: Duration::from_millis(self.servo.step_delay_ms),
            counter_reset_window: Duration::from_millis(self.counter.reset_window_ms),
            counter_trigger: self.counter.trigger,
        }
    }
}

/// Load the config from `path`. Returns `None` when the file is absent so
/// the caller can fall back to defaults.
pub fn load(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| ConfigError::Invalid(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `LATCHKEY_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LATCHKEY_DEVICE_ID` | `broker.device_id` |
/// | `LATCHKEY_CAPACITY` | `fabric.capacity` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("LATCHKEY_DEVICE_ID") {
        cfg.broker.device_id = v;
    }
    if let Ok(v) = std::env::var("LATCHKEY_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
    {
        cfg.fabric.capacity = capacity;
    }
}
