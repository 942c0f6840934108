//! Button gesture detection.
//!
//! A polling state machine samples one digital input on a fixed interval
//! and classifies presses into [`GestureKind`]s. Sampling at the scan
//! interval doubles as the debounce: contact noise shorter than one scan
//! period never produces an edge.
//!
//! Classification is deliberately delayed until ambiguity is resolved: a
//! short press is not reported as a single click until the double-click
//! window has definitively elapsed, so a double-click sequence never emits
//! a spurious single click first. The one exception is the long press,
//! which is reported *during* the hold so consumers can react without
//! waiting for release; once fired it is never revoked.
//!
//! | State | Trigger | Emits | Next |
//! |---|---|---|---|
//! | `Idle` | level falls | – | `Pressed` |
//! | `Pressed` | released before the long-press threshold | – | `WaitSecondClick` |
//! | `Pressed` | released at/after the threshold | – | `Idle` |
//! | `Pressed` | still held past the threshold | `LongPress` (once) | `Pressed` |
//! | `WaitSecondClick` | pressed inside the window | – | `DoubleConfirming` |
//! | `WaitSecondClick` | pressed after the window | `SingleClick` | `Pressed` (fresh press) |
//! | `WaitSecondClick` | window elapses released | `SingleClick` | `Idle` |
//! | `DoubleConfirming` | released | `DoubleClick` | `Idle` |

use std::time::{Duration, Instant};

use latchkey_fabric::{ChannelId, Fabric, SendWait};
use latchkey_hal::DigitalInput;
use latchkey_types::{GestureKind, Message};
use tracing::{debug, info, warn};

/// Source id stamped on key events produced by the local button.
pub const BUTTON_SOURCE_ID: u8 = 0;

/// Timing constants of the state machine. All injected; the machine itself
/// hardcodes nothing.
#[derive(Debug, Clone, Copy)]
pub struct GestureTiming {
    /// Hold duration at which a press becomes a long press.
    pub long_press: Duration,
    /// Maximum gap between release and second press for a double click.
    pub double_click_window: Duration,
    /// Input sampling period.
    pub scan_interval: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            long_press: Duration::from_millis(1000),
            double_click_window: Duration::from_millis(300),
            scan_interval: Duration::from_millis(10),
        }
    }
}

/// Destination channel per gesture kind.
///
/// The defaults mirror the appliance wiring: clicks and long presses feed
/// the indicator panel, double clicks feed the door controller.
#[derive(Debug, Clone, Copy)]
pub struct GestureRoutes {
    pub single_click: ChannelId,
    pub double_click: ChannelId,
    pub long_press: ChannelId,
}

impl Default for GestureRoutes {
    fn default() -> Self {
        Self {
            single_click: ChannelId::Indicator,
            double_click: ChannelId::Actuator,
            long_press: ChannelId::Indicator,
        }
    }
}

impl GestureRoutes {
    /// The channel a gesture of `kind` is delivered to.
    pub fn route(&self, kind: GestureKind) -> ChannelId {
        match kind {
            GestureKind::SingleClick => self.single_click,
            GestureKind::DoubleClick => self.double_click,
            GestureKind::LongPress => self.long_press,
        }
    }
}

/// Everything the detector task needs besides its input line.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub timing: GestureTiming,
    pub routes: GestureRoutes,
    /// Source id stamped on emitted key events.
    pub source_id: u8,
    /// Wait budget for delivering an event before it is dropped.
    pub send_wait: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            timing: GestureTiming::default(),
            routes: GestureRoutes::default(),
            source_id: BUTTON_SOURCE_ID,
            send_wait: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    Idle,
    Pressed,
    WaitSecondClick,
    DoubleConfirming,
}

/// The gesture classification state machine.
///
/// Pure and synchronous: feed it one `(level, now)` sample per scan tick
/// and it returns at most one classified gesture. Owned exclusively by the
/// detector task; nothing here is shared.
pub struct GestureDetector {
    timing: GestureTiming,
    state: DetectorState,
    level_at_last_scan: bool,
    press_started_at: Instant,
    second_window_started_at: Instant,
    long_press_fired: bool,
}

impl GestureDetector {
    /// Create a detector in the idle state with the button released.
    pub fn new(timing: GestureTiming) -> Self {
        let now = Instant::now();
        Self {
            timing,
            state: DetectorState::Idle,
            level_at_last_scan: true,
            press_started_at: now,
            second_window_started_at: now,
            long_press_fired: false,
        }
    }

    /// Advance the machine by one scan sample.
    ///
    /// `level` is the raw input (`true` = released), `now` the sample time.
    /// Returns the gesture classified on this tick, if any.
    pub fn tick(&mut self, level: bool, now: Instant) -> Option<GestureKind> {
        let falling = !level && self.level_at_last_scan;
        let rising = level && !self.level_at_last_scan;
        let mut emitted = None;

        match self.state {
            DetectorState::Idle => {
                if falling {
                    self.press_started_at = now;
                    self.long_press_fired = false;
                    self.state = DetectorState::Pressed;
                }
            }

            DetectorState::Pressed => {
                if rising {
                    let held = now.duration_since(self.press_started_at);
                    if held >= self.timing.long_press {
                        // The long press already fired during the hold.
                        self.state = DetectorState::Idle;
                    } else {
                        self.second_window_started_at = now;
                        self.state = DetectorState::WaitSecondClick;
                    }
                } else if !level {
                    let held = now.duration_since(self.press_started_at);
                    if held >= self.timing.long_press && !self.long_press_fired {
                        emitted = Some(GestureKind::LongPress);
                        self.long_press_fired = true;
                    }
                }
            }

            DetectorState::WaitSecondClick => {
                if falling {
                    let gap = now.duration_since(self.second_window_started_at);
                    if gap <= self.timing.double_click_window {
                        self.press_started_at = now;
                        self.state = DetectorState::DoubleConfirming;
                    } else {
                        // Too late for a double click: report the first
                        // press and treat this one as fresh.
                        emitted = Some(GestureKind::SingleClick);
                        self.press_started_at = now;
                        self.long_press_fired = false;
                        self.state = DetectorState::Pressed;
                    }
                } else if level {
                    let waited = now.duration_since(self.second_window_started_at);
                    if waited > self.timing.double_click_window {
                        emitted = Some(GestureKind::SingleClick);
                        self.state = DetectorState::Idle;
                    }
                }
            }

            DetectorState::DoubleConfirming => {
                if rising {
                    emitted = Some(GestureKind::DoubleClick);
                    self.state = DetectorState::Idle;
                }
            }
        }

        self.level_at_last_scan = level;
        emitted
    }
}

/// Scan loop: sample the input every `scan_interval`, tick the machine,
/// and deliver classified gestures to their routed channels.
///
/// A failed delivery is logged and dropped; the machine always advances.
pub async fn run_detector(mut input: Box<dyn DigitalInput>, fabric: Fabric, config: DetectorConfig) {
    let mut detector = GestureDetector::new(config.timing);
    let mut ticker = tokio::time::interval(config.timing.scan_interval);
    info!(
        long_press_ms = config.timing.long_press.as_millis() as u64,
        double_click_ms = config.timing.double_click_window.as_millis() as u64,
        "gesture detector started"
    );

    loop {
        let tick_at = ticker.tick().await;
        let level = input.read();
        let Some(gesture) = detector.tick(level, tick_at.into_std()) else {
            continue;
        };

        let dest = config.routes.route(gesture);
        debug!(?gesture, ?dest, "gesture classified");
        let msg = Message::KeyEvent {
            source_id: config.source_id,
            gesture,
        };
        if let Err(err) = fabric
            .send(dest, msg, SendWait::Timeout(config.send_wait))
            .await
        {
            warn!(?gesture, ?dest, %err, "gesture event dropped");
        }
    }
}
