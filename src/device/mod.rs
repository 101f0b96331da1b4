//! Output and input device ports driven by the channel services.
//!
//! Implementations are hardware backends owned by the embedding application.
//! Calls other than `write` are expected to return promptly; `write` is awaited
//! in line by the media sinks so a slow device delays the acknowledgement the
//! peer is waiting for.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::transport::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoResolution {
    #[serde(rename = "800x480")]
    R800x480,
    #[serde(rename = "1280x720")]
    R1280x720,
    #[serde(rename = "1920x1080")]
    R1920x1080,
}

impl VideoResolution {
    pub fn size(&self) -> Size {
        match self {
            VideoResolution::R800x480 => Size::new(800, 480),
            VideoResolution::R1280x720 => Size::new(1280, 720),
            VideoResolution::R1920x1080 => Size::new(1920, 1080),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFrameRate {
    Fps30,
    Fps60,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    DpadCenter,
    DpadLeft,
    DpadRight,
    DpadUp,
    DpadDown,
    Back,
    Home,
    Call,
    EndCall,
    MediaPlay,
    MediaPause,
    MediaPrevious,
    MediaPlayPause,
    MediaNext,
    Search,
    Navigation,
    RotaryController,
}

/// Operations shared by every media sink backend.
#[async_trait]
pub trait MediaOutput: Send + Sync {
    fn open(&self) -> bool;

    fn start(&self);

    /// Pauses playback but keeps the backend ready for a fast restart.
    fn suspend(&self);

    /// Releases the backend.
    fn stop(&self);

    async fn write(&self, timestamp: Option<Timestamp>, payload: Bytes);
}

pub trait AudioOutput: MediaOutput {
    fn sample_rate(&self) -> u32;

    fn sample_size(&self) -> u32;

    fn channel_count(&self) -> u32;
}

pub trait VideoOutput: MediaOutput {
    /// Prepares the decoder; `false` means the peer should retry setup later.
    fn init(&self) -> bool;

    fn resolution(&self) -> VideoResolution;

    fn frame_rate(&self) -> VideoFrameRate;

    fn dpi(&self) -> u32;

    fn margins(&self) -> Margins;
}

/// Capture side of the microphone channel.
pub trait AudioInput: Send + Sync {
    fn open(&self) -> bool;

    /// Starts capturing. Each chunk on the returned stream is one PCM frame;
    /// `None` means the capture could not be started.
    fn start(&self) -> Option<mpsc::Receiver<Bytes>>;

    fn stop(&self);

    fn sample_rate(&self) -> u32;

    fn sample_size(&self) -> u32;

    fn channel_count(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Press,
    Release,
    /// Rotary step; carries no press state.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub action: ButtonAction,
    pub wheel: WheelDirection,
    pub code: KeyCode,
}

/// Position of one local contact in touchscreen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

impl PointerSample {
    pub fn new(id: u64, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

/// Local multi-pointer surface events. Ids are whatever the platform hands
/// out and may be reused between gestures.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Engage(PointerSample),
    Move(Vec<PointerSample>),
    Release(PointerSample),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Button(ButtonEvent),
}

pub trait InputDevice: Send + Sync {
    /// Starts delivering events. Every call hands out a fresh stream; the
    /// previous one ends.
    fn start(&self) -> mpsc::Receiver<InputEvent>;

    fn stop(&self);

    fn supported_keycodes(&self) -> Vec<KeyCode>;

    /// Touch surface size, or `None` when no touchscreen is present.
    fn touchscreen(&self) -> Option<Size>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMode {
    NoFix,
    Fix2d,
    Fix3d,
}

/// Raw GNSS fix as reported by the positioning daemon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub mode: FixMode,
    pub time_s: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub epx: f64,
    pub epy: f64,
    pub altitude_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub track_deg: Option<f64>,
}

#[async_trait]
pub trait SensorProvider: Send + Sync {
    /// Connects to the positioning source; `false` disables location reports.
    fn connect(&self) -> bool;

    fn disconnect(&self);

    async fn night_mode(&self) -> bool;

    async fn location(&self) -> Option<GpsFix>;
}
