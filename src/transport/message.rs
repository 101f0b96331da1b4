use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::device::{KeyCode, Margins, VideoFrameRate, VideoResolution};

/// Logical sub-stream of the multiplexed session link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelId {
    Control,
    MediaSinkSystemAudio,
    MediaSinkMediaAudio,
    MediaSinkGuidanceAudio,
    MediaSinkTelephonyAudio,
    MediaSinkVideo,
    MediaSourceMicrophone,
    SensorSource,
    InputSource,
}

impl ChannelId {
    pub const ALL: [ChannelId; 9] = [
        ChannelId::Control,
        ChannelId::MediaSinkSystemAudio,
        ChannelId::MediaSinkMediaAudio,
        ChannelId::MediaSinkGuidanceAudio,
        ChannelId::MediaSinkTelephonyAudio,
        ChannelId::MediaSinkVideo,
        ChannelId::MediaSourceMicrophone,
        ChannelId::SensorSource,
        ChannelId::InputSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::Control => "control",
            ChannelId::MediaSinkSystemAudio => "media_sink_system_audio",
            ChannelId::MediaSinkMediaAudio => "media_sink_media_audio",
            ChannelId::MediaSinkGuidanceAudio => "media_sink_guidance_audio",
            ChannelId::MediaSinkTelephonyAudio => "media_sink_telephony_audio",
            ChannelId::MediaSinkVideo => "media_sink_video",
            ChannelId::MediaSourceMicrophone => "media_source_microphone",
            ChannelId::SensorSource => "sensor_source",
            ChannelId::InputSource => "input_source",
        }
    }

    /// Stream tag advertised by the audio sink bound to this channel.
    pub fn audio_stream_type(&self) -> Option<AudioStreamType> {
        match self {
            ChannelId::MediaSinkSystemAudio => Some(AudioStreamType::System),
            ChannelId::MediaSinkMediaAudio => Some(AudioStreamType::Media),
            ChannelId::MediaSinkGuidanceAudio => Some(AudioStreamType::Guidance),
            ChannelId::MediaSinkTelephonyAudio => Some(AudioStreamType::Telephony),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session identifier issued by the peer on a media start indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Timestamp = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Success,
    InternalError,
    UnsolicitedMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSetupStatus {
    Ready,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaCodec {
    AudioPcm,
    VideoH264Bp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioStreamType {
    System,
    Media,
    Guidance,
    Telephony,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFocusMode {
    Native,
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFocusReason {
    Unknown,
    PhoneScreenOff,
    LaunchNative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorType {
    DrivingStatus,
    Location,
    NightMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrivingStatus {
    Unrestricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFocusRequestType {
    Gain,
    GainTransient,
    GainTransientMayDuck,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFocusState {
    Gain,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationFocus {
    Native,
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerAction {
    Down,
    Up,
    Moved,
    PointerDown,
    PointerUp,
}

/// Encoded location sample as carried in a sensor batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationData {
    pub timestamp_s: i64,
    pub latitude_e7: i32,
    pub longitude_e7: i32,
    pub accuracy_e3: u32,
    pub altitude_e2: Option<i32>,
    pub speed_e3: Option<i32>,
    pub bearing_e6: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorBatch {
    DrivingStatus(DrivingStatus),
    NightMode { night: bool },
    Location(LocationData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePointer {
    pub x: u32,
    pub y: u32,
    pub pointer_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: PointerAction,
    pub action_index: u32,
    pub pointers: Vec<WirePointer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputPayload {
    Touch(TouchEvent),
    Key {
        keycode: KeyCode,
        down: bool,
        metastate: u32,
        longpress: bool,
    },
    Relative {
        keycode: KeyCode,
        delta: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEventIndication {
    pub timestamp_us: u64,
    pub payload: InputPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sampling_rate: u32,
    pub number_of_bits: u32,
    pub number_of_channels: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub resolution: VideoResolution,
    pub frame_rate: VideoFrameRate,
    pub width_margin: u32,
    pub height_margin: u32,
    pub density: u32,
}

impl VideoConfig {
    pub fn new(
        resolution: VideoResolution,
        frame_rate: VideoFrameRate,
        margins: Margins,
        density: u32,
    ) -> Self {
        Self {
            resolution,
            frame_rate,
            width_margin: margins.width,
            height_margin: margins.height,
            density,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSinkDescriptor {
    pub codec: MediaCodec,
    pub audio_type: Option<AudioStreamType>,
    pub available_while_in_call: bool,
    pub audio_configs: Vec<AudioConfig>,
    pub video_configs: Vec<VideoConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSourceDescriptor {
    pub codec: MediaCodec,
    pub audio_config: AudioConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSourceDescriptor {
    pub sensors: Vec<SensorType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchscreenConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSourceDescriptor {
    pub supported_keycodes: Vec<KeyCode>,
    pub touchscreen: Option<TouchscreenConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    MediaSink(MediaSinkDescriptor),
    MediaSource(MediaSourceDescriptor),
    SensorSource(SensorSourceDescriptor),
    InputSource(InputSourceDescriptor),
}

/// One capability descriptor entry, keyed by channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub channel_id: ChannelId,
    pub kind: ServiceKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadUnitInfo {
    pub make: String,
    pub model: String,
    pub year: String,
    pub vehicle_id: String,
    pub head_unit_make: String,
    pub head_unit_model: String,
    pub head_unit_software_build: String,
    pub head_unit_software_version: String,
}

/// Capability registry sent in answer to the peer's discovery request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDiscoveryResponse {
    pub display_name: String,
    pub head_unit_info: HeadUnitInfo,
    pub channels: Vec<ServiceDescriptor>,
}

impl ServiceDiscoveryResponse {
    pub fn descriptor(&self, channel: ChannelId) -> Option<&ServiceDescriptor> {
        self.channels.iter().find(|entry| entry.channel_id == channel)
    }
}

/// Messages received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    ChannelOpenRequest {
        priority: i32,
    },
    MediaSetupRequest {
        codec: MediaCodec,
    },
    MediaStartIndication {
        session_id: SessionId,
        configuration_index: u32,
    },
    MediaStopIndication,
    MediaData {
        timestamp: Option<Timestamp>,
        payload: Bytes,
    },
    VideoFocusRequest {
        mode: VideoFocusMode,
        reason: VideoFocusReason,
    },
    /// Peer asks the head unit to open or close its microphone.
    MicrophoneRequest {
        open: bool,
        anc_enabled: bool,
        ec_enabled: bool,
        max_unacked: u32,
    },
    /// Peer acknowledges captured frames sent by a media source.
    MediaAckIndication {
        session_id: SessionId,
        ack: u32,
    },
    SensorStartRequest {
        sensor: SensorType,
    },
    InputBindingRequest {
        keycodes: Vec<KeyCode>,
    },
    ServiceDiscoveryRequest {
        device_name: String,
        label: String,
    },
    AudioFocusRequest {
        request: AudioFocusRequestType,
    },
    NavigationFocusRequest {
        focus_type: u32,
    },
    PingRequest {
        timestamp: i64,
    },
    ByeByeRequest {
        reason: i32,
    },
    ByeByeResponse,
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::ChannelOpenRequest { .. } => "channel_open_request",
            InboundMessage::MediaSetupRequest { .. } => "media_setup_request",
            InboundMessage::MediaStartIndication { .. } => "media_start_indication",
            InboundMessage::MediaStopIndication => "media_stop_indication",
            InboundMessage::MediaData { .. } => "media_data",
            InboundMessage::VideoFocusRequest { .. } => "video_focus_request",
            InboundMessage::MicrophoneRequest { .. } => "microphone_request",
            InboundMessage::MediaAckIndication { .. } => "media_ack_indication",
            InboundMessage::SensorStartRequest { .. } => "sensor_start_request",
            InboundMessage::InputBindingRequest { .. } => "input_binding_request",
            InboundMessage::ServiceDiscoveryRequest { .. } => "service_discovery_request",
            InboundMessage::AudioFocusRequest { .. } => "audio_focus_request",
            InboundMessage::NavigationFocusRequest { .. } => "navigation_focus_request",
            InboundMessage::PingRequest { .. } => "ping_request",
            InboundMessage::ByeByeRequest { .. } => "byebye_request",
            InboundMessage::ByeByeResponse => "byebye_response",
        }
    }
}

/// Messages sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    ChannelOpenResponse {
        status: MessageStatus,
    },
    MediaSetupResponse {
        status: MediaSetupStatus,
        max_unacked: u32,
        configuration_indices: Vec<u32>,
    },
    MediaAck {
        session_id: SessionId,
        ack: u32,
    },
    VideoFocusIndication {
        focus: VideoFocusMode,
        unsolicited: bool,
    },
    MicrophoneResponse {
        status: MessageStatus,
    },
    /// One captured frame, stamped in microseconds since the Unix epoch.
    MediaSourceData {
        timestamp_us: u64,
        payload: Bytes,
    },
    SensorStartResponse {
        status: MessageStatus,
    },
    SensorEvent(SensorBatch),
    InputBindingResponse {
        status: MessageStatus,
    },
    InputEvent(InputEventIndication),
    ServiceDiscoveryResponse(ServiceDiscoveryResponse),
    AudioFocusNotification {
        state: AudioFocusState,
    },
    NavigationFocusNotification {
        focus: NavigationFocus,
    },
    ByeByeResponse,
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::ChannelOpenResponse { .. } => "channel_open_response",
            OutboundMessage::MediaSetupResponse { .. } => "media_setup_response",
            OutboundMessage::MediaAck { .. } => "media_ack",
            OutboundMessage::VideoFocusIndication { .. } => "video_focus_indication",
            OutboundMessage::MicrophoneResponse { .. } => "microphone_response",
            OutboundMessage::MediaSourceData { .. } => "media_source_data",
            OutboundMessage::SensorStartResponse { .. } => "sensor_start_response",
            OutboundMessage::SensorEvent(_) => "sensor_event",
            OutboundMessage::InputBindingResponse { .. } => "input_binding_response",
            OutboundMessage::InputEvent(_) => "input_event",
            OutboundMessage::ServiceDiscoveryResponse(_) => "service_discovery_response",
            OutboundMessage::AudioFocusNotification { .. } => "audio_focus_notification",
            OutboundMessage::NavigationFocusNotification { .. } => "navigation_focus_notification",
            OutboundMessage::ByeByeResponse => "byebye_response",
        }
    }
}
