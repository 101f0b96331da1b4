use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::HeadUnitConfig;
use crate::device::{AudioInput, AudioOutput, InputDevice, SensorProvider, VideoOutput};
use crate::error::SessionError;
use crate::service::{
    spawn_service, AudioSink, ChannelHandler, InputSource, MicrophoneSource, RunningService,
    SensorSource, VideoSink,
};
use crate::transport::{ChannelId, Transport};

use super::lifecycle::SessionEvent;

/// Backends handed to one session. System audio, video, input and sensors
/// are mandatory; the remaining audio streams and the microphone are
/// attached on demand.
#[derive(Clone)]
pub struct DeviceSet {
    system_audio: Arc<dyn AudioOutput>,
    media_audio: Option<Arc<dyn AudioOutput>>,
    guidance_audio: Option<Arc<dyn AudioOutput>>,
    telephony_audio: Option<Arc<dyn AudioOutput>>,
    video: Arc<dyn VideoOutput>,
    microphone: Option<Arc<dyn AudioInput>>,
    input: Arc<dyn InputDevice>,
    sensors: Arc<dyn SensorProvider>,
}

impl DeviceSet {
    pub fn new(
        system_audio: Arc<dyn AudioOutput>,
        video: Arc<dyn VideoOutput>,
        input: Arc<dyn InputDevice>,
        sensors: Arc<dyn SensorProvider>,
    ) -> Self {
        Self {
            system_audio,
            media_audio: None,
            guidance_audio: None,
            telephony_audio: None,
            video,
            microphone: None,
            input,
            sensors,
        }
    }

    pub fn with_media_audio(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.media_audio = Some(output);
        self
    }

    pub fn with_guidance_audio(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.guidance_audio = Some(output);
        self
    }

    pub fn with_telephony_audio(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.telephony_audio = Some(output);
        self
    }

    pub fn with_microphone(mut self, input: Arc<dyn AudioInput>) -> Self {
        self.microphone = Some(input);
        self
    }
}

/// Builds the channel set of a session from configuration.
pub struct ServiceFactory {
    config: Arc<HeadUnitConfig>,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
}

impl ServiceFactory {
    pub fn new(
        config: Arc<HeadUnitConfig>,
        transport: Arc<dyn Transport>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            transport,
            events,
        }
    }

    pub fn build(&self, devices: DeviceSet) -> Result<Vec<RunningService>, SessionError> {
        let audio = &self.config.audio;
        let optional_streams = [
            (
                ChannelId::MediaSinkMediaAudio,
                audio.media_enabled,
                devices.media_audio,
            ),
            (
                ChannelId::MediaSinkGuidanceAudio,
                audio.guidance_enabled,
                devices.guidance_audio,
            ),
            (
                ChannelId::MediaSinkTelephonyAudio,
                audio.telephony_enabled,
                devices.telephony_audio,
            ),
        ];

        let mut audio_sinks = vec![AudioSink::new(
            ChannelId::MediaSinkSystemAudio,
            devices.system_audio,
        )];
        for (channel, enabled, output) in optional_streams {
            match (enabled, output) {
                (true, Some(output)) => audio_sinks.push(AudioSink::new(channel, output)),
                (true, None) => return Err(SessionError::MissingDevice { channel }),
                (false, Some(_)) => {
                    debug!(target: "session_orchestrator", %channel, "audio stream disabled")
                }
                (false, None) => {}
            }
        }

        let microphone = match (audio.microphone_enabled, devices.microphone) {
            (true, Some(input)) => Some(MicrophoneSource::new(input)),
            (true, None) => {
                return Err(SessionError::MissingDevice {
                    channel: ChannelId::MediaSourceMicrophone,
                })
            }
            (false, _) => None,
        };

        let mut services = Vec::with_capacity(audio_sinks.len() + 4);
        for sink in audio_sinks {
            services.push(self.spawn(sink));
        }
        services.push(self.spawn(VideoSink::new(devices.video)));
        if let Some(microphone) = microphone {
            services.push(self.spawn(microphone));
        }
        services.push(self.spawn(SensorSource::new(
            devices.sensors,
            self.config.sensor_poll_interval(),
        )));
        services.push(self.spawn(InputSource::new(
            devices.input,
            self.config.input.clone(),
            self.config.video.resolution.size(),
        )));

        info!(
            target: "session_orchestrator",
            services = services.len(),
            "channel services created"
        );
        Ok(services)
    }

    fn spawn<H: ChannelHandler>(&self, handler: H) -> RunningService {
        spawn_service(
            handler,
            Arc::clone(&self.transport),
            self.events.clone(),
            self.config.runtime.mailbox_capacity,
        )
    }
}
