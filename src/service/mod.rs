//! Channel services: one actor per logical channel.

mod audio;
mod constants;
mod input;
mod media;
mod microphone;
mod runtime;
mod sensor;
mod video;

pub use audio::AudioSink;
pub use input::InputSource;
pub use microphone::MicrophoneSource;
pub use runtime::{
    spawn_service, ChannelContext, ChannelHandler, ChannelState, DriveMode, LocalEvent,
    RunningService, ServiceHandle,
};
pub use sensor::SensorSource;
pub use video::VideoSink;

pub(crate) use constants::EVENT_BUS_CAPACITY;

#[cfg(test)]
mod tests;
