//! Input source channel: vehicle buttons, rotary controller and touchscreen.

mod pointer;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::InputSettings;
use crate::device::{
    ButtonAction, ButtonEvent, InputDevice, InputEvent, KeyCode, Size, WheelDirection,
};
use crate::transport::{
    ChannelId, InboundMessage, InputEventIndication, InputPayload, InputSourceDescriptor,
    MessageStatus, OutboundMessage, ServiceDescriptor, ServiceKind, TouchscreenConfig,
};

use self::pointer::{PointerScale, PointerTracker};
use super::runtime::{ChannelContext, ChannelHandler, LocalEvent};

pub struct InputSource {
    device: Arc<dyn InputDevice>,
    settings: InputSettings,
    display: Size,
    pointers: PointerTracker,
    device_started: bool,
}

impl InputSource {
    /// `display` is the projected surface size touch coordinates are scaled to.
    pub fn new(device: Arc<dyn InputDevice>, settings: InputSettings, display: Size) -> Self {
        Self {
            device,
            settings,
            display,
            pointers: PointerTracker::default(),
            device_started: false,
        }
    }

    fn supported_keycodes(&self) -> Vec<KeyCode> {
        let mut codes = self.device.supported_keycodes();
        if !self.settings.button_codes.is_empty() {
            codes.retain(|code| self.settings.button_codes.contains(code));
        }
        codes
    }

    /// Panel geometry reported by the device, or the configured size when
    /// the device does not report one.
    fn touchscreen(&self) -> Option<Size> {
        if !self.settings.touchscreen_enabled {
            return None;
        }
        Some(
            self.device
                .touchscreen()
                .unwrap_or_else(|| Size::new(self.settings.width, self.settings.height)),
        )
    }

    fn pointer_scale(&self) -> PointerScale {
        match self.touchscreen() {
            Some(touchscreen) => PointerScale::new(touchscreen, self.display),
            None => PointerScale::identity(),
        }
    }

    async fn binding_request(&mut self, ctx: &mut ChannelContext, keycodes: Vec<KeyCode>) {
        let supported = self.supported_keycodes();
        let unsupported: Vec<KeyCode> = keycodes
            .iter()
            .copied()
            .filter(|code| !supported.contains(code))
            .collect();

        let status = if unsupported.is_empty() {
            MessageStatus::Success
        } else {
            warn!(target: "input_source", ?unsupported, "binding requested unsupported keycodes");
            MessageStatus::UnsolicitedMessage
        };
        info!(target: "input_source", requested = keycodes.len(), ?status, "input binding request");

        let sent = ctx
            .send(OutboundMessage::InputBindingResponse { status })
            .await;
        if sent && status == MessageStatus::Success && !ctx.is_stop_requested() {
            if self.device_started {
                debug!(target: "input_source", "rebinding, previous input stream stopped");
                ctx.detach_local_input();
                self.device.stop();
            }
            self.pointers.reset();
            ctx.attach_local_input(self.device.start());
            self.device_started = true;
        }
    }

    async fn send_payload(&mut self, ctx: &mut ChannelContext, payload: InputPayload) {
        ctx.send(OutboundMessage::InputEvent(InputEventIndication {
            timestamp_us: timestamp_us(),
            payload,
        }))
        .await;
    }
}

#[async_trait]
impl ChannelHandler for InputSource {
    fn channel_id(&self) -> ChannelId {
        ChannelId::InputSource
    }

    fn fill_features(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            channel_id: ChannelId::InputSource,
            kind: ServiceKind::InputSource(InputSourceDescriptor {
                supported_keycodes: self.supported_keycodes(),
                touchscreen: self.touchscreen().map(|_| TouchscreenConfig {
                    width: self.display.width,
                    height: self.display.height,
                }),
            }),
        }
    }

    async fn on_message(&mut self, ctx: &mut ChannelContext, message: InboundMessage) {
        match message {
            InboundMessage::InputBindingRequest { keycodes } => {
                self.binding_request(ctx, keycodes).await;
            }
            other => warn!(
                target: "input_source",
                kind = other.kind(),
                "unexpected message on input channel"
            ),
        }
    }

    async fn on_local_event(&mut self, ctx: &mut ChannelContext, event: LocalEvent) {
        let LocalEvent::Input(event) = event else {
            return;
        };
        match event {
            InputEvent::Pointer(pointer) => {
                if self.touchscreen().is_none() {
                    return;
                }
                let scale = self.pointer_scale();
                if let Some(touch) = self.pointers.apply(pointer, &scale) {
                    self.send_payload(ctx, InputPayload::Touch(touch)).await;
                }
            }
            InputEvent::Button(button) => match button_payload(&button) {
                Some(payload) => self.send_payload(ctx, payload).await,
                None => debug!(target: "input_source", ?button, "button event ignored"),
            },
        }
    }

    fn on_stop(&mut self, _ctx: &mut ChannelContext) {
        if self.device_started {
            self.device.stop();
            self.device_started = false;
        }
        self.pointers.reset();
    }
}

fn button_payload(button: &ButtonEvent) -> Option<InputPayload> {
    match button.wheel {
        WheelDirection::Left => {
            return Some(InputPayload::Relative {
                keycode: KeyCode::RotaryController,
                delta: -1,
            })
        }
        WheelDirection::Right => {
            return Some(InputPayload::Relative {
                keycode: KeyCode::RotaryController,
                delta: 1,
            })
        }
        WheelDirection::None => {}
    }

    let down = match button.action {
        ButtonAction::Press => true,
        ButtonAction::Release => false,
        ButtonAction::None => return None,
    };

    Some(InputPayload::Key {
        keycode: button.code,
        down,
        metastate: 0,
        longpress: false,
    })
}

pub(super) fn timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros().min(u64::MAX as u128) as u64)
        .unwrap_or_default()
}
