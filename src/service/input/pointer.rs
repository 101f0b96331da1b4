//! Multi-pointer gesture tracking.

use crate::device::{PointerEvent, PointerSample, Size};
use crate::transport::{PointerAction, TouchEvent, WirePointer};

/// Maps touchscreen coordinates onto the projected display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PointerScale {
    x: f32,
    y: f32,
}

impl PointerScale {
    pub(crate) fn new(touchscreen: Size, display: Size) -> Self {
        let ratio = |to: u32, from: u32| {
            if from == 0 {
                1.0
            } else {
                to as f32 / from as f32
            }
        };
        Self {
            x: ratio(display.width, touchscreen.width),
            y: ratio(display.height, touchscreen.height),
        }
    }

    pub(crate) fn identity() -> Self {
        Self { x: 1.0, y: 1.0 }
    }

    fn apply(&self, x: f32, y: f32) -> (u32, u32) {
        ((x * self.x).round().max(0.0) as u32, (y * self.y).round().max(0.0) as u32)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActivePointer {
    local_id: u64,
    wire_id: u32,
    x: f32,
    y: f32,
}

/// Translates local pointer events into wire touch events.
///
/// Local ids map to sequential wire ids on first engagement. Wire ids are
/// only handed out again after the whole gesture has ended.
#[derive(Debug, Default)]
pub(crate) struct PointerTracker {
    active: Vec<ActivePointer>,
    next_wire_id: u32,
}

impl PointerTracker {
    pub(crate) fn apply(&mut self, event: PointerEvent, scale: &PointerScale) -> Option<TouchEvent> {
        match event {
            PointerEvent::Engage(sample) => self.engage(sample, scale),
            PointerEvent::Move(samples) => self.move_pointers(&samples, scale),
            PointerEvent::Release(sample) => self.release(sample, scale),
            PointerEvent::Cancel => self.cancel(scale),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.active.clear();
        self.next_wire_id = 0;
    }

    fn engage(&mut self, sample: PointerSample, scale: &PointerScale) -> Option<TouchEvent> {
        if let Some(existing) = self.position(sample.id) {
            self.update(existing, &sample);
            return Some(self.message(PointerAction::Moved, 0, scale));
        }

        let wire_id = self.next_wire_id;
        self.next_wire_id += 1;
        self.active.push(ActivePointer {
            local_id: sample.id,
            wire_id,
            x: sample.x,
            y: sample.y,
        });

        let index = self.active.len() - 1;
        let action = if index == 0 {
            PointerAction::Down
        } else {
            PointerAction::PointerDown
        };
        Some(self.message(action, index, scale))
    }

    fn move_pointers(&mut self, samples: &[PointerSample], scale: &PointerScale) -> Option<TouchEvent> {
        let mut moved = false;
        for sample in samples {
            if let Some(index) = self.position(sample.id) {
                self.update(index, sample);
                moved = true;
            }
        }

        moved.then(|| self.message(PointerAction::Moved, 0, scale))
    }

    fn release(&mut self, sample: PointerSample, scale: &PointerScale) -> Option<TouchEvent> {
        let index = self.position(sample.id)?;
        self.update(index, &sample);

        let message = if self.active.len() == 1 {
            self.message(PointerAction::Up, 0, scale)
        } else {
            self.message(PointerAction::PointerUp, index, scale)
        };

        self.active.remove(index);
        if self.active.is_empty() {
            self.next_wire_id = 0;
        }
        Some(message)
    }

    fn cancel(&mut self, scale: &PointerScale) -> Option<TouchEvent> {
        if self.active.is_empty() {
            return None;
        }
        let message = self.message(PointerAction::Up, 0, scale);
        self.reset();
        Some(message)
    }

    fn position(&self, local_id: u64) -> Option<usize> {
        self.active
            .iter()
            .position(|pointer| pointer.local_id == local_id)
    }

    fn update(&mut self, index: usize, sample: &PointerSample) {
        let pointer = &mut self.active[index];
        pointer.x = sample.x;
        pointer.y = sample.y;
    }

    fn message(&self, action: PointerAction, action_index: usize, scale: &PointerScale) -> TouchEvent {
        TouchEvent {
            action,
            action_index: action_index as u32,
            pointers: self
                .active
                .iter()
                .map(|pointer| {
                    let (x, y) = scale.apply(pointer.x, pointer.y);
                    WirePointer {
                        x,
                        y,
                        pointer_id: pointer.wire_id,
                    }
                })
                .collect(),
        }
    }
}
