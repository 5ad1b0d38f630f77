//! Translation of winit window events into explorer [`InputEvent`]s.

use mesmer_core::{InputEvent, Key, MouseButton};
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key as WinitKey, NamedKey};

/// Trackpads report pixels; this many count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 50.0;

/// Remembers the cursor, since button and wheel events carry no position.
#[derive(Debug, Default)]
pub struct InputTranslator {
    cursor: (f32, f32),
}

impl InputTranslator {
    pub fn translate(&mut self, event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::CloseRequested => Some(InputEvent::Close),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                Some(InputEvent::MouseMotion {
                    position: self.cursor,
                })
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = wheel_notches(*delta);
                (delta != 0.0).then_some(InputEvent::Wheel {
                    position: self.cursor,
                    delta,
                })
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_button(*button)?;
                let position = self.cursor;
                Some(match state {
                    ElementState::Pressed => InputEvent::MouseDown { position, button },
                    ElementState::Released => InputEvent::MouseUp { position, button },
                })
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                map_key(&event.logical_key).map(InputEvent::Key)
            }
            _ => None,
        }
    }
}

fn wheel_notches(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_NOTCH,
    }
}

fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn map_key(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Named(NamedKey::Escape | NamedKey::Backspace) => Some(Key::Back),
        WinitKey::Named(NamedKey::Space) => Some(Key::ResetView),
        WinitKey::Character(c) if c.eq_ignore_ascii_case("s") => Some(Key::Export),
        _ => None,
    }
}
