use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{Key, NamedKey},
};

use crate::abi::{buttons, MouseInput};

/// Wheel units per notch.
pub const WHEEL_DELTA: i32 = 120;

#[derive(Debug, PartialEq)]
pub enum InputEvent {
    Mouse(MouseInput),
    Character(u32),
}

/// Turns window events into the absolute mouse state and codepoints the module consumes.
///
/// winit reports the cursor from the top-left corner; the module works bottom-up, so the height
/// of the window is tracked to flip it.
#[derive(Debug, Default)]
pub struct InputTranslator {
    mouse: MouseInput,
    height: u32,
}

impl InputTranslator {
    pub fn new(height: u32) -> Self {
        Self {
            mouse: MouseInput::default(),
            height,
        }
    }

    pub fn translate(&mut self, event: &WindowEvent) -> Vec<InputEvent> {
        match event {
            WindowEvent::Resized(size) => {
                self.height = size.height;
                Vec::new()
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse.x = position.x as i32;
                self.mouse.y = flip_y(position.y, self.height);
                vec![self.mouse_event()]
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let bit = button_bit(*button);
                match state {
                    ElementState::Pressed => self.mouse.buttons |= bit,
                    ElementState::Released => self.mouse.buttons &= !bit,
                }
                vec![self.mouse_event()]
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.mouse.wheel = wheel_units(*delta);
                let event = self.mouse_event();
                self.mouse.wheel = 0;
                vec![event]
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                match (&event.logical_key, &event.text) {
                    (Key::Named(NamedKey::Enter), _) => vec![InputEvent::Character('\n' as u32)],
                    (Key::Named(NamedKey::Backspace), _) => vec![InputEvent::Character(0x08)],
                    (_, Some(text)) => text
                        .chars()
                        .map(|c| InputEvent::Character(c as u32))
                        .collect(),
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    fn mouse_event(&self) -> InputEvent {
        InputEvent::Mouse(self.mouse)
    }
}

fn flip_y(y: f64, height: u32) -> i32 {
    height as i32 - 1 - y as i32
}

fn button_bit(button: MouseButton) -> u32 {
    match button {
        MouseButton::Left => buttons::LEFT,
        MouseButton::Right => buttons::RIGHT,
        _ => 0,
    }
}

fn wheel_units(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => (y * WHEEL_DELTA as f32).round() as i32,
        MouseScrollDelta::PixelDelta(position) => position.y.round() as i32,
    }
}
