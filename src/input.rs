//! Input events and their effect on the scene.
//!
//! Window events are translated into [`InputEvent`]s (see `flow`) and applied
//! by an [`InputHandler`]:
//!
//! - wheel: zoom the camera, or scale the light position when Ctrl is held
//! - left drag: move the camera's look-at point
//! - right drag: orbit
//! - Escape or closing the window: quit
//!
//! Any other key is handed back to the caller as [`Action::Key`].

use crate::{camera::CameraController, scene::Scene};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Char(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Quit,
    KeyPressed(Key),
    /// Positive values scroll up (towards the scene).
    Wheel(f32),
    ButtonPressed(MouseButton),
    ButtonReleased(MouseButton),
    /// Relative pointer motion in pixels.
    MouseMotion { dx: f64, dy: f64 },
    Modifiers { ctrl: bool },
}

/// What the caller should do after an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Key(Key),
}

pub struct InputHandler {
    pub controller: CameraController,
    /// Light position factor per wheel notch with Ctrl held.
    pub light_step: f32,
    left: bool,
    right: bool,
    ctrl: bool,
}

impl InputHandler {
    pub fn new(controller: CameraController) -> Self {
        Self {
            controller,
            light_step: 0.1,
            left: false,
            right: false,
            ctrl: false,
        }
    }

    pub fn handle(&mut self, scene: &mut Scene, event: InputEvent) -> Action {
        match event {
            InputEvent::Quit | InputEvent::KeyPressed(Key::Escape) => return Action::Quit,
            InputEvent::KeyPressed(key) => return Action::Key(key),
            InputEvent::Wheel(notches) if self.ctrl => {
                let factor = if notches > 0.0 {
                    1.0 + self.light_step
                } else {
                    1.0 - self.light_step
                };
                scene.light.scale_position(factor);
            }
            InputEvent::Wheel(notches) => {
                let notches = notches.signum();
                self.controller.handle_wheel(&mut scene.camera, notches);
            }
            InputEvent::ButtonPressed(button) | InputEvent::ButtonReleased(button) => {
                let pressed = matches!(event, InputEvent::ButtonPressed(_));
                match button {
                    MouseButton::Left => self.left = pressed,
                    MouseButton::Right => self.right = pressed,
                    MouseButton::Middle => {}
                }
            }
            InputEvent::MouseMotion { dx, dy } => {
                let window = (scene.config.width, scene.config.height);
                if self.left {
                    self.controller.handle_pan(&mut scene.camera, (dx, dy), window);
                } else if self.right {
                    self.controller.handle_orbit(&mut scene.camera, (dx, dy), window);
                }
            }
            InputEvent::Modifiers { ctrl } => self.ctrl = ctrl,
        }
        Action::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneConfig;
    use approx::assert_relative_eq;
    use cgmath::Point3;

    fn scene() -> Scene {
        Scene::new(SceneConfig::default())
    }

    #[test]
    fn ctrl_wheel_moves_light_not_camera() {
        let mut scene = scene();
        scene.light.position = Point3::new(0.0, 10.0, 0.0);
        let mut input = InputHandler::new(scene.config.controller());
        input.handle(&mut scene, InputEvent::Modifiers { ctrl: true });
        input.handle(&mut scene, InputEvent::Wheel(1.0));
        assert_relative_eq!(scene.light.position.y, 11.0, epsilon = 1e-5);
        input.handle(&mut scene, InputEvent::Wheel(-1.0));
        assert_relative_eq!(scene.light.position.y, 9.9, epsilon = 1e-5);
        assert_eq!(scene.camera.distance(), 5.0);
    }

    #[test]
    fn drag_needs_a_pressed_button() {
        let mut scene = scene();
        let mut input = InputHandler::new(scene.config.controller());
        input.handle(&mut scene, InputEvent::MouseMotion { dx: 80.0, dy: 0.0 });
        assert_eq!(scene.camera.azimuth(), 0.0);

        input.handle(&mut scene, InputEvent::ButtonPressed(MouseButton::Right));
        input.handle(&mut scene, InputEvent::MouseMotion { dx: 80.0, dy: 0.0 });
        assert_relative_eq!(scene.camera.azimuth(), -0.1, epsilon = 1e-6);

        input.handle(&mut scene, InputEvent::ButtonReleased(MouseButton::Right));
        input.handle(&mut scene, InputEvent::MouseMotion { dx: 80.0, dy: 0.0 });
        assert_relative_eq!(scene.camera.azimuth(), -0.1, epsilon = 1e-6);
    }

    #[test]
    fn escape_quits_and_letters_pass_through() {
        let mut scene = scene();
        let mut input = InputHandler::new(scene.config.controller());
        assert_eq!(input.handle(&mut scene, InputEvent::KeyPressed(Key::Escape)), Action::Quit);
        assert_eq!(
            input.handle(&mut scene, InputEvent::KeyPressed(Key::Char('s'))),
            Action::Key(Key::Char('s'))
        );
    }
}
