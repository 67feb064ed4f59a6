//! Flow control and the application event loop.
//!
//! A "flow" builds a [`Scene`] once the GPU context exists and then reacts to
//! keys and frame updates. The engine owns the window, the [`Context`] and the
//! scene, translates winit events into [`InputEvent`]s and renders one frame
//! per redraw.
//!
//! # Lifecycle
//!
//! Each frame:
//! 1. Window and device events are handled by the [`InputHandler`] (camera,
//!    light, quit); remaining keys go to [`SceneFlow::on_key`]
//! 2. [`SceneFlow::on_update`] and the scene's own update closures run
//! 3. [`Scene::draw`] renders every pass and presents
//!
//! Closing the window or pressing Escape ends the loop and tears the scene down.

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{self, NamedKey},
    window::{Window, WindowId},
};

use crate::{
    context::Context,
    input::{Action, InputEvent, InputHandler, Key, MouseButton},
    scene::{Scene, SceneConfig},
};

/// Trait for implementing a scene and its reactions to input.
pub trait SceneFlow {
    /// Called once after the GPU context is created. Load meshes, textures
    /// and passes here; an error ends the application.
    fn on_init(&mut self, ctx: &mut Context, scene: &mut Scene) -> anyhow::Result<()>;

    /// A key the engine did not consume itself.
    fn on_key(&mut self, _scene: &mut Scene, _key: Key) {}

    /// Called every frame before the scene is drawn.
    fn on_update(&mut self, _scene: &mut Scene, _dt: Duration) {}
}

struct AppState {
    ctx: Context,
    scene: Scene,
}

pub struct App<F: SceneFlow> {
    async_runtime: tokio::runtime::Runtime,
    config: SceneConfig,
    flow: F,
    input: InputHandler,
    state: Option<AppState>,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl<F: SceneFlow> App<F> {
    fn new(config: SceneConfig, flow: F) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new()?;
        let input = InputHandler::new(config.controller());
        Ok(Self {
            async_runtime,
            config,
            flow,
            input,
            state: None,
            last_time: Instant::now(),
            error: None,
        })
    }

    fn init(&mut self, window: Arc<Window>) -> anyhow::Result<AppState> {
        let mut ctx = self.async_runtime.block_on(Context::new(window))?;
        let [r, g, b, a] = self.config.clear_colour;
        ctx.clear_colour = wgpu::Color { r, g, b, a };

        let mut scene = Scene::new(self.config.clone());
        let (width, height) = (ctx.config.width, ctx.config.height);
        scene.resize(width, height);
        self.flow.on_init(&mut ctx, &mut scene)?;
        log::info!("scene ready with {} models", scene.models().len());
        Ok(AppState { ctx, scene })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: InputEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        match self.input.handle(&mut state.scene, event) {
            Action::None => {}
            Action::Quit => event_loop.exit(),
            Action::Key(key) => self.flow.on_key(&mut state.scene, key),
        }
    }
}

impl<F: SceneFlow> ApplicationHandler for App<F> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        match self.init(window) {
            Ok(state) => {
                state.ctx.window().request_redraw();
                self.last_time = Instant::now();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn device_event(&mut self, event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.dispatch(event_loop, InputEvent::MouseMotion { dx, dy });
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.dispatch(event_loop, InputEvent::Quit),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if let Some(key) = key_of(&event.logical_key) {
                    self.dispatch(event_loop, InputEvent::KeyPressed(key));
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                let ctrl = modifiers.state().control_key();
                self.dispatch(event_loop, InputEvent::Modifiers { ctrl });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = wheel_notches(delta);
                if notches != 0.0 {
                    self.dispatch(event_loop, InputEvent::Wheel(notches));
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = button_of(button) {
                    let event = if state.is_pressed() {
                        InputEvent::ButtonPressed(button)
                    } else {
                        InputEvent::ButtonReleased(button)
                    };
                    self.dispatch(event_loop, event);
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.ctx.resize(size.width, size.height);
                    state.scene.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                self.flow.on_update(&mut state.scene, dt);
                state.scene.update(dt);
                state.scene.draw(&mut state.ctx);
                state.ctx.window().request_redraw();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(AppState { mut ctx, scene }) = self.state.take() {
            scene.teardown(&mut ctx);
        }
    }
}

fn key_of(key: &keyboard::Key) -> Option<Key> {
    match key {
        keyboard::Key::Named(NamedKey::Escape) => Some(Key::Escape),
        keyboard::Key::Character(text) => text.chars().next().map(|c| Key::Char(c.to_ascii_lowercase())),
        _ => None,
    }
}

/// Wheel movement in notches; positive scrolls towards the scene.
fn wheel_notches(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => (position.y as f32).signum(),
    }
}

fn button_of(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

/// Opens a window, builds the scene through `flow` and runs until quit.
pub fn run<F: SceneFlow>(config: SceneConfig, flow: F) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, flow)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_lowercased_and_escape_is_named() {
        assert_eq!(key_of(&keyboard::Key::Character("S".into())), Some(Key::Char('s')));
        assert_eq!(key_of(&keyboard::Key::Named(NamedKey::Escape)), Some(Key::Escape));
        assert_eq!(key_of(&keyboard::Key::Named(NamedKey::Shift)), None);
    }

    #[test]
    fn pixel_scrolling_counts_as_one_notch() {
        let delta = MouseScrollDelta::PixelDelta(winit::dpi::PhysicalPosition::new(0.0, -37.5));
        assert_eq!(wheel_notches(delta), -1.0);
        assert_eq!(wheel_notches(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
    }
}
