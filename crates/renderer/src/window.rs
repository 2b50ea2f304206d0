//! Windowed preview loop: one winit window, one loaded demo, redraws paced
//! by the optional FPS cap.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use tracing::{debug, error, warn};

use crate::gpu::GpuState;
use crate::runtime::{local_date_uniform, FrameClock, FrameContext, FramePacer};
use crate::types::{DemoBundle, RendererConfig};
use crate::VideoFrame;

/// Aggregates GPU state and input tracking for the preview window.
struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
    mouse: MouseState,
    clock: FrameClock,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig, bundle: &DemoBundle) -> Result<Self> {
        let size = window.inner_size();
        let mut gpu = GpuState::new(
            window.as_ref(),
            size,
            bundle,
            config.antialiasing,
            config.color_space,
            config.surface_alpha,
        )?;
        gpu.start()?;

        Ok(Self {
            window,
            gpu,
            mouse: MouseState::default(),
            clock: FrameClock::animated(config.fixed_time),
        })
    }

    fn size(&self) -> PhysicalSize<u32> {
        self.gpu.size()
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
    }

    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let size = self.size();
        let (sample, delta) = self.clock.tick();
        let frame_ctx = FrameContext {
            width: size.width,
            height: size.height,
            time: sample.seconds,
            delta,
            frame: sample.frame_index,
            mouse: self.mouse.as_uniform(size.height.max(1) as f32),
            date: local_date_uniform(),
        };
        self.gpu.render(&frame_ctx)
    }
}

/// Runs the preview window on the calling thread until the user quits.
pub(crate) fn run_window(
    config: &RendererConfig,
    bundle: &DemoBundle,
    video_frames: Option<Receiver<VideoFrame>>,
) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(format!("shaderdeck: {}", bundle.name))
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window.clone(), config, bundle)?;
    let mut pacer = FramePacer::new(config.target_fps);

    if video_frames.is_some() && !state.gpu.has_video_channel() {
        warn!("video feed attached but the demo declares no video channel; frames will be dropped");
    }

    state.window.request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed
                            && !event.repeat
                            && is_quit_key(&event.logical_key)
                        {
                            elwt.exit();
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        state.mouse.handle_cursor_moved(position);
                    }
                    WindowEvent::MouseInput {
                        state: button_state,
                        button,
                        ..
                    } => {
                        if button == winit::event::MouseButton::Left {
                            state.mouse.handle_button(button_state);
                        }
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(new_size);
                    }
                    WindowEvent::ScaleFactorChanged {
                        mut inner_size_writer,
                        ..
                    } => {
                        let _ = inner_size_writer.request_inner_size(state.size());
                    }
                    WindowEvent::RedrawRequested => {
                        if let Some(frames) = video_frames.as_ref() {
                            // Only the newest decoded frame matters.
                            if let Some(frame) = frames.try_iter().last() {
                                state.gpu.push_video_frame(&frame.pixels);
                            }
                        }
                        match state.render_frame() {
                            Ok(()) => pacer.mark_rendered(Instant::now()),
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                state.resize(state.size());
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                error!("surface out of memory; exiting preview");
                                elwt.exit();
                            }
                            Err(wgpu::SurfaceError::Timeout) => {
                                debug!("surface timeout; retrying next frame");
                            }
                            Err(other) => {
                                warn!(error = ?other, "surface error; retrying next frame");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if pacer.ready_for_frame(now) {
                    state.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = pacer.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

/// Escape or Q (either case) closes the preview.
fn is_quit_key(key: &Key) -> bool {
    match key {
        Key::Named(NamedKey::Escape) => true,
        Key::Character(value) => value.as_str().eq_ignore_ascii_case("q"),
        _ => false,
    }
}

/// ShaderToy mouse packing: `xy` tracks the cursor, `zw` the press anchor
/// while the button is held, both measured from the bottom-left corner.
#[derive(Default)]
struct MouseState {
    position: Option<PhysicalPosition<f64>>,
    pressed_anchor: Option<PhysicalPosition<f64>>,
    is_pressed: bool,
}

impl MouseState {
    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.position = Some(position);
        if self.is_pressed {
            self.pressed_anchor.get_or_insert(position);
        }
    }

    fn handle_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.is_pressed = true;
                if let Some(pos) = self.position {
                    self.pressed_anchor = Some(pos);
                }
            }
            ElementState::Released => {
                self.is_pressed = false;
                self.pressed_anchor = None;
            }
        }
    }

    fn as_uniform(&self, height: f32) -> [f32; 4] {
        let mut data = [0.0; 4];

        if let Some(pos) = self.position {
            data[0] = pos.x as f32;
            data[1] = height - pos.y as f32;
        }

        if let Some(anchor) = self.pressed_anchor {
            data[2] = anchor.x as f32;
            data[3] = height - anchor.y as f32;
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_keys_match_either_case() {
        assert!(is_quit_key(&Key::Named(NamedKey::Escape)));
        assert!(is_quit_key(&Key::Character("q".into())));
        assert!(is_quit_key(&Key::Character("Q".into())));
        assert!(!is_quit_key(&Key::Character("w".into())));
        assert!(!is_quit_key(&Key::Named(NamedKey::Space)));
    }

    #[test]
    fn mouse_uniform_uses_bottom_left_origin() {
        let mut mouse = MouseState::default();
        mouse.handle_cursor_moved(PhysicalPosition::new(100.0, 20.0));
        let data = mouse.as_uniform(720.0);
        assert_eq!(data[0], 100.0);
        assert_eq!(data[1], 700.0);
        assert_eq!(data[2], 0.0);
    }

    #[test]
    fn press_anchor_clears_on_release() {
        let mut mouse = MouseState::default();
        mouse.handle_cursor_moved(PhysicalPosition::new(50.0, 50.0));
        mouse.handle_button(ElementState::Pressed);
        assert_ne!(mouse.as_uniform(100.0)[2], 0.0);
        mouse.handle_button(ElementState::Released);
        assert_eq!(mouse.as_uniform(100.0)[2], 0.0);
    }
}
