//! Window host loop with winit
//!
//! Owns the window, the wgpu surface and the [`Renderer`]. Keyboard and raw
//! pointer motion drive the free-fly camera; `R` and the optional shader
//! watcher trigger a reload.

// Collapsible if is clearer as two separate conditions
#![allow(clippy::collapsible_if)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use crate::camera::{Camera, CameraController, MotionInput};
use crate::renderer::Renderer;
use crate::shader::ShaderLibrary;
use crate::topology::Topology;
use crate::watch::ShaderWatcher;
use crate::wgpu_backend::{WgpuBackend, init_with_surface};

/// Configuration for the interactive window
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub topology: Topology,
    /// Shader directory; the embedded shaders are used when `None`
    pub shader_dir: Option<PathBuf>,
    /// Reload automatically when files in `shader_dir` change
    pub watch: bool,
    pub controller: CameraController,
    pub camera: Camera,
    /// Capture the cursor for mouse look as soon as the window opens
    pub grab_cursor: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Forge Engine".to_string(),
            width: 1600,
            height: 900,
            topology: Topology::Direct,
            shader_dir: None,
            watch: false,
            controller: CameraController::default(),
            camera: Camera::default(),
            grab_cursor: true,
        }
    }
}

/// Counts frames and reports the rate once per second
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Record a frame; returns the frame rate when a second has elapsed
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

/// Record a movement key press or release
fn apply_key(input: &mut MotionInput, code: KeyCode, pressed: bool) {
    match code {
        KeyCode::KeyW => input.forward = pressed,
        KeyCode::KeyS => input.back = pressed,
        KeyCode::KeyA => input.left = pressed,
        KeyCode::KeyD => input.right = pressed,
        KeyCode::Space => input.up = pressed,
        KeyCode::ShiftLeft => input.down = pressed,
        _ => {}
    }
}

struct ForgeApp {
    config: WindowConfig,
    instance: wgpu::Instance,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    renderer: Option<Renderer<WgpuBackend>>,
    watcher: Option<ShaderWatcher>,
    camera: Camera,
    input: MotionInput,
    cursor_grabbed: bool,
    start_time: Instant,
    last_frame: Instant,
    fps: FpsCounter,
    fatal: Option<anyhow::Error>,
}

impl ForgeApp {
    fn new(config: WindowConfig) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let now = Instant::now();

        Self {
            camera: config.camera,
            config,
            instance,
            window: None,
            surface: None,
            surface_config: None,
            renderer: None,
            watcher: None,
            input: MotionInput::default(),
            cursor_grabbed: false,
            start_time: now,
            last_frame: now,
            fps: FpsCounter::new(now),
            fatal: None,
        }
    }

    fn library(&self) -> ShaderLibrary {
        match &self.config.shader_dir {
            Some(dir) => ShaderLibrary::from_dir(dir),
            None => ShaderLibrary::embedded(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let surface = self.instance.create_surface(window.clone())?;
        let (device, queue, format) =
            pollster::block_on(init_with_surface(&self.instance, &surface))?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let backend = WgpuBackend::new(device, queue, format);
        let renderer = Renderer::create(
            backend,
            self.library(),
            self.config.topology,
            size.width,
            size.height,
        )?;

        if self.config.watch {
            match &self.config.shader_dir {
                Some(dir) => {
                    let mut watcher = ShaderWatcher::new(None)?;
                    watcher.watch(dir)?;
                    self.watcher = Some(watcher);
                }
                None => tracing::warn!("--watch needs a shader directory, ignoring"),
            }
        }

        self.window = Some(window);
        self.surface = Some(surface);
        self.surface_config = Some(surface_config);
        self.renderer = Some(renderer);
        if self.config.grab_cursor {
            self.set_cursor_grab(true);
        }
        self.start_time = Instant::now();
        self.last_frame = self.start_time;
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width > 0 && size.height > 0 {
            if let (Some(config), Some(surface), Some(renderer)) =
                (&mut self.surface_config, &self.surface, &self.renderer)
            {
                config.width = size.width;
                config.height = size.height;
                surface.configure(renderer.backend().device(), config);
            }
        }
        if let Some(renderer) = &mut self.renderer {
            // Allocation failures are logged by the renderer; the next
            // successful resize recovers
            let _ = renderer.resize(size.width, size.height);
        }
    }

    fn set_cursor_grab(&mut self, grab: bool) {
        let Some(window) = &self.window else {
            return;
        };
        if grab {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                tracing::warn!("failed to grab cursor: {e}");
                return;
            }
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
        }
        window.set_cursor_visible(!grab);
        self.cursor_grabbed = grab;
    }

    fn reload(&mut self) {
        if let Some(renderer) = &mut self.renderer {
            // On failure the renderer logs and keeps the previous programs
            let _ = renderer.reload();
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;
        apply_key(&mut self.input, code, pressed);

        if pressed && !event.repeat {
            match code {
                KeyCode::Escape => self.set_cursor_grab(!self.cursor_grabbed),
                KeyCode::KeyR => self.reload(),
                _ => {}
            }
        }
    }

    fn render(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.config
            .controller
            .update(&mut self.camera, dt, &self.input);
        self.input.pointer_dx = 0.0;
        self.input.pointer_dy = 0.0;

        if self.watcher.as_ref().is_some_and(ShaderWatcher::reload_requested) {
            self.reload();
        }

        let (Some(surface), Some(renderer)) = (&self.surface, &mut self.renderer) else {
            return;
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(config) = &self.surface_config {
                    surface.configure(renderer.backend().device(), config);
                }
                return;
            }
            Err(e) => {
                tracing::warn!("surface error: {e}");
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let time = self.start_time.elapsed().as_secs_f32();
        renderer.draw(time, &self.camera, &view);
        frame.present();

        if let Some(fps) = self.fps.tick(now) {
            tracing::info!("{fps:.1} FPS (shader generation {})", renderer.generation());
            if let Some(window) = &self.window {
                window.set_title(&format!(
                    "{} - {fps:.0} FPS ({})",
                    self.config.title,
                    renderer.topology()
                ));
            }
        }
    }
}

impl ApplicationHandler for ForgeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.render();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(&event);
            }
            WindowEvent::Focused(false) => {
                self.input = MotionInput::default();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.cursor_grabbed {
                self.input.pointer_dx += delta.0 as f32;
                self.input.pointer_dy += delta.1 as f32;
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy();
        }
    }
}

/// Open the window and run until it is closed
pub fn run(config: WindowConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ForgeApp::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None if app.window.is_none() => {
            Err(anyhow!("event loop exited before a window was created"))
        }
        None => Ok(()),
    }
}

/// Controls help text
pub fn controls_help() -> &'static str {
    r#"
Controls:
  W / A / S / D  - Move forward / left / back / right
  Space          - Move up
  Left Shift     - Move down
  Mouse          - Look around (while the cursor is captured)
  Escape         - Release / recapture the cursor
  R              - Reload shaders
"#
}
