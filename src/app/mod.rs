use crate::assets::{spawn_prop_loads, AssetMessage};
use crate::config::{AppConfig, AppConfigOverrides};
use crate::input::{Input, InputEvent};
use crate::mesh_registry::MeshRegistry;
use crate::renderer::Renderer;
use crate::session::{FrameInput, GlobeSession, SessionCommand};
use crate::time::Time;

use anyhow::{Context, Result};
use glam::Vec2;
use std::sync::mpsc::{Receiver, TryRecvError};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};

#[cfg(feature = "panel")]
mod panel;

#[cfg(feature = "panel")]
use egui_wgpu::{Renderer as EguiRenderer, RendererOptions, ScreenDescriptor};
#[cfg(feature = "panel")]
use egui_winit::State as EguiWinit;

const ORBIT_RADIANS_PER_PIXEL: f32 = 0.005;
const MODELS_DIR: &str = "assets/models";

pub async fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default()).await
}

pub async fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default("config/app.json");
    config.apply_overrides(&overrides);
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

pub struct App {
    renderer: Renderer,
    registry: MeshRegistry,
    session: GlobeSession,
    input: Input,
    time: Time,
    assets: Option<Receiver<AssetMessage>>,
    should_close: bool,

    #[cfg(feature = "panel")]
    egui_ctx: egui::Context,
    #[cfg(feature = "panel")]
    egui_winit: Option<EguiWinit>,
    #[cfg(feature = "panel")]
    egui_renderer: Option<EguiRenderer>,
    #[cfg(feature = "panel")]
    egui_screen: Option<ScreenDescriptor>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let registry = MeshRegistry::new();
        let session = GlobeSession::new(&config, &registry);
        Self {
            renderer: Renderer::new(&config.window),
            registry,
            session,
            input: Input::from_config("config/input.json"),
            time: Time::new(),
            assets: None,
            should_close: false,
            #[cfg(feature = "panel")]
            egui_ctx: egui::Context::default(),
            #[cfg(feature = "panel")]
            egui_winit: None,
            #[cfg(feature = "panel")]
            egui_renderer: None,
            #[cfg(feature = "panel")]
            egui_screen: None,
        }
    }

    /// Load completions apply between frames, before the next tick, so the
    /// registry never mutates while a frame is in flight.
    fn drain_asset_messages(&mut self) {
        let Some(receiver) = self.assets.as_ref() else {
            return;
        };
        loop {
            match receiver.try_recv() {
                Ok(AssetMessage::Loaded(asset)) => {
                    println!("[assets] '{}' ready", asset.name.label());
                    self.session.install_prop(&asset, &mut self.registry);
                }
                Ok(AssetMessage::Failed { name, error }) => {
                    eprintln!("[assets] '{}' failed to load: {error}", name.label());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.assets = None;
                    break;
                }
            }
        }
    }

    fn apply_input_commands(&mut self) {
        if let Some(mode) = self.input.take_mode_request() {
            self.session.apply(SessionCommand::SetGizmoMode(mode));
        }
        for prop in self.input.drain_toggle_requests() {
            self.session.apply(SessionCommand::ToggleProp(prop));
        }
        if self.input.take_generate_pressed() {
            self.session.apply(SessionCommand::GenerateSlime);
        }
        if self.input.take_reset_pressed() {
            self.session.apply(SessionCommand::ResetSlime);
        }
    }

    fn frame(&mut self) {
        self.time.tick();
        let dt = self.time.delta_seconds();

        self.drain_asset_messages();
        self.apply_input_commands();

        let viewport = self.renderer.size();
        let cursor_px = self.input.cursor_position().map(|(x, y)| Vec2::new(x, y));
        let pointer_ndc = cursor_px.and_then(|px| {
            if viewport.width == 0 || viewport.height == 0 {
                return None;
            }
            Some(Vec2::new(
                (2.0 * px.x / viewport.width as f32) - 1.0,
                1.0 - (2.0 * px.y / viewport.height as f32),
            ))
        });
        let left_held = self.input.left_held();
        let (dx, dy) = self.input.mouse_delta;
        let orbit_delta = if left_held {
            Vec2::new(-dx, dy) * ORBIT_RADIANS_PER_PIXEL
        } else {
            Vec2::ZERO
        };
        let frame_input = FrameInput {
            dt,
            viewport,
            pointer_ndc,
            cursor_px,
            clicked: self.input.take_left_click(),
            left_held,
            orbit_delta,
        };

        let output = self.session.tick(&frame_input);
        match self.renderer.render_scene(&mut self.registry, &output.camera, &output.draws) {
            Ok(frame) => self.finish_frame(frame),
            Err(err) => eprintln!("Render error: {err:?}"),
        }
        self.input.clear_frame();
    }

    #[cfg(feature = "panel")]
    fn finish_frame(&mut self, frame: crate::renderer::SurfaceFrame) {
        let raw_input = match (self.renderer.window(), self.egui_winit.as_mut()) {
            (Some(window), Some(state)) => state.take_egui_input(window),
            _ => {
                frame.present();
                return;
            }
        };
        let mut commands: Vec<SessionCommand> = Vec::new();
        let view = panel::PanelView::from_session(&self.session);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            panel::draw(ctx, &view, &mut commands);
        });
        for command in commands {
            self.session.apply(command);
        }
        let egui::FullOutput { platform_output, textures_delta, shapes, .. } = full_output;
        if let (Some(window), Some(state)) = (self.renderer.window(), self.egui_winit.as_mut()) {
            state.handle_platform_output(window, platform_output);
        }
        if let (Some(painter), Some(screen)) = (self.egui_renderer.as_mut(), self.egui_screen.as_ref()) {
            if let (Ok(device), Ok(queue)) = (self.renderer.device(), self.renderer.queue()) {
                for (id, delta) in &textures_delta.set {
                    painter.update_texture(device, queue, *id, delta);
                }
            }
            let meshes = self.egui_ctx.tessellate(shapes, screen.pixels_per_point);
            if let Err(err) = self.renderer.render_panel(painter, &meshes, screen, frame) {
                eprintln!("Panel render error: {err:?}");
            }
            for id in &textures_delta.free {
                painter.free_texture(id);
            }
        } else {
            frame.present();
        }
    }

    #[cfg(not(feature = "panel"))]
    fn finish_frame(&mut self, frame: crate::renderer::SurfaceFrame) {
        frame.present();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.renderer.ensure_window(event_loop) {
            eprintln!("Renderer initialization error: {err:?}");
            self.should_close = true;
            return;
        }
        if let Err(err) = self.renderer.init_scene_pipeline() {
            eprintln!("Failed to initialize scene pipeline: {err:?}");
            self.should_close = true;
            return;
        }
        if self.assets.is_none() {
            println!("[assets] loading props from {MODELS_DIR}");
            self.assets = Some(spawn_prop_loads(MODELS_DIR));
        }

        #[cfg(feature = "panel")]
        {
            if self.egui_winit.is_none() {
                if let Some(window) = self.renderer.window() {
                    let state = EguiWinit::new(
                        self.egui_ctx.clone(),
                        egui::ViewportId::ROOT,
                        window,
                        Some(self.renderer.pixels_per_point()),
                        window.theme(),
                        None,
                    );
                    self.egui_winit = Some(state);
                }
            }
            match (self.renderer.device(), self.renderer.surface_format()) {
                (Ok(device), Ok(format)) => {
                    self.egui_renderer = Some(EguiRenderer::new(device, format, RendererOptions::default()));
                }
                (Err(err), _) | (_, Err(err)) => {
                    eprintln!("Unable to initialize panel renderer: {err:?}");
                }
            }
            let size = self.renderer.size();
            self.egui_screen = Some(ScreenDescriptor {
                size_in_pixels: [size.width, size.height],
                pixels_per_point: self.renderer.pixels_per_point(),
            });
        }
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, id: winit::window::WindowId, event: WindowEvent) {
        let mut consumed = false;
        let input_event = InputEvent::from_window_event(&event);
        let is_cursor_event = matches!(&input_event, InputEvent::CursorPos { .. });
        #[cfg(feature = "panel")]
        if let (Some(window), Some(state)) = (self.renderer.window(), self.egui_winit.as_mut()) {
            if id == window.id() {
                let resp = state.on_window_event(window, &event);
                if resp.consumed {
                    consumed = true;
                }
            }
        }
        #[cfg(not(feature = "panel"))]
        let _ = id;
        if !consumed || is_cursor_event {
            self.input.push(input_event);
        }
        if consumed {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => {
                self.renderer.resize(*size);
                #[cfg(feature = "panel")]
                if let Some(screen) = &mut self.egui_screen {
                    screen.size_in_pixels = [size.width, size.height];
                }
            }
            WindowEvent::KeyboardInput { event: KeyEvent { logical_key, state, .. }, .. } => {
                if let Key::Named(NamedKey::Escape) = logical_key {
                    if *state == ElementState::Pressed {
                        self.should_close = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _e: &ActiveEventLoop, _dev: winit::event::DeviceId, ev: DeviceEvent) {
        self.input.push(InputEvent::from_device_event(&ev));
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        self.frame();
        if let Some(window) = self.renderer.window() {
            window.request_redraw();
        }
    }
}
