//! Crag -- main loop and application entry point.
//!
//! winit drives the event loop via `ApplicationHandler`. All simulation runs
//! inside `RedrawRequested` on a fixed timestep (see `TimeState`):
//!
//!   1. `begin_frame()` -- measure wall-clock delta, feed accumulator
//!   2. `while should_step()` -- advance `GameState` one fixed step at a time
//!   3. Rebuild the world and screen meshes from the settled state
//!   4. Draw the world layer, then the screen layer, then the egui labels and
//!      debug window on top
//!
//! Levels live in `saves/` next to the working directory. Solid tiles use
//! `assets/tiles.png` when it exists and flat colours otherwise.

mod collision;
mod editor;
mod game;
mod level;
mod level_select;
mod mesh;
mod player;
mod registry;
#[cfg(test)]
mod replay;
mod storage;

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use wgpu::util::DeviceExt;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crag_core::input::{InputState, Key, MouseBtn};
use crag_core::time::TimeState;
use crag_devtools::{DebugOverlay, OverlayStats, ScreenLabel};
use crag_platform::window::PlatformConfig;
use crag_render::{Camera2D, GpuContext, QuadPipeline, QuadVertex, Texture};

use editor::EditorLayout;
use game::{GameState, Scene, BACK_BUTTON};
use level::TileKind;
use mesh::{DrawCall, Mesh, TILESET_TEXTURE, WHITE_TEXTURE};
use storage::{DirLevelStore, SAVES_DIR};

const TILESET_PATH: &str = "assets/tiles.png";
const LABEL_SIZE: f32 = 14.0;
const TOOL_LABEL_SIZE: f32 = 10.0;

/// GPU copy of one `Mesh`. Buffers grow (power-of-two) but never shrink.
struct GpuMesh {
    label: &'static str,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    draw_calls: Vec<DrawCall>,
    quad_count: usize,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, label: &'static str) -> Self {
        Self {
            label,
            vertex_buffer: create_vertex_buffer(device, label, 4),
            index_buffer: create_index_buffer(device, label, 6),
            vertex_capacity: 4,
            index_capacity: 6,
            draw_calls: Vec::new(),
            quad_count: 0,
        }
    }

    fn ensure_capacity(&mut self, device: &wgpu::Device, vertex_count: usize, index_count: usize) {
        let needed_vertices = vertex_count.max(1);
        if needed_vertices > self.vertex_capacity {
            self.vertex_capacity = needed_vertices.next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(device, self.label, self.vertex_capacity);
            log::debug!("{} vertex buffer grown to {}", self.label, self.vertex_capacity);
        }

        let needed_indices = index_count.max(1);
        if needed_indices > self.index_capacity {
            self.index_capacity = needed_indices.next_power_of_two();
            self.index_buffer = create_index_buffer(device, self.label, self.index_capacity);
        }
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, mesh: Mesh) {
        self.ensure_capacity(device, mesh.vertices.len(), mesh.indices.len());
        if !mesh.vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&mesh.vertices));
            queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&mesh.indices));
        }
        self.quad_count = mesh.quad_count();
        self.draw_calls = mesh.draw_calls;
    }
}

/// All mutable engine state lives here. Constructed lazily in
/// `ApplicationHandler::resumed` once the window and GPU surface exist.
struct EngineState {
    window: Arc<Window>,
    gpu: GpuContext,
    time: TimeState,
    input: InputState,
    quad_pipeline: QuadPipeline,
    debug_overlay: DebugOverlay,
    textures: HashMap<Arc<str>, wgpu::BindGroup>,

    game: GameState,
    show_hitboxes: bool,
    paused: bool,
    single_step_requested: bool,

    // World layer follows the player or the editor view; the screen layer is
    // fixed to logical pixels for buttons.
    world_camera: Camera2D,
    world_camera_buffer: wgpu::Buffer,
    world_camera_bind_group: wgpu::BindGroup,
    world_mesh: GpuMesh,
    screen_camera: Camera2D,
    screen_camera_buffer: wgpu::Buffer,
    screen_camera_bind_group: wgpu::BindGroup,
    screen_mesh: GpuMesh,
}

impl EngineState {
    fn new(window: Arc<Window>) -> Result<Self, String> {
        let gpu = GpuContext::new(window.clone())?;
        let quad_pipeline = QuadPipeline::new(&gpu.device, gpu.surface_format);
        let debug_overlay = DebugOverlay::new(&gpu.device, gpu.surface_format, &window);

        let mut textures = HashMap::new();
        let white = Texture::white(&gpu.device, &gpu.queue);
        textures.insert(
            Arc::from(WHITE_TEXTURE),
            quad_pipeline.create_texture_bind_group(&gpu.device, &white),
        );
        match load_tileset(&gpu) {
            Ok(tileset) => {
                log::info!(
                    "Loaded tileset '{}' ({}x{})",
                    TILESET_PATH,
                    tileset.size.0,
                    tileset.size.1
                );
                textures.insert(
                    Arc::from(TILESET_TEXTURE),
                    quad_pipeline.create_texture_bind_group(&gpu.device, &tileset),
                );
            }
            Err(e) => log::warn!("{e}; drawing flat tiles"),
        }

        let store = DirLevelStore::new(SAVES_DIR);
        log::info!("Level store: {}", store.root().display());
        let game = GameState::new(Box::new(store));

        let viewport = logical_viewport(&window, gpu.size);
        let world_camera = Camera2D::new(viewport.x, viewport.y);
        let screen_camera = Camera2D::screen(viewport.x, viewport.y);
        let world_camera_buffer = create_camera_buffer(&gpu.device, &world_camera, "World");
        let screen_camera_buffer = create_camera_buffer(&gpu.device, &screen_camera, "Screen");
        let world_camera_bind_group =
            quad_pipeline.create_camera_bind_group(&gpu.device, &world_camera_buffer);
        let screen_camera_bind_group =
            quad_pipeline.create_camera_bind_group(&gpu.device, &screen_camera_buffer);
        let world_mesh = GpuMesh::new(&gpu.device, "World");
        let screen_mesh = GpuMesh::new(&gpu.device, "Screen");

        Ok(Self {
            window,
            gpu,
            time: TimeState::new(),
            input: InputState::new(),
            quad_pipeline,
            debug_overlay,
            textures,
            game,
            show_hitboxes: false,
            paused: false,
            single_step_requested: false,
            world_camera,
            world_camera_buffer,
            world_camera_bind_group,
            world_mesh,
            screen_camera,
            screen_camera_buffer,
            screen_camera_bind_group,
            screen_mesh,
        })
    }

    fn set_viewport(&mut self, viewport: Vec2) {
        self.world_camera.set_viewport(viewport.x, viewport.y);
        self.screen_camera = Camera2D::screen(viewport.x, viewport.y);
    }

    /// Points the world camera at the player or the editor view.
    fn follow(&mut self) {
        self.world_camera.position = match self.game.scene {
            Scene::Game => self.game.player.rect.position(),
            Scene::LevelEditor => self.game.editor.camera + self.world_camera.viewport * 0.5,
            Scene::LevelSelect | Scene::LevelSelectEditor => self.world_camera.viewport * 0.5,
        };
    }

    fn rebuild_meshes(&mut self) {
        self.follow();
        let view = mesh::view_rect(self.world_camera.position, self.world_camera.viewport);
        let tileset = self.textures.contains_key(TILESET_TEXTURE);
        let world = mesh::build_world_mesh(&self.game, view, tileset, self.show_hitboxes);
        let screen = mesh::build_screen_mesh(&self.game);
        self.world_mesh.upload(&self.gpu.device, &self.gpu.queue, world);
        self.screen_mesh.upload(&self.gpu.device, &self.gpu.queue, screen);
    }

    fn screen_labels(&self) -> Vec<ScreenLabel> {
        let caption = |rect: crag_core::geometry::Rect, text: &str, size: f32| {
            ScreenLabel::new(text, rect.x + 5.0, rect.y + 8.0, size)
        };
        match self.game.scene {
            Scene::Game => vec![caption(BACK_BUTTON, "Level select", LABEL_SIZE)],
            Scene::LevelEditor => {
                let editor = &self.game.editor;
                let mut labels = vec![
                    caption(EditorLayout::PLAY, "Play", LABEL_SIZE),
                    caption(EditorLayout::NAME_BOX, &editor.name, LABEL_SIZE),
                    caption(
                        EditorLayout::LINK,
                        editor.chained.as_deref().unwrap_or("Link level"),
                        LABEL_SIZE,
                    ),
                ];
                labels.extend(TileKind::ALL.iter().enumerate().map(|(i, kind)| {
                    caption(EditorLayout::tool_button(i), kind.label(), TOOL_LABEL_SIZE)
                }));
                labels.push(ScreenLabel::new(
                    format!("Orientation: {:?}", editor.orientation),
                    10.0,
                    self.screen_camera.viewport.y - 24.0,
                    LABEL_SIZE,
                ));
                labels
            }
            Scene::LevelSelect | Scene::LevelSelectEditor => self
                .game
                .level_select
                .buttons()
                .into_iter()
                .map(|(rect, text)| caption(rect, text, LABEL_SIZE))
                .collect(),
        }
    }

    fn overlay_stats(&self) -> OverlayStats {
        let player = &self.game.player;
        OverlayStats {
            scene_label: self.game.scene.label().to_string(),
            level_name: self.game.level_name.clone().unwrap_or_default(),
            player_position: (player.rect.x, player.rect.y),
            player_velocity: (player.velocity.x, player.velocity.y),
            dash_charge: player.dash_charge,
            stamina: player.stamina,
            climbing: player.climbing.is_some(),
            tile_count: self.game.registry.len() as u32,
            quad_count: (self.world_mesh.quad_count + self.screen_mesh.quad_count) as u32,
            paused: self.paused,
        }
    }
}

struct App {
    config: PlatformConfig,
    state: Option<EngineState>,
}

impl App {
    fn new() -> Self {
        Self {
            config: PlatformConfig::default(),
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window = crag_platform::window::create_window(event_loop, &self.config);
        log::info!(
            "Window created: {}x{}",
            self.config.width,
            self.config.height
        );
        match EngineState::new(window) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("Failed to start renderer: {e}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        let egui_consumed = state
            .debug_overlay
            .handle_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                let w = physical_size.width;
                let h = physical_size.height;
                if w > 0 && h > 0 {
                    state.gpu.resize(w, h);
                    let viewport = logical_viewport(&state.window, (w, h));
                    state.set_viewport(viewport);
                    log::info!("Resized to {}x{}", w, h);
                }
            }

            WindowEvent::KeyboardInput { event, .. } if !egui_consumed => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    if let Some(engine_key) = map_key(key_code) {
                        match event.state {
                            ElementState::Pressed => state.input.key_down(engine_key),
                            ElementState::Released => state.input.key_up(engine_key),
                        }
                    }
                }
                if event.state == ElementState::Pressed {
                    if let Some(text) = &event.text {
                        state.input.push_text(text);
                    }
                }
            }

            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } if !egui_consumed => {
                if let Some(btn) = map_mouse_button(button) {
                    match button_state {
                        ElementState::Pressed => state.input.mouse_down(btn),
                        ElementState::Released => state.input.mouse_up(btn),
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let scale = state.window.scale_factor();
                state.input.mouse_position = (position.x / scale, position.y / scale);
            }

            WindowEvent::RedrawRequested => {
                if state.gpu.size.0 == 0 || state.gpu.size.1 == 0 {
                    return;
                }

                // Fixed-step simulation phase.
                state.time.begin_frame();
                while state.time.should_step() {
                    if state.input.is_just_pressed(Key::Escape) {
                        event_loop.exit();
                        return;
                    }
                    if state.input.is_just_pressed(Key::F3) {
                        state.debug_overlay.toggle();
                    }
                    if state.input.is_just_pressed(Key::F4) {
                        state.show_hitboxes = !state.show_hitboxes;
                        log::info!(
                            "Hitbox debug: {}",
                            if state.show_hitboxes { "ON" } else { "OFF" }
                        );
                    }

                    // Skip simulation update when paused (unless single-step requested)
                    if state.paused && !state.single_step_requested {
                        break;
                    }
                    state.single_step_requested = false;

                    let dt = state.time.step_dt();
                    state.game.step(&state.input, dt);
                    // Edges belong to the step that saw them.
                    state.input.end_frame();
                }

                state.rebuild_meshes();

                // Render phase reads finalized simulation state from this frame.
                state.gpu.queue.write_buffer(
                    &state.world_camera_buffer,
                    0,
                    bytemuck::cast_slice(&[state.world_camera.build_uniform()]),
                );
                state.gpu.queue.write_buffer(
                    &state.screen_camera_buffer,
                    0,
                    bytemuck::cast_slice(&[state.screen_camera.build_uniform()]),
                );

                let Some((output, view)) = state.gpu.begin_frame() else {
                    return;
                };

                let labels = state.screen_labels();
                let stats = state.overlay_stats();
                let (egui_primitives, egui_textures_delta, overlay_actions) = state
                    .debug_overlay
                    .prepare(&state.window, &state.time, Some(stats), &labels);

                // Handle overlay button actions
                if overlay_actions.toggle_pause {
                    state.paused = !state.paused;
                    log::info!(
                        "Simulation {}",
                        if state.paused { "PAUSED" } else { "RESUMED" }
                    );
                }
                if overlay_actions.single_step {
                    state.single_step_requested = true;
                }
                if overlay_actions.respawn && state.game.scene == Scene::Game {
                    state.game.player.die(&mut state.game.registry);
                }
                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [state.gpu.size.0, state.gpu.size.1],
                    pixels_per_point: state.window.scale_factor() as f32,
                };

                let mut encoder =
                    state
                        .gpu
                        .device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("Render Encoder"),
                        });

                {
                    let clear_color = match state.game.scene {
                        Scene::Game | Scene::LevelEditor => wgpu::Color {
                            r: 0.08,
                            g: 0.09,
                            b: 0.14,
                            a: 1.0,
                        },
                        Scene::LevelSelect | Scene::LevelSelectEditor => wgpu::Color {
                            r: 0.96,
                            g: 0.96,
                            b: 0.96,
                            a: 1.0,
                        },
                    };
                    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Scene Render Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(clear_color),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        ..Default::default()
                    });

                    render_pass.set_pipeline(&state.quad_pipeline.render_pipeline);
                    draw_layer(
                        &mut render_pass,
                        &state.world_camera_bind_group,
                        &state.world_mesh,
                        &state.textures,
                    );
                    draw_layer(
                        &mut render_pass,
                        &state.screen_camera_bind_group,
                        &state.screen_mesh,
                        &state.textures,
                    );
                }

                state.debug_overlay.upload(
                    &state.gpu.device,
                    &state.gpu.queue,
                    &mut encoder,
                    &egui_primitives,
                    &egui_textures_delta,
                    &screen_descriptor,
                );

                {
                    let mut egui_pass = encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("egui Render Pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Load,
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            ..Default::default()
                        })
                        .forget_lifetime();

                    state
                        .debug_overlay
                        .paint(&mut egui_pass, &egui_primitives, &screen_descriptor);
                }

                state.debug_overlay.cleanup(&egui_textures_delta);

                state.gpu.queue.submit(std::iter::once(encoder.finish()));
                output.present();

                // A paused frame ran no step; drop its edges so hotkeys fire once.
                if state.time.steps_this_frame > 0 {
                    state.input.end_frame();
                }
            }

            _ => {}
        }
    }
}

/// Issue one layer's draw calls, rebinding the texture group only when the
/// key changes.
fn draw_layer(
    render_pass: &mut wgpu::RenderPass<'_>,
    camera_bind_group: &wgpu::BindGroup,
    mesh: &GpuMesh,
    textures: &HashMap<Arc<str>, wgpu::BindGroup>,
) {
    if mesh.draw_calls.is_empty() {
        return;
    }
    render_pass.set_bind_group(0, camera_bind_group, &[]);
    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

    let mut last_bound_texture_key: Option<&Arc<str>> = None;
    for draw in &mesh.draw_calls {
        let Some(bind_group) = textures.get(&draw.texture_key) else {
            log::trace!("Skipping draw with unknown texture '{}'", draw.texture_key);
            continue;
        };
        let need_rebind = match last_bound_texture_key {
            Some(last) => **last != *draw.texture_key,
            None => true,
        };
        if need_rebind {
            render_pass.set_bind_group(1, bind_group, &[]);
            last_bound_texture_key = Some(&draw.texture_key);
        }
        render_pass.draw_indexed(
            draw.index_start..(draw.index_start + draw.index_count),
            0,
            0..1,
        );
    }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, vertex_capacity: usize) -> wgpu::Buffer {
    let byte_len = (vertex_capacity * std::mem::size_of::<QuadVertex>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{label} Vertex Buffer")),
        size: byte_len,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, label: &str, index_capacity: usize) -> wgpu::Buffer {
    let byte_len = (index_capacity * std::mem::size_of::<u32>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("{label} Index Buffer")),
        size: byte_len,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_camera_buffer(device: &wgpu::Device, camera: &Camera2D, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label} Camera Uniform Buffer")),
        contents: bytemuck::cast_slice(&[camera.build_uniform()]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn load_tileset(gpu: &GpuContext) -> Result<Texture, String> {
    let bytes = std::fs::read(TILESET_PATH)
        .map_err(|e| format!("Failed to read tileset '{TILESET_PATH}': {e}"))?;
    Texture::from_bytes(&gpu.device, &gpu.queue, &bytes, TILESET_PATH)
}

fn logical_viewport(window: &Window, physical: (u32, u32)) -> Vec2 {
    let scale = window.scale_factor() as f32;
    Vec2::new(physical.0 as f32 / scale, physical.1 as f32 / scale)
}

fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::Space => Some(Key::Jump),
        KeyCode::KeyX => Some(Key::Dash),
        KeyCode::KeyZ => Some(Key::Climb),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::KeyE => Some(Key::OrientationNext),
        KeyCode::KeyQ => Some(Key::OrientationPrev),
        KeyCode::Digit1 => Some(Key::Digit1),
        KeyCode::Digit2 => Some(Key::Digit2),
        KeyCode::Digit3 => Some(Key::Digit3),
        KeyCode::Digit4 => Some(Key::Digit4),
        KeyCode::Digit5 => Some(Key::Digit5),
        KeyCode::Digit6 => Some(Key::Digit6),
        KeyCode::F3 => Some(Key::F3),
        KeyCode::F4 => Some(Key::F4),
        _ => None,
    }
}

fn map_mouse_button(button: MouseButton) -> Option<MouseBtn> {
    match button {
        MouseButton::Left => Some(MouseBtn::Left),
        MouseButton::Right => Some(MouseBtn::Right),
        MouseButton::Middle => Some(MouseBtn::Middle),
        _ => None,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Crag starting...");

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app).expect("Event loop error");
}
