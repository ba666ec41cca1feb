//! CPU-side quad meshes for the world and screen layers.
//!
//! Both layers are rebuilt every rendered frame from `GameState`. Quads are
//! emitted in draw order and consecutive quads sharing a texture collapse into
//! one draw call.

use std::sync::Arc;

use crag_core::geometry::Rect;
use crag_core::orientation::{variant_index, Direction, ART_SLOT_COUNT};
use crag_render::QuadVertex;
use glam::Vec2;

use crate::editor::EditorLayout;
use crate::game::{GameState, Scene, BACK_BUTTON};
use crate::level::{cell_rect, TileDescriptor, TileKind, TILE_SIZE};
use crate::registry::{EnvItem, EnvKind};

pub const WHITE_TEXTURE: &str = "white";
pub const TILESET_TEXTURE: &str = "tiles";
/// Tileset slots per row in `assets/tiles.png`.
pub const TILESET_COLUMNS: u32 = 16;

const BACKDROP: [f32; 4] = [0.16, 0.18, 0.26, 1.0];
const SOLID: [f32; 4] = [0.55, 0.55, 0.58, 1.0];
const HAZARD: [f32; 4] = [0.9, 0.2, 0.2, 1.0];
const RESPAWN: [f32; 4] = [0.2, 0.8, 0.3, 1.0];
const SWITCH: [f32; 4] = [0.7, 0.3, 0.9, 1.0];
const ENTRY: [f32; 4] = [0.3, 0.6, 0.95, 0.6];
const CRYSTAL_READY: [f32; 4] = [0.1, 0.85, 0.35, 1.0];
const CRYSTAL_SPENT: [f32; 4] = [0.6, 0.95, 0.3, 0.35];
const PLAYER: [f32; 4] = [0.95, 0.95, 0.95, 1.0];
const PLAYER_CLIMBING: [f32; 4] = [0.95, 0.85, 0.6, 1.0];
const HAIR_NORMAL: [f32; 4] = [0.67, 0.2, 0.2, 1.0];
const HAIR_DASHING: [f32; 4] = [0.27, 0.72, 1.0, 1.0];
const GRID_LINE: [f32; 4] = [0.0, 0.0, 0.0, 0.5];
const HITBOX: [f32; 4] = [0.15, 0.9, 0.15, 0.35];
const BUTTON: [f32; 4] = [0.9, 0.16, 0.22, 1.0];
const BUTTON_ACTIVE: [f32; 4] = [1.0, 0.63, 0.0, 1.0];
const NAME_BOX: [f32; 4] = [0.0, 0.62, 0.18, 1.0];

/// A contiguous run of indices that share the same texture binding.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub texture_key: Arc<str>,
    pub index_start: u32,
    pub index_count: u32,
}

pub struct QuadSpec<'a> {
    pub texture_key: &'a str,
    pub rect: Rect,
    /// `[u0, v0, u1, v1]`, top-left to bottom-right.
    pub uv: [f32; 4],
    pub color: [f32; 4],
}

impl<'a> QuadSpec<'a> {
    pub fn solid(rect: Rect, color: [f32; 4]) -> Self {
        Self {
            texture_key: WHITE_TEXTURE,
            rect,
            uv: [0.0, 0.0, 1.0, 1.0],
            color,
        }
    }
}

#[derive(Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<QuadVertex>,
    pub indices: Vec<u32>,
    pub draw_calls: Vec<DrawCall>,
}

impl Mesh {
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn add_quad(&mut self, spec: QuadSpec<'_>) {
        let r = spec.rect;
        let [u0, v0, u1, v1] = spec.uv;
        let base_index = self.vertices.len() as u32;

        let corners = [
            ([r.x, r.y], [u0, v0]),
            ([r.right(), r.y], [u1, v0]),
            ([r.right(), r.bottom()], [u1, v1]),
            ([r.x, r.bottom()], [u0, v1]),
        ];
        for (position, tex_coords) in corners {
            self.vertices.push(QuadVertex {
                position,
                tex_coords,
                color: spec.color,
            });
        }

        let draw_start = self.indices.len() as u32;
        self.indices.extend_from_slice(&[
            base_index,
            base_index + 1,
            base_index + 2,
            base_index,
            base_index + 2,
            base_index + 3,
        ]);

        self.push_draw_call(Arc::from(spec.texture_key), draw_start, 6);
    }

    /// Append a draw call, merging with the previous one when the texture
    /// matches and the indices are contiguous.
    fn push_draw_call(&mut self, texture_key: Arc<str>, index_start: u32, index_count: u32) {
        if let Some(last) = self.draw_calls.last_mut() {
            let contiguous = last.index_start + last.index_count == index_start;
            if *last.texture_key == *texture_key && contiguous {
                last.index_count += index_count;
                return;
            }
        }
        self.draw_calls.push(DrawCall {
            texture_key,
            index_start,
            index_count,
        });
    }
}

/// Texture rectangle of tileset slot `art_index`.
pub fn tile_uv(art_index: u32) -> [f32; 4] {
    let rows = ART_SLOT_COUNT.div_ceil(TILESET_COLUMNS);
    let col = art_index % TILESET_COLUMNS;
    let row = art_index / TILESET_COLUMNS;
    let (w, h) = (1.0 / TILESET_COLUMNS as f32, 1.0 / rows as f32);
    [
        col as f32 * w,
        row as f32 * h,
        (col + 1) as f32 * w,
        (row + 1) as f32 * h,
    ]
}

/// Solid tiles use tileset art when it is loaded; everything else is flat.
fn tile_quad(rect: Rect, kind: TileKind, art: u32, tileset: bool) -> QuadSpec<'static> {
    match kind {
        TileKind::Solid if tileset => QuadSpec {
            texture_key: TILESET_TEXTURE,
            rect,
            uv: tile_uv(art),
            color: [1.0; 4],
        },
        TileKind::Solid => QuadSpec::solid(rect, SOLID),
        TileKind::Hazard => QuadSpec::solid(rect, HAZARD),
        TileKind::RespawnPoint => QuadSpec::solid(rect, RESPAWN),
        TileKind::SwitchLevel => QuadSpec::solid(rect, SWITCH),
        TileKind::LevelEntry | TileKind::LevelEntrySpawn => QuadSpec::solid(rect, ENTRY),
    }
}

/// Spikes fill the half of the cell they stand on, tips toward `facing`.
fn spike_rect(rect: Rect, facing: Direction) -> Rect {
    let (half_w, half_h) = (rect.w * 0.5, rect.h * 0.5);
    match facing {
        Direction::Up => Rect::new(rect.x, rect.y + half_h, rect.w, half_h),
        Direction::Down => Rect::new(rect.x, rect.y, rect.w, half_h),
        Direction::Left => Rect::new(rect.x + half_w, rect.y, half_w, rect.h),
        Direction::Right => Rect::new(rect.x, rect.y, half_w, rect.h),
    }
}

fn cell_quad(rect: Rect, tile: &TileDescriptor, tileset: bool) -> QuadSpec<'static> {
    match tile.kind {
        TileKind::Hazard => QuadSpec::solid(spike_rect(rect, tile.orientation.facing()), HAZARD),
        kind => tile_quad(rect, kind, art_index(tile, rect), tileset),
    }
}

fn art_index(tile: &TileDescriptor, rect: Rect) -> u32 {
    variant_index(tile.orientation, rect.x as i32, rect.y as i32)
}

fn item_quad(item: &EnvItem, tileset: bool) -> QuadSpec<'static> {
    let art = variant_index(item.orientation, item.rect.x as i32, item.rect.y as i32);
    match &item.kind {
        EnvKind::Nonsolid => QuadSpec::solid(item.rect, BACKDROP),
        EnvKind::Solid => tile_quad(item.rect, TileKind::Solid, art, tileset),
        EnvKind::Hazard { facing } => QuadSpec::solid(spike_rect(item.rect, *facing), HAZARD),
        EnvKind::Crystal { respawning, .. } => {
            QuadSpec::solid(item.rect, if *respawning { CRYSTAL_SPENT } else { CRYSTAL_READY })
        }
        EnvKind::SwitchLevel { .. } => tile_quad(item.rect, TileKind::SwitchLevel, art, tileset),
        EnvKind::LevelEntry { .. } | EnvKind::LevelEntrySpawn { .. } => {
            tile_quad(item.rect, TileKind::LevelEntry, art, tileset)
        }
    }
}

/// World-space mesh for the active scene. `view` is the visible world
/// rectangle, used to clip the editor grid.
pub fn build_world_mesh(state: &GameState, view: Rect, tileset: bool, hitboxes: bool) -> Mesh {
    let mut mesh = Mesh::default();
    match state.scene {
        Scene::Game => {
            for item in state.registry.items() {
                mesh.add_quad(item_quad(item, tileset));
            }
            add_player(&mut mesh, state);
            if hitboxes {
                add_hitboxes(&mut mesh, state);
            }
        }
        Scene::LevelEditor => {
            for (col, row, tile) in state.document.iter() {
                let rect = cell_rect(col, row);
                mesh.add_quad(cell_quad(rect, tile, tileset));
            }
            add_grid(&mut mesh, view);
        }
        Scene::LevelSelect | Scene::LevelSelectEditor => {}
    }
    mesh
}

fn add_player(mesh: &mut Mesh, state: &GameState) {
    let player = &state.player;
    let hair_color = if player.dash_charge < player.config.dash_charge_max {
        HAIR_DASHING
    } else {
        HAIR_NORMAL
    };
    for (i, point) in player.hair.iter().enumerate().rev() {
        let size = 9.0 - i as f32 * 0.6;
        mesh.add_quad(QuadSpec::solid(
            Rect::new(point.x, point.y, size, size),
            hair_color,
        ));
    }
    let color = if player.climbing.is_some() {
        PLAYER_CLIMBING
    } else {
        PLAYER
    };
    mesh.add_quad(QuadSpec::solid(player.rect, color));
}

fn add_hitboxes(mesh: &mut Mesh, state: &GameState) {
    for item in state.registry.items().iter().filter(|item| item.is_solid()) {
        mesh.add_quad(QuadSpec::solid(item.rect, HITBOX));
    }
    if let Some(tile) = state
        .player
        .climbing
        .and_then(|handle| state.registry.resolve(handle))
    {
        mesh.add_quad(QuadSpec::solid(tile.rect, BUTTON_ACTIVE));
    }
    mesh.add_quad(QuadSpec::solid(state.player.rect, HITBOX));
}

fn add_grid(mesh: &mut Mesh, view: Rect) {
    let first_col = (view.x / TILE_SIZE).floor() as i32;
    let last_col = (view.right() / TILE_SIZE).ceil() as i32;
    let first_row = (view.y / TILE_SIZE).floor() as i32;
    let last_row = (view.bottom() / TILE_SIZE).ceil() as i32;
    for col in first_col..=last_col {
        let x = col as f32 * TILE_SIZE;
        mesh.add_quad(QuadSpec::solid(Rect::new(x, view.y, 1.0, view.h), GRID_LINE));
    }
    for row in first_row..=last_row {
        let y = row as f32 * TILE_SIZE;
        mesh.add_quad(QuadSpec::solid(Rect::new(view.x, y, view.w, 1.0), GRID_LINE));
    }
}

/// Screen-space buttons for the active scene, in logical pixels.
pub fn build_screen_mesh(state: &GameState) -> Mesh {
    let mut mesh = Mesh::default();
    match state.scene {
        Scene::Game => mesh.add_quad(QuadSpec::solid(BACK_BUTTON, BUTTON)),
        Scene::LevelEditor => {
            mesh.add_quad(QuadSpec::solid(EditorLayout::PLAY, BUTTON));
            mesh.add_quad(QuadSpec::solid(EditorLayout::NAME_BOX, NAME_BOX));
            mesh.add_quad(QuadSpec::solid(EditorLayout::LINK, BUTTON));
            for (i, kind) in TileKind::ALL.iter().enumerate() {
                let color = if *kind == state.editor.tool {
                    BUTTON_ACTIVE
                } else {
                    BUTTON
                };
                mesh.add_quad(QuadSpec::solid(EditorLayout::tool_button(i), color));
            }
        }
        Scene::LevelSelect | Scene::LevelSelectEditor => {
            for (rect, _) in state.level_select.buttons() {
                mesh.add_quad(QuadSpec::solid(rect, BUTTON));
            }
        }
    }
    mesh
}

/// Visible world rectangle for a camera centred on `center`.
pub fn view_rect(center: Vec2, viewport: Vec2) -> Rect {
    Rect::new(
        center.x - viewport.x * 0.5,
        center.y - viewport.y * 0.5,
        viewport.x,
        viewport.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLevelStore;
    use crag_core::orientation::Orientation;

    fn state() -> GameState {
        GameState::new(Box::new(MemoryLevelStore::default()))
    }

    #[test]
    fn consecutive_quads_with_one_texture_share_a_draw_call() {
        let mut mesh = Mesh::default();
        mesh.add_quad(QuadSpec::solid(Rect::new(0.0, 0.0, 1.0, 1.0), SOLID));
        mesh.add_quad(QuadSpec::solid(Rect::new(1.0, 0.0, 1.0, 1.0), SOLID));
        mesh.add_quad(QuadSpec {
            texture_key: TILESET_TEXTURE,
            rect: Rect::new(2.0, 0.0, 1.0, 1.0),
            uv: tile_uv(0),
            color: [1.0; 4],
        });
        mesh.add_quad(QuadSpec::solid(Rect::new(3.0, 0.0, 1.0, 1.0), SOLID));

        assert_eq!(mesh.quad_count(), 4);
        assert_eq!(mesh.indices.len(), 24);
        let counts: Vec<u32> = mesh.draw_calls.iter().map(|d| d.index_count).collect();
        assert_eq!(counts, vec![12, 6, 6]);
        assert_eq!(mesh.vertices[2].position, [2.0, 1.0]);
    }

    #[test]
    fn hazards_are_drawn_on_the_side_they_stand_on() {
        let cell = Rect::new(30.0, 60.0, 15.0, 15.0);
        let quad_for = |facing| {
            let mut mesh = Mesh::default();
            mesh.add_quad(item_quad(&EnvItem::new(cell, EnvKind::Hazard { facing }), true));
            let v = &mesh.vertices;
            (v[0].position, v[2].position)
        };
        assert_eq!(quad_for(Direction::Up), ([30.0, 67.5], [45.0, 75.0]));
        assert_eq!(quad_for(Direction::Down), ([30.0, 60.0], [45.0, 67.5]));
        assert_eq!(quad_for(Direction::Left), ([37.5, 60.0], [45.0, 75.0]));
        assert_eq!(quad_for(Direction::Right), ([30.0, 60.0], [37.5, 75.0]));

        let mut doc_cell = Mesh::default();
        let tile = TileDescriptor::new(TileKind::Hazard, Orientation::Left);
        doc_cell.add_quad(cell_quad(cell, &tile, true));
        assert_eq!(doc_cell.vertices[0].position, [37.5, 60.0]);
        assert_eq!(&*doc_cell.draw_calls[0].texture_key, WHITE_TEXTURE);
    }

    #[test]
    fn tileset_uvs_step_through_rows() {
        let rows = ART_SLOT_COUNT.div_ceil(TILESET_COLUMNS) as f32;
        assert_eq!(tile_uv(0), [0.0, 0.0, 1.0 / 16.0, 1.0 / rows]);
        let [u0, v0, _, _] = tile_uv(17);
        assert_eq!(u0, 1.0 / 16.0);
        assert_eq!(v0, 1.0 / rows);
    }

    #[test]
    fn game_scene_draws_items_player_and_hair() {
        let mut state = state();
        state.load_sandbox();
        let items = state.registry.len();
        let mesh = build_world_mesh(&state, Rect::new(0.0, 0.0, 800.0, 450.0), false, false);
        assert_eq!(mesh.quad_count(), items + 5 + 1);

        let with_boxes = build_world_mesh(&state, Rect::new(0.0, 0.0, 800.0, 450.0), false, true);
        assert_eq!(
            with_boxes.quad_count(),
            items + 6 + state.registry.solid_count() + 1
        );
    }

    #[test]
    fn editor_draws_cells_and_a_clipped_grid() {
        let mut state = state();
        state.set_scene(Scene::LevelEditor);
        state
            .document
            .set_cell(1, 1, TileDescriptor::new(TileKind::Solid, Orientation::Top));
        let mesh = build_world_mesh(&state, Rect::new(0.0, 0.0, 30.0, 15.0), true, false);
        // 1 cell + 3 vertical + 2 horizontal lines.
        assert_eq!(mesh.quad_count(), 6);
        assert_eq!(&*mesh.draw_calls[0].texture_key, TILESET_TEXTURE);

        let screen = build_screen_mesh(&state);
        assert_eq!(screen.quad_count(), 3 + TileKind::ALL.len());
    }

    #[test]
    fn level_select_draws_one_button_per_entry() {
        let state = state();
        assert!(build_world_mesh(&state, Rect::new(0.0, 0.0, 800.0, 450.0), true, true)
            .vertices
            .is_empty());
        assert_eq!(build_screen_mesh(&state).quad_count(), 2);
    }
}
