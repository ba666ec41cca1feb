//! Player movement: run, jump, 8-way dash, wall climbing and wall jumps.
//!
//! `Player::update` runs once per fixed step. Horizontal control is discrete
//! (full run speed while a direction is held, zero on release), gravity is
//! constant, and every environment item is resolved against the player each
//! step in registry order. Death and level switches are reported back to the
//! caller as a `FrameEvent`.

use crag_core::geometry::Rect;
use crag_core::input::{InputState, Key};
use glam::Vec2;
use serde::Deserialize;

use crate::collision::{self, Outcome};
use crate::registry::{EnvKind, Registry, StackSide, TileHandle};

pub const PLAYER_SIZE: f32 = 40.0;
pub const HAIR_SEGMENTS: usize = 5;

/// Movement tuning. Speeds are world units per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementConfig {
    pub gravity: f32,
    pub run_speed: f32,
    pub jump_speed: f32,
    pub dash_speed: f32,
    /// Per-axis speed of a diagonal dash.
    pub dash_speed_diagonal: f32,
    /// Extra charge cost of starting a diagonal dash.
    pub diagonal_charge_factor: f32,
    pub dash_charge_max: f32,
    /// Charge burned per second while a dash is in flight.
    pub dash_decay: f32,
    pub climb_speed: f32,
    pub climb_drain: f32,
    pub hold_drain: f32,
    pub wall_jump_cost: f32,
    pub wall_jump_lockout: f32,
    pub stamina_max: f32,
    pub crystal_cooldown: f32,
    pub slide_in_frames: u32,
    pub slide_in_distance: f32,
    /// Fixed steps per animation frame.
    pub animation_step_ticks: u32,
    pub animation_frames: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            gravity: 1000.0,
            run_speed: 200.0,
            jump_speed: 350.0,
            dash_speed: 666.6,
            dash_speed_diagonal: 353.5,
            diagonal_charge_factor: 1.414,
            dash_charge_max: 100.0,
            dash_decay: 353.5,
            climb_speed: 100.0,
            climb_drain: 45.45,
            hold_drain: 10.0,
            wall_jump_cost: 27.5,
            wall_jump_lockout: 0.1,
            stamina_max: 110.0,
            crystal_cooldown: 5.0,
            slide_in_frames: 15,
            slide_in_distance: 45.0,
            animation_step_ticks: 60 / 8,
            animation_frames: 16,
        }
    }
}

/// Input sampled for one fixed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub left_released: bool,
    pub right_released: bool,
    pub jump_pressed: bool,
    pub dash_pressed: bool,
    pub climb_held: bool,
    pub climb_released: bool,
}

impl PlayerInput {
    pub fn from_state(input: &InputState) -> Self {
        Self {
            left: input.is_held(Key::Left),
            right: input.is_held(Key::Right),
            up: input.is_held(Key::Up),
            down: input.is_held(Key::Down),
            left_released: input.is_just_released(Key::Left),
            right_released: input.is_just_released(Key::Right),
            jump_pressed: input.is_just_pressed(Key::Jump),
            dash_pressed: input.is_just_pressed(Key::Dash),
            climb_held: input.is_held(Key::Climb),
            climb_released: input.is_just_released(Key::Climb),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Died,
    SwitchLevel { target: String },
}

#[derive(Debug, Clone)]
pub struct Player {
    pub rect: Rect,
    pub velocity: Vec2,
    pub dash_charge: f32,
    pub stamina: f32,
    pub can_move: bool,
    pub can_jump: bool,
    pub dashing: bool,
    pub falling: bool,
    pub facing_left: bool,
    /// Wall tile the player is holding on to.
    pub climbing: Option<TileHandle>,
    pub move_lockout: f32,
    pub frame_counter: u32,
    pub current_frame: u32,
    pub hair: [Vec2; HAIR_SEGMENTS],
    pub slide_frames: u32,
    pub slide_step: Vec2,
    pub respawn_point: Vec2,
    pub config: MovementConfig,
    /// Target-less switch tile already reported while the player overlaps it.
    pub(crate) unlinked_switch: Option<TileHandle>,
}

impl Player {
    pub fn new(position: Vec2) -> Self {
        let config = MovementConfig::default();
        let mut player = Self {
            rect: Rect::new(position.x, position.y, PLAYER_SIZE, PLAYER_SIZE),
            velocity: Vec2::ZERO,
            dash_charge: config.dash_charge_max,
            stamina: config.stamina_max,
            can_move: true,
            can_jump: false,
            dashing: false,
            falling: false,
            facing_left: false,
            climbing: None,
            move_lockout: 0.0,
            frame_counter: 0,
            current_frame: 0,
            hair: [Vec2::ZERO; HAIR_SEGMENTS],
            slide_frames: 0,
            slide_step: Vec2::ZERO,
            respawn_point: position,
            config,
            unlinked_switch: None,
        };
        player.update_hair();
        player
    }

    /// Puts the player at `position` with fresh movement state, keeping the
    /// tuning. Used on every level load.
    pub fn place(&mut self, position: Vec2) {
        let config = self.config;
        *self = Self::new(position);
        self.config = config;
        self.dash_charge = config.dash_charge_max;
        self.stamina = config.stamina_max;
    }

    /// Places the player on an entry tile and plays the slide-in: a fixed
    /// number of steps moving `slide_in_distance` toward `leftward`'s side.
    /// The respawn point falls back to where the slide ends.
    pub fn enter(&mut self, entry: Vec2, leftward: bool, respawn: Option<Vec2>) {
        self.place(entry);
        let frames = self.config.slide_in_frames.max(1);
        let sign = if leftward { -1.0 } else { 1.0 };
        let travel = Vec2::new(sign * self.config.slide_in_distance, 0.0);
        self.slide_frames = frames;
        self.slide_step = travel / frames as f32;
        self.facing_left = leftward;
        self.respawn_point = respawn.unwrap_or(entry + travel);
        self.update_hair();
    }

    pub fn position(&self) -> Vec2 {
        self.rect.position()
    }

    /// Standing on something: jump, dash and stamina come back.
    pub(crate) fn land(&mut self) {
        self.can_jump = true;
        self.dash_charge = self.config.dash_charge_max;
        self.stamina = self.config.stamina_max;
        self.falling = false;
    }

    pub fn update(
        &mut self,
        input: &PlayerInput,
        registry: &mut Registry,
        dt: f32,
    ) -> Option<FrameEvent> {
        if self.slide_frames > 0 {
            self.rect = self.rect.translated(self.slide_step.x, self.slide_step.y);
            self.slide_frames -= 1;
            self.update_hair();
            return None;
        }

        self.advance_animation();

        if self.velocity.x < 0.0 {
            self.facing_left = true;
        } else if self.velocity.x > 0.0 {
            self.facing_left = false;
        }

        if self.can_move && !self.dashing {
            if input.left {
                self.velocity.x = -self.config.run_speed;
            }
            if input.right {
                self.velocity.x = self.config.run_speed;
            }
            if input.left_released || input.right_released {
                self.velocity.x = 0.0;
            }
        }

        if input.jump_pressed && self.can_jump {
            self.velocity.y = -self.config.jump_speed;
            self.can_jump = false;
        }

        if input.dash_pressed && self.dash_charge > 0.0 {
            self.start_dash(input, dt);
        }
        if self.dashing && self.dash_charge <= 0.0 {
            self.end_dash();
        }

        if self.climbing.is_some() {
            self.climb(input, registry, dt);
        }

        let event = self.resolve_collisions(input, registry, dt);
        if matches!(event, Some(FrameEvent::SwitchLevel { .. })) {
            // The caller replaces the level; nothing else this step matters.
            return event;
        }
        registry.tick_crystals(dt);

        if self.climbing.is_none() {
            self.rect.x += self.velocity.x * dt;
        } else if input.climb_released {
            self.release_climb();
            self.velocity = Vec2::ZERO;
        }
        self.rect.y += self.velocity.y * dt;

        if self.dashing {
            self.dash_charge -= self.config.dash_decay * dt;
            if self.dash_charge <= 0.0 {
                self.end_dash();
            }
        } else if self.climbing.is_none() {
            self.velocity.y += self.config.gravity * dt;
            if self.velocity.y > 0.0 {
                self.falling = true;
            }
        }

        if !self.can_move {
            self.move_lockout -= dt;
            if self.move_lockout <= 0.0 {
                self.move_lockout = 0.0;
                self.can_move = true;
            }
        }

        self.update_hair();
        event
    }

    fn advance_animation(&mut self) {
        self.frame_counter += 1;
        if self.frame_counter >= self.config.animation_step_ticks {
            self.frame_counter = 0;
            self.current_frame += 1;
            if self.current_frame >= self.config.animation_frames {
                self.current_frame = 0;
            }
        }
    }

    fn start_dash(&mut self, input: &PlayerInput, dt: f32) {
        let straight = self.config.dash_speed;
        let diagonal = self.config.dash_speed_diagonal;

        // Diagonals win over cardinals; no direction dashes the way we face.
        let (velocity, cost) = match (input.left, input.right, input.up, input.down) {
            (true, _, true, _) => (Vec2::new(-diagonal, -diagonal), true),
            (_, true, true, _) => (Vec2::new(diagonal, -diagonal), true),
            (_, true, _, true) => (Vec2::new(diagonal, diagonal), true),
            (true, _, _, true) => (Vec2::new(-diagonal, diagonal), true),
            (true, _, _, _) => (Vec2::new(-straight, 0.0), false),
            (_, true, _, _) => (Vec2::new(straight, 0.0), false),
            (_, _, true, _) => (Vec2::new(0.0, -straight), false),
            (_, _, _, true) => (Vec2::new(0.0, straight), false),
            _ if self.facing_left => (Vec2::new(-straight, 0.0), false),
            _ => (Vec2::new(straight, 0.0), false),
        };

        let factor = if cost {
            self.config.diagonal_charge_factor
        } else {
            1.0
        };
        self.dashing = true;
        self.velocity = velocity;
        self.dash_charge -= straight * dt * factor;
        log::trace!("Dash {:?}, charge left {:.1}", velocity, self.dash_charge);
    }

    fn end_dash(&mut self) {
        self.dashing = false;
        self.dash_charge = self.dash_charge.max(0.0);
        self.velocity = Vec2::ZERO;
    }

    fn climb(&mut self, input: &PlayerInput, registry: &Registry, dt: f32) {
        let Some(handle) = self.climbing else {
            return;
        };
        let Some(tile) = registry.resolve(handle).map(|item| item.rect) else {
            log::debug!("Climb target no longer exists; letting go");
            self.release_climb();
            return;
        };

        if input.up {
            let next = if self.rect.y > tile.y {
                Some(handle)
            } else {
                registry.find_stacked(handle, StackSide::Above)
            };
            match next {
                Some(next) if self.stamina > 0.0 => {
                    self.climbing = Some(next);
                    self.stamina -= self.config.climb_drain * dt;
                    self.velocity.y = -self.config.climb_speed;
                }
                _ => self.velocity.y = 0.0,
            }
        } else if input.down {
            let next = if self.rect.bottom() < tile.bottom() {
                Some(handle)
            } else {
                registry.find_stacked(handle, StackSide::Below)
            };
            match next {
                Some(next) => {
                    self.climbing = Some(next);
                    self.velocity.y = self.config.climb_speed;
                }
                None => self.velocity.y = 0.0,
            }
        } else {
            self.velocity.y = 0.0;
            if self.stamina > 0.0 {
                self.stamina -= self.config.hold_drain * dt;
            }
        }
        self.stamina = self.stamina.max(0.0);

        if input.jump_pressed {
            let wall_is_right = self.rect.x < tile.x;
            self.velocity.y = -self.config.jump_speed;
            self.velocity.x = if wall_is_right {
                -self.config.run_speed
            } else {
                self.config.run_speed
            };
            self.release_climb();
            self.can_move = false;
            self.move_lockout = self.config.wall_jump_lockout;
            self.stamina = (self.stamina - self.config.wall_jump_cost).max(0.0);
            log::trace!("Wall jump, stamina {:.1}", self.stamina);
        }
    }

    fn release_climb(&mut self) {
        self.climbing = None;
    }

    fn resolve_collisions(
        &mut self,
        input: &PlayerInput,
        registry: &mut Registry,
        dt: f32,
    ) -> Option<FrameEvent> {
        self.can_jump = false;
        let mut touched_unlinked = None;
        for index in 0..registry.len() {
            let handle = registry.handle(index);
            let Some(item) = registry.item_mut(index) else {
                break;
            };
            match collision::resolve(item, handle, self, input.climb_held, dt) {
                Outcome::None => {}
                Outcome::DashRecharge => log::debug!("Dash recharged by crystal {index}"),
                Outcome::Death => {
                    self.die(registry);
                    return Some(FrameEvent::Died);
                }
                Outcome::SwitchLevel => {
                    let target = match &registry.items()[index].kind {
                        EnvKind::SwitchLevel { target } => target.clone(),
                        _ => None,
                    };
                    match target {
                        Some(target) => return Some(FrameEvent::SwitchLevel { target }),
                        None => {
                            if self.unlinked_switch != Some(handle) {
                                log::warn!("Switch tile {index} has no target level");
                            }
                            touched_unlinked = Some(handle);
                        }
                    }
                }
            }
        }
        self.unlinked_switch = touched_unlinked;
        None
    }

    /// Back to the respawn point with crystals re-armed.
    pub fn die(&mut self, registry: &mut Registry) {
        log::info!(
            "Player died at ({:.0}, {:.0}); respawning at ({:.0}, {:.0})",
            self.rect.x,
            self.rect.y,
            self.respawn_point.x,
            self.respawn_point.y
        );
        registry.clear_crystals();
        self.rect.x = self.respawn_point.x;
        self.rect.y = self.respawn_point.y;
        self.velocity = Vec2::ZERO;
        self.dashing = false;
        self.dash_charge = self.config.dash_charge_max;
        self.stamina = self.config.stamina_max;
        self.release_climb();
        self.can_move = true;
        self.move_lockout = 0.0;
    }

    /// Trailing hair: five points hanging behind the head, bobbing on some
    /// animation frames. Cosmetic only.
    fn update_hair(&mut self) {
        let (head_offset, step_x) = if self.facing_left {
            (-1.0, 2.0)
        } else {
            (11.0, -2.0)
        };
        let step = Vec2::new(step_x, 4.0);
        let mut head = Vec2::new(self.rect.x + head_offset, self.rect.y - 5.0);

        let frame = self.current_frame;
        let idle_bob = self.velocity == Vec2::ZERO && frame % 9 < 4;
        let beat_bob = matches!(frame % 12, 0 | 5 | 10 | 11);
        let bob = idle_bob || beat_bob;

        for (i, segment) in self.hair.iter_mut().enumerate() {
            if bob {
                head.y -= 2.0;
            }
            let ratio = 0.1 * i as f32 / 3.0;
            *segment = head + Vec2::splat(ratio * 30.0) + step * i as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelDocument, TileDescriptor, TileKind};
    use crate::registry::EnvItem;
    use crag_core::orientation::{Direction, Orientation};

    const DT: f32 = 1.0 / 60.0;

    fn floor_registry() -> Registry {
        Registry::new(vec![EnvItem::new(
            Rect::new(-500.0, 400.0, 2000.0, 100.0),
            EnvKind::Solid,
        )])
    }

    fn standing_player(registry: &mut Registry) -> Player {
        let mut player = Player::new(Vec2::new(100.0, 360.0));
        // One idle step lets gravity press the player into the floor.
        player.update(&PlayerInput::default(), registry, DT);
        player.update(&PlayerInput::default(), registry, DT);
        assert!(player.can_jump, "player should be grounded");
        player
    }

    #[test]
    fn run_speed_is_discrete() {
        let mut registry = floor_registry();
        let mut player = standing_player(&mut registry);

        let held = PlayerInput {
            right: true,
            ..Default::default()
        };
        player.update(&held, &mut registry, DT);
        assert_eq!(player.velocity.x, 200.0);

        let released = PlayerInput {
            right_released: true,
            ..Default::default()
        };
        player.update(&released, &mut registry, DT);
        assert_eq!(player.velocity.x, 0.0);
    }

    #[test]
    fn facing_follows_velocity_sign_only() {
        let mut registry = floor_registry();
        let mut player = standing_player(&mut registry);
        let left = PlayerInput {
            left: true,
            ..Default::default()
        };
        player.update(&left, &mut registry, DT);
        player.update(&left, &mut registry, DT);
        assert!(player.facing_left);
        let stop = PlayerInput {
            left_released: true,
            ..Default::default()
        };
        player.update(&stop, &mut registry, DT);
        player.update(&PlayerInput::default(), &mut registry, DT);
        assert!(player.facing_left, "zero velocity keeps the facing");
    }

    #[test]
    fn jump_needs_ground() {
        let mut registry = floor_registry();
        let mut player = standing_player(&mut registry);
        let jump = PlayerInput {
            jump_pressed: true,
            ..Default::default()
        };
        player.update(&jump, &mut registry, DT);
        assert!(player.velocity.y < 0.0);
        assert!(!player.can_jump);
        let vy = player.velocity.y;

        // Mid-air presses do nothing beyond gravity.
        player.update(&jump, &mut registry, DT);
        assert!((player.velocity.y - (vy + 1000.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn dash_from_partial_charge_ends_without_going_negative() {
        let mut registry = Registry::empty();
        let mut player = Player::new(Vec2::ZERO);
        player.dash_charge = 75.0;

        let dash = PlayerInput {
            right: true,
            dash_pressed: true,
            ..Default::default()
        };
        player.update(&dash, &mut registry, DT);
        assert!(player.dashing);
        assert_eq!(player.velocity, Vec2::new(666.6, 0.0));

        let hold = PlayerInput {
            right: true,
            ..Default::default()
        };
        let mut frames = 0;
        while player.dashing {
            player.update(&hold, &mut registry, DT);
            assert!(player.dash_charge >= 0.0);
            frames += 1;
            assert!(frames < 60, "dash never ended");
        }
        assert_eq!(player.dash_charge, 0.0);
        // Ending the dash stops the player; gravity then starts again.
        assert_eq!(player.velocity.x, 0.0);
    }

    #[test]
    fn diagonal_dash_costs_more() {
        let mut registry = Registry::empty();
        let mut player = Player::new(Vec2::ZERO);
        let dash = PlayerInput {
            left: true,
            up: true,
            dash_pressed: true,
            ..Default::default()
        };
        player.update(&dash, &mut registry, DT);
        assert_eq!(player.velocity, Vec2::new(-353.5, -353.5));
        let expected = 100.0 - 666.6 * DT * 1.414 - 353.5 * DT;
        assert!((player.dash_charge - expected).abs() < 1e-3);
    }

    #[test]
    fn neutral_dash_goes_the_way_the_player_faces() {
        let mut registry = Registry::empty();
        let mut player = Player::new(Vec2::ZERO);
        player.facing_left = true;
        let dash = PlayerInput {
            dash_pressed: true,
            ..Default::default()
        };
        player.update(&dash, &mut registry, DT);
        assert_eq!(player.velocity, Vec2::new(-666.6, 0.0));
    }

    #[test]
    fn dash_needs_charge() {
        let mut registry = Registry::empty();
        let mut player = Player::new(Vec2::ZERO);
        player.dash_charge = 0.0;
        let dash = PlayerInput {
            right: true,
            dash_pressed: true,
            ..Default::default()
        };
        player.update(&dash, &mut registry, DT);
        assert!(!player.dashing);
    }

    #[test]
    fn hazard_resets_to_respawn_and_rearms_crystals() {
        let mut registry = Registry::new(vec![
            EnvItem::new(
                Rect::new(500.0, 500.0, 20.0, 20.0),
                EnvKind::Crystal {
                    respawning: true,
                    timer: 3.0,
                },
            ),
            EnvItem::new(
                Rect::new(0.0, 100.0, 200.0, 20.0),
                EnvKind::Hazard {
                    facing: Direction::Up,
                },
            ),
        ]);
        let mut player = Player::new(Vec2::new(20.0, 55.0));
        player.respawn_point = Vec2::new(-300.0, -300.0);
        player.velocity.y = 600.0;

        let event = player.update(&PlayerInput::default(), &mut registry, DT);

        assert_eq!(event, Some(FrameEvent::Died));
        assert_eq!(player.rect.x, -300.0);
        assert_eq!(
            registry.items()[0].kind,
            EnvKind::Crystal {
                respawning: false,
                timer: 0.0
            }
        );
        // Only gravity since the reset.
        assert_eq!(player.velocity.x, 0.0);
        assert!((player.velocity.y - 1000.0 * DT).abs() < 1e-4);
    }

    #[test]
    fn switch_contact_reports_target() {
        let mut registry = Registry::new(vec![EnvItem::new(
            Rect::new(30.0, 0.0, 15.0, 15.0),
            EnvKind::SwitchLevel {
                target: Some("cave".to_string()),
            },
        )]);
        let mut player = Player::new(Vec2::new(0.0, 0.0));
        let run = PlayerInput {
            right: true,
            ..Default::default()
        };
        let event = player.update(&run, &mut registry, DT);
        assert_eq!(
            event,
            Some(FrameEvent::SwitchLevel {
                target: "cave".to_string()
            })
        );
    }

    #[test]
    fn unlinked_switch_is_reported_once_per_touch() {
        let mut registry = Registry::new(vec![EnvItem::new(
            Rect::new(0.0, 0.0, 200.0, 200.0),
            EnvKind::SwitchLevel { target: None },
        )]);
        let handle = registry.handle(0);
        let mut player = Player::new(Vec2::new(20.0, 20.0));
        let idle = PlayerInput::default();

        for _ in 0..3 {
            assert_eq!(player.update(&idle, &mut registry, DT), None);
            assert_eq!(player.unlinked_switch, Some(handle));
        }

        player.place(Vec2::new(500.0, 20.0));
        assert_eq!(player.update(&idle, &mut registry, DT), None);
        assert_eq!(player.unlinked_switch, None);
    }

    fn wall_level() -> Registry {
        // A wall seven tiles high at column 10 (x = 150, y = 300..405).
        let mut doc = LevelDocument::new();
        for row in 20..27 {
            doc.set_cell(10, row, TileDescriptor::new(TileKind::Solid, Orientation::Left));
        }
        Registry::rebuild(&doc).0
    }

    /// Player pressed against the wall's left face, holding climb.
    fn grab_wall(registry: &mut Registry) -> Player {
        let mut player = Player::new(Vec2::new(108.0, 350.0));
        let grab = PlayerInput {
            right: true,
            climb_held: true,
            ..Default::default()
        };
        player.update(&grab, registry, DT);
        assert!(player.climbing.is_some(), "wall should be grabbed");
        assert_eq!(player.rect.x, 110.0);
        player
    }

    #[test]
    fn climbing_up_drains_stamina_and_chains_tiles() {
        let mut registry = wall_level();
        let mut player = grab_wall(&mut registry);
        let first = player.climbing;
        let start_y = player.rect.y;

        let up = PlayerInput {
            up: true,
            climb_held: true,
            ..Default::default()
        };
        for _ in 0..10 {
            player.update(&up, &mut registry, DT);
        }
        assert!(player.rect.y < start_y);
        assert!(player.stamina < player.config.stamina_max);
        assert_eq!(player.rect.x, 110.0, "no horizontal drift while climbing");

        for _ in 0..60 {
            player.update(&up, &mut registry, DT);
        }
        // Stopped at the top tile's top edge after moving up the stack.
        assert_ne!(player.climbing, first);
        assert!((player.rect.y - 300.0).abs() <= 100.0 * DT + 1e-3);
        assert_eq!(player.velocity.y, 0.0);
    }

    #[test]
    fn climbing_down_follows_the_stack_to_its_bottom() {
        let mut registry = wall_level();
        let mut player = grab_wall(&mut registry);
        let first = player.climbing;
        let start_y = player.rect.y;

        let down = PlayerInput {
            down: true,
            climb_held: true,
            ..Default::default()
        };
        player.update(&down, &mut registry, DT);
        assert!(player.rect.y > start_y);
        assert_eq!(player.stamina, player.config.stamina_max, "descending is free");

        for _ in 0..60 {
            player.update(&down, &mut registry, DT);
        }
        assert_ne!(player.climbing, first);
        let held = player.climbing.and_then(|handle| registry.resolve(handle));
        assert_eq!(held.map(|item| item.rect.y), Some(390.0), "lowest tile of the wall");
        // Stopped at the lowest tile's bottom edge, still on the wall.
        assert!((player.rect.bottom() - 405.0).abs() <= 100.0 * DT + 1e-3);
        assert_eq!(player.velocity.y, 0.0);
        assert_eq!(player.rect.x, 110.0);
    }

    #[test]
    fn holding_still_on_a_wall_drains_slowly() {
        let mut registry = wall_level();
        let mut player = grab_wall(&mut registry);
        let hold = PlayerInput {
            climb_held: true,
            ..Default::default()
        };
        let y = player.rect.y;
        player.update(&hold, &mut registry, DT);
        assert_eq!(player.rect.y, y);
        assert!((player.stamina - (110.0 - 10.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn wall_jump_pushes_away_and_locks_movement() {
        let mut registry = wall_level();
        let mut player = grab_wall(&mut registry);
        let jump = PlayerInput {
            climb_held: true,
            jump_pressed: true,
            ..Default::default()
        };
        player.update(&jump, &mut registry, DT);

        assert!(player.climbing.is_none());
        assert_eq!(player.velocity.x, -200.0);
        assert!(player.velocity.y < 0.0);
        assert!(!player.can_move);
        assert!((player.stamina - (110.0 - 27.5)).abs() < 0.5);

        // Holding toward the wall does nothing until the lockout runs out.
        let toward = PlayerInput {
            right: true,
            ..Default::default()
        };
        player.update(&toward, &mut registry, DT);
        assert_eq!(player.velocity.x, -200.0);
        for _ in 0..6 {
            player.update(&toward, &mut registry, DT);
        }
        assert!(player.can_move);
    }

    #[test]
    fn releasing_climb_lets_go() {
        let mut registry = wall_level();
        let mut player = grab_wall(&mut registry);
        let release = PlayerInput {
            climb_released: true,
            ..Default::default()
        };
        player.update(&release, &mut registry, DT);
        assert!(player.climbing.is_none());
    }

    #[test]
    fn stale_climb_handle_is_released_after_reload() {
        let mut registry = wall_level();
        let mut player = grab_wall(&mut registry);
        let mut reloaded = wall_level();
        assert!(reloaded.resolve(player.climbing.expect("climbing")).is_none());

        let up = PlayerInput {
            up: true,
            climb_held: true,
            ..Default::default()
        };
        player.update(&up, &mut reloaded, DT);
        assert!(player.climbing.is_none());
    }

    #[test]
    fn slide_in_locks_input_for_its_duration() {
        let mut registry = Registry::empty();
        let mut player = Player::new(Vec2::ZERO);
        player.enter(Vec2::new(30.0, 60.0), false, None);
        assert_eq!(player.slide_frames, 15);
        assert_eq!(player.respawn_point, Vec2::new(75.0, 60.0));

        let run = PlayerInput {
            left: true,
            jump_pressed: true,
            ..Default::default()
        };
        for _ in 0..15 {
            player.update(&run, &mut registry, DT);
        }
        assert_eq!(player.slide_frames, 0);
        assert!((player.rect.x - 75.0).abs() < 1e-3);
        assert_eq!(player.rect.y, 60.0);
        assert_eq!(player.velocity, Vec2::ZERO);

        player.update(&run, &mut registry, DT);
        assert_eq!(player.velocity.x, -200.0);
    }

    #[test]
    fn animation_frame_wraps_at_sixteen() {
        let mut registry = Registry::empty();
        let mut player = Player::new(Vec2::ZERO);
        for _ in 0..(7 * 16) {
            player.update(&PlayerInput::default(), &mut registry, DT);
        }
        assert_eq!(player.current_frame, 0);
        player.update(&PlayerInput::default(), &mut registry, DT);
        assert_eq!(player.frame_counter, 1);
    }

    #[test]
    fn hair_trails_behind_the_head() {
        let mut player = Player::new(Vec2::new(100.0, 100.0));
        player.current_frame = 1;
        player.velocity = Vec2::new(200.0, 0.0);
        player.update_hair();
        assert_eq!(player.hair[0], Vec2::new(111.0, 95.0));
        assert!(player.hair[4].x < player.hair[0].x);

        player.facing_left = true;
        player.update_hair();
        assert_eq!(player.hair[0], Vec2::new(99.0, 95.0));
        assert!(player.hair[4].x > player.hair[0].x);
    }

    #[test]
    fn input_snapshot_reads_edges_and_levels() {
        let mut state = InputState::new();
        state.key_down(Key::Left);
        state.key_down(Key::Dash);
        state.key_down(Key::Climb);
        let input = PlayerInput::from_state(&state);
        assert!(input.left && input.dash_pressed && input.climb_held);
        assert!(!input.jump_pressed);

        state.end_frame();
        state.key_up(Key::Climb);
        let input = PlayerInput::from_state(&state);
        assert!(!input.dash_pressed);
        assert!(input.climb_released && !input.climb_held);
    }
}
