//! Axis-separated collision between the player and one environment item.
//!
//! Each call tests two hypothetical rectangles built from the *unresolved*
//! player rect: one moved by the X velocity only, one by the Y velocity only.
//! Blocking one axis therefore never stops movement along the other, which
//! is what lets the player slide along floors and walls. Overlap is strict,
//! so a body resting flush against a tile does not collide with it.
//!
//! Only `Solid` items push the player out. Crystals, hazards and switches
//! report an outcome and leave the player where it is.

use crate::player::Player;
use crate::registry::{EnvItem, EnvKind, TileHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    None,
    DashRecharge,
    Death,
    SwitchLevel,
}

pub fn resolve(
    item: &mut EnvItem,
    handle: TileHandle,
    player: &mut Player,
    climb_held: bool,
    dt: f32,
) -> Outcome {
    if matches!(
        item.kind,
        EnvKind::Nonsolid | EnvKind::LevelEntry { .. } | EnvKind::LevelEntrySpawn { .. }
    ) {
        return Outcome::None;
    }

    let old = player.rect;
    let tile = item.rect;
    let hit_x = old
        .translated(player.velocity.x * dt, 0.0)
        .overlaps(&tile);
    let hit_y = old
        .translated(0.0, player.velocity.y * dt)
        .overlaps(&tile);
    if !hit_x && !hit_y {
        return Outcome::None;
    }

    match &mut item.kind {
        EnvKind::Crystal { respawning, timer } => {
            if *respawning {
                return Outcome::None;
            }
            *respawning = true;
            *timer = player.config.crystal_cooldown;
            player.dash_charge = player.config.dash_charge_max;
            return Outcome::DashRecharge;
        }
        EnvKind::Hazard { .. } => return Outcome::Death,
        EnvKind::SwitchLevel { .. } => return Outcome::SwitchLevel,
        EnvKind::Solid => {}
        EnvKind::Nonsolid | EnvKind::LevelEntry { .. } | EnvKind::LevelEntrySpawn { .. } => {
            return Outcome::None
        }
    }

    if hit_x {
        player.rect.x = if old.x < tile.x {
            tile.x - old.w
        } else {
            tile.right()
        };
        player.velocity.x = 0.0;
        if player.dashing {
            player.dash_charge = 0.0;
        }
        player.dashing = false;
    }

    if hit_y {
        if old.y < tile.y {
            player.rect.y = tile.y - old.h;
            player.land();
        } else {
            if player.dashing {
                player.dash_charge = 0.0;
            }
            player.rect.y = tile.bottom();
        }
        player.velocity.y = 0.0;
        player.dashing = false;
    }

    if hit_x {
        let center_y = player.rect.center().y;
        if center_y >= tile.y && climb_held {
            if player.climbing.is_none() {
                log::trace!("Grabbed wall tile {}", handle.index());
                player.velocity = glam::Vec2::ZERO;
            }
            // Already on the wall: follow the tile under the body without
            // losing the climb speed set this frame.
            player.climbing = Some(handle);
        } else if player.climbing == Some(handle) {
            player.climbing = None;
        }
    }

    Outcome::None
}
