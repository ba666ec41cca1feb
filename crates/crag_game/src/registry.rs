//! Run-time tile list for the loaded level.
//!
//! The registry is derived from a `LevelDocument` on every load and thrown away
//! on the next one. Collision walks the whole list every frame in order; there
//! is no spatial partitioning.
//!
//! Each registry carries a process-wide generation number. A `TileHandle`
//! remembers the generation it was issued under, so a handle kept across a
//! level load resolves to nothing instead of to an unrelated tile.

use std::sync::atomic::{AtomicU64, Ordering};

use crag_core::geometry::Rect;
use crag_core::orientation::{Direction, Orientation};
use glam::Vec2;

use crate::level::{cell_rect, LevelDocument, TileKind};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Where the built-in practice course starts the player.
pub const SANDBOX_SPAWN: Vec2 = Vec2::new(20.0, 300.0);

#[derive(Debug, Clone, PartialEq)]
pub enum EnvKind {
    /// Drawn, never collides.
    Nonsolid,
    Solid,
    Hazard { facing: Direction },
    Crystal { respawning: bool, timer: f32 },
    SwitchLevel { target: Option<String> },
    LevelEntry { entering_from: Option<String> },
    LevelEntrySpawn { entering_from: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvItem {
    pub rect: Rect,
    pub orientation: Orientation,
    pub kind: EnvKind,
}

impl EnvItem {
    pub fn new(rect: Rect, kind: EnvKind) -> Self {
        Self {
            rect,
            orientation: Orientation::Top,
            kind,
        }
    }

    pub fn is_solid(&self) -> bool {
        matches!(self.kind, EnvKind::Solid)
    }
}

/// Generation-checked reference to one registry item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHandle {
    index: usize,
    generation: u64,
}

impl TileHandle {
    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSide {
    Above,
    Below,
}

/// A LevelEntry or LevelEntrySpawn cell.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub position: Vec2,
    pub orientation: Orientation,
    pub entering_from: Option<String>,
    /// LevelEntrySpawn cells may also be used when no entry matches.
    pub spawn: bool,
}

/// Placement data gathered while rebuilding; consumed by the level loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnInfo {
    pub respawn: Option<Vec2>,
    pub entries: Vec<EntryPoint>,
}

impl SpawnInfo {
    /// Entry whose `entering_from` names the level we came from, otherwise
    /// the first LevelEntrySpawn.
    pub fn choose_entry(&self, from: Option<&str>) -> Option<&EntryPoint> {
        from.and_then(|from| {
            self.entries
                .iter()
                .find(|entry| entry.entering_from.as_deref() == Some(from))
        })
        .or_else(|| self.entries.iter().find(|entry| entry.spawn))
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    items: Vec<EnvItem>,
    generation: u64,
}

impl Registry {
    pub fn new(items: Vec<EnvItem>) -> Self {
        Self {
            items,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn rebuild(document: &LevelDocument) -> (Self, SpawnInfo) {
        let mut items = Vec::with_capacity(document.len() + 1);
        let mut spawn = SpawnInfo::default();

        if let Some(bounds) = document.bounds() {
            items.push(EnvItem::new(bounds, EnvKind::Nonsolid));
        }

        for (col, row, tile) in document.iter() {
            let rect = cell_rect(col, row);
            let kind = match tile.kind {
                TileKind::Solid => EnvKind::Solid,
                TileKind::Hazard => EnvKind::Hazard {
                    facing: tile.orientation.facing(),
                },
                TileKind::SwitchLevel => EnvKind::SwitchLevel {
                    target: tile.switch_target.clone(),
                },
                TileKind::LevelEntry => EnvKind::LevelEntry {
                    entering_from: tile.entering_from.clone(),
                },
                TileKind::LevelEntrySpawn => EnvKind::LevelEntrySpawn {
                    entering_from: tile.entering_from.clone(),
                },
                TileKind::RespawnPoint => {
                    if spawn.respawn.is_some() {
                        log::debug!("Level has several respawn points; using ({col}, {row})");
                    }
                    spawn.respawn = Some(rect.position());
                    continue;
                }
            };
            if tile.kind == TileKind::LevelEntry || tile.kind == TileKind::LevelEntrySpawn {
                spawn.entries.push(EntryPoint {
                    position: rect.position(),
                    orientation: tile.orientation,
                    entering_from: tile.entering_from.clone(),
                    spawn: tile.kind == TileKind::LevelEntrySpawn,
                });
            }
            items.push(EnvItem {
                rect,
                orientation: tile.orientation,
                kind,
            });
        }

        let registry = Self::new(items);
        log::debug!(
            "Registry generation {} rebuilt with {} items ({} entry points)",
            registry.generation,
            registry.items.len(),
            spawn.entries.len()
        );
        (registry, spawn)
    }

    /// The practice course: a crystal over a pit, three floor blocks, a
    /// ledge, spikes on the far side and a kill floor far below.
    pub fn sandbox() -> (Self, SpawnInfo) {
        let spikes = |x, y, w, h| {
            EnvItem::new(
                Rect::new(x, y, w, h),
                EnvKind::Hazard {
                    facing: Direction::Up,
                },
            )
        };
        let items = vec![
            EnvItem::new(
                Rect::new(290.0, 440.0, 20.0, 20.0),
                EnvKind::Crystal {
                    respawning: false,
                    timer: 0.0,
                },
            ),
            EnvItem::new(Rect::new(0.0, 0.0, 1000.0, 400.0), EnvKind::Nonsolid),
            EnvItem::new(Rect::new(0.0, 400.0, 200.0, 200.0), EnvKind::Solid),
            EnvItem::new(Rect::new(400.0, 400.0, 200.0, 200.0), EnvKind::Solid),
            EnvItem::new(Rect::new(800.0, 400.0, 200.0, 200.0), EnvKind::Solid),
            EnvItem::new(Rect::new(250.0, 300.0, 100.0, 10.0), EnvKind::Solid),
            spikes(650.0, 300.0, 100.0, 20.0),
            spikes(200.0, 580.0, 200.0, 20.0),
            spikes(600.0, 580.0, 200.0, 20.0),
            spikes(-1000.0, 1000.0, 3000.0, 20.0),
        ];
        let spawn = SpawnInfo {
            respawn: Some(SANDBOX_SPAWN),
            entries: Vec::new(),
        };
        (Self::new(items), spawn)
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &[EnvItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn handle(&self, index: usize) -> TileHandle {
        TileHandle {
            index,
            generation: self.generation,
        }
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut EnvItem> {
        self.items.get_mut(index)
    }

    /// `None` when the handle was issued by another registry.
    pub fn resolve(&self, handle: TileHandle) -> Option<&EnvItem> {
        if handle.generation != self.generation {
            return None;
        }
        self.items.get(handle.index)
    }

    /// Solid tile in the same column whose edge touches `handle`'s tile on
    /// the given side. Used to carry a climb across stacked tiles.
    pub fn find_stacked(&self, handle: TileHandle, side: StackSide) -> Option<TileHandle> {
        const EPS: f32 = 0.01;
        let tile = self.resolve(handle)?.rect;
        self.items
            .iter()
            .enumerate()
            .find(|(index, item)| {
                if *index == handle.index || !item.is_solid() {
                    return false;
                }
                let same_column =
                    (item.rect.x - tile.x).abs() < EPS && (item.rect.w - tile.w).abs() < EPS;
                let touching = match side {
                    StackSide::Above => (item.rect.bottom() - tile.y).abs() < EPS,
                    StackSide::Below => (item.rect.y - tile.bottom()).abs() < EPS,
                };
                same_column && touching
            })
            .map(|(index, _)| self.handle(index))
    }

    pub fn clear_crystals(&mut self) {
        for item in &mut self.items {
            if let EnvKind::Crystal { respawning, timer } = &mut item.kind {
                *respawning = false;
                *timer = 0.0;
            }
        }
    }

    pub fn tick_crystals(&mut self, dt: f32) {
        for item in &mut self.items {
            if let EnvKind::Crystal { respawning, timer } = &mut item.kind {
                if !*respawning {
                    continue;
                }
                *timer -= dt;
                if *timer <= 0.0 {
                    *respawning = false;
                    *timer = 0.0;
                }
            }
        }
    }

    #[cfg(test)]
    pub fn solid_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_solid()).count()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::TileDescriptor;

    fn document(cells: &[(i32, i32, TileDescriptor)]) -> LevelDocument {
        let mut doc = LevelDocument::new();
        for (col, row, tile) in cells {
            doc.set_cell(*col, *row, tile.clone());
        }
        doc
    }

    #[test]
    fn rebuild_maps_cells_to_items_and_skips_respawn_points() {
        let doc = document(&[
            (0, 0, TileDescriptor::new(TileKind::Solid, Orientation::Top)),
            (1, 0, TileDescriptor::new(TileKind::Hazard, Orientation::Left)),
            (2, 3, TileDescriptor::new(TileKind::RespawnPoint, Orientation::Top)),
            (
                3,
                0,
                TileDescriptor::new(TileKind::SwitchLevel, Orientation::Top).with_switch_target("b"),
            ),
        ]);
        let (registry, spawn) = Registry::rebuild(&doc);

        // backdrop + solid + hazard + switch
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.items()[0].kind, EnvKind::Nonsolid);
        assert_eq!(registry.items()[0].rect, Rect::new(0.0, 0.0, 60.0, 60.0));
        assert_eq!(registry.items()[1].rect, Rect::new(0.0, 0.0, 15.0, 15.0));
        assert_eq!(
            registry.items()[2].kind,
            EnvKind::Hazard {
                facing: Direction::Left
            }
        );
        assert_eq!(
            registry.items()[3].kind,
            EnvKind::SwitchLevel {
                target: Some("b".to_string())
            }
        );
        assert_eq!(spawn.respawn, Some(Vec2::new(30.0, 45.0)));
        assert!(spawn.entries.is_empty());
    }

    #[test]
    fn empty_document_has_no_backdrop() {
        let (registry, spawn) = Registry::rebuild(&LevelDocument::new());
        assert!(registry.is_empty());
        assert_eq!(spawn, SpawnInfo::default());
    }

    #[test]
    fn every_rebuild_gets_a_new_generation() {
        let doc = document(&[(0, 0, TileDescriptor::new(TileKind::Solid, Orientation::Top))]);
        let (first, _) = Registry::rebuild(&doc);
        let (second, _) = Registry::rebuild(&doc);
        assert_ne!(first.generation(), second.generation());

        let stale = first.handle(1);
        assert!(first.resolve(stale).is_some());
        assert!(second.resolve(stale).is_none());
    }

    #[test]
    fn entry_choice_prefers_matching_origin() {
        let doc = document(&[
            (
                0,
                0,
                TileDescriptor::new(TileKind::LevelEntrySpawn, Orientation::Top),
            ),
            (
                5,
                0,
                TileDescriptor::new(TileKind::LevelEntry, Orientation::Left).with_entering_from("west"),
            ),
        ]);
        let (_, spawn) = Registry::rebuild(&doc);
        let from_west = spawn.choose_entry(Some("west")).expect("matching entry");
        assert_eq!(from_west.position, Vec2::new(75.0, 0.0));
        let fallback = spawn.choose_entry(Some("east")).expect("spawn fallback");
        assert_eq!(fallback.position, Vec2::ZERO);
        assert!(spawn.choose_entry(None).expect("spawn").spawn);
    }

    #[test]
    fn entry_without_spawn_fallback_is_none() {
        let doc = document(&[(
            0,
            0,
            TileDescriptor::new(TileKind::LevelEntry, Orientation::Top).with_entering_from("a"),
        )]);
        let (_, spawn) = Registry::rebuild(&doc);
        assert!(spawn.choose_entry(Some("b")).is_none());
        assert!(spawn.choose_entry(None).is_none());
    }

    #[test]
    fn stacked_search_finds_touching_solids_in_same_column() {
        let doc = document(&[
            (2, 4, TileDescriptor::new(TileKind::Solid, Orientation::Left)),
            (2, 5, TileDescriptor::new(TileKind::Solid, Orientation::Left)),
            (3, 3, TileDescriptor::new(TileKind::Solid, Orientation::Left)),
        ]);
        let (registry, _) = Registry::rebuild(&doc);
        let index_of = |rect: Rect| {
            registry
                .items()
                .iter()
                .position(|item| item.rect == rect)
                .expect("tile present")
        };
        let lower = registry.handle(index_of(cell_rect(2, 5)));
        let upper = registry.find_stacked(lower, StackSide::Above).expect("tile above");
        assert_eq!(registry.resolve(upper).map(|i| i.rect), Some(cell_rect(2, 4)));
        assert!(registry.find_stacked(upper, StackSide::Above).is_none());
        assert_eq!(registry.find_stacked(upper, StackSide::Below), Some(lower));
    }

    #[test]
    fn crystal_timers_tick_and_clear() {
        let (mut registry, spawn) = Registry::sandbox();
        assert_eq!(spawn.respawn, Some(SANDBOX_SPAWN));
        if let Some(EnvItem {
            kind: EnvKind::Crystal { respawning, timer },
            ..
        }) = registry.item_mut(0)
        {
            *respawning = true;
            *timer = 1.0;
        }
        registry.tick_crystals(0.5);
        assert_eq!(
            registry.items()[0].kind,
            EnvKind::Crystal {
                respawning: true,
                timer: 0.5
            }
        );
        registry.tick_crystals(0.5);
        assert_eq!(
            registry.items()[0].kind,
            EnvKind::Crystal {
                respawning: false,
                timer: 0.0
            }
        );

        if let Some(EnvItem {
            kind: EnvKind::Crystal { respawning, timer },
            ..
        }) = registry.item_mut(0)
        {
            *respawning = true;
            *timer = 4.0;
        }
        registry.clear_crystals();
        assert_eq!(
            registry.items()[0].kind,
            EnvKind::Crystal {
                respawning: false,
                timer: 0.0
            }
        );
    }

    #[test]
    fn sandbox_layout() {
        let (registry, _) = Registry::sandbox();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.solid_count(), 4);
    }
}
