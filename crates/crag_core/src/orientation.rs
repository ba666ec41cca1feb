//! Tile orientation model used for autotile art selection.
//!
//! An `Orientation` names which piece of a tileset a tile is drawn with: an
//! edge, a corner, a strip, or one of the interior "in ground" decorations.
//! It never influences collision.
//!
//! The editor steps through orientations with `successor` / `predecessor`.
//! That walk follows `CYCLE`, a hand-ordered ring that visits the pieces the
//! way a level author thinks about them (around the outline first, then the
//! inner corners, strips, junctions, and finally the decorations). It is
//! intentionally independent from declaration order, which is the stable
//! integer tag used by saved levels.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Orientation {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
    MiddleHorizontal,
    MiddleVertical,
    EndTop,
    EndBottom,
    EndLeft,
    EndRight,
    Single,
    Center,
    CornerTopLeft,
    CornerTopRight,
    CornerBottomLeft,
    CornerBottomRight,
    InnerTopLeft,
    InnerTopRight,
    InnerBottomLeft,
    InnerBottomRight,
    TeeTop,
    TeeBottom,
    TeeLeft,
    TeeRight,
    Cross,
    InnerPairTop,
    InnerPairBottom,
    InnerPairLeft,
    InnerPairRight,
    InGround1,
    InGround2,
    InGround3,
    InGround4,
    InGround5,
    InGround6,
    InGround7,
    InGround8,
    InGround9,
    InGround10,
    InGround11,
    InGround12,
    InGround13,
    InGround14,
    InGround15,
}

/// Spike direction for hazard tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

pub const ORIENTATION_COUNT: usize = 44;

/// Number of shape pieces; every orientation from `InGround1` on is decorative.
const SHAPE_COUNT: usize = 29;

/// Sub-variants drawn for each shape piece.
pub const VARIANTS_PER_SHAPE: u32 = 4;

/// Total number of tileset slots addressed by `variant_index`.
pub const ART_SLOT_COUNT: u32 =
    SHAPE_COUNT as u32 * VARIANTS_PER_SHAPE + (ORIENTATION_COUNT - SHAPE_COUNT) as u32;

use Orientation::*;

/// Declaration order; index `i` is the integer tag of `ALL[i]`.
pub const ALL: [Orientation; ORIENTATION_COUNT] = [
    Top,
    Bottom,
    Left,
    Right,
    MiddleHorizontal,
    MiddleVertical,
    EndTop,
    EndBottom,
    EndLeft,
    EndRight,
    Single,
    Center,
    CornerTopLeft,
    CornerTopRight,
    CornerBottomLeft,
    CornerBottomRight,
    InnerTopLeft,
    InnerTopRight,
    InnerBottomLeft,
    InnerBottomRight,
    TeeTop,
    TeeBottom,
    TeeLeft,
    TeeRight,
    Cross,
    InnerPairTop,
    InnerPairBottom,
    InnerPairLeft,
    InnerPairRight,
    InGround1,
    InGround2,
    InGround3,
    InGround4,
    InGround5,
    InGround6,
    InGround7,
    InGround8,
    InGround9,
    InGround10,
    InGround11,
    InGround12,
    InGround13,
    InGround14,
    InGround15,
];

/// Editor cycling order.
const CYCLE: [Orientation; ORIENTATION_COUNT] = [
    Top,
    CornerTopRight,
    Right,
    CornerBottomRight,
    Bottom,
    CornerBottomLeft,
    Left,
    CornerTopLeft,
    Center,
    InnerTopLeft,
    InnerTopRight,
    InnerBottomRight,
    InnerBottomLeft,
    InnerPairTop,
    InnerPairRight,
    InnerPairBottom,
    InnerPairLeft,
    MiddleHorizontal,
    EndLeft,
    EndRight,
    MiddleVertical,
    EndTop,
    EndBottom,
    Single,
    TeeTop,
    TeeRight,
    TeeBottom,
    TeeLeft,
    Cross,
    InGround1,
    InGround2,
    InGround3,
    InGround4,
    InGround5,
    InGround6,
    InGround7,
    InGround8,
    InGround9,
    InGround10,
    InGround11,
    InGround12,
    InGround13,
    InGround14,
    InGround15,
];

/// Inverse of `CYCLE`, indexed by declaration index.
const CYCLE_POSITION: [u8; ORIENTATION_COUNT] = {
    let mut table = [0u8; ORIENTATION_COUNT];
    let mut i = 0;
    while i < ORIENTATION_COUNT {
        table[CYCLE[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Next orientation in the editor cycle, wrapping after the last decoration.
pub fn successor(orientation: Orientation) -> Orientation {
    let pos = CYCLE_POSITION[orientation as usize] as usize;
    CYCLE[(pos + 1) % ORIENTATION_COUNT]
}

/// Previous orientation in the editor cycle; exact inverse of [`successor`].
pub fn predecessor(orientation: Orientation) -> Orientation {
    let pos = CYCLE_POSITION[orientation as usize] as usize;
    CYCLE[(pos + ORIENTATION_COUNT - 1) % ORIENTATION_COUNT]
}

/// Tileset slot for a tile drawn at world position (`world_x`, `world_y`).
///
/// Shape pieces get one of four sub-variants chosen by `(x + y) mod 4`, so
/// long runs of the same edge don't repeat. Decorations always map to their
/// own single slot after the shape block.
pub fn variant_index(orientation: Orientation, world_x: i32, world_y: i32) -> u32 {
    let slot = orientation as u32;
    if orientation.is_in_ground() {
        SHAPE_COUNT as u32 * VARIANTS_PER_SHAPE + (slot - SHAPE_COUNT as u32)
    } else {
        let variant = (world_x.wrapping_add(world_y)).rem_euclid(VARIANTS_PER_SHAPE as i32);
        slot * VARIANTS_PER_SHAPE + variant as u32
    }
}

impl Orientation {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ALL.get(index).copied()
    }

    pub fn is_in_ground(self) -> bool {
        self.index() >= SHAPE_COUNT
    }

    pub fn successor(self) -> Self {
        successor(self)
    }

    pub fn predecessor(self) -> Self {
        predecessor(self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Top => "Top",
            Bottom => "Bottom",
            Left => "Left",
            Right => "Right",
            MiddleHorizontal => "MiddleHorizontal",
            MiddleVertical => "MiddleVertical",
            EndTop => "EndTop",
            EndBottom => "EndBottom",
            EndLeft => "EndLeft",
            EndRight => "EndRight",
            Single => "Single",
            Center => "Center",
            CornerTopLeft => "CornerTopLeft",
            CornerTopRight => "CornerTopRight",
            CornerBottomLeft => "CornerBottomLeft",
            CornerBottomRight => "CornerBottomRight",
            InnerTopLeft => "InnerTopLeft",
            InnerTopRight => "InnerTopRight",
            InnerBottomLeft => "InnerBottomLeft",
            InnerBottomRight => "InnerBottomRight",
            TeeTop => "TeeTop",
            TeeBottom => "TeeBottom",
            TeeLeft => "TeeLeft",
            TeeRight => "TeeRight",
            Cross => "Cross",
            InnerPairTop => "InnerPairTop",
            InnerPairBottom => "InnerPairBottom",
            InnerPairLeft => "InnerPairLeft",
            InnerPairRight => "InnerPairRight",
            InGround1 => "InGround1",
            InGround2 => "InGround2",
            InGround3 => "InGround3",
            InGround4 => "InGround4",
            InGround5 => "InGround5",
            InGround6 => "InGround6",
            InGround7 => "InGround7",
            InGround8 => "InGround8",
            InGround9 => "InGround9",
            InGround10 => "InGround10",
            InGround11 => "InGround11",
            InGround12 => "InGround12",
            InGround13 => "InGround13",
            InGround14 => "InGround14",
            InGround15 => "InGround15",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|o| o.name() == name)
    }

    /// Direction spikes point when a hazard tile uses this orientation.
    pub fn facing(self) -> Direction {
        match self {
            Bottom | EndBottom | TeeBottom | InnerPairBottom => Direction::Down,
            Left | EndLeft | TeeLeft | InnerPairLeft => Direction::Left,
            Right | EndRight | TeeRight | InnerPairRight => Direction::Right,
            _ => Direction::Up,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Orientation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Accepts either the variant name or its integer tag.
impl<'de> Deserialize<'de> for Orientation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrientationVisitor;

        impl Visitor<'_> for OrientationVisitor {
            type Value = Orientation;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an orientation name or integer tag")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Orientation, E> {
                Orientation::from_name(v)
                    .ok_or_else(|| E::custom(format!("unknown orientation '{v}'")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Orientation, E> {
                usize::try_from(v)
                    .ok()
                    .and_then(Orientation::from_index)
                    .ok_or_else(|| E::custom(format!("orientation tag {v} out of range")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Orientation, E> {
                if v < 0 {
                    return Err(E::custom(format!("orientation tag {v} out of range")));
                }
                self.visit_u64(v as u64)
            }
        }

        deserializer.deserialize_any(OrientationVisitor)
    }
}
