//! Tile editor session.
//!
//! The session turns mouse and keyboard input into edits of a `LevelDocument`:
//! left drag paints the current tool, right drag erases, E/Q step the
//! orientation and 1-6 pick the tool. The level name is typed while the cursor
//! hovers the name box. All screen-space controls live in the top strip.

use crag_core::geometry::Rect;
use crag_core::input::{InputState, Key, MouseBtn};
use crag_core::orientation::Orientation;
use glam::Vec2;

use crate::level::{cell_at, LevelDocument, TileDescriptor, TileKind};

pub const SCREEN_WIDTH: f32 = 800.0;

/// Longest level name the name box accepts.
pub const MAX_NAME_LEN: usize = 20;

/// Editor camera pan per step while an arrow key is held.
const PAN_SPEED: f32 = 1.0;

/// Screen rectangles of the editor controls.
pub struct EditorLayout;

impl EditorLayout {
    pub const PLAY: Rect = Rect::new(10.0, 10.0, 100.0, 30.0);
    pub const NAME_BOX: Rect = Rect::new(SCREEN_WIDTH - 110.0, 10.0, 100.0, 30.0);
    pub const LINK: Rect = Rect::new(460.0, 10.0, 100.0, 30.0);

    /// Tool button for `TileKind::ALL[index]`.
    pub fn tool_button(index: usize) -> Rect {
        Rect::new(120.0 + index as f32 * 55.0, 10.0, 50.0, 30.0)
    }

    pub fn is_over_controls(x: f32, y: f32) -> bool {
        Self::PLAY.contains_point(x, y)
            || Self::NAME_BOX.contains_point(x, y)
            || Self::LINK.contains_point(x, y)
            || (0..TileKind::ALL.len()).any(|i| Self::tool_button(i).contains_point(x, y))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    None,
    /// Save the document under this name and start playing it.
    SaveAndPlay(String),
    /// Pick another level to link the next switch/entry tiles to.
    OpenLinkPicker,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    pub tool: TileKind,
    pub orientation: Orientation,
    /// Cell painted during the current drag.
    pub last_cell: Option<(i32, i32)>,
    pub name: String,
    /// Level picked from the link picker; stamped into link tiles.
    pub chained: Option<String>,
    /// World position of the screen's top-left corner.
    pub camera: Vec2,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            tool: TileKind::Solid,
            orientation: Orientation::Top,
            last_cell: None,
            name: String::new(),
            chained: None,
            camera: Vec2::ZERO,
        }
    }

    /// Links subsequent switch/entry tiles to `level` and selects the switch tool.
    pub fn set_chained(&mut self, level: impl Into<String>) {
        let level = level.into();
        log::info!("Editor linked to level '{level}'");
        self.chained = Some(level);
        self.tool = TileKind::SwitchLevel;
    }

    /// Grid cell under a screen-space point.
    pub fn cell_under(&self, screen_x: f32, screen_y: f32) -> (i32, i32) {
        cell_at(screen_x + self.camera.x, screen_y + self.camera.y)
    }

    /// Tile the current tool would paint.
    pub fn brush(&self) -> TileDescriptor {
        let tile = TileDescriptor::new(self.tool, self.orientation);
        match (&self.chained, self.tool) {
            (Some(chained), TileKind::SwitchLevel) => tile.with_switch_target(chained.as_str()),
            (Some(chained), TileKind::LevelEntry | TileKind::LevelEntrySpawn) => {
                tile.with_entering_from(chained.as_str())
            }
            _ => tile,
        }
    }

    pub fn update(&mut self, input: &InputState, document: &mut LevelDocument) -> EditorAction {
        self.update_keys(input);
        self.update_mouse(input, document)
    }

    /// Panning, hotkeys and name typing. The name box takes typed text while
    /// the cursor hovers it; hotkeys are ignored meanwhile.
    pub fn update_keys(&mut self, input: &InputState) {
        let (mx, my) = input.mouse_xy();
        self.pan(input);
        if EditorLayout::NAME_BOX.contains_point(mx, my) {
            self.type_name(input);
        } else {
            self.hotkeys(input);
        }
    }

    /// Buttons, painting and erasing. A press and release landing in the same
    /// step still paints or erases the cell under the cursor.
    pub fn update_mouse(&mut self, input: &InputState, document: &mut LevelDocument) -> EditorAction {
        let (mx, my) = input.mouse_xy();
        if input.is_mouse_just_pressed(MouseBtn::Left) {
            if let Some(action) = self.click_controls(mx, my) {
                return action;
            }
        }

        let left_held = input.is_mouse_held(MouseBtn::Left);
        if EditorLayout::is_over_controls(mx, my) {
            if !left_held {
                self.last_cell = None;
            }
            return EditorAction::None;
        }

        if left_held || input.is_mouse_just_pressed(MouseBtn::Left) {
            let cell = self.cell_under(mx, my);
            if self.last_cell != Some(cell) {
                let (col, row) = cell;
                let brush = self.brush();
                if document.get_cell(col, row) != Some(&brush) {
                    log::trace!("Paint {:?} at ({col}, {row})", self.tool);
                    document.set_cell(col, row, brush);
                }
                self.last_cell = Some(cell);
            }
        }
        if !left_held {
            self.last_cell = None;
        }

        if input.is_mouse_held(MouseBtn::Right) || input.is_mouse_just_pressed(MouseBtn::Right) {
            let (col, row) = self.cell_under(mx, my);
            if document.erase_cell(col, row).is_some() {
                log::trace!("Erased ({col}, {row})");
            }
        }

        EditorAction::None
    }

    fn pan(&mut self, input: &InputState) {
        if input.is_held(Key::Left) {
            self.camera.x -= PAN_SPEED;
        } else if input.is_held(Key::Right) {
            self.camera.x += PAN_SPEED;
        } else if input.is_held(Key::Up) {
            self.camera.y -= PAN_SPEED;
        } else if input.is_held(Key::Down) {
            self.camera.y += PAN_SPEED;
        }
    }

    fn hotkeys(&mut self, input: &InputState) {
        if input.is_just_pressed(Key::OrientationNext) {
            self.orientation = self.orientation.successor();
        }
        if input.is_just_pressed(Key::OrientationPrev) {
            self.orientation = self.orientation.predecessor();
        }
        for (key, kind) in Key::DIGITS.iter().zip(TileKind::ALL) {
            if input.is_just_pressed(*key) {
                self.tool = kind;
            }
        }
    }

    fn type_name(&mut self, input: &InputState) {
        for ch in input.typed_text().chars() {
            if (32..=125).contains(&u32::from(ch)) && self.name.chars().count() < MAX_NAME_LEN {
                self.name.push(ch);
            }
        }
        if input.is_just_pressed(Key::Backspace) {
            self.name.pop();
        }
    }

    fn click_controls(&mut self, x: f32, y: f32) -> Option<EditorAction> {
        if EditorLayout::PLAY.contains_point(x, y) {
            if self.name.trim().is_empty() {
                log::warn!("Type a level name before playing");
                return Some(EditorAction::None);
            }
            return Some(EditorAction::SaveAndPlay(self.name.clone()));
        }
        if EditorLayout::LINK.contains_point(x, y) {
            return Some(EditorAction::OpenLinkPicker);
        }
        let tool = (0..TileKind::ALL.len())
            .find(|&i| EditorLayout::tool_button(i).contains_point(x, y))
            .map(|i| TileKind::ALL[i]);
        if let Some(tool) = tool {
            self.tool = tool;
            return Some(EditorAction::None);
        }
        None
    }
}
