//! Level browser.
//!
//! One button per stored level, stacked down the left edge. In browse mode
//! the top row holds the Editor and Sandbox buttons; when the editor opens
//! the browser to pick a link target, the top row is a single Cancel button.

use crag_core::geometry::Rect;
use crag_core::input::{InputState, MouseBtn};

use crate::level::LevelError;
use crate::storage::{LevelStore, SavesWatcher};

pub const EDITOR_BUTTON: Rect = Rect::new(10.0, 10.0, 100.0, 30.0);
pub const SANDBOX_BUTTON: Rect = Rect::new(120.0, 10.0, 100.0, 30.0);
pub const CANCEL_BUTTON: Rect = Rect::new(10.0, 10.0, 100.0, 30.0);

const ROW_SPACING: f32 = 50.0;

/// Button of the `index`-th listed level. Row 0 is the control row.
pub fn level_button(index: usize) -> Rect {
    Rect::new(10.0, 10.0 + (index + 1) as f32 * ROW_SPACING, 100.0, 30.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Browse,
    /// Choosing a level for the editor to link to.
    LinkPicker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectAction {
    None,
    OpenEditor,
    PlaySandbox,
    Play(String),
    Link(String),
    Cancel,
}

pub struct LevelSelect {
    names: Vec<String>,
    pub mode: SelectMode,
    watcher: Option<SavesWatcher>,
}

impl LevelSelect {
    pub fn new(store: &dyn LevelStore) -> Self {
        let mut select = Self {
            names: Vec::new(),
            mode: SelectMode::Browse,
            watcher: store
                .watch_path()
                .map(|path| SavesWatcher::new(path.to_path_buf())),
        };
        if let Err(e) = select.refresh(store) {
            log::error!("Failed to list levels: {e}");
        }
        select
    }

    #[cfg(test)]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn refresh(&mut self, store: &dyn LevelStore) -> Result<(), LevelError> {
        self.names = store.list()?;
        log::debug!("Level list refreshed: {} levels", self.names.len());
        Ok(())
    }

    /// Re-lists the store when the saves directory changed on disk.
    pub fn poll(&mut self, store: &dyn LevelStore) {
        let changed = self
            .watcher
            .as_mut()
            .is_some_and(|watcher| watcher.should_reload());
        if changed {
            if let Err(e) = self.refresh(store) {
                log::error!("Failed to list levels: {e}");
            }
        }
    }

    /// Buttons currently shown, with their captions.
    pub fn buttons(&self) -> Vec<(Rect, &str)> {
        let mut buttons = match self.mode {
            SelectMode::Browse => vec![(EDITOR_BUTTON, "Level editor"), (SANDBOX_BUTTON, "Sandbox")],
            SelectMode::LinkPicker => vec![(CANCEL_BUTTON, "Cancel")],
        };
        buttons.extend(
            self.names
                .iter()
                .enumerate()
                .map(|(i, name)| (level_button(i), name.as_str())),
        );
        buttons
    }

    pub fn hit_test(&self, x: f32, y: f32) -> SelectAction {
        match self.mode {
            SelectMode::Browse => {
                if EDITOR_BUTTON.contains_point(x, y) {
                    return SelectAction::OpenEditor;
                }
                if SANDBOX_BUTTON.contains_point(x, y) {
                    return SelectAction::PlaySandbox;
                }
            }
            SelectMode::LinkPicker => {
                if CANCEL_BUTTON.contains_point(x, y) {
                    return SelectAction::Cancel;
                }
            }
        }

        let Some(name) = self
            .names
            .iter()
            .enumerate()
            .find(|(i, _)| level_button(*i).contains_point(x, y))
            .map(|(_, name)| name.clone())
        else {
            return SelectAction::None;
        };
        match self.mode {
            SelectMode::Browse => SelectAction::Play(name),
            SelectMode::LinkPicker => SelectAction::Link(name),
        }
    }

    pub fn update(&self, input: &InputState) -> SelectAction {
        if !input.is_mouse_just_pressed(MouseBtn::Left) {
            return SelectAction::None;
        }
        let (x, y) = input.mouse_xy();
        self.hit_test(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLevelStore;

    fn select_with(names: &[&str]) -> LevelSelect {
        let mut store = MemoryLevelStore::default();
        for name in names {
            store.write(name, "{}").expect("write level");
        }
        LevelSelect::new(&store)
    }

    #[test]
    fn rows_start_below_the_control_row() {
        assert_eq!(level_button(0), Rect::new(10.0, 60.0, 100.0, 30.0));
        assert_eq!(level_button(2), Rect::new(10.0, 160.0, 100.0, 30.0));
    }

    #[test]
    fn browse_mode_hit_testing() {
        let select = select_with(&["beta", "alpha"]);
        assert_eq!(select.names(), ["alpha", "beta"]);
        assert_eq!(select.hit_test(20.0, 20.0), SelectAction::OpenEditor);
        assert_eq!(select.hit_test(130.0, 20.0), SelectAction::PlaySandbox);
        assert_eq!(select.hit_test(50.0, 70.0), SelectAction::Play("alpha".into()));
        assert_eq!(select.hit_test(50.0, 120.0), SelectAction::Play("beta".into()));
        // Gap between rows and past the last row.
        assert_eq!(select.hit_test(50.0, 100.0), SelectAction::None);
        assert_eq!(select.hit_test(50.0, 170.0), SelectAction::None);
    }

    #[test]
    fn link_picker_replaces_controls_with_cancel() {
        let mut select = select_with(&["cave"]);
        select.mode = SelectMode::LinkPicker;
        assert_eq!(select.hit_test(20.0, 20.0), SelectAction::Cancel);
        assert_eq!(select.hit_test(130.0, 20.0), SelectAction::None);
        assert_eq!(select.hit_test(20.0, 70.0), SelectAction::Link("cave".into()));
        assert_eq!(select.buttons().len(), 2);
    }

    #[test]
    fn only_fresh_clicks_count() {
        let select = select_with(&["cave"]);
        let mut input = InputState::new();
        input.mouse_position = (20.0, 70.0);
        assert_eq!(select.update(&input), SelectAction::None);
        input.mouse_down(MouseBtn::Left);
        assert_eq!(select.update(&input), SelectAction::Play("cave".into()));
        input.end_frame();
        assert_eq!(select.update(&input), SelectAction::None);
    }

    #[test]
    fn refresh_picks_up_new_levels() {
        let mut store = MemoryLevelStore::default();
        let mut select = LevelSelect::new(&store);
        assert!(select.names().is_empty());
        store.write("new", "{}").expect("write level");
        select.refresh(&store).expect("refresh");
        assert_eq!(select.names(), ["new"]);
    }
}
