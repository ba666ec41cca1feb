//! Scene state machine tying the level, player, editor and level browser
//! together. One `step` per fixed tick; rendering reads the fields afterwards.

use crag_core::geometry::Rect;
use crag_core::input::{InputState, MouseBtn};
use crag_core::orientation::Direction;
use glam::Vec2;

use crate::editor::{EditorAction, EditorSession};
use crate::level::{LevelDocument, LevelError};
use crate::level_select::{LevelSelect, SelectAction, SelectMode};
use crate::player::{FrameEvent, Player, PlayerInput};
use crate::registry::{Registry, SpawnInfo};
use crate::storage::LevelStore;

/// In-game button that returns to the level list.
pub const BACK_BUTTON: Rect = Rect::new(10.0, 10.0, 100.0, 30.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Game,
    LevelEditor,
    LevelSelect,
    /// Level list opened from the editor to choose a link target.
    LevelSelectEditor,
}

impl Scene {
    pub fn label(self) -> &'static str {
        match self {
            Scene::Game => "Game",
            Scene::LevelEditor => "Level editor",
            Scene::LevelSelect => "Level select",
            Scene::LevelSelectEditor => "Link picker",
        }
    }
}

pub struct GameState {
    pub scene: Scene,
    /// Level being played or edited.
    pub document: LevelDocument,
    /// `None` while playing the sandbox or an unsaved document.
    pub level_name: Option<String>,
    pub registry: Registry,
    pub player: Player,
    pub editor: EditorSession,
    pub level_select: LevelSelect,
    store: Box<dyn LevelStore>,
    /// A click that changed the scene must be released before the next
    /// scene reacts to the mouse.
    click_ready: bool,
}

impl GameState {
    pub fn new(store: Box<dyn LevelStore>) -> Self {
        let level_select = LevelSelect::new(store.as_ref());
        Self {
            scene: Scene::LevelSelect,
            document: LevelDocument::new(),
            level_name: None,
            registry: Registry::empty(),
            player: Player::new(Vec2::ZERO),
            editor: EditorSession::new(),
            level_select,
            store,
            click_ready: false,
        }
    }

    pub fn set_scene(&mut self, scene: Scene) {
        if self.scene != scene {
            log::info!("Scene: {} -> {}", self.scene.label(), scene.label());
        }
        self.scene = scene;
        self.click_ready = false;
        self.level_select.mode = match scene {
            Scene::LevelSelectEditor => SelectMode::LinkPicker,
            _ => SelectMode::Browse,
        };
        if matches!(scene, Scene::LevelSelect | Scene::LevelSelectEditor) {
            if let Err(e) = self.level_select.refresh(self.store.as_ref()) {
                log::error!("Failed to list levels: {e}");
            }
        }
    }

    /// Advances the active scene by one fixed step.
    pub fn step(&mut self, input: &InputState, dt: f32) {
        if !input.is_mouse_held(MouseBtn::Left) {
            self.click_ready = true;
        }

        match self.scene {
            Scene::Game => self.step_game(input, dt),
            Scene::LevelEditor => self.step_editor(input),
            Scene::LevelSelect | Scene::LevelSelectEditor => self.step_select(input),
        }
    }

    fn step_game(&mut self, input: &InputState, dt: f32) {
        if self.click_ready && input.is_mouse_just_pressed(MouseBtn::Left) {
            let (x, y) = input.mouse_xy();
            if BACK_BUTTON.contains_point(x, y) {
                self.set_scene(Scene::LevelSelect);
                return;
            }
        }

        let player_input = PlayerInput::from_state(input);
        match self.player.update(&player_input, &mut self.registry, dt) {
            Some(FrameEvent::SwitchLevel { target }) => self.switch_level(&target),
            Some(FrameEvent::Died) | None => {}
        }
    }

    fn step_editor(&mut self, input: &InputState) {
        self.editor.update_keys(input);
        if !self.click_ready {
            return;
        }
        match self.editor.update_mouse(input, &mut self.document) {
            EditorAction::None => {}
            EditorAction::SaveAndPlay(name) => self.save_and_play(&name),
            EditorAction::OpenLinkPicker => self.set_scene(Scene::LevelSelectEditor),
        }
    }

    fn step_select(&mut self, input: &InputState) {
        self.level_select.poll(self.store.as_ref());
        if !self.click_ready {
            return;
        }
        match self.level_select.update(input) {
            SelectAction::None => {}
            SelectAction::OpenEditor => {
                self.editor.name = self.level_name.clone().unwrap_or_default();
                self.set_scene(Scene::LevelEditor);
            }
            SelectAction::PlaySandbox => self.load_sandbox(),
            SelectAction::Play(name) => {
                if let Err(e) = self.load_level(&name, None) {
                    log::error!("Failed to load level '{name}': {e}");
                }
            }
            SelectAction::Link(name) => {
                self.editor.set_chained(name);
                self.set_scene(Scene::LevelEditor);
            }
            SelectAction::Cancel => self.set_scene(Scene::LevelEditor),
        }
    }

    /// Reads and parses `name` from the store, then starts playing it.
    /// On failure the current scene and level are left untouched.
    pub fn load_level(&mut self, name: &str, from: Option<&str>) -> Result<(), LevelError> {
        let text = self.store.read(name)?;
        let document = LevelDocument::parse(&text)?;
        self.load_document(document, Some(name.to_string()), from);
        Ok(())
    }

    /// Replaces the running level with `document`. `from` names the level
    /// the player arrived from and selects the matching entry point.
    pub fn load_document(&mut self, document: LevelDocument, name: Option<String>, from: Option<&str>) {
        let (registry, spawn) = Registry::rebuild(&document);
        self.registry = registry;
        self.place_player(&spawn, from);
        log::info!(
            "Loaded level '{}' ({} tiles){}",
            name.as_deref().unwrap_or("<unsaved>"),
            document.len(),
            from.map(|f| format!(" from '{f}'")).unwrap_or_default()
        );
        self.document = document;
        self.level_name = name;
        self.set_scene(Scene::Game);
    }

    pub fn load_sandbox(&mut self) {
        let (registry, spawn) = Registry::sandbox();
        self.registry = registry;
        self.place_player(&spawn, None);
        self.level_name = None;
        log::info!("Loaded sandbox course");
        self.set_scene(Scene::Game);
    }

    fn place_player(&mut self, spawn: &SpawnInfo, from: Option<&str>) {
        match spawn.choose_entry(from) {
            Some(entry) => {
                let leftward = entry.orientation.facing() == Direction::Left;
                self.player.enter(entry.position, leftward, spawn.respawn);
            }
            None => self.player.place(spawn.respawn.unwrap_or(Vec2::ZERO)),
        }
    }

    fn save_and_play(&mut self, name: &str) {
        let text = self.document.serialize();
        if let Err(e) = self.store.write(name, &text) {
            log::error!("Failed to save level '{name}': {e}");
            return;
        }
        self.load_document(self.document.clone(), Some(name.to_string()), None);
    }

    fn switch_level(&mut self, target: &str) {
        let from = self.level_name.clone();
        log::info!("Switching to level '{target}'");
        if let Err(e) = self.load_level(target, from.as_deref()) {
            log::error!("Failed to switch to level '{target}': {e}");
            self.set_scene(Scene::LevelSelect);
        }
    }
}
