//! Scripted input sequences for driving the player deterministically.

use crate::player::PlayerInput;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    #[serde(default = "default_dt")]
    pub fixed_dt: f32,
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(flatten)]
    pub input: PlayerInput,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ReplaySequence {
    /// One input per fixed step. Edge-triggered fields only fire on the first
    /// step of a repeated frame.
    pub fn expanded_inputs(&self) -> Vec<PlayerInput> {
        let mut out = Vec::new();
        for frame in &self.frames {
            for i in 0..frame.repeat.max(1) {
                let mut input = frame.input;
                if i > 0 {
                    input.left_released = false;
                    input.right_released = false;
                    input.jump_pressed = false;
                    input.dash_pressed = false;
                    input.climb_released = false;
                }
                out.push(input);
            }
        }
        out
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let replay: ReplaySequence = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse replay JSON {}: {e}", path.display()))?;
    validate_replay(&replay)?;
    Ok(replay)
}

fn validate_replay(replay: &ReplaySequence) -> Result<(), String> {
    if replay.fixed_dt <= 0.0 {
        return Err("Replay validation failed: fixed_dt must be > 0".to_string());
    }
    if replay.frames.is_empty() {
        return Err("Replay validation failed: frames list is empty".to_string());
    }
    Ok(())
}

const fn default_dt() -> f32 {
    1.0 / 60.0
}

const fn default_repeat() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::registry::{Registry, SANDBOX_SPAWN};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "crag_replay_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn replay_file_parses_and_expands() {
        let path = temp_file_path("parse");
        fs::write(
            &path,
            r#"{
              "fixed_dt": 0.016666667,
              "frames": [
                { "right": true, "repeat": 3 },
                { "right": true, "jump_pressed": true, "repeat": 2 }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let expanded = replay.expanded_inputs();
        assert_eq!(expanded.len(), 5);
        assert!(expanded.iter().all(|input| input.right));
        assert!(expanded[3].jump_pressed);
        assert!(!expanded[4].jump_pressed);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn empty_replay_is_rejected() {
        let path = temp_file_path("empty");
        fs::write(&path, r#"{ "frames": [] }"#).expect("write replay file");
        assert!(load_replay_from_path(&path).is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn sandbox_run_is_deterministic() {
        let path = temp_file_path("deterministic");
        fs::write(
            &path,
            r#"{
              "fixed_dt": 0.016666667,
              "frames": [
                { "repeat": 30 },
                { "right": true, "repeat": 40 },
                { "right": true, "jump_pressed": true },
                { "right": true, "repeat": 20 },
                { "right": true, "up": true, "dash_pressed": true },
                { "right": true, "repeat": 60 },
                { "right_released": true },
                { "repeat": 60 }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let inputs = replay.expanded_inputs();

        let run = || {
            let (mut registry, _) = Registry::sandbox();
            let mut player = Player::new(SANDBOX_SPAWN);
            let mut deaths = 0;
            for input in &inputs {
                if player.update(input, &mut registry, replay.fixed_dt).is_some() {
                    deaths += 1;
                }
            }
            (player, deaths)
        };
        let (run_a, deaths_a) = run();
        let (run_b, deaths_b) = run();

        assert_eq!(run_a.rect, run_b.rect);
        assert_eq!(run_a.velocity, run_b.velocity);
        assert_eq!(run_a.dash_charge, run_b.dash_charge);
        assert_eq!(run_a.can_jump, run_b.can_jump);
        assert_eq!(deaths_a, deaths_b);

        let _ = fs::remove_file(path);
    }
}
