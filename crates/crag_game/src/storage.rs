//! Named level storage.
//!
//! Levels live in a saves directory as `<name>.txt`. Writes go to a sibling
//! temp file first and are renamed into place, so a crash mid-save never
//! leaves a truncated level behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::level::LevelError;

pub const SAVES_DIR: &str = "saves";
const LEVEL_EXTENSION: &str = "txt";

pub trait LevelStore {
    /// Stored level names, sorted.
    fn list(&self) -> Result<Vec<String>, LevelError>;
    fn read(&self, name: &str) -> Result<String, LevelError>;
    fn write(&mut self, name: &str, text: &str) -> Result<(), LevelError>;

    /// Directory whose mtime changes when levels are added or removed.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

/// Rejects names that would escape the saves directory or produce no file name.
pub fn validate_name(name: &str) -> Result<(), LevelError> {
    let bad = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name.contains("..")
        || name.chars().any(char::is_control);
    if bad {
        return Err(LevelError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub struct DirLevelStore {
    root: PathBuf,
}

impl DirLevelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, LevelError> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{LEVEL_EXTENSION}")))
    }
}

impl LevelStore for DirLevelStore {
    fn list(&self) -> Result<Vec<String>, LevelError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LevelError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LevelError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(LEVEL_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, LevelError> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(LevelError::NotFound {
                name: name.to_string(),
            }),
            Err(source) => Err(LevelError::Io { path, source }),
        }
    }

    fn write(&mut self, name: &str, text: &str) -> Result<(), LevelError> {
        let path = self.path_for(name)?;
        write_text_atomic(&path, text).map_err(|source| LevelError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("Saved level '{}' to {}", name, path.display());
        Ok(())
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("level");
    // A `.tmp` suffix keeps half-written files out of `list()`.
    path.with_file_name(format!("{file_name}.tmp"))
}

/// Polls a file or directory mtime so the level list can refresh when saves
/// appear or disappear.
pub struct SavesWatcher {
    path: PathBuf,
    last_seen_modified: Option<SystemTime>,
}

impl SavesWatcher {
    pub fn new(path: PathBuf) -> Self {
        let last_seen_modified = modified_time(&path);
        Self {
            path,
            last_seen_modified,
        }
    }

    pub fn should_reload(&mut self) -> bool {
        let current = modified_time(&self.path);
        match (self.last_seen_modified, current) {
            (Some(old), Some(now)) if now > old => {
                self.last_seen_modified = Some(now);
                true
            }
            (None, Some(now)) => {
                self.last_seen_modified = Some(now);
                true
            }
            _ => false,
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryLevelStore {
    levels: std::collections::BTreeMap<String, String>,
}

#[cfg(test)]
impl LevelStore for MemoryLevelStore {
    fn list(&self) -> Result<Vec<String>, LevelError> {
        Ok(self.levels.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> Result<String, LevelError> {
        self.levels
            .get(name)
            .cloned()
            .ok_or_else(|| LevelError::NotFound {
                name: name.to_string(),
            })
    }

    fn write(&mut self, name: &str, text: &str) -> Result<(), LevelError> {
        validate_name(name)?;
        self.levels.insert(name.to_string(), text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn temp_dir_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "crag_saves_test_{}_{}_{}",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn write_read_list_round_trip() {
        let dir = temp_dir_path("round_trip");
        let mut store = DirLevelStore::new(&dir);
        assert!(store.list().expect("missing dir lists as empty").is_empty());

        store.write("beta", r#"{"0":{"0":1}}"#).expect("write beta");
        store.write("alpha", "{}").expect("write alpha");
        fs::write(dir.join("notes.md"), "ignored").expect("write stray file");

        assert_eq!(store.list().expect("list"), vec!["alpha", "beta"]);
        assert_eq!(store.read("beta").expect("read beta"), r#"{"0":{"0":1}}"#);
        assert!(!dir.join("beta.txt.tmp").exists());

        store.write("beta", "{}").expect("overwrite beta");
        assert_eq!(store.read("beta").expect("read beta"), "{}");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_level_is_not_found() {
        let dir = temp_dir_path("missing");
        let store = DirLevelStore::new(&dir);
        match store.read("nowhere") {
            Err(LevelError::NotFound { name }) => assert_eq!(name, "nowhere"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let dir = temp_dir_path("names");
        let mut store = DirLevelStore::new(&dir);
        for name in ["", "   ", "../escape", "a/b", "a\\b", ".."] {
            assert!(
                matches!(store.write(name, "{}"), Err(LevelError::InvalidName { .. })),
                "name {name:?} should be rejected"
            );
        }
        assert!(validate_name("level 1!").is_ok());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn watcher_fires_once_when_saves_dir_appears() {
        let dir = temp_dir_path("watcher");
        let mut watcher = SavesWatcher::new(dir.clone());
        assert!(!watcher.should_reload(), "missing dir should not reload");

        fs::create_dir_all(&dir).expect("create saves dir");
        assert!(watcher.should_reload(), "creating dir should trigger reload");
        assert!(!watcher.should_reload(), "no change, no reload");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn memory_store_behaves_like_dir_store() {
        let mut store = MemoryLevelStore::default();
        store.write("one", "{}").expect("write");
        assert_eq!(store.list().expect("list"), vec!["one"]);
        assert!(matches!(
            store.read("two"),
            Err(LevelError::NotFound { .. })
        ));
        assert!(store.write("../x", "{}").is_err());
    }
}
