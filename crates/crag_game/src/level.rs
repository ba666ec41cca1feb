//! Level document: a sparse grid of typed, oriented tiles and its JSON form.
//!
//! On disk a level is a two-level object, column key -> row key -> cell. Keys
//! are decimal strings (the first editor wrote them with `to_string(float)`,
//! so `"3.000000"` is as valid as `"3"`). A cell is either
//!
//!   - a bare integer type code (the first save format; orientation is `Top`,
//!     and `0` marks a cell that was erased), or
//!   - a record `{ "type", "orientation", "switchName"?, "enteringFrom"? }`.
//!
//! Writes always produce records with integer keys. Reads are strict: one bad
//! key, code or orientation rejects the whole document.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crag_core::geometry::Rect;
use crag_core::orientation::Orientation;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// World units per grid cell.
pub const TILE_SIZE: f32 = 15.0;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level '{name}' not found")]
    NotFound { name: String },
    #[error("corrupt level: {reason}")]
    Corrupt { reason: String },
    #[error("invalid level name '{name}'")]
    InvalidName { name: String },
    #[error("level I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LevelError {
    fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Solid,
    Hazard,
    RespawnPoint,
    SwitchLevel,
    LevelEntry,
    LevelEntrySpawn,
}

impl TileKind {
    /// Editor tool order, matching the persisted codes 1..=6.
    pub const ALL: [TileKind; 6] = [
        TileKind::Solid,
        TileKind::Hazard,
        TileKind::RespawnPoint,
        TileKind::SwitchLevel,
        TileKind::LevelEntry,
        TileKind::LevelEntrySpawn,
    ];

    pub fn code(self) -> u8 {
        match self {
            TileKind::Solid => 1,
            TileKind::Hazard => 2,
            TileKind::RespawnPoint => 3,
            TileKind::SwitchLevel => 4,
            TileKind::LevelEntry => 5,
            TileKind::LevelEntrySpawn => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        TileKind::ALL
            .iter()
            .copied()
            .find(|kind| i64::from(kind.code()) == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            TileKind::Solid => "Solid",
            TileKind::Hazard => "Hazard",
            TileKind::RespawnPoint => "Respawn",
            TileKind::SwitchLevel => "Switch",
            TileKind::LevelEntry => "Entry",
            TileKind::LevelEntrySpawn => "Spawn",
        }
    }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    pub kind: TileKind,
    pub orientation: Orientation,
    /// Level loaded when the player touches a `SwitchLevel` tile.
    pub switch_target: Option<String>,
    /// Level the player must arrive from for this entry point to be used.
    pub entering_from: Option<String>,
}

impl TileDescriptor {
    pub fn new(kind: TileKind, orientation: Orientation) -> Self {
        Self {
            kind,
            orientation,
            switch_target: None,
            entering_from: None,
        }
    }

    pub fn with_switch_target(mut self, target: impl Into<String>) -> Self {
        self.switch_target = non_empty(target.into());
        self
    }

    pub fn with_entering_from(mut self, from: impl Into<String>) -> Self {
        self.entering_from = non_empty(from.into());
        self
    }

    /// An empty level name is stored as no name.
    fn without_empty_names(mut self) -> Self {
        self.switch_target = self.switch_target.and_then(non_empty);
        self.entering_from = self.entering_from.and_then(non_empty);
        self
    }
}

fn non_empty(name: String) -> Option<String> {
    (!name.is_empty()).then_some(name)
}

/// World rectangle covered by grid cell (`col`, `row`).
pub fn cell_rect(col: i32, row: i32) -> Rect {
    Rect::new(
        col as f32 * TILE_SIZE,
        row as f32 * TILE_SIZE,
        TILE_SIZE,
        TILE_SIZE,
    )
}

/// Grid cell containing world point (`x`, `y`). Floors, so negative
/// coordinates land in negative cells.
pub fn cell_at(x: f32, y: f32) -> (i32, i32) {
    (
        (x / TILE_SIZE).floor() as i32,
        (y / TILE_SIZE).floor() as i32,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelDocument {
    cells: BTreeMap<i32, BTreeMap<i32, TileDescriptor>>,
}

impl LevelDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, LevelError> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| LevelError::corrupt(format!("not valid JSON: {e}")))?;
        let columns = match root {
            Value::Object(columns) => columns,
            // An editor that never painted anything wrote `null`.
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(LevelError::corrupt(format!(
                    "expected an object of columns, found {}",
                    json_kind(&other)
                )))
            }
        };

        let mut document = Self::new();
        for (col_key, column) in &columns {
            let col = parse_coordinate(col_key)?;
            let rows = match column {
                Value::Object(rows) => rows,
                Value::Null => continue,
                other => {
                    return Err(LevelError::corrupt(format!(
                        "column '{col_key}' is {}, expected an object",
                        json_kind(other)
                    )))
                }
            };
            for (row_key, cell) in rows {
                let row = parse_coordinate(row_key)?;
                let parsed = parse_cell(cell).map_err(|reason| {
                    LevelError::corrupt(format!("cell ({col_key}, {row_key}): {reason}"))
                })?;
                let Some(descriptor) = parsed else {
                    continue;
                };
                if document.set_cell(col, row, descriptor).is_some() {
                    log::warn!("Duplicate level cell ({col}, {row}); keeping the later entry");
                }
            }
        }

        log::debug!("Parsed level document with {} cells", document.len());
        Ok(document)
    }

    pub fn serialize(&self) -> String {
        let mut columns = Map::new();
        for (col, rows) in &self.cells {
            let mut column = Map::new();
            for (row, tile) in rows {
                column.insert(row.to_string(), Value::Object(cell_record(tile)));
            }
            columns.insert(col.to_string(), Value::Object(column));
        }
        Value::Object(columns).to_string()
    }

    /// Stores `tile` at the cell, returning whatever was there before.
    pub fn set_cell(&mut self, col: i32, row: i32, tile: TileDescriptor) -> Option<TileDescriptor> {
        self.cells
            .entry(col)
            .or_default()
            .insert(row, tile.without_empty_names())
    }

    pub fn erase_cell(&mut self, col: i32, row: i32) -> Option<TileDescriptor> {
        let column = self.cells.get_mut(&col)?;
        let removed = column.remove(&row);
        if column.is_empty() {
            self.cells.remove(&col);
        }
        removed
    }

    pub fn get_cell(&self, col: i32, row: i32) -> Option<&TileDescriptor> {
        self.cells.get(&col)?.get(&row)
    }

    /// Cells in column-major order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, &TileDescriptor)> {
        self.cells
            .iter()
            .flat_map(|(&col, rows)| rows.iter().map(move |(&row, tile)| (col, row, tile)))
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// World rectangle spanning every cell, `None` for an empty document.
    pub fn bounds(&self) -> Option<Rect> {
        self.iter()
            .map(|(col, row, _)| cell_rect(col, row))
            .reduce(|acc, rect| acc.union(&rect))
    }
}

fn cell_record(tile: &TileDescriptor) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("type".into(), Value::from(tile.kind.code()));
    record.insert("orientation".into(), Value::from(tile.orientation.name()));
    if let Some(target) = &tile.switch_target {
        record.insert("switchName".into(), Value::from(target.as_str()));
    }
    if let Some(from) = &tile.entering_from {
        record.insert("enteringFrom".into(), Value::from(from.as_str()));
    }
    record
}

fn parse_coordinate(key: &str) -> Result<i32, LevelError> {
    let value: f64 = key
        .trim()
        .parse()
        .map_err(|_| LevelError::corrupt(format!("grid key '{key}' is not a number")))?;
    if !value.is_finite() || value.abs() > f64::from(i32::MAX) {
        return Err(LevelError::corrupt(format!(
            "grid key '{key}' is out of range"
        )));
    }
    Ok(value.trunc() as i32)
}

/// `Ok(None)` for cells that are present but empty (code 0 or `null`).
fn parse_cell(cell: &Value) -> Result<Option<TileDescriptor>, String> {
    match cell {
        Value::Null => Ok(None),
        Value::Number(_) => {
            let code = cell
                .as_i64()
                .ok_or_else(|| format!("type code {cell} is not an integer"))?;
            kind_from_code(code).map(|kind| kind.map(|k| TileDescriptor::new(k, Orientation::Top)))
        }
        Value::Object(record) => parse_record(record),
        other => Err(format!("unexpected {}", json_kind(other))),
    }
}

fn parse_record(record: &Map<String, Value>) -> Result<Option<TileDescriptor>, String> {
    let code = record
        .get("type")
        .ok_or_else(|| "record has no \"type\"".to_string())?
        .as_i64()
        .ok_or_else(|| "\"type\" is not an integer".to_string())?;
    let Some(kind) = kind_from_code(code)? else {
        return Ok(None);
    };

    let orientation = match record.get("orientation") {
        None | Some(Value::Null) => Orientation::Top,
        Some(value) => Orientation::deserialize(value).map_err(|e| e.to_string())?,
    };

    Ok(Some(TileDescriptor {
        kind,
        orientation,
        switch_target: optional_name(record, "switchName")?,
        entering_from: optional_name(record, "enteringFrom")?,
    }))
}

fn kind_from_code(code: i64) -> Result<Option<TileKind>, String> {
    if code == 0 {
        return Ok(None);
    }
    TileKind::from_code(code)
        .map(Some)
        .ok_or_else(|| format!("unknown tile type {code}"))
}

/// Absent, `null` and empty strings all mean "no name".
fn optional_name(record: &Map<String, Value>, field: &str) -> Result<Option<String>, String> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) if name.is_empty() => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.clone())),
        Some(other) => Err(format!("\"{field}\" is {}, expected a string", json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
