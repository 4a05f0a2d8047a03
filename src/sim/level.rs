/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, sorted by file name)
///   2. Built-in embedded levels
///
/// ## Single-level format (`.txt`):
///   Line 1: `# Level Name`
///   Optional: `@ jetpack` / `@ grapple` (equipment the player starts with)
///   Optional: `! gx,gy,w,h property[=value]` (extra tile region, grid units,
///             bottom-left origin)
///   Lines: map rows, top row first
///
/// ## Tile legend:
///   '#' = Solid                  'X' = Solid, rejects the grapple
///   '^' = Kill                   'G' = Goal
///   '1'..'9' = Checkpoint <id>   ' ' or '.' = Empty
///
/// A checkpoint glyph is also a spawn point: the player stands on the
/// bottom edge of that cell. Checkpoint `1` is where a level starts.
/// `checkpoint` is the only property that needs a value; a region naming
/// it without `=id` gets an empty placeholder and a load warning.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::config::GameConfig;
use crate::domain::entity::PLAYER_WIDTH;
use crate::domain::tile::{prop, LoadWarning, TileGrid, TileGridBuilder, TileRegion, TILE_SIZE};

pub const START_CHECKPOINT: &str = "1";

/// Runtime level data (owned strings, loaded from file or embedded).
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub name: String,
    pub rows: Vec<String>,
    pub regions: Vec<TileRegion>,
    pub jetpack: bool,
    pub grapple: bool,
}

/// A level materialized into a collision grid plus spawn points.
#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub grid: TileGrid,
    /// Checkpoint id → player origin (bottom-left) in world units.
    pub spawn_points: BTreeMap<String, (f64, f64)>,
    pub start: String,
    pub jetpack: bool,
    pub grapple: bool,
    pub warnings: Vec<LoadWarning>,
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level {index} not found ({available} available)")]
    NotFound { index: usize, available: usize },
    #[error("level '{name}' has no map rows")]
    EmptyMap { name: String },
    #[error("level '{name}' has no checkpoint to spawn at")]
    NoSpawn { name: String },
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load and materialize level `index` from the configured sources.
pub fn load_level(config: &GameConfig, index: usize) -> Result<Level, LevelError> {
    let levels = available_levels(config);
    let def = levels.get(index).ok_or(LevelError::NotFound {
        index,
        available: levels.len(),
    })?;
    let level = build_level(def)?;
    tracing::info!(
        index,
        name = %level.name,
        cols = level.grid.cols(),
        rows = level.grid.rows(),
        warnings = level.warnings.len(),
        "level loaded"
    );
    Ok(level)
}

/// All levels from the levels directory, or the embedded set if it has none.
pub fn available_levels(config: &GameConfig) -> Vec<LevelDef> {
    let mut found = load_from_directory(&config.levels_dir);
    if found.is_empty() {
        tracing::debug!(dir = %config.levels_dir.display(), "no level files, using embedded levels");
        return embedded_levels();
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.into_iter().map(|(_, def)| def).collect()
}

pub fn level_count(config: &GameConfig) -> usize {
    available_levels(config).len()
}

/// Turn a parsed definition into a grid. Bad regions and unknown glyphs
/// are reported through `Level::warnings`; only a missing map or a level
/// with nowhere to spawn is an error.
pub fn build_level(def: &LevelDef) -> Result<Level, LevelError> {
    let rows = def.rows.len();
    let cols = def.rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    if rows == 0 || cols == 0 {
        return Err(LevelError::EmptyMap { name: def.name.clone() });
    }

    let mut builder = TileGridBuilder::new(cols as f64 * TILE_SIZE, rows as f64 * TILE_SIZE);
    let mut spawn_points = BTreeMap::new();

    for (row_idx, row) in def.rows.iter().enumerate() {
        let gy = rows - 1 - row_idx;
        for (gx, ch) in row.chars().enumerate() {
            match ch {
                ' ' | '.' => {}
                '#' => { builder.mark(gx, gy, prop::SOLID, ""); }
                'X' => {
                    builder.mark(gx, gy, prop::SOLID, "");
                    builder.mark(gx, gy, prop::NO_GRAPPLE, "");
                }
                '^' => { builder.mark(gx, gy, prop::KILL, ""); }
                'G' => { builder.mark(gx, gy, prop::GOAL, ""); }
                d if d.is_ascii_digit() && d != '0' => {
                    let id = d.to_string();
                    builder.mark(gx, gy, prop::CHECKPOINT, &id);
                    let origin = (
                        gx as f64 * TILE_SIZE + (TILE_SIZE - PLAYER_WIDTH) / 2.0,
                        gy as f64 * TILE_SIZE,
                    );
                    spawn_points.entry(id).or_insert(origin);
                }
                other => builder.warn(LoadWarning::UnknownGlyph {
                    glyph: other,
                    gx: gx as i64,
                    gy: gy as i64,
                }),
            }
        }
    }

    for region in &def.regions {
        builder.apply_region(region);
    }

    let start = if spawn_points.contains_key(START_CHECKPOINT) {
        START_CHECKPOINT.to_string()
    } else {
        match spawn_points.keys().next() {
            Some(first) => {
                tracing::warn!(level = %def.name, start = %first, "no checkpoint 1, starting at lowest id");
                first.clone()
            }
            None => return Err(LevelError::NoSpawn { name: def.name.clone() }),
        }
    };

    let (grid, warnings) = builder.build();
    Ok(Level {
        name: def.name.clone(),
        grid,
        spawn_points,
        start,
        jetpack: def.jetpack,
        grapple: def.grapple,
        warnings,
    })
}

// ══════════════════════════════════════════════════════════════
// Single-level file parsing
// ══════════════════════════════════════════════════════════════

/// Parse a single level from text content.
pub fn parse_level_file(content: &str) -> Option<LevelDef> {
    let mut name = String::new();
    let mut rows = vec![];
    let mut regions = vec![];
    let mut jetpack = false;
    let mut grapple = false;

    for line in content.lines() {
        if line.starts_with('#') && name.is_empty() && is_name_line(line) {
            name = line[1..].trim().to_string();
        } else if let Some(rest) = line.strip_prefix("@ ") {
            for item in rest.split_whitespace() {
                match item {
                    "jetpack" => jetpack = true,
                    "grapple" => grapple = true,
                    other => tracing::warn!(item = other, "unknown equipment in level header"),
                }
            }
        } else if let Some(rest) = line.strip_prefix("! ") {
            match parse_region(rest) {
                Some(region) => regions.push(region),
                None => tracing::warn!(line, "malformed region line, skipped"),
            }
        } else {
            rows.push(line.to_string());
        }
    }

    while rows.first().is_some_and(|r| r.trim().is_empty()) {
        rows.remove(0);
    }
    while rows.last().is_some_and(|r| r.trim().is_empty()) {
        rows.pop();
    }

    if rows.is_empty() {
        return None;
    }

    if name.is_empty() {
        name = "Unnamed Level".to_string();
    }

    Some(LevelDef { name, rows, regions, jetpack, grapple })
}

/// Distinguish `# Level Name` from `#######` (level data).
/// A name line starts with `#` and contains at least one letter.
fn is_name_line(line: &str) -> bool {
    line[1..].chars().any(|c| c.is_alphabetic())
}

/// `gx,gy,w,h [property[=value]]`
fn parse_region(text: &str) -> Option<TileRegion> {
    let mut parts = text.split_whitespace();
    let coords: Vec<i64> = parts
        .next()?
        .split(',')
        .map(|n| n.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let &[gx, gy, w, h] = coords.as_slice() else { return None };

    let (property, value) = match parts.next() {
        None => (None, None),
        Some(spec) => match spec.split_once('=') {
            Some((p, v)) => (Some(p.to_string()), Some(v.to_string())),
            None if spec == prop::CHECKPOINT => (Some(spec.to_string()), None),
            None => (Some(spec.to_string()), Some(String::new())),
        },
    };
    Some(TileRegion { gx, gy, w, h, property, value })
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<(String, LevelDef)> {
    let mut results = vec![];

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return results,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.extension().is_some_and(|e| e == "txt") {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                if let Some(def) = parse_level_file(&content) {
                    let filename = path.file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string();
                    results.push((filename, def));
                } else {
                    tracing::warn!(path = %path.display(), "level file has no map rows");
                }
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot read level file"),
        }
    }

    results
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

fn embedded_levels() -> Vec<LevelDef> {
    vec![
        make_embedded("Level 1 - Boot Sequence", true, false, &[
            "################################################",
            "#                                              #",
            "#                                              #",
            "#                                              #",
            "#                                   ########   #",
            "#                                          #  G#",
            "#                         ######           #  G#",
            "#                                          #   #",
            "#                                          #   #",
            "#                ######                    ##  #",
            "#                                              #",
            "#                                              #",
            "#        ###                2                  #",
            "#                       #########              #",
            "#  1                                    ###    #",
            "##########     ########^^^^^^^^^^^##############",
            "##########^^^^^########################XXXXXXXXX",
        ]),
        make_embedded("Level 2 - Cable Run", true, true, &[
            "############################################################",
            "#         XXXX          ###########           ###########  #",
            "#                                                          #",
            "#                                                          #",
            "#                                                          #",
            "#                                                          #",
            "#                                                          #",
            "#                                                       G  #",
            "#                                                     #### #",
            "#                        3                                 #",
            "#                      #####                               #",
            "#  1                                    2                  #",
            "#######                              #######               #",
            "#######^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^#######^^^^^^^^^^^^^^^#",
            "############################################################",
        ]),
    ]
}

fn make_embedded(name: &str, jetpack: bool, grapple: bool, map: &[&str]) -> LevelDef {
    LevelDef {
        name: name.to_string(),
        rows: map.iter().map(|s| s.to_string()).collect(),
        regions: vec![],
        jetpack,
        grapple,
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Test Level
@ grapple
! 0,0,2,1 kill
! 4,1,1,1 checkpoint
! 9,9,1,1 goal
########

 1    2
########
";

    #[test]
    fn parses_header_and_rows() {
        let def = parse_level_file(SAMPLE).unwrap();
        assert_eq!(def.name, "Test Level");
        assert!(def.grapple && !def.jetpack);
        assert_eq!(def.rows.len(), 4);
        assert_eq!(def.regions.len(), 3);
        assert_eq!(def.regions[0].property.as_deref(), Some("kill"));
        assert_eq!(def.regions[0].value.as_deref(), Some(""));
        assert_eq!(def.regions[1].value, None);
    }

    #[test]
    fn builds_grid_with_spawns_and_warnings() {
        let level = build_level(&parse_level_file(SAMPLE).unwrap()).unwrap();
        assert_eq!(level.grid.cols(), 8);
        assert_eq!(level.grid.rows(), 4);
        assert_eq!(level.start, "1");
        // Bottom map row is solid, the region adds kill to the first two cells
        let t = level.grid.tile(0, 0).unwrap();
        assert!(t.is_solid() && t.has_property(prop::KILL));
        assert_eq!(level.spawn_points["1"], (32.0 + 1.0, 32.0));
        assert_eq!(level.spawn_points["2"], (6.0 * 32.0 + 1.0, 32.0));
        assert!(level.warnings.contains(&LoadWarning::MissingValue {
            property: "checkpoint".into(),
            gx: 4,
            gy: 1,
        }));
        assert!(level.warnings.contains(&LoadWarning::RegionOutOfBounds { gx: 9, gy: 9 }));
        // Placeholder value recorded on the cell
        assert_eq!(level.grid.tile(4, 1).unwrap().property(prop::CHECKPOINT), Some(""));
    }

    #[test]
    fn unknown_glyph_warns_and_stays_empty() {
        let def = parse_level_file("# Odd\n1 ?\n###\n").unwrap();
        let level = build_level(&def).unwrap();
        assert_eq!(level.warnings, vec![LoadWarning::UnknownGlyph { glyph: '?', gx: 2, gy: 1 }]);
        assert!(level.grid.tile(2, 1).unwrap().is_empty());
    }

    #[test]
    fn falls_back_to_lowest_checkpoint() {
        let def = parse_level_file("# No One\n3  2\n####\n").unwrap();
        let level = build_level(&def).unwrap();
        assert_eq!(level.start, "2");
    }

    #[test]
    fn level_without_spawn_is_an_error() {
        let def = parse_level_file("# Nowhere\n    \n####\n").unwrap();
        assert!(matches!(build_level(&def), Err(LevelError::NoSpawn { .. })));
    }

    #[test]
    fn empty_file_is_not_a_level() {
        assert!(parse_level_file("# Only A Name\n\n").is_none());
    }

    #[test]
    fn malformed_region_skipped() {
        let def = parse_level_file("# R\n! 1,2,x,4 kill\n! 1,2 kill\n1\n#\n").unwrap();
        assert!(def.regions.is_empty());
    }

    #[test]
    fn directory_levels_sorted_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "# Second\n1\n#\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "# First\n1\n#\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# Ignored\n1\n#\n").unwrap();
        let mut config = GameConfig::load_from(&[]);
        config.levels_dir = dir.path().to_path_buf();
        let names: Vec<String> = available_levels(&config).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(load_level(&config, 1).unwrap().name, "Second");
        assert!(matches!(
            load_level(&config, 5),
            Err(LevelError::NotFound { index: 5, available: 2 })
        ));
    }

    #[test]
    fn embedded_levels_all_build() {
        for def in embedded_levels() {
            let level = build_level(&def).unwrap();
            assert!(level.warnings.is_empty(), "{}: {:?}", level.name, level.warnings);
            assert_eq!(level.start, START_CHECKPOINT);
        }
    }

    #[test]
    fn missing_directory_uses_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GameConfig::load_from(&[]);
        config.levels_dir = dir.path().join("nope");
        assert_eq!(level_count(&config), embedded_levels().len());
    }
}
