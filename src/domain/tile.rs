/// Tiles and the static collision grid.
///
/// A tile is one 32×32 cell carrying zero or more named properties
/// (`solid`, `kill`, `checkpoint=<id>`, `goal`, `nograpple`, or anything a
/// level author invents). Semantics are queried via methods so the meaning
/// of each property name lives here.
///
/// The grid is built once through `TileGridBuilder` and is read-only after
/// that: `TileGrid` exposes no mutation.
///
/// ## Query rules
///
/// - `point_query` answers `None` for any point outside `[0,width)×[0,height)`.
/// - `rect_query` floors the rectangle's edges to grid indices and walks the
///   inclusive range. Right/top edges are pulled in by `EDGE_EPSILON` first,
///   so a rectangle flush against a cell boundary does not pick up the
///   neighbouring cell. Indices outside the grid are skipped.

use std::collections::BTreeMap;

use thiserror::Error;

use super::rect::Rect;

pub const TILE_SIZE: f64 = 32.0;
pub const EDGE_EPSILON: f64 = 0.0001;

pub mod prop {
    pub const SOLID: &str = "solid";
    pub const KILL: &str = "kill";
    pub const CHECKPOINT: &str = "checkpoint";
    pub const GOAL: &str = "goal";
    pub const NO_GRAPPLE: &str = "nograpple";
}

/// Property name → value. Ordered so flushed contact sets are deterministic.
pub type PropertyMap = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub gx: usize,
    pub gy: usize,
    properties: PropertyMap,
}

impl Tile {
    fn new(gx: usize, gy: usize) -> Self {
        Tile { gx, gy, properties: PropertyMap::new() }
    }

    /// World rectangle covered by this cell.
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.gx as f64 * TILE_SIZE,
            self.gy as f64 * TILE_SIZE,
            TILE_SIZE,
            TILE_SIZE,
        )
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Blocks rectangle movement.
    pub fn is_solid(&self) -> bool {
        self.has_property(prop::SOLID)
    }

    /// A grapple tip touching this tile is refused.
    pub fn rejects_grapple(&self) -> bool {
        self.has_property(prop::NO_GRAPPLE) || self.has_property(prop::KILL)
    }

    /// Nothing to report: no properties at all.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Non-fatal problems found while materializing a grid.
/// The load continues; the offending data is skipped or given a placeholder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadWarning {
    #[error("region at grid ({gx}, {gy}) lies outside the level bounds")]
    RegionOutOfBounds { gx: i64, gy: i64 },
    #[error("region at grid ({gx}, {gy}) has no property name")]
    MissingProperty { gx: i64, gy: i64 },
    #[error("property '{property}' at grid ({gx}, {gy}) has no value; using empty placeholder")]
    MissingValue { property: String, gx: i64, gy: i64 },
    #[error("unknown map glyph '{glyph}' at grid ({gx}, {gy})")]
    UnknownGlyph { glyph: char, gx: i64, gy: i64 },
}

/// A rectangular run of cells sharing one property, in grid units.
/// This is the loader-facing shape of level collision data.
#[derive(Clone, Debug, PartialEq)]
pub struct TileRegion {
    pub gx: i64,
    pub gy: i64,
    pub w: i64,
    pub h: i64,
    pub property: Option<String>,
    pub value: Option<String>,
}

/// Write-once construction of a `TileGrid`.
pub struct TileGridBuilder {
    grid: TileGrid,
    warnings: Vec<LoadWarning>,
}

impl TileGridBuilder {
    /// `width`/`height` are the level extent in world units.
    pub fn new(width: f64, height: f64) -> Self {
        let width = width.max(0.0);
        let height = height.max(0.0);
        let cols = (width / TILE_SIZE).ceil() as usize;
        let rows = (height / TILE_SIZE).ceil() as usize;
        let mut tiles = Vec::with_capacity(cols * rows);
        for gy in 0..rows {
            for gx in 0..cols {
                tiles.push(Tile::new(gx, gy));
            }
        }
        TileGridBuilder {
            grid: TileGrid { width, height, cols, rows, tiles },
            warnings: Vec::new(),
        }
    }

    /// Tag one cell. Returns false (and records nothing) if out of range.
    pub fn mark(&mut self, gx: usize, gy: usize, property: &str, value: &str) -> bool {
        if property.is_empty() {
            return false;
        }
        match self.grid.index(gx as i64, gy as i64) {
            Some(i) => {
                self.grid.tiles[i]
                    .properties
                    .insert(property.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    /// Apply a rectangular region. Missing property names skip the region,
    /// missing values get an empty placeholder; both are recorded.
    pub fn apply_region(&mut self, region: &TileRegion) {
        let TileRegion { gx, gy, w, h, .. } = *region;
        if gx < 0 || gy < 0 || gx >= self.grid.cols as i64 || gy >= self.grid.rows as i64 {
            tracing::warn!(gx, gy, "tile region out of bounds, skipped");
            self.warnings.push(LoadWarning::RegionOutOfBounds { gx, gy });
            return;
        }
        let property = match region.property.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => {
                tracing::warn!(gx, gy, "tile region missing property name");
                self.warnings.push(LoadWarning::MissingProperty { gx, gy });
                return;
            }
        };
        let value = match region.value.as_deref() {
            Some(v) => v.to_string(),
            None => {
                tracing::warn!(gx, gy, property = %property, "tile property missing value");
                self.warnings.push(LoadWarning::MissingValue {
                    property: property.clone(),
                    gx,
                    gy,
                });
                String::new()
            }
        };
        // Clipped to the grid before iterating: widths come from the file.
        let x_end = gx.saturating_add(w.max(0)).min(self.grid.cols as i64);
        let y_end = gy.saturating_add(h.max(0)).min(self.grid.rows as i64);
        for tx in gx..x_end {
            for ty in gy..y_end {
                self.mark(tx as usize, ty as usize, &property, &value);
            }
        }
    }

    pub fn warn(&mut self, warning: LoadWarning) {
        tracing::warn!(%warning, "level load warning");
        self.warnings.push(warning);
    }

    pub fn build(self) -> (TileGrid, Vec<LoadWarning>) {
        (self.grid, self.warnings)
    }
}

/// Immutable 2D array of tiles covering the level bounds.
#[derive(Clone, Debug)]
pub struct TileGrid {
    width: f64,
    height: f64,
    cols: usize,
    rows: usize,
    /// Row-major, `gy * cols + gx`.
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn width(&self) -> f64 { self.width }
    pub fn height(&self) -> f64 { self.height }
    pub fn cols(&self) -> usize { self.cols }
    pub fn rows(&self) -> usize { self.rows }

    #[inline]
    fn index(&self, gx: i64, gy: i64) -> Option<usize> {
        if gx < 0 || gy < 0 || gx >= self.cols as i64 || gy >= self.rows as i64 {
            return None;
        }
        Some(gy as usize * self.cols + gx as usize)
    }

    /// Tile at grid coordinates, `None` outside the allocated range.
    pub fn tile(&self, gx: i64, gy: i64) -> Option<&Tile> {
        self.index(gx, gy).map(|i| &self.tiles[i])
    }

    /// The tile whose cell contains the point.
    pub fn point_query(&self, x: f64, y: f64) -> Option<&Tile> {
        if !(x >= 0.0 && x < self.width && y >= 0.0 && y < self.height) {
            return None;
        }
        let gx = (x / TILE_SIZE).floor() as i64;
        let gy = (y / TILE_SIZE).floor() as i64;
        self.tile(gx, gy)
    }

    /// Every tile whose cell intersects the rectangle.
    pub fn rect_query(&self, rect: &Rect) -> Vec<&Tile> {
        let gx1 = (rect.left() / TILE_SIZE).floor() as i64;
        let gx2 = ((rect.right() - EDGE_EPSILON) / TILE_SIZE).floor() as i64;
        let gy1 = (rect.bottom() / TILE_SIZE).floor() as i64;
        let gy2 = ((rect.top() - EDGE_EPSILON) / TILE_SIZE).floor() as i64;

        let mut out = Vec::new();
        for gx in gx1..=gx2 {
            for gy in gy1..=gy2 {
                if let Some(tile) = self.tile(gx, gy) {
                    out.push(tile);
                }
            }
        }
        out
    }

    #[cfg(test)]
    pub fn tiles_with(&self, name: &str) -> impl Iterator<Item = &Tile> + '_ {
        let name = name.to_string();
        self.tiles.iter().filter(move |t| t.has_property(&name))
    }
}

/// Test helper: build a grid from ASCII rows, top row first.
/// `#` solid, `X` solid+nograpple, `^` kill, `G` goal, digits checkpoint.
#[cfg(test)]
pub fn grid_from(rows: &[&str]) -> TileGrid {
    let h = rows.len();
    let w = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut b = TileGridBuilder::new(w as f64 * TILE_SIZE, h as f64 * TILE_SIZE);
    for (row_idx, row) in rows.iter().enumerate() {
        let gy = h - 1 - row_idx;
        for (gx, ch) in row.chars().enumerate() {
            match ch {
                '#' => { b.mark(gx, gy, prop::SOLID, ""); }
                'X' => {
                    b.mark(gx, gy, prop::SOLID, "");
                    b.mark(gx, gy, prop::NO_GRAPPLE, "");
                }
                '^' => { b.mark(gx, gy, prop::KILL, ""); }
                'G' => { b.mark(gx, gy, prop::GOAL, ""); }
                d if d.is_ascii_digit() => {
                    b.mark(gx, gy, prop::CHECKPOINT, &d.to_string());
                }
                _ => {}
            }
        }
    }
    b.build().0
}
