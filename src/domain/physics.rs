/// Collision resolution against the tile grid.
///
/// ## Axis-separated resolution
///
/// Movement is resolved one axis at a time:
///   1. integrate X, requery tiles at the new rectangle, push out on X
///   2. integrate Y, requery tiles at the post-X rectangle, push out on Y
///
/// ## Push selection
///
/// `resolve_axis` looks only at `solid` tiles. For each it computes the
/// offset that would make the actor flush with that tile's leading edge,
/// and keeps the one with the largest magnitude: a multi-tile overlap
/// resolves to the most restrictive correction.
///
/// ## Contact properties
///
/// Every pass merges the properties of all touched tiles (solid or not) into
/// the body's contact map. Non-blocking tags like `kill` or `goal` are seen
/// this way. The owner flushes the map once after both passes.

use super::rect::Rect;
use super::tile::{PropertyMap, Tile, TileGrid, EDGE_EPSILON};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    X,
    Y,
}

/// Offset that makes `actor` flush with the deepest solid tile it overlaps
/// on the leading side given by `velocity_sign`. 0 when nothing applies.
pub fn resolve_axis(actor: &Rect, velocity_sign: f64, tiles: &[&Tile], axis: Axis) -> f64 {
    let mut push = 0.0_f64;
    for tile in tiles.iter().filter(|t| t.is_solid()) {
        let t = tile.rect();
        let diff = match axis {
            Axis::X if velocity_sign > 0.0 => t.left() - actor.right() - EDGE_EPSILON,
            Axis::X if velocity_sign < 0.0 => t.right() - actor.left(),
            Axis::Y if velocity_sign > 0.0 => t.bottom() - actor.top() - EDGE_EPSILON,
            Axis::Y if velocity_sign < 0.0 => t.top() - actor.bottom(),
            _ => 0.0,
        };
        if diff.abs() > push.abs() {
            push = diff;
        }
    }
    push
}

/// Physics state shared by every actor: AABB, velocity, gravity.
#[derive(Clone, Debug)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub vx: f64,
    pub vy: f64,
    pub gravity: f64,
    pub terminal_velocity: f64,
    /// Accumulated during the current tick's resolution; see `flush_contacts`.
    contacts: PropertyMap,
}

impl Body {
    pub fn new(x: f64, y: f64, w: f64, h: f64, gravity: f64, terminal_velocity: f64) -> Self {
        Body {
            x, y, w, h,
            vx: 0.0,
            vy: 0.0,
            gravity,
            terminal_velocity,
            contacts: PropertyMap::new(),
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    #[inline]
    pub fn center_x(&self) -> f64 { self.x + self.w / 2.0 }
    #[inline]
    pub fn center_y(&self) -> f64 { self.y + self.h / 2.0 }
    #[inline]
    pub fn top(&self) -> f64 { self.y + self.h }

    /// v -= g·dt
    #[inline]
    pub fn apply_gravity(&mut self, interval: f64) {
        self.vy -= self.gravity * interval;
    }

    /// Clamp both velocity components to ±terminal velocity.
    pub fn clamp_velocity(&mut self) {
        let t = self.terminal_velocity;
        self.vx = self.vx.clamp(-t, t);
        self.vy = self.vy.clamp(-t, t);
    }

    /// Merge tile properties into the contact map. Later values overwrite.
    pub fn record_contacts(&mut self, tiles: &[&Tile]) {
        for tile in tiles {
            for (name, value) in tile.properties() {
                self.contacts.insert(name.clone(), value.clone());
            }
        }
    }

    /// Hand over this tick's contacts and start a fresh map.
    pub fn flush_contacts(&mut self) -> PropertyMap {
        std::mem::take(&mut self.contacts)
    }

    /// Integrate one axis, requery the grid, record contacts and push out.
    /// On a non-zero push the velocity on that axis is zeroed.
    /// Returns the push that was applied.
    pub fn move_axis(&mut self, grid: &TileGrid, axis: Axis, interval: f64) -> f64 {
        let velocity = match axis {
            Axis::X => {
                self.x += self.vx * interval;
                self.vx
            }
            Axis::Y => {
                self.y += self.vy * interval;
                self.vy
            }
        };
        let tiles = grid.rect_query(&self.rect());
        self.record_contacts(&tiles);
        let push = resolve_axis(&self.rect(), velocity, &tiles, axis);
        if push != 0.0 {
            match axis {
                Axis::X => {
                    self.x += push;
                    self.vx = 0.0;
                }
                Axis::Y => {
                    self.y += push;
                    self.vy = 0.0;
                }
            }
        }
        push
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{grid_from, prop, TILE_SIZE};

    fn body_at(x: f64, y: f64, w: f64, h: f64) -> Body {
        Body::new(x, y, w, h, 0.0019, 1.0)
    }

    // ── resolve_axis ──

    #[test]
    fn non_solid_overlap_gives_no_push() {
        let g = grid_from(&["^G1"]);
        let tiles = g.rect_query(&Rect::new(0.0, 0.0, 96.0, 32.0));
        assert_eq!(tiles.len(), 3);
        let actor = Rect::new(10.0, 5.0, 60.0, 20.0);
        assert_eq!(resolve_axis(&actor, 1.0, &tiles, Axis::X), 0.0);
        assert_eq!(resolve_axis(&actor, -1.0, &tiles, Axis::Y), 0.0);
    }

    #[test]
    fn solid_push_right_is_flush_minus_epsilon() {
        let g = grid_from(&[".#"]);
        let tile = g.tile(1, 0).unwrap();
        let actor = Rect::new(10.0, 0.0, 30.0, 30.0); // right = 40, tile.left = 32
        let push = resolve_axis(&actor, 1.0, &[tile], Axis::X);
        assert!((push - (32.0 - 40.0 - EDGE_EPSILON)).abs() < 1e-12);
    }

    #[test]
    fn solid_push_left_is_exactly_flush() {
        let g = grid_from(&["#."]);
        let tile = g.tile(0, 0).unwrap();
        let actor = Rect::new(28.0, 0.0, 30.0, 30.0);
        assert_eq!(resolve_axis(&actor, -1.0, &[tile], Axis::X), 4.0);
    }

    #[test]
    fn solid_push_down_and_up() {
        let g = grid_from(&["#", ".", "#"]);
        let floor = g.tile(0, 0).unwrap();
        let ceiling = g.tile(0, 2).unwrap();
        let falling = Rect::new(0.0, 30.0, 30.0, 30.0);
        assert_eq!(resolve_axis(&falling, -1.0, &[floor], Axis::Y), 2.0);
        let rising = Rect::new(0.0, 40.0, 30.0, 30.0); // top = 70, ceiling bottom = 64
        let push = resolve_axis(&rising, 1.0, &[ceiling], Axis::Y);
        assert!((push - (64.0 - 70.0 - EDGE_EPSILON)).abs() < 1e-12);
    }

    #[test]
    fn deepest_overlap_wins() {
        let g = grid_from(&["##"]);
        let a = g.tile(0, 0).unwrap();
        let b = g.tile(1, 0).unwrap();
        // a.right(32) - 20 = 12, b.right(64) - 20 = 44
        let actor = Rect::new(20.0, 0.0, 30.0, 30.0);
        let push = resolve_axis(&actor, -1.0, &[a, b], Axis::X);
        assert_eq!(push, 44.0);
    }

    #[test]
    fn zero_velocity_gives_no_push() {
        let g = grid_from(&["#"]);
        let tile = g.tile(0, 0).unwrap();
        let actor = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(resolve_axis(&actor, 0.0, &[tile], Axis::X), 0.0);
    }

    // ── Body::move_axis ──

    #[test]
    fn moving_right_into_wall_scenario() {
        // Actor's right edge 16 units from the wall, vx=0.42, 40 ms
        let g = grid_from(&["...#"]);
        let wall_left = 3.0 * TILE_SIZE;
        let mut b = body_at(wall_left - 16.0 - 30.0, 0.0, 30.0, 30.0);
        b.vx = 0.42;
        let before_right = b.x + b.w;
        let push = b.move_axis(&g, Axis::X, 40.0);
        // Penetration 0.42*40 - 16 = 0.8
        let moved_right = before_right + 16.8;
        assert!((push - (wall_left - moved_right - EDGE_EPSILON)).abs() < 1e-9);
        assert!((b.x + b.w - (wall_left - EDGE_EPSILON)).abs() < 1e-9);
        assert_eq!(b.vx, 0.0);
    }

    #[test]
    fn resolve_twice_is_idempotent() {
        let g = grid_from(&["..#"]);
        let mut b = body_at(30.0, 0.0, 30.0, 30.0);
        b.vx = 0.5;
        assert!(b.move_axis(&g, Axis::X, 20.0) != 0.0);
        // No velocity between calls; requery at the flush position
        let tiles = g.rect_query(&b.rect());
        assert_eq!(resolve_axis(&b.rect(), 1.0, &tiles, Axis::X), 0.0);
        assert_eq!(b.move_axis(&g, Axis::X, 20.0), 0.0);
    }

    #[test]
    fn landing_on_floor() {
        let g = grid_from(&[".", "#"]);
        let mut b = body_at(0.0, 32.0, 30.0, 30.0);
        b.apply_gravity(16.0);
        let push = b.move_axis(&g, Axis::Y, 16.0);
        assert!(push > 0.0);
        assert_eq!(b.y, 32.0);
        assert_eq!(b.vy, 0.0);
    }

    #[test]
    fn contacts_include_non_solid_tags() {
        let g = grid_from(&[".^."]);
        let mut b = body_at(20.0, 0.0, 30.0, 30.0);
        b.vx = 0.1;
        let push = b.move_axis(&g, Axis::X, 10.0);
        assert_eq!(push, 0.0);
        let contacts = b.flush_contacts();
        assert!(contacts.contains_key(prop::KILL));
        assert!(b.flush_contacts().is_empty());
    }

    #[test]
    fn contacts_overwrite_duplicates() {
        let g = grid_from(&["12"]);
        let mut b = body_at(10.0, 0.0, 40.0, 30.0);
        let tiles = g.rect_query(&b.rect());
        b.record_contacts(&tiles);
        let contacts = b.flush_contacts();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts.get(prop::CHECKPOINT).map(String::as_str), Some("2"));
    }

    #[test]
    fn clamp_to_terminal_velocity() {
        let mut b = body_at(0.0, 0.0, 1.0, 1.0);
        b.vx = 3.0;
        b.vy = -7.0;
        b.clamp_velocity();
        assert_eq!((b.vx, b.vy), (1.0, -1.0));
    }
}
