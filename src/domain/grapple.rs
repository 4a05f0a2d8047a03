/// Grappling hook: a projectile that becomes a pendulum pivot.
///
/// ## Phases
///
///   Idle ──fire──▶ Traveling ──solid tile──▶ Latched ◀──▶ Active
///     ▲               │                          │
///     └── rejected / out of range / fire released┘
///
/// `Latched` means the hook is attached but the owner is not swinging yet
/// (e.g. standing on the ground with slack rope). `Active` mirrors the
/// owner being in the Grappling movement state; `sync_owner_state` keeps
/// the two in step after every tick.
///
/// The hook holds only a handle to its owner. Each tick the owner passes in
/// an `OwnerView` snapshot; the hook answers with a `GrappleSignal` asking
/// for a state change rather than writing into the owner.

use crate::config::GrappleConfig;

use super::movement::MoveState;
use super::registry::ActorId;
use super::tile::TileGrid;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GrapplePhase {
    Idle,
    Traveling,
    Latched,
    Active,
}

/// What the owner's state machine should do after a grapple tick.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum GrappleSignal {
    #[default]
    None,
    /// Tip hit a `nograpple`/`kill` tile; the shot was cancelled.
    Rejected,
    /// Tip hit a solid tile this tick; owner should start swinging.
    Latched,
    /// Owner must swing now, with an upward kick on its velocity.
    ForceGrappling { boost_vy: f64 },
}

/// Owner state the hook reads each tick.
#[derive(Clone, Copy, Debug)]
pub struct OwnerView {
    pub center_x: f64,
    pub center_y: f64,
    pub state: MoveState,
    pub hold_fire: bool,
}

#[derive(Clone, Debug)]
pub struct Grapple {
    owner: ActorId,
    /// Tip while traveling, anchor once latched.
    pub tip_x: f64,
    pub tip_y: f64,
    pub angle_deg: f64,
    pub length: f64,
    pub min_length: f64,
    pub max_length: f64,
    pub phase: GrapplePhase,
    pub length_locked: bool,
}

/// Launch angle for the 8-way input, degrees counter-clockwise from +x.
/// Straight down and no input fall back to a diagonal on the facing side.
pub fn launch_angle(move_x: i8, move_y: i8, facing_right: bool) -> f64 {
    match (move_x.signum(), move_y.signum()) {
        (1, 0) => 0.0,
        (1, 1) | (1, -1) => 45.0,
        (0, 1) => 90.0,
        (-1, 1) | (-1, -1) => 135.0,
        (-1, 0) => 180.0,
        _ if facing_right => 45.0,
        _ => 135.0,
    }
}

/// One pendulum step around `anchor` with rope `length`.
///
/// The body's tentative position (centre + v·dt) is projected back onto the
/// rope circle after nudging its angle by `pump_deg`; the returned velocity
/// is whatever displacement gets the centre there in one interval.
pub fn swing_step(
    anchor: (f64, f64),
    length: f64,
    center: (f64, f64),
    velocity: (f64, f64),
    pump_deg: f64,
    interval: f64,
) -> (f64, f64) {
    let (ax, ay) = anchor;
    let (cx, cy) = center;
    let nx = cx + velocity.0 * interval;
    let ny = cy + velocity.1 * interval;
    let angle = ((ay - ny).atan2(ax - nx).to_degrees() + pump_deg).to_radians();
    let px = ax - length * angle.cos();
    let py = ay - length * angle.sin();
    ((px - cx) / interval, (py - cy) / interval)
}

impl Grapple {
    pub fn new(owner: ActorId, x: f64, y: f64, cfg: &GrappleConfig) -> Self {
        Grapple {
            owner,
            tip_x: x,
            tip_y: y,
            angle_deg: 0.0,
            length: cfg.min_length,
            min_length: cfg.min_length,
            max_length: cfg.max_length,
            phase: GrapplePhase::Idle,
            length_locked: true,
        }
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn is_latched(&self) -> bool {
        matches!(self.phase, GrapplePhase::Latched | GrapplePhase::Active)
    }

    pub fn is_out(&self) -> bool {
        self.phase != GrapplePhase::Idle
    }

    pub fn anchor(&self) -> Option<(f64, f64)> {
        self.is_latched().then_some((self.tip_x, self.tip_y))
    }

    /// Back to Idle, tip folded into the owner.
    pub fn reset(&mut self, owner_x: f64, owner_y: f64) {
        self.phase = GrapplePhase::Idle;
        self.length_locked = true;
        self.angle_deg = 0.0;
        self.length = self.min_length;
        self.tip_x = owner_x;
        self.tip_y = owner_y;
    }

    /// Launch from the owner's centre. `mirrored` flips the horizontal input
    /// and facing, for shots fired off a wall.
    pub fn fire(&mut self, move_x: i8, move_y: i8, mirrored: bool, facing_right: bool) {
        let (mx, fr) = if mirrored { (-move_x, !facing_right) } else { (move_x, facing_right) };
        self.angle_deg = launch_angle(mx, move_y, fr);
        self.length = self.min_length;
        self.length_locked = true;
        self.phase = GrapplePhase::Traveling;
    }

    /// Reel in (`move_y > 0`) or pay out (`move_y < 0`). The first vertical
    /// tap after latching only unlocks the length.
    pub fn reel(&mut self, move_y: i8, tapped_vertical: bool, speed: f64, interval: f64) {
        if self.length_locked {
            if tapped_vertical {
                self.length_locked = false;
            }
            return;
        }
        if move_y < 0 {
            self.length += speed * interval;
        } else if move_y > 0 {
            self.length -= speed * interval;
        }
        self.length = self.length.clamp(self.min_length, self.max_length);
    }

    /// Keep `Latched`/`Active` in step with the owner's movement state.
    pub fn sync_owner_state(&mut self, state: MoveState) {
        if self.is_latched() {
            self.phase = if state == MoveState::Grappling {
                GrapplePhase::Active
            } else {
                GrapplePhase::Latched
            };
        }
    }

    pub fn update(
        &mut self,
        owner: &OwnerView,
        grid: &TileGrid,
        cfg: &GrappleConfig,
        interval: f64,
    ) -> GrappleSignal {
        if !owner.hold_fire {
            if self.is_out() {
                self.reset(owner.center_x, owner.center_y);
            }
            return GrappleSignal::None;
        }
        match self.phase {
            GrapplePhase::Idle => GrappleSignal::None,
            GrapplePhase::Traveling => self.travel(owner, grid, cfg, interval),
            GrapplePhase::Latched | GrapplePhase::Active => self.hold(owner, cfg),
        }
    }

    fn travel(
        &mut self,
        owner: &OwnerView,
        grid: &TileGrid,
        cfg: &GrappleConfig,
        interval: f64,
    ) -> GrappleSignal {
        self.length += cfg.travel_speed * interval;
        if self.length > self.max_length {
            self.reset(owner.center_x, owner.center_y);
            return GrappleSignal::None;
        }
        let a = self.angle_deg.to_radians();
        self.tip_x = owner.center_x + self.length * a.cos();
        self.tip_y = owner.center_y + self.length * a.sin();

        let Some(tile) = grid.point_query(self.tip_x, self.tip_y) else {
            return GrappleSignal::None;
        };
        if tile.rejects_grapple() {
            self.reset(owner.center_x, owner.center_y);
            return GrappleSignal::Rejected;
        }
        if tile.is_solid() {
            self.length = self.length.clamp(self.min_length, self.max_length);
            self.length_locked = true;
            self.phase = GrapplePhase::Latched;
            return GrappleSignal::Latched;
        }
        GrappleSignal::None
    }

    fn hold(&mut self, owner: &OwnerView, cfg: &GrappleConfig) -> GrappleSignal {
        let dx = self.tip_x - owner.center_x;
        let dy = self.tip_y - owner.center_y;
        self.angle_deg = dy.atan2(dx).to_degrees();

        match owner.state {
            MoveState::Grappling | MoveState::FreeMove => GrappleSignal::None,
            MoveState::Grounded => {
                let taut = dx.hypot(dy);
                self.length = taut.clamp(self.min_length, self.max_length);
                if taut > self.max_length {
                    GrappleSignal::ForceGrappling { boost_vy: cfg.ground_release_boost }
                } else {
                    GrappleSignal::None
                }
            }
            _ => GrappleSignal::ForceGrappling { boost_vy: 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::Registry;
    use crate::domain::tile::grid_from;

    fn hook() -> Grapple {
        let mut reg = Registry::new();
        let id = reg.insert(());
        Grapple::new(id, 0.0, 0.0, &GrappleConfig::default())
    }

    fn owner(x: f64, y: f64, state: MoveState) -> OwnerView {
        OwnerView { center_x: x, center_y: y, state, hold_fire: true }
    }

    #[test]
    fn launch_table() {
        assert_eq!(launch_angle(1, 0, true), 0.0);
        assert_eq!(launch_angle(1, 1, false), 45.0);
        assert_eq!(launch_angle(0, 1, true), 90.0);
        assert_eq!(launch_angle(-1, 1, true), 135.0);
        assert_eq!(launch_angle(-1, 0, true), 180.0);
        assert_eq!(launch_angle(0, 0, true), 45.0);
        assert_eq!(launch_angle(0, -1, false), 135.0);
    }

    #[test]
    fn wall_shot_is_mirrored() {
        let mut g = hook();
        // Sliding on a wall to the right, pushing into it: shoot away
        g.fire(1, 0, true, true);
        assert_eq!(g.angle_deg, 180.0);
        g.fire(0, 0, true, true);
        assert_eq!(g.angle_deg, 135.0);
    }

    #[test]
    fn fired_right_travels_and_latches() {
        // Owner centre at (40, 48); wall column starts at x=160
        let grid = grid_from(&[".....#", ".....#", "######"]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.fire(1, 0, false, true);
        assert_eq!(g.angle_deg, 0.0);
        assert_eq!(g.phase, GrapplePhase::Traveling);

        let me = owner(40.0, 48.0, MoveState::Grounded);
        let mut signal = GrappleSignal::None;
        let mut ticks = 0;
        while signal == GrappleSignal::None && ticks < 50 {
            let before = g.tip_x;
            signal = g.update(&me, &grid, &cfg, 16.0);
            ticks += 1;
            if signal == GrappleSignal::None {
                assert!(g.tip_x > before);
                assert_eq!(g.tip_y, 48.0);
            }
        }
        assert_eq!(signal, GrappleSignal::Latched);
        assert!(g.is_latched());
        assert!(g.tip_x >= 160.0);
        assert!(g.length >= g.min_length && g.length <= g.max_length);
    }

    #[test]
    fn nograpple_tile_rejects() {
        let grid = grid_from(&["..X", "..."]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.fire(1, 0, false, true);
        let me = owner(16.0, 48.0, MoveState::Falling);
        let mut signal = GrappleSignal::None;
        for _ in 0..10 {
            signal = g.update(&me, &grid, &cfg, 16.0);
            if signal != GrappleSignal::None {
                break;
            }
        }
        assert_eq!(signal, GrappleSignal::Rejected);
        assert_eq!(g.phase, GrapplePhase::Idle);
    }

    #[test]
    fn out_of_range_resets() {
        let grid = grid_from(&["........."]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.fire(1, 0, false, true);
        let me = owner(16.0, 16.0, MoveState::Falling);
        // 16 + 250 > 256
        assert_eq!(g.update(&me, &grid, &cfg, 250.0), GrappleSignal::None);
        assert_eq!(g.phase, GrapplePhase::Idle);
    }

    #[test]
    fn releasing_fire_resets() {
        let grid = grid_from(&["...."]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.fire(1, 0, false, true);
        let mut me = owner(16.0, 16.0, MoveState::Falling);
        me.hold_fire = false;
        g.update(&me, &grid, &cfg, 16.0);
        assert_eq!(g.phase, GrapplePhase::Idle);
    }

    #[test]
    fn grounded_taut_rope_forces_swing() {
        let grid = grid_from(&["...."]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.phase = GrapplePhase::Latched;
        g.tip_x = 300.0;
        g.tip_y = 16.0;
        let me = owner(16.0, 16.0, MoveState::Grounded);
        let signal = g.update(&me, &grid, &cfg, 16.0);
        assert_eq!(signal, GrappleSignal::ForceGrappling { boost_vy: 0.1 });
        assert_eq!(g.length, 256.0);
    }

    #[test]
    fn grounded_slack_rope_follows_distance() {
        let grid = grid_from(&["...."]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.phase = GrapplePhase::Latched;
        g.tip_x = 116.0;
        g.tip_y = 16.0;
        let me = owner(16.0, 16.0, MoveState::Grounded);
        assert_eq!(g.update(&me, &grid, &cfg, 16.0), GrappleSignal::None);
        assert!((g.length - 100.0).abs() < 1e-9);
        // Standing almost under the anchor still keeps the minimum
        let me = owner(113.0, 14.0, MoveState::Grounded);
        g.update(&me, &grid, &cfg, 16.0);
        assert_eq!(g.length, g.min_length);
    }

    #[test]
    fn airborne_latched_owner_forced_to_swing() {
        let grid = grid_from(&["...."]);
        let cfg = GrappleConfig::default();
        let mut g = hook();
        g.phase = GrapplePhase::Latched;
        g.tip_x = 100.0;
        g.tip_y = 100.0;
        let me = owner(16.0, 16.0, MoveState::Falling);
        assert_eq!(
            g.update(&me, &grid, &cfg, 16.0),
            GrappleSignal::ForceGrappling { boost_vy: 0.0 }
        );
        assert!((g.angle_deg - 45.0).abs() < 1e-9);
    }

    #[test]
    fn reel_is_locked_until_vertical_tap() {
        let mut g = hook();
        g.phase = GrapplePhase::Active;
        g.length = 100.0;
        g.reel(1, false, 0.2, 50.0);
        assert_eq!(g.length, 100.0);
        g.reel(1, true, 0.2, 50.0);
        assert!(!g.length_locked);
        g.reel(1, false, 0.2, 50.0);
        assert_eq!(g.length, 90.0);
    }

    #[test]
    fn rope_length_stays_in_bounds() {
        let mut g = hook();
        g.phase = GrapplePhase::Active;
        g.length_locked = false;
        g.length = 30.0;
        for _ in 0..20 {
            g.reel(1, false, 0.2, 50.0);
            assert!(g.length >= g.min_length && g.length <= g.max_length);
        }
        assert_eq!(g.length, g.min_length);
        for _ in 0..100 {
            g.reel(-1, false, 0.2, 50.0);
            assert!(g.length >= g.min_length && g.length <= g.max_length);
        }
        assert_eq!(g.length, g.max_length);
    }

    #[test]
    fn swing_keeps_rope_length() {
        let anchor = (100.0, 200.0);
        let center = (100.0 - 80.0, 200.0 - 60.0); // length 100
        let (vx, vy) = swing_step(anchor, 100.0, center, (0.2, -0.1), 0.0, 16.0);
        let nx = center.0 + vx * 16.0;
        let ny = center.1 + vy * 16.0;
        let r = (anchor.0 - nx).hypot(anchor.1 - ny);
        assert!((r - 100.0).abs() < 1e-9);
    }
}
