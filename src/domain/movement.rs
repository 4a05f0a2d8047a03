/// Player movement state machine.
///
/// ## States
///
/// `MoveState` is a plain tagged enum; `update_state` dispatches to exactly
/// one handler per tick. A handler writes velocity deltas and may switch the
/// state, but the new state's handler does not run until the next tick, so
/// a tap consumed by one state can never also drive another.
///
/// Every handler checks its own preconditions and falls back to `Falling`
/// when they no longer hold (wall gone, hook not latched, ...).
///
/// ## Tick pipeline (`tick_player`)
///
///   1. fire the grapple on a fire tap
///   2. jetpack recharge (any state but Jetpacking)
///   3. state handler
///   4. grapple tick, may request Grappling
///   5. clamp to terminal velocity
///   6. integrate + resolve X, then Y (post-move transitions)
///   7. flush contacts, animate, update facing, emit cues
///
/// The debug `FreeMove` state is only entered and left by explicit request;
/// none of the automatic transitions touch it.

use crate::config::{GrappleConfig, PhysicsConfig};

use super::control::{ControlIntent, DebugRequest};
use super::entity::{AnimationKind, Cue, CueCommand, Facing, Player};
use super::grapple::{swing_step, GrappleSignal, OwnerView};
use super::physics::Axis;
use super::tile::{PropertyMap, TileGrid};

/// Wall friction while sliding down and pressing into the wall.
const WALL_FRICTION: f64 = 0.0015;
const WALL_FRICTION_FAST: f64 = 0.0018;
/// Horizontal launch of wall and ledge jumps, relative to jump velocity.
const WALL_JUMP_FACTOR: f64 = 0.8;
const AIR_CONTROL: f64 = 0.5;
const JETPACK_OFF_AXIS: f64 = 0.2;
const SWING_AIR_CONTROL: f64 = 0.1;
const GROUND_FRICTION: f64 = 4.0;
const FRICTION_SNAP: f64 = 0.1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveState {
    Grounded,
    Falling,
    Jetpacking,
    Wallslide,
    LedgeGrab,
    Grappling,
    FreeMove,
}

impl MoveState {
    pub fn name(self) -> &'static str {
        match self {
            MoveState::Grounded => "grounded",
            MoveState::Falling => "falling",
            MoveState::Jetpacking => "jetpacking",
            MoveState::Wallslide => "wallslide",
            MoveState::LedgeGrab => "ledgegrab",
            MoveState::Grappling => "grappling",
            MoveState::FreeMove => "freemove",
        }
    }

    /// On a wall, where horizontal aim is mirrored.
    pub fn is_on_wall(self) -> bool {
        matches!(self, MoveState::Wallslide | MoveState::LedgeGrab)
    }
}

/// Read-only inputs shared by every handler in a tick.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    pub grid: &'a TileGrid,
    pub physics: &'a PhysicsConfig,
    pub rope: &'a GrappleConfig,
    pub interval: f64,
}

/// What one player tick hands back to the session.
#[derive(Clone, Debug, Default)]
pub struct PlayerReport {
    pub contacts: PropertyMap,
    pub cues: Vec<CueCommand>,
    pub grapple: GrappleSignal,
}

// ══════════════════════════════════════════════════════════════
// Dispatch
// ══════════════════════════════════════════════════════════════

pub fn update_state(
    p: &mut Player,
    intent: &mut ControlIntent,
    ctx: &TickContext,
    cues: &mut Vec<CueCommand>,
) {
    match p.state {
        MoveState::Grounded => grounded(p, intent, ctx, cues),
        MoveState::Falling => falling(p, intent, ctx),
        MoveState::Jetpacking => jetpacking(p, intent, ctx),
        MoveState::Wallslide => wallslide(p, intent, ctx, cues),
        MoveState::LedgeGrab => ledge_grab(p, intent, ctx, cues),
        MoveState::Grappling => grappling(p, intent, ctx),
        MoveState::FreeMove => free_move(p, intent),
    }
}

// ── Handlers ──

fn grounded(p: &mut Player, intent: &mut ControlIntent, ctx: &TickContext, cues: &mut Vec<CueCommand>) {
    let phys = ctx.physics;
    let dt = ctx.interval;
    let b = &mut p.body;
    b.apply_gravity(dt);

    if intent.move_x != 0 {
        b.vx += intent.move_x as f64 * phys.run_accel * dt;
        b.vx = b.vx.clamp(-phys.run_speed, phys.run_speed);
    } else {
        b.vx -= b.vx * phys.run_accel * dt * GROUND_FRICTION;
        if b.vx.abs() < FRICTION_SNAP {
            b.vx = 0.0;
        }
    }

    if intent.take_jump() {
        b.vy = phys.jump_velocity;
        p.jump_charge = phys.jump_charge_ms;
        p.upjump = intent.move_x == 0;
        p.state = MoveState::Falling;
        cues.push(CueCommand::Play(Cue::Jump));
    }
}

fn falling(p: &mut Player, intent: &mut ControlIntent, ctx: &TickContext) {
    let phys = ctx.physics;
    let dt = ctx.interval;

    if intent.tapped_jump() && p.has_jetpack && p.jetpack_charge > phys.jetpack_tap_threshold {
        intent.take_jump();
        p.jetpack_charge -= phys.jetpack_tap_cost;
        p.state = MoveState::Jetpacking;
        return;
    }

    if p.jump_charge > 0.0 && intent.hold_jump {
        p.jump_charge -= dt;
    } else {
        p.jump_charge = 0.0;
        p.body.apply_gravity(dt);
    }

    if under_run_speed(p.body.vx, intent.move_x, phys.run_speed) {
        p.body.vx += intent.move_x as f64 * phys.run_accel * dt * AIR_CONTROL;
    }
}

fn jetpacking(p: &mut Player, intent: &mut ControlIntent, ctx: &TickContext) {
    let phys = ctx.physics;
    let dt = ctx.interval;

    p.jetpack_charge -= dt;
    p.body.apply_gravity(dt);

    if intent.hold_jump && p.jetpack_charge > 0.0 {
        if p.body.vy < phys.run_speed / 2.0 {
            p.body.vy += phys.jetpack_thrust * dt;
        }
        let push = intent.move_x as f64 * phys.run_accel * dt;
        if under_run_speed(p.body.vx, intent.move_x, phys.run_speed) {
            p.body.vx += push;
        } else {
            p.body.vx += push * JETPACK_OFF_AXIS;
        }
    } else {
        if p.jetpack_charge <= 0.0 {
            // Assigned, not added: running dry twice cannot stack penalties.
            p.jetpack_charge = phys.jetpack_penalty;
        }
        p.state = MoveState::Falling;
    }
}

fn wallslide(p: &mut Player, intent: &mut ControlIntent, ctx: &TickContext, cues: &mut Vec<CueCommand>) {
    let phys = ctx.physics;
    let dt = ctx.interval;

    // Not interval-scaled.
    p.body.vx += intent.move_x as f64 * phys.run_accel;
    p.body.apply_gravity(dt);
    let away: i8 = if p.wall_right { -1 } else { 1 };

    if intent.take_jump() {
        p.body.vy = (p.body.vy + phys.jump_velocity).min(phys.jump_velocity);
        p.body.vx = away as f64 * phys.jump_velocity * WALL_JUMP_FACTOR;
        p.jump_charge = phys.jump_charge_ms;
        p.state = MoveState::Falling;
        cues.push(CueCommand::Play(Cue::Jump));
        return;
    }

    // Probe just past the facing edge, at mid height and at the head.
    let probe_x = p.body.center_x() + p.facing.sign() * phys.wall_probe;
    let solid_at = |y: f64| ctx.grid.point_query(probe_x, y).map_or(false, |t| t.is_solid());
    let wall_mid = solid_at(p.body.center_y());
    let wall_top = solid_at(p.body.top());
    if !wall_mid && !wall_top {
        p.state = MoveState::Falling;
        p.grab_potential = false;
        return;
    }

    if intent.move_x == -away && p.body.vy < 0.0 {
        let friction = if p.body.vy < -0.5 { WALL_FRICTION_FAST } else { WALL_FRICTION };
        p.body.vy += dt * friction;
        if wall_top {
            if p.grab_potential {
                p.state = MoveState::LedgeGrab;
                p.body.vx = 0.0;
                p.body.vy = 0.0;
                p.grab_potential = false;
            }
        } else {
            // Head has cleared the wall top: the next contact is a ledge.
            p.grab_potential = true;
        }
    }
}

fn ledge_grab(p: &mut Player, intent: &mut ControlIntent, ctx: &TickContext, cues: &mut Vec<CueCommand>) {
    let phys = ctx.physics;
    if intent.take_jump() {
        let pressing_away = (intent.move_x < 0 && p.wall_right) || (intent.move_x > 0 && !p.wall_right);
        if pressing_away {
            p.body.vx = intent.move_x as f64 * phys.jump_velocity * WALL_JUMP_FACTOR;
            p.jump_charge = phys.jump_charge_ms;
        }
        p.body.vy = phys.jump_velocity;
        p.state = MoveState::Falling;
        cues.push(CueCommand::Play(Cue::Jump));
    }
    if intent.move_y < 0 {
        p.state = MoveState::Falling;
    }
}

fn grappling(p: &mut Player, intent: &mut ControlIntent, ctx: &TickContext) {
    let phys = ctx.physics;
    let rope = ctx.rope;
    let dt = ctx.interval;
    let (cx, cy) = p.center();

    if !intent.hold_fire {
        p.state = MoveState::Falling;
        p.grapple.reset(cx, cy);
        return;
    }
    let Some(anchor) = p.grapple.anchor() else {
        p.state = MoveState::Falling;
        return;
    };

    let tapped_vertical = intent.take_vertical();
    p.grapple.reel(intent.move_y, tapped_vertical, rope.reel_speed, dt);

    let b = &mut p.body;
    if b.vy < 0.0 {
        b.vx += intent.move_x as f64 * phys.run_accel * dt * SWING_AIR_CONTROL;
    }
    b.apply_gravity(dt);

    let pump = intent.move_x as f64 * dt * rope.swing_pump;
    let (vx, vy) = swing_step(anchor, p.grapple.length, (cx, cy), (b.vx, b.vy), pump, dt);
    b.vx = vx;
    b.vy = vy;
}

fn free_move(p: &mut Player, intent: &ControlIntent) {
    p.body.vx = intent.move_x as f64;
    p.body.vy = intent.move_y as f64;
}

#[inline]
fn under_run_speed(vx: f64, move_x: i8, run_speed: f64) -> bool {
    (vx < run_speed && move_x > 0) || (vx > -run_speed && move_x < 0)
}

// ══════════════════════════════════════════════════════════════
// Post-move transitions
// ══════════════════════════════════════════════════════════════

/// After the X pass. `vx` is the velocity the pass moved with.
pub fn on_x_resolved(p: &mut Player, vx: f64, push: f64) {
    if push == 0.0 {
        return;
    }
    p.upjump = false;
    if p.state != MoveState::Falling {
        return;
    }
    if vx > 0.0 && push < 0.0 {
        p.state = MoveState::Wallslide;
        p.wall_right = true;
    } else if vx < 0.0 && push > 0.0 {
        p.state = MoveState::Wallslide;
        p.wall_right = false;
    }
}

/// After the Y pass: landing, or losing the ground.
pub fn on_y_resolved(p: &mut Player, push: f64) {
    if p.state == MoveState::FreeMove {
        return;
    }
    if push != 0.0 {
        p.upjump = false;
        if push > 0.0 {
            p.state = MoveState::Grounded;
        }
    } else if p.state == MoveState::Grounded {
        p.state = if p.grapple.is_latched() {
            MoveState::Grappling
        } else {
            MoveState::Falling
        };
    }
}

fn apply_grapple_signal(p: &mut Player, signal: GrappleSignal, cues: &mut Vec<CueCommand>) {
    match signal {
        GrappleSignal::None => {}
        GrappleSignal::Rejected => cues.push(CueCommand::Play(Cue::Clink)),
        _ if p.state == MoveState::FreeMove => {}
        GrappleSignal::Latched => p.state = MoveState::Grappling,
        GrappleSignal::ForceGrappling { boost_vy } => {
            p.state = MoveState::Grappling;
            p.body.vy += boost_vy;
        }
    }
}

fn animation_kind(p: &Player, move_x: i8) -> AnimationKind {
    match p.state {
        MoveState::Grounded if move_x != 0 => AnimationKind::Run,
        MoveState::Wallslide => AnimationKind::Wallslide,
        MoveState::LedgeGrab => AnimationKind::LedgeGrab,
        MoveState::Jetpacking => AnimationKind::Jetpack,
        MoveState::Falling => match (p.body.vy > 0.0, p.upjump) {
            (true, true) => AnimationKind::JumpUp,
            (true, false) => AnimationKind::Jump,
            (false, true) => AnimationKind::FallingUp,
            (false, false) => AnimationKind::Falling,
        },
        MoveState::Grappling => AnimationKind::Swinging,
        _ => AnimationKind::Idle,
    }
}

/// Apply a developer toggle. Turning free-move off always lands in Falling.
pub fn apply_debug(p: &mut Player, request: DebugRequest) {
    p.state = match request {
        DebugRequest::FreeMoveOn => MoveState::FreeMove,
        DebugRequest::FreeMoveOff => MoveState::Falling,
    };
}

// ══════════════════════════════════════════════════════════════
// Full player tick
// ══════════════════════════════════════════════════════════════

pub fn tick_player(p: &mut Player, mut intent: ControlIntent, ctx: &TickContext) -> PlayerReport {
    let mut report = PlayerReport::default();
    let dt = ctx.interval;
    if dt <= 0.0 || !p.alive {
        return report;
    }
    if let Some(request) = intent.debug.take() {
        apply_debug(p, request);
    }

    if intent.take_fire() && p.has_grapple {
        let facing_right = p.facing == Facing::Right;
        let on_wall = p.state.is_on_wall();
        p.grapple.fire(intent.move_x, intent.move_y, on_wall, facing_right);
    }

    if p.state != MoveState::Jetpacking {
        if p.has_jetpack {
            p.jetpack_charge = (p.jetpack_charge + dt).min(ctx.physics.jetpack_charge_max);
        }
        if p.jet_loop {
            p.jet_loop = false;
            report.cues.push(CueCommand::StopLoop(Cue::Jet));
        }
    }

    let prev_state = p.state;
    update_state(p, &mut intent, ctx, &mut report.cues);
    if prev_state == MoveState::Jetpacking && !p.jet_loop {
        p.jet_loop = true;
        report.cues.push(CueCommand::StartLoop(Cue::Jet));
    }

    let (cx, cy) = p.center();
    let owner = OwnerView {
        center_x: cx,
        center_y: cy,
        state: p.state,
        hold_fire: intent.hold_fire,
    };
    report.grapple = p.grapple.update(&owner, ctx.grid, ctx.rope, dt);
    apply_grapple_signal(p, report.grapple, &mut report.cues);

    p.body.clamp_velocity();

    let vx = p.body.vx;
    let push_x = p.body.move_axis(ctx.grid, Axis::X, dt);
    on_x_resolved(p, vx, push_x);
    let push_y = p.body.move_axis(ctx.grid, Axis::Y, dt);
    on_y_resolved(p, push_y);
    p.grapple.sync_owner_state(p.state);

    report.contacts = p.body.flush_contacts();

    let state_changed = prev_state != p.state;
    let kind = animation_kind(p, intent.move_x);
    let new_frame = p.animation.advance(kind, dt, state_changed);
    if new_frame && kind == AnimationKind::Run && matches!(p.animation.frame, 0 | 6) {
        report.cues.push(CueCommand::Play(Cue::Run));
    }

    if intent.move_x > 0 {
        p.facing = Facing::Right;
    } else if intent.move_x < 0 {
        p.facing = Facing::Left;
    }

    if state_changed && matches!(p.state, MoveState::Grounded | MoveState::Wallslide) {
        report.cues.push(CueCommand::Play(Cue::Land));
    }
    report
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control::{Buttons, EdgeDetector};
    use crate::domain::grapple::GrapplePhase;
    use crate::domain::registry::Registry;
    use crate::domain::tile::{grid_from, prop, EDGE_EPSILON, TILE_SIZE};

    struct Rig {
        physics: PhysicsConfig,
        rope: GrappleConfig,
        grid: TileGrid,
    }

    impl Rig {
        fn new(rows: &[&str]) -> Self {
            Rig {
                physics: PhysicsConfig::default(),
                rope: GrappleConfig::default(),
                grid: grid_from(rows),
            }
        }

        fn ctx(&self, interval: f64) -> TickContext<'_> {
            TickContext {
                grid: &self.grid,
                physics: &self.physics,
                rope: &self.rope,
                interval,
            }
        }

        fn player(&self, x: f64, y: f64) -> Player {
            let mut reg = Registry::new();
            let id = reg.insert(());
            Player::new(id, x, y, &self.physics, &self.rope)
        }
    }

    fn press(b: Buttons) -> ControlIntent {
        EdgeDetector::new().sample(b)
    }

    fn hold(b: Buttons) -> ControlIntent {
        let mut e = EdgeDetector::new();
        e.hold_all(b);
        e.sample(b)
    }

    const NONE: Buttons = Buttons { up: false, down: false, left: false, right: false, jump: false, fire: false };

    fn plays(report: &PlayerReport, cue: Cue) -> bool {
        report.cues.contains(&CueCommand::Play(cue))
    }

    // ── Scenario: landing ──

    #[test]
    fn falling_onto_tile_lands_grounded() {
        let rig = Rig::new(&["...", "...", "###"]);
        let mut p = rig.player(10.0, TILE_SIZE);
        assert_eq!(p.state, MoveState::Falling);
        let report = tick_player(&mut p, ControlIntent::idle(), &rig.ctx(16.0));
        assert_eq!(p.body.y, TILE_SIZE);
        assert_eq!(p.body.vy, 0.0);
        assert_eq!(p.state, MoveState::Grounded);
        assert!(plays(&report, Cue::Land));
    }

    #[test]
    fn walking_off_a_ledge_falls() {
        let rig = Rig::new(&["....", "....", "#..."]);
        let mut p = rig.player(0.0, TILE_SIZE);
        tick_player(&mut p, ControlIntent::idle(), &rig.ctx(16.0));
        assert_eq!(p.state, MoveState::Grounded);
        p.body.x = 40.0;
        tick_player(&mut p, ControlIntent::idle(), &rig.ctx(16.0));
        assert_eq!(p.state, MoveState::Falling);
    }

    #[test]
    fn lost_ground_with_latched_hook_swings() {
        let rig = Rig::new(&["....", "....", "#..."]);
        let mut p = rig.player(40.0, TILE_SIZE);
        p.state = MoveState::Grounded;
        p.grapple.phase = GrapplePhase::Latched;
        p.grapple.tip_x = 55.0;
        p.grapple.tip_y = 90.0;
        on_y_resolved(&mut p, 0.0);
        assert_eq!(p.state, MoveState::Grappling);
    }

    // ── Scenario: running into a wall ──

    #[test]
    fn run_into_wall_is_pushed_flush() {
        // Floor plus a wall; the wall's left edge is 16 units ahead
        let rig = Rig::new(&["....#", "....#", "....#", "#####"]);
        let wall_left = 4.0 * TILE_SIZE;
        let mut p = rig.player(wall_left - 16.0 - 30.0, TILE_SIZE);
        p.state = MoveState::Grounded;
        p.body.vx = 0.42;
        let right = Buttons { right: true, ..NONE };
        tick_player(&mut p, hold(right), &rig.ctx(40.0));
        assert!((p.body.x + p.body.w - (wall_left - EDGE_EPSILON)).abs() < 1e-9);
        assert_eq!(p.body.vx, 0.0);
        assert_eq!(p.state, MoveState::Grounded);
    }

    #[test]
    fn falling_into_wall_starts_wallslide() {
        let rig = Rig::new(&["...#", "...#", "...#", "...#"]);
        let mut p = rig.player(96.0 - 31.0, 40.0);
        p.body.vx = 0.3;
        tick_player(&mut p, hold(Buttons { right: true, ..NONE }), &rig.ctx(16.0));
        assert_eq!(p.state, MoveState::Wallslide);
        assert!(p.wall_right);
    }

    // ── Grounded ──

    #[test]
    fn ground_jump_consumes_tap_once() {
        let rig = Rig::new(&["...", "...", "...", "###"]);
        let mut p = rig.player(10.0, TILE_SIZE);
        p.state = MoveState::Grounded;
        let report = tick_player(&mut p, press(Buttons { jump: true, ..NONE }), &rig.ctx(16.0));
        assert_eq!(p.state, MoveState::Falling);
        assert!(p.body.vy > 0.0);
        assert!(p.upjump);
        assert_eq!(p.jump_charge, rig.physics.jump_charge_ms);
        assert!(plays(&report, Cue::Jump));
        assert_eq!(p.animation.kind, AnimationKind::JumpUp);
    }

    #[test]
    fn ground_friction_snaps_to_zero() {
        let rig = Rig::new(&["...", "###"]);
        let mut p = rig.player(10.0, TILE_SIZE);
        p.state = MoveState::Grounded;
        p.body.vx = 0.105;
        let mut intent = ControlIntent::idle();
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.body.vx, 0.0);
    }

    #[test]
    fn run_speed_is_capped_on_ground() {
        let rig = Rig::new(&["...", "###"]);
        let mut p = rig.player(10.0, TILE_SIZE);
        p.state = MoveState::Grounded;
        p.body.vx = 0.41;
        let mut intent = hold(Buttons { right: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.body.vx, rig.physics.run_speed);
    }

    // ── Falling ──

    #[test]
    fn held_jump_suspends_gravity_during_charge() {
        let rig = Rig::new(&["..."]);
        let mut p = rig.player(10.0, 0.0);
        p.jump_charge = 200.0;
        p.body.vy = 0.3;
        let mut intent = hold(Buttons { jump: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.body.vy, 0.3);
        assert_eq!(p.jump_charge, 150.0);

        let mut released = ControlIntent::idle();
        update_state(&mut p, &mut released, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.jump_charge, 0.0);
        assert!(p.body.vy < 0.3);
    }

    #[test]
    fn air_control_only_below_run_speed() {
        let rig = Rig::new(&["..."]);
        let mut p = rig.player(10.0, 0.0);
        p.body.vx = rig.physics.run_speed;
        let mut intent = hold(Buttons { right: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.body.vx, rig.physics.run_speed);
        p.body.vx = 0.0;
        update_state(&mut p, &mut intent, &rig.ctx(10.0), &mut Vec::new());
        assert!((p.body.vx - 0.002 * 10.0 * 0.5).abs() < 1e-12);
    }

    // ── Jetpack ──

    #[test]
    fn jetpack_tap_needs_charge() {
        let rig = Rig::new(&["..."]);
        let mut p = rig.player(10.0, 0.0);
        p.has_jetpack = true;
        p.jetpack_charge = 400.0;
        let mut intent = press(Buttons { jump: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);

        p.jetpack_charge = 600.0;
        let mut intent = press(Buttons { jump: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Jetpacking);
        assert_eq!(p.jetpack_charge, 550.0);
        assert!(!intent.tapped_jump());
    }

    #[test]
    fn jetpack_thrust_and_exhaustion() {
        let rig = Rig::new(&["..."]);
        let mut p = rig.player(10.0, 0.0);
        p.has_jetpack = true;
        p.state = MoveState::Jetpacking;
        p.jetpack_charge = 100.0;
        let mut intent = hold(Buttons { jump: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Jetpacking);
        assert!(p.body.vy > 0.0);

        update_state(&mut p, &mut intent, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);
        assert_eq!(p.jetpack_charge, rig.physics.jetpack_penalty);
    }

    #[test]
    fn double_exhaustion_does_not_stack_penalty() {
        let rig = Rig::new(&["..."]);
        let mut p = rig.player(10.0, 0.0);
        p.has_jetpack = true;
        // Already penalised and forced back into the jetpack state
        p.state = MoveState::Jetpacking;
        p.jetpack_charge = rig.physics.jetpack_penalty;
        let mut intent = hold(Buttons { jump: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.jetpack_charge, rig.physics.jetpack_penalty);
        p.state = MoveState::Jetpacking;
        update_state(&mut p, &mut intent, &rig.ctx(50.0), &mut Vec::new());
        assert_eq!(p.jetpack_charge, rig.physics.jetpack_penalty);
    }

    #[test]
    fn recharge_caps_and_jet_loop_cues() {
        let rig = Rig::new(&["....", "....", "....", "...."]);
        let mut p = rig.player(10.0, 40.0);
        p.has_jetpack = true;
        p.jetpack_charge = 990.0;
        tick_player(&mut p, ControlIntent::idle(), &rig.ctx(50.0));
        assert_eq!(p.jetpack_charge, 1000.0);

        p.state = MoveState::Jetpacking;
        let report = tick_player(&mut p, hold(Buttons { jump: true, ..NONE }), &rig.ctx(16.0));
        assert!(report.cues.contains(&CueCommand::StartLoop(Cue::Jet)));
        p.state = MoveState::Falling;
        let report = tick_player(&mut p, ControlIntent::idle(), &rig.ctx(16.0));
        assert!(report.cues.contains(&CueCommand::StopLoop(Cue::Jet)));
        assert!(!p.jet_loop);
    }

    // ── Wallslide / LedgeGrab ──

    #[test]
    fn wallslide_without_wall_self_corrects() {
        let rig = Rig::new(&["....", "...."]);
        let mut p = rig.player(10.0, 0.0);
        p.state = MoveState::Wallslide;
        p.grab_potential = true;
        let mut intent = ControlIntent::idle();
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);
        assert!(!p.grab_potential);
    }

    #[test]
    fn wall_jump_pushes_away() {
        let rig = Rig::new(&["...#", "...#", "...#"]);
        let mut p = rig.player(96.0 - 30.0 - EDGE_EPSILON, 10.0);
        p.state = MoveState::Wallslide;
        p.wall_right = true;
        p.body.vy = -0.2;
        let mut cues = Vec::new();
        let mut intent = press(Buttons { jump: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut cues);
        assert_eq!(p.state, MoveState::Falling);
        assert!(p.body.vx < 0.0);
        assert!((p.body.vx + 0.4).abs() < 1e-12);
        assert!(p.body.vy <= rig.physics.jump_velocity);
        assert!(cues.contains(&CueCommand::Play(Cue::Jump)));
    }

    #[test]
    fn wall_friction_and_ledge_grab() {
        // Wall column at gx=3 is two tiles tall; above it is open air
        let rig = Rig::new(&["....", "....", "...#", "...#"]);
        let mut p = rig.player(96.0 - 30.0 - EDGE_EPSILON, 20.0);
        p.state = MoveState::Wallslide;
        p.wall_right = true;
        p.facing = Facing::Right;
        p.body.vy = -0.3;
        let into_wall = hold(Buttons { right: true, ..NONE });

        // Head (top = 82) is above the wall top (64): arms the grab
        let mut intent = into_wall;
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Wallslide);
        assert!(p.grab_potential);
        let expected = -0.3 - rig.physics.gravity * 16.0 + 0.0015 * 16.0;
        assert!((p.body.vy - expected).abs() < 1e-12);

        // Slide down until the head probe hits the wall again
        p.body.y = 0.0;
        p.body.vy = -0.2;
        let mut intent = into_wall;
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::LedgeGrab);
        assert_eq!((p.body.vx, p.body.vy), (0.0, 0.0));
        assert!(!p.grab_potential);
    }

    #[test]
    fn ledge_grab_releases_on_down() {
        let rig = Rig::new(&["...#"]);
        let mut p = rig.player(10.0, 0.0);
        p.state = MoveState::LedgeGrab;
        let mut intent = hold(Buttons { down: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);
    }

    #[test]
    fn ledge_jump_away_from_wall() {
        let rig = Rig::new(&["...#"]);
        let mut p = rig.player(10.0, 0.0);
        p.state = MoveState::LedgeGrab;
        p.wall_right = true;
        let mut intent = press(Buttons { jump: true, left: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);
        assert_eq!(p.body.vy, rig.physics.jump_velocity);
        assert!((p.body.vx + 0.4).abs() < 1e-12);
    }

    // ── Grapple ──

    #[test]
    fn grapple_fired_right_latches_and_swings() {
        // Airborne, thick wall ahead on every row
        let rig = Rig::new(&["......####"; 8]);
        let mut p = rig.player(10.0, 150.0);
        p.has_grapple = true;
        let fire = Buttons { fire: true, right: true, ..NONE };
        let mut edges = EdgeDetector::new();
        let report = tick_player(&mut p, edges.sample(fire), &rig.ctx(16.0));
        assert_eq!(p.grapple.angle_deg, 0.0);
        assert_eq!(p.grapple.phase, GrapplePhase::Traveling);
        assert_eq!(report.grapple, GrappleSignal::None);

        let mut latched = false;
        for _ in 0..20 {
            let report = tick_player(&mut p, edges.sample(fire), &rig.ctx(16.0));
            if report.grapple == GrappleSignal::Latched {
                latched = true;
                break;
            }
        }
        assert!(latched);
        assert!(p.grapple.tip_x >= 192.0);
        assert_eq!(p.state, MoveState::Grappling);
        assert_eq!(p.grapple.phase, GrapplePhase::Active);
    }

    #[test]
    fn latching_while_grounded_keeps_slack_rope() {
        let rig = Rig::new(&["......####", "......####", "......####", "##########"]);
        let mut p = rig.player(10.0, TILE_SIZE);
        p.has_grapple = true;
        p.state = MoveState::Grounded;
        let fire = Buttons { fire: true, right: true, ..NONE };
        let mut edges = EdgeDetector::new();
        let mut latched = false;
        for _ in 0..20 {
            let report = tick_player(&mut p, edges.sample(fire), &rig.ctx(16.0));
            if report.grapple == GrappleSignal::Latched {
                latched = true;
                break;
            }
        }
        assert!(latched);
        // The swing request is overridden by landing in the same tick
        assert_eq!(p.state, MoveState::Grounded);
        assert_eq!(p.grapple.phase, GrapplePhase::Latched);
    }

    #[test]
    fn releasing_fire_drops_out_of_swing() {
        let rig = Rig::new(&["........", "........", "........"]);
        let mut p = rig.player(40.0, 10.0);
        p.state = MoveState::Grappling;
        p.grapple.phase = GrapplePhase::Active;
        p.grapple.tip_x = 55.0;
        p.grapple.tip_y = 90.0;
        let mut intent = ControlIntent::idle();
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);
        assert_eq!(p.grapple.phase, GrapplePhase::Idle);
    }

    #[test]
    fn grappling_without_anchor_self_corrects() {
        let rig = Rig::new(&["...."]);
        let mut p = rig.player(10.0, 0.0);
        p.state = MoveState::Grappling;
        let mut intent = hold(Buttons { fire: true, ..NONE });
        update_state(&mut p, &mut intent, &rig.ctx(16.0), &mut Vec::new());
        assert_eq!(p.state, MoveState::Falling);
    }

    #[test]
    fn swing_holds_rope_length_and_bounds() {
        let rig = Rig::new(&["..........", "..........", "..........", "..........", ".........."]);
        let mut p = rig.player(100.0, 20.0);
        p.state = MoveState::Grappling;
        p.grapple.phase = GrapplePhase::Active;
        p.grapple.tip_x = 115.0 + 60.0;
        p.grapple.tip_y = 51.0 + 80.0;
        p.grapple.length = 100.0;
        p.grapple.length_locked = false;
        let mut e = EdgeDetector::new();
        for i in 0..40 {
            let b = Buttons { fire: true, up: i % 2 == 0, right: i < 20, ..NONE };
            tick_player(&mut p, e.sample(b), &rig.ctx(16.0));
            let g = &p.grapple;
            assert!(g.length >= g.min_length && g.length <= g.max_length);
        }
    }

    #[test]
    fn grapple_rejected_plays_clink() {
        let rig = Rig::new(&["..X", "..X"]);
        let mut p = rig.player(0.0, 0.0);
        p.has_grapple = true;
        let fire = Buttons { fire: true, right: true, ..NONE };
        let mut edges = EdgeDetector::new();
        let mut clinked = false;
        for _ in 0..10 {
            let report = tick_player(&mut p, edges.sample(fire), &rig.ctx(16.0));
            if plays(&report, Cue::Clink) {
                clinked = true;
                break;
            }
        }
        assert!(clinked);
        assert_eq!(p.grapple.phase, GrapplePhase::Idle);
    }

    // ── Contacts, state invariant, debug ──

    #[test]
    fn kill_tile_reported_without_push() {
        let rig = Rig::new(&["....", ".^..", "####"]);
        let mut p = rig.player(2.0, TILE_SIZE);
        p.state = MoveState::Grounded;
        p.body.vx = 0.1;
        let report = tick_player(&mut p, hold(Buttons { right: true, ..NONE }), &rig.ctx(16.0));
        assert!(report.contacts.contains_key(prop::KILL));
        assert!(report.contacts.contains_key(prop::SOLID));
        assert!(p.body.vx > 0.0);
    }

    #[test]
    fn state_is_always_one_of_the_variants() {
        let rig = Rig::new(&[
            "..........",
            "...#......",
            "...#...#..",
            "..........",
            "##########",
        ]);
        let mut p = rig.player(10.0, 40.0);
        p.has_grapple = true;
        p.has_jetpack = true;
        let mut e = EdgeDetector::new();
        for i in 0..600u32 {
            let b = Buttons {
                left: i % 97 < 30,
                right: i % 61 > 35,
                up: i % 13 == 0,
                down: i % 29 == 0,
                jump: i % 7 < 2,
                fire: i % 45 > 20,
            };
            tick_player(&mut p, e.sample(b), &rig.ctx((i % 50) as f64 + 1.0));
            assert!(matches!(
                p.state,
                MoveState::Grounded
                    | MoveState::Falling
                    | MoveState::Jetpacking
                    | MoveState::Wallslide
                    | MoveState::LedgeGrab
                    | MoveState::Grappling
            ));
            assert!(p.body.vx.abs() <= 1.0 + 1e-9);
            if p.grapple.is_latched() {
                let g = &p.grapple;
                assert!(g.length >= g.min_length && g.length <= g.max_length);
            }
        }
    }

    #[test]
    fn free_move_toggle() {
        let rig = Rig::new(&["....", "....", "####"]);
        let mut p = rig.player(10.0, TILE_SIZE);
        let mut intent = hold(Buttons { up: true, ..NONE });
        intent.debug = Some(DebugRequest::FreeMoveOn);
        tick_player(&mut p, intent, &rig.ctx(10.0));
        assert_eq!(p.state, MoveState::FreeMove);
        assert_eq!(p.body.vy, 1.0);
        assert!(p.body.y > TILE_SIZE);

        let mut off = ControlIntent::idle();
        off.debug = Some(DebugRequest::FreeMoveOff);
        tick_player(&mut p, off, &rig.ctx(10.0));
        assert_ne!(p.state, MoveState::FreeMove);
    }

    #[test]
    fn facing_follows_input() {
        let rig = Rig::new(&["....", "####"]);
        let mut p = rig.player(40.0, TILE_SIZE);
        tick_player(&mut p, hold(Buttons { left: true, ..NONE }), &rig.ctx(16.0));
        assert_eq!(p.facing, Facing::Left);
        tick_player(&mut p, ControlIntent::idle(), &rig.ctx(16.0));
        assert_eq!(p.facing, Facing::Left);
    }
}
