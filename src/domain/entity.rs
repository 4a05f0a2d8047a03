/// Actors: the player, explosion debris, and what they report outward.
///
/// Actors never talk to audio or the session directly. The player's tick
/// produces `CueCommand`s and a flushed contact map; the sim layer turns
/// those into events.

use crate::config::{GrappleConfig, PhysicsConfig};

use super::grapple::Grapple;
use super::movement::MoveState;
use super::physics::{Axis, Body};
use super::registry::ActorId;
use super::tile::TileGrid;

pub const PLAYER_WIDTH: f64 = 30.0;
pub const PLAYER_HEIGHT: f64 = 62.0;
pub const PARTICLE_SIZE: f64 = 10.0;
pub const PARTICLE_TTL_MS: f64 = 5000.0;
pub const FRAME_MS: f64 = 60.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    pub fn sign(self) -> f64 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Named audio cues. Playback is someone else's problem.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Cue {
    Jump,
    Land,
    Run,
    Explosion,
    Clink,
    Jet,
}

impl Cue {
    pub const ALL: [Cue; 6] = [Cue::Jump, Cue::Land, Cue::Run, Cue::Explosion, Cue::Clink, Cue::Jet];

    pub fn name(self) -> &'static str {
        match self {
            Cue::Jump => "jump",
            Cue::Land => "land",
            Cue::Run => "run",
            Cue::Explosion => "explosion",
            Cue::Clink => "clink",
            Cue::Jet => "jet",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CueCommand {
    Play(Cue),
    StartLoop(Cue),
    StopLoop(Cue),
}

// ── Animation ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnimationKind {
    Idle,
    Run,
    Jump,
    JumpUp,
    Falling,
    FallingUp,
    Wallslide,
    LedgeGrab,
    Jetpack,
    Swinging,
}

impl AnimationKind {
    pub fn frame_count(self) -> usize {
        match self {
            AnimationKind::Run => 12,
            AnimationKind::Jump | AnimationKind::Jetpack => 10,
            AnimationKind::JumpUp => 8,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AnimationKind::Idle => "idle",
            AnimationKind::Run => "run",
            AnimationKind::Jump => "jump",
            AnimationKind::JumpUp => "jumpup",
            AnimationKind::Falling => "falling",
            AnimationKind::FallingUp => "fallingup",
            AnimationKind::Wallslide => "wallslide",
            AnimationKind::LedgeGrab => "ledgegrab",
            AnimationKind::Jetpack => "jetpack",
            AnimationKind::Swinging => "swinging",
        }
    }
}

/// Frame cursor: shows a new frame every `FRAME_MS`, or immediately when
/// the movement state changes (which also rewinds to frame 0).
#[derive(Clone, Debug)]
pub struct Animation {
    pub kind: AnimationKind,
    /// Frame currently on screen.
    pub frame: usize,
    next: usize,
    delay: f64,
}

impl Animation {
    pub fn new() -> Self {
        Animation { kind: AnimationKind::Idle, frame: 0, next: 0, delay: 0.0 }
    }

    /// Returns true when a new frame was put on screen this tick.
    pub fn advance(&mut self, kind: AnimationKind, interval: f64, state_changed: bool) -> bool {
        self.kind = kind;
        self.delay += interval;
        if self.delay <= FRAME_MS && !state_changed {
            return false;
        }
        self.delay = 0.0;
        if self.next >= kind.frame_count() || state_changed {
            self.next = 0;
        }
        self.frame = self.next;
        self.next += 1;
        true
    }
}

impl Default for Animation {
    fn default() -> Self { Self::new() }
}

// ── Player ──

#[derive(Clone, Debug)]
pub struct Player {
    pub body: Body,
    pub state: MoveState,
    pub facing: Facing,
    /// Side of the wall while in Wallslide / LedgeGrab.
    pub wall_right: bool,
    /// Remaining reduced-gravity hang time after a jump.
    pub jump_charge: f64,
    /// Last jump was straight up (picks the jump-up animation).
    pub upjump: bool,
    pub grab_potential: bool,
    pub has_jetpack: bool,
    pub has_grapple: bool,
    pub jetpack_charge: f64,
    pub grapple: Grapple,
    pub animation: Animation,
    pub alive: bool,
    pub jet_loop: bool,
}

impl Player {
    pub fn new(id: ActorId, x: f64, y: f64, physics: &PhysicsConfig, rope: &GrappleConfig) -> Self {
        let body = Body::new(
            x, y, PLAYER_WIDTH, PLAYER_HEIGHT,
            physics.gravity, physics.terminal_velocity,
        );
        let grapple = Grapple::new(id, body.center_x(), body.center_y(), rope);
        Player {
            body,
            state: MoveState::Falling,
            facing: Facing::Right,
            wall_right: true,
            jump_charge: 0.0,
            upjump: false,
            grab_potential: false,
            has_jetpack: false,
            has_grapple: false,
            jetpack_charge: 0.0,
            grapple,
            animation: Animation::new(),
            alive: true,
            jet_loop: false,
        }
    }

    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.body.center_x(), self.body.center_y())
    }

    /// Put the player back in play at a spawn point. Capabilities and the
    /// jetpack charge survive; motion state does not.
    pub fn reposition(&mut self, x: f64, y: f64) {
        self.body.x = x;
        self.body.y = y;
        self.body.vx = 0.0;
        self.body.vy = 0.0;
        self.body.flush_contacts();
        self.state = MoveState::Falling;
        self.jump_charge = 0.0;
        self.upjump = false;
        self.grab_potential = false;
        let (cx, cy) = self.center();
        self.grapple.reset(cx, cy);
        self.alive = true;
    }

    /// Take the player out of play. Velocity is zeroed, the grapple dropped.
    pub fn kill(&mut self) {
        self.body.vx = 0.0;
        self.body.vy = 0.0;
        let (cx, cy) = self.center();
        self.grapple.reset(cx, cy);
        self.alive = false;
    }
}

// ── Particles ──

/// Debris: gravity plus a stop-on-contact rule, no state machine.
#[derive(Clone, Debug)]
pub struct ParticleActor {
    pub body: Body,
    pub ttl: f64,
}

impl ParticleActor {
    pub fn new(cx: f64, cy: f64, vx: f64, vy: f64, physics: &PhysicsConfig) -> Self {
        let mut body = Body::new(
            cx, cy, PARTICLE_SIZE, PARTICLE_SIZE,
            physics.gravity, physics.terminal_velocity,
        );
        body.vx = vx;
        body.vy = vy;
        ParticleActor { body, ttl: PARTICLE_TTL_MS }
    }

    /// Advance one tick. Returns false once the particle has expired.
    ///
    /// Contact is tested at the current rectangle before moving: touching a
    /// solid tile on the leading side stops the particle dead.
    pub fn update(&mut self, grid: &TileGrid, interval: f64) -> bool {
        self.ttl -= interval;
        if self.ttl < 0.0 {
            return false;
        }
        let b = &mut self.body;
        b.apply_gravity(interval);
        b.vx = b.vx.clamp(-b.terminal_velocity, b.terminal_velocity);

        let rect = b.rect();
        let tiles = grid.rect_query(&rect);
        let push_x = super::physics::resolve_axis(&rect, b.vx, &tiles, Axis::X);
        let push_y = super::physics::resolve_axis(&rect, b.vy, &tiles, Axis::Y);
        if push_x != 0.0 || push_y != 0.0 {
            b.vx = 0.0;
            b.vy = 0.0;
        }
        b.x += b.vx * interval;
        b.y += b.vy * interval;
        true
    }
}

/// Small LCG for debris scatter, reproducible from a seed.
#[derive(Clone, Debug)]
pub struct DebrisRng {
    state: u32,
}

impl DebrisRng {
    pub fn new(seed: u32) -> Self {
        DebrisRng { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state
    }

    /// Uniform integer in `lo..hi` (half-open).
    pub fn range(&mut self, lo: i32, hi: i32) -> i32 {
        let span = (hi - lo).max(1) as u32;
        lo + ((self.next_u32() >> 16) % span) as i32
    }

    /// Launch velocity for one piece of debris.
    pub fn debris_velocity(&mut self) -> (f64, f64) {
        let vx = self.range(-3, 3) as f64 * 0.1;
        let vy = self.range(1, 10) as f64 * 0.1;
        (vx, vy)
    }
}

/// Everything the registry can hold.
#[derive(Clone, Debug)]
pub enum Actor {
    Player(Box<Player>),
    Particle(ParticleActor),
}

impl Actor {
    pub fn body(&self) -> &Body {
        match self {
            Actor::Player(p) => &p.body,
            Actor::Particle(p) => &p.body,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Actor::Player(p) => Some(p),
            Actor::Particle(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Actor::Player(p) => Some(p),
            Actor::Particle(_) => None,
        }
    }
}
