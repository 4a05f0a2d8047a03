/// WorldState: the complete snapshot of a running level.
///
/// ## Actors
///
/// Every moving thing lives in one `Registry<Actor>` and is referred to by
/// `ActorId`. The player is a registry entry like any particle; the session
/// only remembers its handle. A dead player stays registered (its `alive`
/// flag is cleared) so the camera keeps following where it died.
///
/// ## Session
///
/// Checkpoints, respawn timing and the goal latch live in `Session`. The
/// grid is the level as loaded and is never mutated.
///
/// ## Phases
///
/// `TransitionIn` (camera zooming in, control withheld) → `Playing` →
/// `TransitionOut` (goal reached, camera zooming out) → `LevelComplete`.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{GameConfig, GrappleConfig, PhysicsConfig};
use crate::domain::entity::{Actor, DebrisRng, ParticleActor, Player};
use crate::domain::registry::{ActorId, Registry};
use crate::domain::tile::{LoadWarning, TileGrid};

use super::camera::{Camera, SubjectView};
use super::level::Level;

pub const RESPAWN_DELAY_MS: f64 = 2000.0;
pub const EXPLOSION_PARTICLES: usize = 10;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    TransitionIn,
    Playing,
    TransitionOut,
    LevelComplete,
}

#[derive(Clone, Debug)]
pub struct Session {
    /// Checkpoint id → player origin.
    pub spawn_points: BTreeMap<String, (f64, f64)>,
    pub checkpoint: String,
    /// Milliseconds until the dead player reappears; 0 while alive.
    pub respawn_timer: f64,
    pub goal_reached: bool,
    pub deaths: u32,
    /// Unknown checkpoint ids already reported, so each is logged once.
    pub ignored_checkpoints: BTreeSet<String>,
}

impl Session {
    pub fn spawn_point(&self) -> Option<(f64, f64)> {
        self.spawn_points.get(&self.checkpoint).copied()
    }
}

pub struct WorldState {
    // ── Level ──
    pub grid: TileGrid,
    pub level_name: String,
    pub current_level: usize,
    pub total_levels: usize,
    pub load_warnings: Vec<LoadWarning>,

    // ── Actors ──
    pub actors: Registry<Actor>,
    pub player_id: ActorId,

    // ── Tuning ──
    pub physics: PhysicsConfig,
    pub rope: GrappleConfig,

    // ── Session ──
    pub session: Session,
    pub camera: Camera,
    pub phase: Phase,
    pub rng: DebrisRng,
    pub tick: u64,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
}

impl WorldState {
    /// Place the player at the level's start checkpoint and aim the camera
    /// at it. The level opens with the zoom-in transition running.
    pub fn new(level: Level, config: &GameConfig, current_level: usize, total_levels: usize) -> Self {
        let session = Session {
            spawn_points: level.spawn_points,
            checkpoint: level.start,
            respawn_timer: 0.0,
            goal_reached: false,
            deaths: 0,
            ignored_checkpoints: BTreeSet::new(),
        };
        let (sx, sy) = session.spawn_point().unwrap_or((0.0, 0.0));

        let mut actors = Registry::new();
        let physics = config.physics.clone();
        let rope = config.grapple.clone();
        let player_id = actors.insert_with(|id| {
            let mut p = Player::new(id, sx, sy, &physics, &rope);
            p.has_jetpack = level.jetpack;
            p.has_grapple = level.grapple;
            if p.has_jetpack {
                p.jetpack_charge = physics.jetpack_charge_max;
            }
            Actor::Player(Box::new(p))
        });

        let mut world = WorldState {
            camera: Camera::new(0.0, 0.0, config.camera.view_width, config.camera.view_height,
                                level.grid.width(), level.grid.height()),
            grid: level.grid,
            level_name: level.name,
            current_level,
            total_levels,
            load_warnings: level.warnings,
            actors,
            player_id,
            physics,
            rope,
            session,
            phase: Phase::TransitionIn,
            rng: DebrisRng::new(0x5eed_0001 ^ current_level as u32),
            tick: 0,
            message: String::new(),
            message_timer: 0,
        };

        if let Some((cx, cy)) = world.player().map(Player::center) {
            world.camera = Camera::new(cx, cy, world.camera.w, world.camera.h,
                                       world.grid.width(), world.grid.height());
        }
        world.camera.follow(Some(player_id));
        world.camera.start_transition(true);
        let name = world.level_name.clone();
        world.set_message(&name, 120);
        world
    }

    pub fn player(&self) -> Option<&Player> {
        self.actors.get(self.player_id).and_then(Actor::as_player)
    }

    pub fn player_mut(&mut self) -> Option<&mut Player> {
        self.actors.get_mut(self.player_id).and_then(Actor::as_player_mut)
    }

    pub fn particles(&self) -> impl Iterator<Item = &ParticleActor> + '_ {
        self.actors.iter().filter_map(|(_, a)| match a {
            Actor::Particle(p) => Some(p),
            Actor::Player(_) => None,
        })
    }

    /// Scatter debris from a point.
    pub fn spawn_explosion(&mut self, cx: f64, cy: f64) {
        for _ in 0..EXPLOSION_PARTICLES {
            let (vx, vy) = self.rng.debris_velocity();
            let p = ParticleActor::new(cx, cy, vx, vy, &self.physics);
            self.actors.insert(Actor::Particle(p));
        }
        tracing::debug!(x = cx, y = cy, actors = self.actors.len(), "explosion spawned");
    }

    /// What the camera sees of its subject, if that actor still exists.
    pub fn subject_view(&self) -> Option<SubjectView> {
        let actor = self.actors.get(self.camera.subject()?)?;
        let b = actor.body();
        Some(SubjectView {
            center_x: b.center_x(),
            center_y: b.center_y(),
            vx: b.vx,
            vy: b.vy,
            facing: actor.as_player().map(|p| p.facing),
        })
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }
}

#[cfg(test)]
pub(crate) fn world_from(rows: &[&str], jetpack: bool, grapple: bool) -> WorldState {
    use super::level::{build_level, LevelDef};
    let def = LevelDef {
        name: "Test".into(),
        rows: rows.iter().map(|r| r.to_string()).collect(),
        regions: vec![],
        jetpack,
        grapple,
    };
    let level = build_level(&def).expect("test level");
    WorldState::new(level, &GameConfig::load_from(&[]), 0, 1)
}
