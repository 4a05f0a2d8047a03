/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Interval clamp (long frames become one bounded step)
///   2. Player tick (state machine, grapple, axis-separated collision)
///   3. Contact properties (kill, checkpoint, goal)
///   4. Particles (move, expire)
///   5. Respawn timer
///   6. Camera follow
///   7. Transition bookkeeping
///
/// Control is withheld while the level is zooming in: the player still
/// falls and lands, but sees an idle intent.

use crate::domain::control::ControlIntent;
use crate::domain::entity::{Actor, Cue, CueCommand};
use crate::domain::grapple::GrappleSignal;
use crate::domain::movement::{tick_player, TickContext};
use crate::domain::tile::{prop, PropertyMap};
use super::event::GameEvent;
use super::world::{Phase, WorldState, RESPAWN_DELAY_MS};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, intent: ControlIntent, interval_ms: f64) -> Vec<GameEvent> {
    if world.phase == Phase::LevelComplete { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    let dt = interval_ms.clamp(0.0, world.physics.max_interval_ms);
    if dt <= 0.0 { return events; }
    world.tick += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 { world.message.clear(); }
    }

    let intent = if world.phase == Phase::TransitionIn { ControlIntent::idle() } else { intent };

    let contacts = resolve_player(world, intent, dt, &mut events);
    resolve_contacts(world, contacts, &mut events);
    resolve_particles(world, dt);
    resolve_respawn(world, dt, &mut events);
    resolve_camera(world, dt);
    resolve_transitions(world, &mut events);

    events
}

/// Enter pressed during the zoom-in: hand control over immediately.
pub fn skip_transition(world: &mut WorldState) {
    if world.phase != Phase::TransitionIn { return; }
    world.camera.stop_transition();
    world.phase = Phase::Playing;
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

fn resolve_player(
    world: &mut WorldState,
    intent: ControlIntent,
    dt: f64,
    events: &mut Vec<GameEvent>,
) -> PropertyMap {
    let player_id = world.player_id;
    let WorldState { actors, grid, physics, rope, .. } = world;
    let Some(player) = actors.get_mut(player_id).and_then(Actor::as_player_mut) else {
        return PropertyMap::new();
    };

    let ctx = TickContext { grid: &*grid, physics: &*physics, rope: &*rope, interval: dt };
    let report = tick_player(player, intent, &ctx);

    events.extend(report.cues.into_iter().map(GameEvent::Audio));
    match report.grapple {
        GrappleSignal::Latched => {
            if let Some((x, y)) = player.grapple.anchor() {
                tracing::debug!(x, y, "grapple latched");
                events.push(GameEvent::GrappleLatched { x, y });
            }
        }
        GrappleSignal::Rejected => events.push(GameEvent::GrappleRejected),
        GrappleSignal::None | GrappleSignal::ForceGrappling { .. } => {}
    }
    report.contacts
}

// ══════════════════════════════════════════════════════════════
// Contact properties
// ══════════════════════════════════════════════════════════════

fn resolve_contacts(world: &mut WorldState, contacts: PropertyMap, events: &mut Vec<GameEvent>) {
    for (name, value) in contacts {
        match name.as_str() {
            prop::KILL => kill_player(world, events),
            prop::CHECKPOINT => reach_checkpoint(world, value, events),
            prop::GOAL => reach_goal(world, events),
            _ => {}
        }
    }
}

fn kill_player(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let Some(player) = world.player_mut() else { return };
    if !player.alive { return; }
    let (cx, cy) = player.center();
    player.kill();
    if player.jet_loop {
        player.jet_loop = false;
        events.push(GameEvent::Audio(CueCommand::StopLoop(Cue::Jet)));
    }

    world.session.respawn_timer = RESPAWN_DELAY_MS;
    world.session.deaths += 1;
    world.spawn_explosion(cx, cy);
    tracing::info!(x = cx, y = cy, deaths = world.session.deaths, "player killed");
    events.push(GameEvent::Audio(CueCommand::Play(Cue::Explosion)));
    events.push(GameEvent::PlayerKilled { x: cx, y: cy });
}

fn reach_checkpoint(world: &mut WorldState, id: String, events: &mut Vec<GameEvent>) {
    // An empty id is a region placeholder, already reported at load.
    if id.is_empty() || id == world.session.checkpoint { return; }
    if !world.session.spawn_points.contains_key(&id) {
        if world.session.ignored_checkpoints.insert(id.clone()) {
            tracing::warn!(checkpoint = %id, "touched unknown checkpoint, ignored");
        }
        return;
    }
    tracing::info!(checkpoint = %id, "checkpoint reached");
    world.session.checkpoint = id.clone();
    world.set_message("Checkpoint", 60);
    events.push(GameEvent::CheckpointReached { id });
}

fn reach_goal(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if world.session.goal_reached { return; }
    world.session.goal_reached = true;
    if world.phase == Phase::TransitionIn {
        world.camera.stop_transition();
    }
    world.camera.start_transition(false);
    world.phase = Phase::TransitionOut;
    tracing::info!(level = %world.level_name, "goal reached");
    events.push(GameEvent::GoalReached);
}

// ══════════════════════════════════════════════════════════════
// Particles
// ══════════════════════════════════════════════════════════════

fn resolve_particles(world: &mut WorldState, dt: f64) {
    let grid = &world.grid;
    world.actors.retain(|actor| match actor {
        Actor::Particle(p) => p.update(grid, dt),
        Actor::Player(_) => true,
    });
}

// ══════════════════════════════════════════════════════════════
// Respawn
// ══════════════════════════════════════════════════════════════

fn resolve_respawn(world: &mut WorldState, dt: f64, events: &mut Vec<GameEvent>) {
    if world.session.respawn_timer <= 0.0 { return; }
    world.session.respawn_timer -= dt;
    if world.session.respawn_timer > 0.0 { return; }
    world.session.respawn_timer = 0.0;

    let checkpoint = world.session.checkpoint.clone();
    let Some((x, y)) = world.session.spawn_point() else {
        tracing::warn!(checkpoint = %checkpoint, "no spawn point for checkpoint");
        return;
    };
    if let Some(player) = world.player_mut() {
        player.reposition(x, y);
        tracing::info!(checkpoint = %checkpoint, "player respawned");
        events.push(GameEvent::PlayerRespawned { checkpoint });
    }
}

// ══════════════════════════════════════════════════════════════
// Camera and transitions
// ══════════════════════════════════════════════════════════════

fn resolve_camera(world: &mut WorldState, dt: f64) {
    let view = world.subject_view();
    world.camera.update(view.as_ref(), dt);
}

fn resolve_transitions(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    match world.phase {
        Phase::TransitionIn if world.camera.transition_in_complete() => {
            world.camera.stop_transition();
            world.phase = Phase::Playing;
            events.push(GameEvent::TransitionFinished);
        }
        Phase::TransitionOut if world.camera.transition_out_complete() => {
            world.phase = Phase::LevelComplete;
            tracing::info!(level = %world.level_name, ticks = world.tick, "level complete");
            events.push(GameEvent::LevelComplete);
        }
        _ => {}
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
