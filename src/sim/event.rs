/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and HUD messages; the
/// session-level ones are also what the game loop watches to change level.

use crate::domain::entity::CueCommand;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Audio(CueCommand),
    PlayerKilled { x: f64, y: f64 },
    PlayerRespawned { checkpoint: String },
    CheckpointReached { id: String },
    GoalReached,
    GrappleLatched { x: f64, y: f64 },
    GrappleRejected,
    TransitionFinished,
    LevelComplete,
}
