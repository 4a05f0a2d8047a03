/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to the built-in tuning if the file is missing, unreadable,
/// or incomplete; a bad config never stops the game.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub grapple: GrappleConfig,
    pub camera: CameraConfig,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
    pub frame_ms: u64,
    pub start_level: usize,
}

/// Player and actor tuning. Units are world units and milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    pub gravity: f64,
    pub terminal_velocity: f64,
    pub jump_velocity: f64,
    pub jump_charge_ms: f64,       // reduced-gravity window after a jump
    pub run_accel: f64,
    pub run_speed: f64,
    pub jetpack_charge_max: f64,
    pub jetpack_tap_threshold: f64,
    pub jetpack_tap_cost: f64,
    pub jetpack_thrust: f64,
    pub jetpack_penalty: f64,      // charge after running dry (negative)
    pub wall_probe: f64,           // distance from centre to the wall probe
    pub max_interval_ms: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GrappleConfig {
    pub min_length: f64,
    pub max_length: f64,
    pub travel_speed: f64,
    pub reel_speed: f64,
    pub swing_pump: f64,           // degrees per ms per unit of move_x
    pub ground_release_boost: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub view_width: f64,
    pub view_height: f64,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub jump: Vec<String>,
    pub fire: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    physics: TomlPhysics,
    #[serde(default)]
    grapple: TomlGrapple,
    #[serde(default)]
    camera: TomlCamera,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlPhysics {
    #[serde(default = "default_gravity")]
    gravity: f64,
    #[serde(default = "default_terminal_velocity")]
    terminal_velocity: f64,
    #[serde(default = "default_jump_velocity")]
    jump_velocity: f64,
    #[serde(default = "default_jump_charge")]
    jump_charge_ms: f64,
    #[serde(default = "default_run_accel")]
    run_accel: f64,
    #[serde(default = "default_run_speed")]
    run_speed: f64,
    #[serde(default = "default_jetpack_max")]
    jetpack_charge_max: f64,
    #[serde(default = "default_jetpack_threshold")]
    jetpack_tap_threshold: f64,
    #[serde(default = "default_jetpack_cost")]
    jetpack_tap_cost: f64,
    #[serde(default = "default_jetpack_thrust")]
    jetpack_thrust: f64,
    #[serde(default = "default_jetpack_penalty")]
    jetpack_penalty: f64,
    #[serde(default = "default_wall_probe")]
    wall_probe: f64,
    #[serde(default = "default_max_interval")]
    max_interval_ms: f64,
}

#[derive(Deserialize, Debug)]
struct TomlGrapple {
    #[serde(default = "default_rope_min")]
    min_length: f64,
    #[serde(default = "default_rope_max")]
    max_length: f64,
    #[serde(default = "default_travel_speed")]
    travel_speed: f64,
    #[serde(default = "default_reel_speed")]
    reel_speed: f64,
    #[serde(default = "default_swing_pump")]
    swing_pump: f64,
    #[serde(default = "default_release_boost")]
    ground_release_boost: f64,
}

#[derive(Deserialize, Debug)]
struct TomlCamera {
    #[serde(default = "default_view_width")]
    view_width: f64,
    #[serde(default = "default_view_height")]
    view_height: f64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_pad_jump")]
    jump: Vec<String>,
    #[serde(default = "default_pad_fire")]
    fire: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
    #[serde(default)]
    start_level: usize,
}

// ── Defaults ──

fn default_gravity() -> f64 { 0.0019 }
fn default_terminal_velocity() -> f64 { 1.0 }
fn default_jump_velocity() -> f64 { 0.5 }
fn default_jump_charge() -> f64 { 200.0 }
fn default_run_accel() -> f64 { 0.002 }
fn default_run_speed() -> f64 { 0.42 }
fn default_jetpack_max() -> f64 { 1000.0 }   // ms of thrust
fn default_jetpack_threshold() -> f64 { 500.0 }
fn default_jetpack_cost() -> f64 { 50.0 }
fn default_jetpack_thrust() -> f64 { 0.004 }
fn default_jetpack_penalty() -> f64 { -200.0 }
fn default_wall_probe() -> f64 { 16.0 }
fn default_max_interval() -> f64 { 50.0 }

fn default_rope_min() -> f64 { 16.0 }
fn default_rope_max() -> f64 { 256.0 }
fn default_travel_speed() -> f64 { 1.0 }
fn default_reel_speed() -> f64 { 0.2 }
fn default_swing_pump() -> f64 { 0.001 }
fn default_release_boost() -> f64 { 0.1 }

fn default_view_width() -> f64 { 800.0 }
fn default_view_height() -> f64 { 600.0 }

fn default_pad_jump() -> Vec<String> { vec!["A".into(), "L1".into()] }
fn default_pad_fire() -> Vec<String> { vec!["B".into(), "X".into(), "R1".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_levels_dir() -> String { "levels".into() }
fn default_frame_ms() -> u64 { 16 }

impl Default for TomlPhysics {
    fn default() -> Self {
        TomlPhysics {
            gravity: default_gravity(),
            terminal_velocity: default_terminal_velocity(),
            jump_velocity: default_jump_velocity(),
            jump_charge_ms: default_jump_charge(),
            run_accel: default_run_accel(),
            run_speed: default_run_speed(),
            jetpack_charge_max: default_jetpack_max(),
            jetpack_tap_threshold: default_jetpack_threshold(),
            jetpack_tap_cost: default_jetpack_cost(),
            jetpack_thrust: default_jetpack_thrust(),
            jetpack_penalty: default_jetpack_penalty(),
            wall_probe: default_wall_probe(),
            max_interval_ms: default_max_interval(),
        }
    }
}

impl Default for TomlGrapple {
    fn default() -> Self {
        TomlGrapple {
            min_length: default_rope_min(),
            max_length: default_rope_max(),
            travel_speed: default_travel_speed(),
            reel_speed: default_reel_speed(),
            swing_pump: default_swing_pump(),
            ground_release_boost: default_release_boost(),
        }
    }
}

impl Default for TomlCamera {
    fn default() -> Self {
        TomlCamera {
            view_width: default_view_width(),
            view_height: default_view_height(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            jump: default_pad_jump(),
            fire: default_pad_fire(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            frame_ms: default_frame_ms(),
            start_level: 0,
        }
    }
}

// ── Schema → public structs ──

/// Magnitude of `value`, or `default` when it is not a finite number.
/// Used for values that end up as `clamp` bounds.
fn magnitude_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value.abs()
    } else {
        tracing::warn!(value, default, "non-finite config value replaced by default");
        default
    }
}

impl From<TomlPhysics> for PhysicsConfig {
    fn from(t: TomlPhysics) -> Self {
        PhysicsConfig {
            gravity: t.gravity,
            terminal_velocity: magnitude_or(t.terminal_velocity, default_terminal_velocity()),
            jump_velocity: t.jump_velocity,
            jump_charge_ms: t.jump_charge_ms,
            run_accel: t.run_accel,
            run_speed: magnitude_or(t.run_speed, default_run_speed()),
            jetpack_charge_max: t.jetpack_charge_max,
            jetpack_tap_threshold: t.jetpack_tap_threshold,
            jetpack_tap_cost: t.jetpack_tap_cost,
            jetpack_thrust: t.jetpack_thrust,
            jetpack_penalty: t.jetpack_penalty,
            wall_probe: t.wall_probe,
            max_interval_ms: magnitude_or(t.max_interval_ms, default_max_interval()),
        }
    }
}

impl From<TomlGrapple> for GrappleConfig {
    fn from(t: TomlGrapple) -> Self {
        // A rope whose bounds cross would make the clamp panic.
        let min_length = magnitude_or(t.min_length, default_rope_min());
        let max_length = magnitude_or(t.max_length, default_rope_max()).max(min_length);
        GrappleConfig {
            min_length,
            max_length,
            travel_speed: t.travel_speed,
            reel_speed: t.reel_speed,
            swing_pump: t.swing_pump,
            ground_release_boost: t.ground_release_boost,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self { TomlPhysics::default().into() }
}

impl Default for GrappleConfig {
    fn default() -> Self { TomlGrapple::default().into() }
}

impl Default for CameraConfig {
    fn default() -> Self {
        let t = TomlCamera::default();
        CameraConfig { view_width: t.view_width, view_height: t.view_height }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) `~/.local/share/grapplebot`.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        Self::load_from(&candidate_dirs())
    }

    pub fn load_from(search_dirs: &[PathBuf]) -> Self {
        let toml_cfg = load_toml(search_dirs);

        // Resolve levels directory
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if Path::new(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            physics: toml_cfg.physics.into(),
            grapple: toml_cfg.grapple.into(),
            camera: CameraConfig {
                view_width: toml_cfg.camera.view_width,
                view_height: toml_cfg.camera.view_height,
            },
            gamepad: GamepadConfig {
                jump: toml_cfg.gamepad.jump,
                fire: toml_cfg.gamepad.fire,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
            },
            levels_dir,
            frame_ms: toml_cfg.general.frame_ms.max(1),
            start_level: toml_cfg.general.start_level,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::load_from(&[])
    }
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/grapplebot)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/grapplebot");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e,
                            "config.toml parse error, using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read config");
                }
            }
        }
    }
    TomlConfig::default()
}
