/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use config::GameConfig;
use domain::control::EdgeDetector;
use sim::event::GameEvent;
use sim::level::{level_count, load_level};
use sim::step;
use sim::world::{Phase, WorldState};
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const LOG_ENV_VAR: &str = "GRAPPLEBOT_LOG";
const DEFAULT_LOG_FILE: &str = "grapplebot.log";
const FRAME_SLEEP: Duration = Duration::from_millis(2);

fn main() {
    init_tracing();
    let config = GameConfig::load();

    let total_levels = level_count(&config);
    let start = config.start_level.min(total_levels.saturating_sub(1));
    let level = match load_level(&config, start) {
        Ok(level) => level,
        Err(e) => {
            tracing::error!(error = %e, "cannot load first level");
            eprintln!("Cannot load level: {e}");
            std::process::exit(1);
        }
    };
    let mut world = WorldState::new(level, &config, start, total_levels);

    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let mut kb = InputState::new();
    kb.enable_release_events();
    let mut sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, &mut kb, sound.as_mut(), &config);

    kb.restore();

    if let Some(sfx) = sound.as_mut() {
        sfx.stop_all();
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(Outcome::Finished) => {
            println!();
            println!("All {} levels cleared. Thanks for playing Grapplebot!", world.total_levels);
        }
        Ok(Outcome::Quit) => println!(),
        Err(e) => eprintln!("Game error: {e}"),
    }
}

/// Logs go to a file: the terminal is owned by the renderer.
/// `GRAPPLEBOT_LOG` picks the file, `RUST_LOG` the filter.
fn init_tracing() {
    let path = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let Ok(file) = File::create(&path) else { return };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(file))
        .init();
}

enum Outcome {
    Finished,
    Quit,
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    kb: &mut InputState,
    mut sound: Option<&mut SoundEngine>,
    config: &GameConfig,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let mut edges = EdgeDetector::new();
    let frame = Duration::from_millis(config.frame_ms);
    let mut last_tick = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        if kb.quit_pressed() || gp.cancel_pressed() {
            tracing::info!(level = %world.level_name, tick = world.tick, "quit");
            return Ok(Outcome::Quit);
        }
        if kb.skip_pressed() || gp.confirm_pressed() {
            step::skip_transition(world);
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= frame {
            last_tick = Instant::now();

            let mut buttons = kb.buttons();
            let pad = gp.buttons();
            buttons.up |= pad.up;
            buttons.down |= pad.down;
            buttons.left |= pad.left;
            buttons.right |= pad.right;
            buttons.jump |= pad.jump;
            buttons.fire |= pad.fire;

            let mut intent = edges.sample(buttons);
            intent.debug = kb.debug_request();

            let events = step::step(world, intent, elapsed.as_secs_f64() * 1000.0);
            dispatch_events(sound.as_deref_mut(), &events);

            if world.phase == Phase::LevelComplete {
                let next = world.current_level + 1;
                if next >= world.total_levels {
                    return Ok(Outcome::Finished);
                }
                let level = load_level(config, next)?;
                if let Some(sfx) = sound.as_deref_mut() {
                    sfx.stop_all();
                }
                *world = WorldState::new(level, config, next, world.total_levels);
                // Buttons still down from the last level must not read as taps
                edges.hold_all(buttons);
            }
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }
}

fn dispatch_events(mut sound: Option<&mut SoundEngine>, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::Audio(cmd) => {
                if let Some(sfx) = sound.as_deref_mut() {
                    sfx.handle(*cmd);
                }
            }
            GameEvent::GrappleRejected => tracing::debug!("grapple rejected"),
            GameEvent::TransitionFinished => tracing::debug!("level intro finished"),
            _ => {}
        }
    }
}
