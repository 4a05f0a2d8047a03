/// Keyboard input tracker.
///
/// Tracks which keys are currently held down and folds them into the
/// simulation's `Buttons`. Edge detection (taps) happens downstream in
/// `EdgeDetector`, so this layer only answers "held right now".
///
/// Default bindings:
///   Arrows / WASD      →  Move
///   Space / Z          →  Jump
///   X / C              →  Fire grapple
///   b / B              →  Free-move on / off (developer)
///   Enter              →  Skip level intro
///   Esc / Ctrl+C       →  Quit
///
/// Release events are used when the terminal supports keyboard
/// enhancement; otherwise a key is released after `HOLD_TIMEOUT` of silence.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};

use crate::domain::control::{Buttons, DebugRequest};

const UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const JUMP: &[KeyCode] = &[KeyCode::Char(' '), KeyCode::Char('z'), KeyCode::Char('Z')];
const FIRE: &[KeyCode] = &[KeyCode::Char('x'), KeyCode::Char('X'), KeyCode::Char('c'), KeyCode::Char('C')];

/// Without release events a key counts as held for this long after its
/// last press or auto-repeat.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct InputState {
    /// Last press/repeat time per key. Presence means "maybe held".
    last_seen: HashMap<KeyCode, Instant>,
    /// Keys that went from released to held in the latest drain.
    pressed_now: Vec<KeyCode>,
    /// Every key event of the latest drain, modifiers included.
    pub raw_events: Vec<KeyEvent>,
    /// Set once the terminal has agreed to report key releases.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_seen: HashMap::with_capacity(16),
            pressed_now: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Ask the terminal for press/release reporting. Must run after raw
    /// mode is on. Returns whether releases will now be reported.
    pub fn enable_release_events(&mut self) -> bool {
        let supported = terminal::supports_keyboard_enhancement().unwrap_or(false);
        self.honor_release = supported
            && execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        tracing::info!(release_events = self.honor_release, "keyboard input ready");
        self.honor_release
    }

    pub fn restore(&mut self) {
        if self.honor_release {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
            self.honor_release = false;
        }
    }

    /// Pull every pending terminal event without blocking. Once per frame.
    pub fn drain_events(&mut self) {
        self.pressed_now.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else { continue };
            self.raw_events.push(key);
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                continue;
            }
            match key.kind {
                KeyEventKind::Release if self.honor_release => {
                    self.last_seen.remove(&key.code);
                }
                // Unreliable without enhancement; the timeout handles it.
                KeyEventKind::Release => {}
                _ => {
                    if !self.is_held(key.code) {
                        self.pressed_now.push(key.code);
                    }
                    self.last_seen.insert(key.code, Instant::now());
                }
            }
        }

        if !self.honor_release {
            let now = Instant::now();
            self.last_seen.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        match self.last_seen.get(&code) {
            Some(_) if self.honor_release => true,
            Some(t) => t.elapsed() < HOLD_TIMEOUT,
            None => false,
        }
    }

    fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|&c| self.is_held(c))
    }

    /// Edge-triggered: true only in the frame the key went down.
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.pressed_now.contains(&code)
    }

    /// Held keys folded into game buttons.
    pub fn buttons(&self) -> Buttons {
        Buttons {
            up: self.any_held(UP),
            down: self.any_held(DOWN),
            left: self.any_held(LEFT),
            right: self.any_held(RIGHT),
            jump: self.any_held(JUMP),
            fire: self.any_held(FIRE),
        }
    }

    /// `b` turns free-move on, shifted `B` turns it off.
    pub fn debug_request(&self) -> Option<DebugRequest> {
        if self.was_pressed(KeyCode::Char('B')) {
            Some(DebugRequest::FreeMoveOff)
        } else if self.was_pressed(KeyCode::Char('b')) {
            Some(DebugRequest::FreeMoveOn)
        } else {
            None
        }
    }

    pub fn skip_pressed(&self) -> bool {
        self.was_pressed(KeyCode::Enter)
    }

    pub fn quit_pressed(&self) -> bool {
        self.was_pressed(KeyCode::Esc) || self.ctrl_c_pressed()
    }

    fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('C'))
        })
    }
}
