/// Gamepad input tracker using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Movement
///   A / L1                →  Jump
///   B / X / R1            →  Fire grapple
///   Start                 →  Skip level intro
///   Select                →  Quit

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::domain::control::Buttons;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,      // LeftTrigger
    R1,      // RightTrigger
    L2,      // LeftTrigger2
    R2,      // RightTrigger2
    Start,
    Select,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "L2" | "LT" | "LEFTTRIGGER2"  => Some(Btn::L2),
            "R2" | "RT" | "RIGHTTRIGGER2" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            _ => None,
        }
    }
}

/// `just_pressed` lives for one `update()`.
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

/// Which physical buttons drive each action.
struct ActionMap {
    jump: Vec<Btn>,
    fire: Vec<Btn>,
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            jump:    vec![Btn::A, Btn::L1],
            fire:    vec![Btn::B, Btn::X, Btn::R1],
            confirm: vec![Btn::Start],
            cancel:  vec![Btn::Select],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [BtnState; 10],

    /// D-pad directions; only the four movement fields are used.
    dpad: Buttons,
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,

    pub connected: bool,
}

fn btn_index(btn: Btn) -> usize {
    btn as usize
}

fn parse_list(names: &[String]) -> Vec<Btn> {
    names.iter().filter_map(|s| {
        let btn = Btn::from_name(s);
        if btn.is_none() {
            tracing::warn!(button = %s, "unknown gamepad button name");
        }
        btn
    }).collect()
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = {
            match Gilrs::new() {
                Ok(g) => {
                    let has_pad = g.gamepads().next().is_some();
                    (Some(g), has_pad)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "gamepad support unavailable");
                    (None, false)
                }
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            buttons: [BtnState::default(); 10],
            dpad: Buttons::default(),
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Load button mapping from config. Empty or unparsable lists keep
    /// the default binding for that action.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        let map = &mut self.action_map;
        let jump = parse_list(&cfg.jump);
        if !jump.is_empty() { map.jump = jump; }
        let fire = parse_list(&cfg.fire);
        if !fire.is_empty() { map.fire = fire; }
        let confirm = parse_list(&cfg.confirm);
        if !confirm.is_empty() { map.confirm = confirm; }
        let cancel = parse_list(&cfg.cancel);
        if !cancel.is_empty() { map.cancel = cancel; }
    }

    pub fn update(&mut self) {
        for b in &mut self.buttons { b.just_pressed = false; }

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, false);
                }
                EventType::AxisChanged(axis, value, _) => {
                    self.connected = true;
                    match axis {
                        Axis::LeftStickX => self.stick_x = value,
                        Axis::LeftStickY => self.stick_y = value,
                        _ => {}
                    }
                }
                EventType::Connected => {
                    tracing::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    tracing::info!("gamepad disconnected");
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool) {
        let dpad = match gilrs_btn {
            Button::DPadUp => Some(&mut self.dpad.up),
            Button::DPadDown => Some(&mut self.dpad.down),
            Button::DPadLeft => Some(&mut self.dpad.left),
            Button::DPadRight => Some(&mut self.dpad.right),
            _ => None,
        };
        if let Some(dir) = dpad {
            *dir = held;
            return;
        }

        let Some(btn) = Btn::from_gilrs(gilrs_btn) else { return };
        let state = &mut self.buttons[btn_index(btn)];
        state.just_pressed |= held && !state.held;
        state.held = held;
    }

    // ── Action queries (config-driven) ──

    fn any_held(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[btn_index(b)].held)
    }

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[btn_index(b)].just_pressed)
    }

    /// Held state folded into game buttons. Merged with the keyboard by OR.
    pub fn buttons(&self) -> Buttons {
        Buttons {
            up: self.dpad.up || self.stick_y > STICK_DEADZONE,
            down: self.dpad.down || self.stick_y < -STICK_DEADZONE,
            left: self.dpad.left || self.stick_x < -STICK_DEADZONE,
            right: self.dpad.right || self.stick_x > STICK_DEADZONE,
            jump: self.any_held(&self.action_map.jump),
            fire: self.any_held(&self.action_map.fire),
        }
    }

    pub fn confirm_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.confirm)
    }
    pub fn cancel_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.cancel)
    }

    // ── Internal ──

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.buttons = [BtnState::default(); 10];
        self.dpad = Buttons::default();
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}
