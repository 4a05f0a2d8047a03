/// Control intent: what the player is asking for this tick.
///
/// Held buttons are level-sensitive. Taps are one-tick rising edges, produced
/// by `EdgeDetector` from the previous and current button snapshots, and are
/// consumed through the `take_*` methods so a single press drives at most one
/// state transition.

/// Raw held state of the logical buttons, as sampled by the input layer.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Buttons {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub fire: bool,
}

impl Buttons {
    /// Everything that is held now and was not held in `prev`.
    pub fn rising_from(&self, prev: &Buttons) -> Buttons {
        Buttons {
            up: (self.up ^ prev.up) & self.up,
            down: (self.down ^ prev.down) & self.down,
            left: (self.left ^ prev.left) & self.left,
            right: (self.right ^ prev.right) & self.right,
            jump: (self.jump ^ prev.jump) & self.jump,
            fire: (self.fire ^ prev.fire) & self.fire,
        }
    }
}

/// Developer toggle carried alongside the intent.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DebugRequest {
    FreeMoveOn,
    FreeMoveOff,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct ControlIntent {
    pub move_x: i8,
    pub move_y: i8,
    pub hold_jump: bool,
    pub hold_fire: bool,
    taps: Buttons,
    pub debug: Option<DebugRequest>,
}

impl ControlIntent {
    /// Intent with no buttons and no taps (control withheld).
    pub fn idle() -> Self {
        ControlIntent::default()
    }

    /// Build from held buttons plus the edges already computed for them.
    pub fn from_buttons(held: &Buttons, taps: Buttons) -> Self {
        ControlIntent {
            move_x: held.right as i8 - held.left as i8,
            move_y: held.up as i8 - held.down as i8,
            hold_jump: held.jump,
            hold_fire: held.fire,
            taps,
            debug: None,
        }
    }

    pub fn tapped_jump(&self) -> bool { self.taps.jump }

    pub fn take_jump(&mut self) -> bool {
        std::mem::take(&mut self.taps.jump)
    }

    pub fn take_fire(&mut self) -> bool {
        std::mem::take(&mut self.taps.fire)
    }

    /// Either vertical tap, consuming both.
    pub fn take_vertical(&mut self) -> bool {
        let up = std::mem::take(&mut self.taps.up);
        let down = std::mem::take(&mut self.taps.down);
        up || down
    }
}

/// Shared rising-edge detector: remembers the previous snapshot only.
#[derive(Clone, Copy, Default, Debug)]
pub struct EdgeDetector {
    prev: Buttons,
}

impl EdgeDetector {
    pub fn new() -> Self {
        EdgeDetector::default()
    }

    /// Produce this tick's intent and remember `now` for the next one.
    pub fn sample(&mut self, now: Buttons) -> ControlIntent {
        let taps = now.rising_from(&self.prev);
        self.prev = now;
        ControlIntent::from_buttons(&now, taps)
    }

    /// Forget history, e.g. while control is withheld, so a button held
    /// through a cutscene does not fire when control returns.
    pub fn hold_all(&mut self, now: Buttons) {
        self.prev = now;
    }
}
