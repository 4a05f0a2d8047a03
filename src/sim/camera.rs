/// Camera: a rate-limited follower with zoom transitions.
///
/// ## Coordinates
///
/// `(x, y)` is the bottom-left of the unzoomed view rectangle in world
/// units; `(w, h)` its size. `zoom` shrinks (> 1) or grows (< 1) the visible
/// rectangle around the same centre, see `view_rect`.
///
/// ## Following
///
/// The camera never snaps. Each tick it picks a target origin ahead of the
/// subject, derives a maximum velocity proportional to the remaining
/// distance, and accelerates toward it:
///
///   max_v = (target - pos) / 400
///   v    += max_v / 1000 · dt,  |v| capped at |max_v|
///
/// ## Transitions
///
/// - into a level: zoom starts just under 2 and creeps, then eases to 1
///   while the target blends from the frozen anchor to the subject.
/// - out of a level: the anchor is held while zoom falls toward zero.
///
/// Clamping to the level is off for the whole transition.
///
/// The subject is a registry handle. The camera reads it through a
/// `SubjectView` each tick and treats "no view" as "hold still".

use crate::domain::entity::Facing;
use crate::domain::rect::Rect;
use crate::domain::registry::ActorId;

pub const PAGE_SIZE: f64 = 512.0;

const LOOKAHEAD_X: f64 = 400.0;
const LOOKAHEAD_Y: f64 = 500.0;
const LOOKAHEAD_Y_ENTERING: f64 = 300.0;
const FACING_OFFSET: f64 = 128.0;
const VERTICAL_OFFSET: f64 = 64.0;
const MAX_SPEED_DIVISOR: f64 = 400.0;
const ACCEL_DIVISOR: f64 = 1000.0;

const ZOOM_IN_START: f64 = 1.999999999;
const ZOOM_IN_CREEP_UNTIL: f64 = 1.993;
const ZOOM_IN_CREEP: f64 = 500_000.0;
const ZOOM_IN_EASE: f64 = 3000.0;
const ZOOM_OUT_RATE: f64 = 4000.0;
const ZOOM_OUT_FLOOR: f64 = 0.001;
const ZOOM_OUT_DONE: f64 = 0.002;

/// What the camera needs to know about whatever it follows.
#[derive(Clone, Copy, Debug)]
pub struct SubjectView {
    pub center_x: f64,
    pub center_y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Actors without a facing get no horizontal lead.
    pub facing: Option<Facing>,
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub vx: f64,
    pub vy: f64,
    pub zoom: f64,
    pub limit_x: f64,
    pub limit_y: f64,
    pub clamp: bool,
    subject: Option<ActorId>,
    transition_in: bool,
    transition_out: bool,
    anchor_x: f64,
    anchor_y: f64,
}

impl Camera {
    /// Centred on `(cx, cy)`, clamped to `[0, limit]`.
    pub fn new(cx: f64, cy: f64, w: f64, h: f64, limit_x: f64, limit_y: f64) -> Self {
        let mut cam = Camera {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
            vx: 0.0,
            vy: 0.0,
            zoom: 1.0,
            limit_x,
            limit_y,
            clamp: true,
            subject: None,
            transition_in: false,
            transition_out: false,
            anchor_x: 0.0,
            anchor_y: 0.0,
        };
        cam.clamp_to_bounds();
        cam
    }

    pub fn subject(&self) -> Option<ActorId> { self.subject }

    pub fn follow(&mut self, subject: Option<ActorId>) {
        self.subject = subject;
    }

    #[inline]
    pub fn center_x(&self) -> f64 { self.x + self.w / 2.0 }
    #[inline]
    pub fn center_y(&self) -> f64 { self.y + self.h / 2.0 }

    #[cfg(test)]
    pub fn is_transitioning_in(&self) -> bool { self.transition_in }
    #[cfg(test)]
    pub fn is_transitioning_out(&self) -> bool { self.transition_out }

    /// The entry zoom has settled at 1.
    pub fn transition_in_complete(&self) -> bool {
        self.transition_in && self.zoom <= 1.0
    }

    pub fn transition_out_complete(&self) -> bool {
        self.transition_out && self.zoom <= ZOOM_OUT_DONE
    }

    pub fn update(&mut self, subject: Option<&SubjectView>, interval: f64) {
        let Some(s) = subject else { return };

        let (target_x, target_y) = if self.transition_in {
            if self.zoom > ZOOM_IN_CREEP_UNTIL {
                self.zoom -= interval / ZOOM_IN_CREEP;
                (self.anchor_x, self.anchor_y)
            } else {
                self.zoom = (self.zoom - interval / ZOOM_IN_EASE).max(1.0);
                (
                    s.center_x + s.vx * LOOKAHEAD_X - self.w / 2.0,
                    s.center_y + s.vy * LOOKAHEAD_Y_ENTERING - self.h / 2.0,
                )
            }
        } else if self.transition_out {
            self.zoom = (self.zoom - interval / ZOOM_OUT_RATE).max(ZOOM_OUT_FLOOR);
            (self.anchor_x, self.anchor_y)
        } else {
            let facing_mod = s.facing.map_or(0.0, |f| f.sign() * FACING_OFFSET);
            let vert_mod = if s.vy > 0.0 {
                VERTICAL_OFFSET
            } else if s.vy < 0.0 {
                -VERTICAL_OFFSET
            } else {
                0.0
            };
            (
                s.center_x + s.vx * LOOKAHEAD_X + facing_mod - self.w / 2.0,
                s.center_y + s.vy * LOOKAHEAD_Y + vert_mod - self.h / 2.0,
            )
        };

        self.vx = approach(self.vx, (target_x - self.x) / MAX_SPEED_DIVISOR, interval);
        self.vy = approach(self.vy, (target_y - self.y) / MAX_SPEED_DIVISOR, interval);
        self.x += self.vx * interval;
        self.y += self.vy * interval;

        if self.clamp {
            self.clamp_to_bounds();
        }
    }

    /// Keep the unzoomed rectangle inside `[0, limit]`. When the level is
    /// smaller than the view, the far edge wins.
    pub fn clamp_to_bounds(&mut self) {
        if self.x < 0.0 {
            self.x = 0.0;
        }
        if self.x + self.w > self.limit_x {
            self.x = self.limit_x - self.w;
        }
        if self.y < 0.0 {
            self.y = 0.0;
        }
        if self.y + self.h > self.limit_y {
            self.y = self.limit_y - self.h;
        }
    }

    /// Page indices (512-unit squares) holding the camera centre.
    pub fn current_page(&self) -> (i64, i64) {
        (
            (self.center_x() / PAGE_SIZE).floor() as i64,
            (self.center_y() / PAGE_SIZE).floor() as i64,
        )
    }

    /// The zoom-adjusted visible rectangle.
    pub fn view_rect(&self) -> Rect {
        let zoom_w = self.w * self.zoom - self.w;
        let zoom_h = self.h * self.zoom - self.h;
        Rect::new(
            self.x + zoom_w / 2.0,
            self.y + zoom_h / 2.0,
            self.w - zoom_w,
            self.h - zoom_h,
        )
    }

    /// Closed-interval test: a sprite touching the view edge is in view.
    pub fn sprite_in_view(&self, sprite: &Rect) -> bool {
        self.view_rect().touches(sprite)
    }

    pub fn start_transition(&mut self, into: bool) {
        if into {
            self.transition_in = true;
            self.zoom = ZOOM_IN_START;
        } else {
            self.transition_out = true;
            self.zoom = 1.0;
        }
        self.anchor_x = self.x;
        self.anchor_y = self.y;
        self.clamp = false;
    }

    pub fn stop_transition(&mut self) {
        self.transition_in = false;
        self.transition_out = false;
        self.zoom = 1.0;
        self.clamp = true;
    }
}

/// Rate-limited step of `v` toward `max_v`.
fn approach(v: f64, max_v: f64, interval: f64) -> f64 {
    let v = v + max_v / ACCEL_DIVISOR * interval;
    if v.abs() > max_v.abs() { max_v } else { v }
}
