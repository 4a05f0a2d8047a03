/// Axis-aligned rectangle in world units.
///
/// Origin is bottom-left and y grows upward, so `top = y + h`.

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect { x, y, w, h }
    }

    #[inline]
    pub fn left(&self) -> f64 { self.x }
    #[inline]
    pub fn right(&self) -> f64 { self.x + self.w }
    #[inline]
    pub fn bottom(&self) -> f64 { self.y }
    #[inline]
    pub fn top(&self) -> f64 { self.y + self.h }
    #[inline]
    pub fn center_x(&self) -> f64 { self.x + self.w / 2.0 }
    #[inline]
    pub fn center_y(&self) -> f64 { self.y + self.h / 2.0 }

    /// Closed-interval overlap: rectangles that merely touch count.
    /// Used for visibility, where an edge-on sprite should still draw.
    pub fn touches(&self, other: &Rect) -> bool {
        self.right() >= other.left()
            && self.left() <= other.right()
            && self.bottom() <= other.top()
            && self.top() >= other.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_and_center() {
        let r = Rect::new(10.0, 20.0, 30.0, 62.0);
        assert_eq!(r.right(), 40.0);
        assert_eq!(r.top(), 82.0);
        assert_eq!(r.center_x(), 25.0);
        assert_eq!(r.center_y(), 51.0);
    }

    #[test]
    fn shared_edge_touches() {
        let a = Rect::new(0.0, 0.0, 32.0, 32.0);
        let b = Rect::new(32.0, 0.0, 32.0, 32.0);
        assert!(a.touches(&b));
        assert!(!a.touches(&Rect::new(33.0, 0.0, 32.0, 32.0)));
    }
}
