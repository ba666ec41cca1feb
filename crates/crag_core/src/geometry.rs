//! Axis-aligned rectangles in a y-down world (origin top-left).
//!
//! Overlap is strict: rectangles that merely share an edge do not overlap.
//! The collision resolver depends on this so a body resting flush against a
//! wall can slide along it without re-triggering the wall every frame.

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Overlapping region of two rectangles, `None` when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.overlaps(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Some(Rect::new(x, y, right - x, bottom - y))
    }

    /// Half-open containment: the left/top edges are inside, right/bottom are not.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_overlap() {
        let floor = Rect::new(0.0, 400.0, 200.0, 200.0);
        let body = Rect::new(0.0, 360.0, 40.0, 40.0);
        assert!(!body.overlaps(&floor));
        assert!(body.translated(0.0, 0.5).overlaps(&floor));
    }

    #[test]
    fn intersection_matches_overlap_region() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(6.0, 8.0, 10.0, 10.0);
        let hit = a.intersection(&b).expect("rects overlap");
        assert_eq!(hit, Rect::new(6.0, 8.0, 4.0, 2.0));
        assert!(a.intersection(&Rect::new(10.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn contains_point_is_half_open() {
        let button = Rect::new(10.0, 10.0, 100.0, 30.0);
        assert!(button.contains_point(10.0, 10.0));
        assert!(button.contains_point(109.9, 39.9));
        assert!(!button.contains_point(110.0, 20.0));
        assert!(!button.contains_point(50.0, 40.0));
    }

    #[test]
    fn union_spans_both_rects() {
        let a = Rect::new(-15.0, 0.0, 15.0, 15.0);
        let b = Rect::new(30.0, 45.0, 15.0, 15.0);
        assert_eq!(a.union(&b), Rect::new(-15.0, 0.0, 60.0, 60.0));
    }

    #[test]
    fn center_and_edges() {
        let r = Rect::new(20.0, 300.0, 40.0, 40.0);
        assert_eq!(r.right(), 60.0);
        assert_eq!(r.bottom(), 340.0);
        assert_eq!(r.center(), Vec2::new(40.0, 320.0));
        assert_eq!(r.position(), Vec2::new(20.0, 300.0));
    }
}
