//! Common geometry types shared by capture, matching and input synthesis.

use serde::{Deserialize, Serialize};

/// A point in absolute virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle identified by its two corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl Region {
    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Rectangle spanning `width`x`height` with its top-left corner at (`x`, `y`).
    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            top_left: Point::new(x, y),
            bottom_right: Point::new(x + width as i32, y + height as i32),
        }
    }

    pub fn width(&self) -> u32 {
        (self.bottom_right.x - self.top_left.x).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom_right.y - self.top_left.y).max(0) as u32
    }

    /// Midpoint of the rectangle, the point clicks are aimed at.
    pub fn center(&self) -> Point {
        Point::new(
            (self.top_left.x + self.bottom_right.x) / 2,
            (self.top_left.y + self.bottom_right.y) / 2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_center_is_the_midpoint() {
        let region = Region::from_origin_size(100, 200, 120, 40);
        assert_eq!(region.bottom_right, Point::new(220, 240));
        assert_eq!(region.center(), Point::new(160, 220));
        assert_eq!(region.width(), 120);
        assert_eq!(region.height(), 40);
    }
}
