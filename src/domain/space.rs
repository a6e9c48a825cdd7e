use std::fmt;

#[cfg(feature = "json_export")]
use json::JsonValue;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
/// Point in 2D Space
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.x, self.y)
    }
}

#[cfg(feature = "json_export")]
impl From<Point> for JsonValue {
    fn from(p: Point) -> Self {
        JsonValue::from(vec![p.x, p.y])
    }
}

/// Quadrant of a child `Cell` following a refinement (from the parent `Cell`'s perspective)
///
/// ```text
///     -------------
///     | NW  | NE  |
///     |  2  |  3  |
///     -------------
///     | SW  | SE  |
///     |  0  |  1  |
///     -------------
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    /// south west
    SW,
    /// south east
    SE,
    /// north west
    NW,
    /// north east
    NE,
}

impl Quadrant {
    /// All quadrants in child storage order
    pub const ALL: [Self; 4] = [Self::SW, Self::SE, Self::NW, Self::NE];

    pub fn index(&self) -> usize {
        match self {
            Self::SW => 0,
            Self::SE => 1,
            Self::NW => 2,
            Self::NE => 3,
        }
    }

    /// The bounds `[x_start, y_start, x_end, y_end]` of this quadrant within a parent's bounds
    pub fn sub_bounds(&self, [x0, y0, x1, y1]: [f64; 4]) -> [f64; 4] {
        let x_mid = (x0 + x1) / 2.0;
        let y_mid = (y0 + y1) / 2.0;

        match self {
            Self::SW => [x0, y0, x_mid, y_mid],
            Self::SE => [x_mid, y0, x1, y_mid],
            Self::NW => [x0, y_mid, x_mid, y1],
            Self::NE => [x_mid, y_mid, x1, y1],
        }
    }
}

/// One of the four sides of a `Cell` or a grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Right,
    Left,
}

impl Side {
    pub const ALL: [Self; 4] = [Self::Top, Self::Bottom, Self::Right, Self::Left];

    pub fn index(&self) -> usize {
        match self {
            Self::Top => 0,
            Self::Bottom => 1,
            Self::Right => 2,
            Self::Left => 3,
        }
    }

    /// The two child quadrants which share this side with their parent
    pub fn quadrants(&self) -> [Quadrant; 2] {
        match self {
            Self::Top => [Quadrant::NW, Quadrant::NE],
            Self::Bottom => [Quadrant::SW, Quadrant::SE],
            Self::Right => [Quadrant::SE, Quadrant::NE],
            Self::Left => [Quadrant::SW, Quadrant::NW],
        }
    }

    /// Does this side run parallel to the x-axis
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    /// Point `(xi, eta)` in the reference square on this side, at position `t` along it
    pub fn reference_point(&self, t: f64) -> (f64, f64) {
        match self {
            Self::Top => (t, 1.0),
            Self::Bottom => (t, -1.0),
            Self::Right => (1.0, t),
            Self::Left => (-1.0, t),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
            Self::Right => write!(f, "right"),
            Self::Left => write!(f, "left"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrant_sub_bounds_tile_parent() {
        let parent = [1.0, 1.0, 5.0, 3.0];
        let expected = [
            [1.0, 1.0, 3.0, 2.0],
            [3.0, 1.0, 5.0, 2.0],
            [1.0, 2.0, 3.0, 3.0],
            [3.0, 2.0, 5.0, 3.0],
        ];

        for (quad, exp) in Quadrant::ALL.iter().zip(expected.iter()) {
            assert_eq!(quad.sub_bounds(parent), *exp);
            assert_eq!(Quadrant::ALL[quad.index()], *quad);
        }
    }

    #[test]
    fn side_quadrants_touch_side() {
        for side in Side::ALL {
            for quad in side.quadrants() {
                let [x0, y0, x1, y1] = quad.sub_bounds([0.0, 0.0, 2.0, 2.0]);
                let touches = match side {
                    Side::Top => y1 == 2.0,
                    Side::Bottom => y0 == 0.0,
                    Side::Right => x1 == 2.0,
                    Side::Left => x0 == 0.0,
                };
                assert!(touches, "{:?} does not touch the {} side", quad, side);
            }
        }
    }
}
