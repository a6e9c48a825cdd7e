use super::space::Point;
use json::JsonValue;
use std::fmt;
use std::sync::Arc;

/// A region of the plane described by a membership predicate
///
/// Any `Fn(f64, f64) -> bool` is an `ImplicitGeometry`, as is the composable [Geometry] enum.
pub trait ImplicitGeometry {
    /// Is the point `(x, y)` inside the region (boundaries are inside)
    fn evaluate(&self, x: f64, y: f64) -> bool;
}

impl<F> ImplicitGeometry for F
where
    F: Fn(f64, f64) -> bool,
{
    fn evaluate(&self, x: f64, y: f64) -> bool {
        self(x, y)
    }
}

/// Composable implicit geometry
///
/// Primitive shapes can be combined with set operations. Combinators take their operands by value
/// and never mutate them, so a `Geometry` can be cloned and reused across refinement passes.
///
/// ```
/// use quadgrid_2d::{Geometry, ImplicitGeometry};
///
/// // a unit square with a hole of radius 0.25 in the middle
/// let plate = Geometry::rectangle(0.0, 0.0, 1.0, 1.0)
///     .difference(Geometry::circle(0.5, 0.5, 0.25));
///
/// assert!(plate.evaluate(0.1, 0.1));
/// assert!(!plate.evaluate(0.5, 0.5));
/// assert!(!plate.evaluate(1.5, 0.5));
/// ```
#[derive(Clone)]
pub enum Geometry {
    Circle { center: Point, radius: f64 },
    Ellipse { center: Point, semi_axes: [f64; 2] },
    Rectangle { start: Point, end: Point },
    Union(Box<Geometry>, Box<Geometry>),
    Intersection(Box<Geometry>, Box<Geometry>),
    Difference(Box<Geometry>, Box<Geometry>),
    Invert(Box<Geometry>),
    Custom(Arc<dyn Fn(f64, f64) -> bool + Send + Sync>),
}

impl Geometry {
    pub fn circle(x0: f64, y0: f64, radius: f64) -> Self {
        Self::Circle {
            center: Point::new(x0, y0),
            radius,
        }
    }

    /// Axis aligned ellipse with semi-axes `a` (along x) and `b` (along y)
    pub fn ellipse(x0: f64, y0: f64, a: f64, b: f64) -> Self {
        Self::Ellipse {
            center: Point::new(x0, y0),
            semi_axes: [a, b],
        }
    }

    pub fn rectangle(x_start: f64, y_start: f64, x_end: f64, y_end: f64) -> Self {
        Self::Rectangle {
            start: Point::new(x_start, y_start),
            end: Point::new(x_end, y_end),
        }
    }

    /// Everything outside of a circle
    pub fn circular_hole(x0: f64, y0: f64, radius: f64) -> Self {
        Self::circle(x0, y0, radius).invert()
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(f64, f64) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    pub fn union(self, other: Self) -> Self {
        Self::Union(Box::new(self), Box::new(other))
    }

    pub fn intersection(self, other: Self) -> Self {
        Self::Intersection(Box::new(self), Box::new(other))
    }

    /// Points in `self` but not in `other`
    pub fn difference(self, other: Self) -> Self {
        Self::Difference(Box::new(self), Box::new(other))
    }

    pub fn invert(self) -> Self {
        Self::Invert(Box::new(self))
    }

    /// Parse a geometry description from JSON
    ///
    /// ```text
    /// { "type": "circle", "center": [x, y], "radius": r }
    /// { "type": "ellipse", "center": [x, y], "semi_axes": [a, b] }
    /// { "type": "rectangle", "start": [x, y], "end": [x, y] }
    /// { "type": "circular_hole", "center": [x, y], "radius": r }
    /// { "type": "union" | "intersection" | "difference", "a": { ... }, "b": { ... } }
    /// { "type": "invert", "shape": { ... } }
    /// ```
    pub fn from_json(value: &JsonValue) -> Result<Self, GeometryError> {
        let kind = value["type"]
            .as_str()
            .ok_or(GeometryError::MissingType)?;

        match kind {
            "circle" => Ok(Self::Circle {
                center: json_point(value, kind, "center")?,
                radius: json_f64(value, kind, "radius")?,
            }),
            "ellipse" => {
                let semi_axes = json_point(value, kind, "semi_axes")?;
                Ok(Self::Ellipse {
                    center: json_point(value, kind, "center")?,
                    semi_axes: [semi_axes.x, semi_axes.y],
                })
            }
            "rectangle" => Ok(Self::Rectangle {
                start: json_point(value, kind, "start")?,
                end: json_point(value, kind, "end")?,
            }),
            "circular_hole" => {
                let center = json_point(value, kind, "center")?;
                Ok(Self::circular_hole(
                    center.x,
                    center.y,
                    json_f64(value, kind, "radius")?,
                ))
            }
            "union" | "intersection" | "difference" => {
                let a = Self::from_json(json_member(value, kind, "a")?)?;
                let b = Self::from_json(json_member(value, kind, "b")?)?;
                Ok(match kind {
                    "union" => a.union(b),
                    "intersection" => a.intersection(b),
                    _ => a.difference(b),
                })
            }
            "invert" => Ok(Self::from_json(json_member(value, kind, "shape")?)?.invert()),
            other => Err(GeometryError::UnknownType(other.to_string())),
        }
    }
}

impl ImplicitGeometry for Geometry {
    fn evaluate(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Circle { center, radius } => {
                (x - center.x).powi(2) + (y - center.y).powi(2) <= radius.powi(2)
            }
            Self::Ellipse { center, semi_axes } => {
                ((x - center.x) / semi_axes[0]).powi(2) + ((y - center.y) / semi_axes[1]).powi(2)
                    <= 1.0
            }
            Self::Rectangle { start, end } => {
                start.x <= x && x <= end.x && start.y <= y && y <= end.y
            }
            Self::Union(a, b) => a.evaluate(x, y) || b.evaluate(x, y),
            Self::Intersection(a, b) => a.evaluate(x, y) && b.evaluate(x, y),
            Self::Difference(a, b) => a.evaluate(x, y) && !b.evaluate(x, y),
            Self::Invert(a) => !a.evaluate(x, y),
            Self::Custom(predicate) => predicate(x, y),
        }
    }
}

impl fmt::Debug for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Circle { center, radius } => write!(f, "Circle({}, r: {})", center, radius),
            Self::Ellipse { center, semi_axes } => write!(
                f,
                "Ellipse({}, a: {}, b: {})",
                center, semi_axes[0], semi_axes[1]
            ),
            Self::Rectangle { start, end } => write!(f, "Rectangle({} -> {})", start, end),
            Self::Union(a, b) => write!(f, "Union({:?}, {:?})", a, b),
            Self::Intersection(a, b) => write!(f, "Intersection({:?}, {:?})", a, b),
            Self::Difference(a, b) => write!(f, "Difference({:?}, {:?})", a, b),
            Self::Invert(a) => write!(f, "Invert({:?})", a),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

fn json_member<'a>(
    value: &'a JsonValue,
    shape: &str,
    field: &'static str,
) -> Result<&'a JsonValue, GeometryError> {
    if value[field].is_null() {
        Err(GeometryError::MissingField(shape.to_string(), field))
    } else {
        Ok(&value[field])
    }
}

fn json_f64(value: &JsonValue, shape: &str, field: &'static str) -> Result<f64, GeometryError> {
    json_member(value, shape, field)?
        .as_f64()
        .ok_or_else(|| GeometryError::InvalidField(shape.to_string(), field))
}

fn json_point(value: &JsonValue, shape: &str, field: &'static str) -> Result<Point, GeometryError> {
    let member = json_member(value, shape, field)?;
    let invalid = || GeometryError::InvalidField(shape.to_string(), field);

    if !member.is_array() || member.len() != 2 {
        return Err(invalid());
    }

    Ok(Point::new(
        member[0].as_f64().ok_or_else(invalid)?,
        member[1].as_f64().ok_or_else(invalid)?,
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    MissingType,
    UnknownType(String),
    MissingField(String, &'static str),
    InvalidField(String, &'static str),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingType => write!(f, "Geometry has no \"type\"; Cannot parse Geometry!"),
            Self::UnknownType(kind) => write!(f, "Unknown Geometry type \"{}\"; Cannot parse Geometry!", kind),
            Self::MissingField(kind, field) => write!(f, "Geometry \"{}\" is missing \"{}\"; Cannot parse Geometry!", kind, field),
            Self::InvalidField(kind, field) => write!(f, "Geometry \"{}\" has an invalid \"{}\"; Cannot parse Geometry!", kind, field),
        }
    }
}

impl std::error::Error for GeometryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        let circle = Geometry::circle(1.0, 1.0, 1.0);
        assert!(circle.evaluate(1.0, 1.0));
        assert!(circle.evaluate(2.0, 1.0));
        assert!(!circle.evaluate(2.0, 2.0));

        let ellipse = Geometry::ellipse(0.0, 0.0, 2.0, 1.0);
        assert!(ellipse.evaluate(1.9, 0.0));
        assert!(!ellipse.evaluate(0.0, 1.1));

        let rectangle = Geometry::rectangle(0.0, 0.0, 10.0, 2.1);
        assert!(rectangle.evaluate(0.0, 0.0));
        assert!(rectangle.evaluate(10.0, 2.1));
        assert!(!rectangle.evaluate(5.0, 2.2));
        assert!(!rectangle.evaluate(-0.1, 1.0));
    }

    #[test]
    fn set_algebra() {
        let a = Geometry::rectangle(0.0, 0.0, 2.0, 2.0);
        let b = Geometry::rectangle(1.0, 1.0, 3.0, 3.0);

        let union = a.clone().union(b.clone());
        let intersection = a.clone().intersection(b.clone());
        let difference = a.clone().difference(b.clone());
        let outside_a = a.clone().invert();

        assert!(union.evaluate(0.5, 0.5) && union.evaluate(2.5, 2.5));
        assert!(!union.evaluate(2.5, 0.5));

        assert!(intersection.evaluate(1.5, 1.5));
        assert!(!intersection.evaluate(0.5, 0.5));

        assert!(difference.evaluate(0.5, 0.5));
        assert!(!difference.evaluate(1.5, 1.5));

        assert!(outside_a.evaluate(5.0, 5.0));
        assert!(!outside_a.evaluate(1.0, 1.0));

        // operands are left untouched
        assert!(a.evaluate(1.5, 1.5) && b.evaluate(1.5, 1.5));

        let hole = Geometry::circular_hole(0.0, 0.0, 1.0);
        assert!(!hole.evaluate(0.0, 0.0));
        assert!(hole.evaluate(2.0, 0.0));
    }

    #[test]
    fn closures_are_geometry() {
        let upper_half = |_x: f64, y: f64| y >= 0.0;
        assert!(upper_half.evaluate(3.0, 1.0));
        assert!(!upper_half.evaluate(3.0, -1.0));

        let custom = Geometry::custom(move |x, y| x + y <= 1.0).intersection(Geometry::rectangle(0.0, 0.0, 1.0, 1.0));
        assert!(custom.evaluate(0.25, 0.25));
        assert!(!custom.evaluate(0.75, 0.75));
        assert_eq!(format!("{:?}", Geometry::custom(|_, _| true)), "Custom(..)");
    }

    #[test]
    fn geometry_from_json() {
        let description = json::parse(
            r#"{
                "type": "difference",
                "a": { "type": "rectangle", "start": [0.0, 0.0], "end": [4.0, 2.0] },
                "b": {
                    "type": "union",
                    "a": { "type": "circle", "center": [1.0, 1.0], "radius": 0.5 },
                    "b": { "type": "ellipse", "center": [3.0, 1.0], "semi_axes": [0.5, 0.25] }
                }
            }"#,
        )
        .unwrap();

        let plate = Geometry::from_json(&description).unwrap();
        assert!(plate.evaluate(2.0, 1.0));
        assert!(!plate.evaluate(1.0, 1.0));
        assert!(!plate.evaluate(3.0, 1.0));
        assert!(plate.evaluate(3.0, 1.5));
        assert!(!plate.evaluate(5.0, 1.0));

        let hole = json::parse(r#"{ "type": "invert", "shape": { "type": "circular_hole", "center": [0, 0], "radius": 1 } }"#).unwrap();
        let disk = Geometry::from_json(&hole).unwrap();
        assert!(disk.evaluate(0.5, 0.0));
        assert!(!disk.evaluate(1.5, 0.0));
    }

    #[test]
    fn bad_geometry_json() {
        let missing_type = json::parse(r#"{ "center": [0, 0] }"#).unwrap();
        assert_eq!(Geometry::from_json(&missing_type).unwrap_err(), GeometryError::MissingType);

        let unknown = json::parse(r#"{ "type": "hexagon" }"#).unwrap();
        assert_eq!(
            Geometry::from_json(&unknown).unwrap_err(),
            GeometryError::UnknownType(String::from("hexagon"))
        );

        let missing_radius = json::parse(r#"{ "type": "circle", "center": [0, 0] }"#).unwrap();
        assert_eq!(
            Geometry::from_json(&missing_radius).unwrap_err(),
            GeometryError::MissingField(String::from("circle"), "radius")
        );

        let bad_center = json::parse(r#"{ "type": "circle", "center": [0, 0, 0], "radius": 1 }"#).unwrap();
        assert_eq!(
            Geometry::from_json(&bad_center).unwrap_err(),
            GeometryError::InvalidField(String::from("circle"), "center")
        );
    }
}
