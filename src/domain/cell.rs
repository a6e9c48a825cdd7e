use super::geometry::ImplicitGeometry;
use super::space::{Point, Quadrant, Side};
use crate::integration::glq::QuadratureRule;

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of refinement levels below a base `Cell`. Refinements will fail past this depth.
pub const MAX_REFINEMENT_DEPTH: u8 = 24;

/// The expected number of leaves along one side of a base `Cell`. This determines the stack allocation size of side-leaf `SmallVec`s
pub const EXPECTED_SIDE_LEAVES: usize = 8;

/// `Cell`s are the nodes of a quadtree over an axis aligned rectangle
///
/// A `Cell` is either a **leaf** (no children) or **refined** (exactly four children which tile it).
/// Only leaves carry a meaningful `active` flag; active leaves make up the integration domain.
///
/// ## Layout
/// Children are stored in [Quadrant] order. The sides of a `Cell` are used to walk its leaves
/// along one of its edges:
///
/// ```text
///                 Top
///     y_end -------------------
///           |  NW:2  |  NE:3  |
///      Left |-----------------| Right
///           |  SW:0  |  SE:1  |
///   y_start -------------------
///         x_start   Bottom   x_end
/// ```
///
/// ## Reference Space
/// Quadrature is defined over the reference square `[-1, 1]^2` with coordinates `(xi, eta)`,
/// mapped affinely onto the `Cell`'s bounds by [Cell::map_local_to_global].
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x_start: f64,
    pub y_start: f64,
    pub x_end: f64,
    pub y_end: f64,
    level: u8,
    active: bool,
    children: Option<Box<[Cell; 4]>>,
}

impl Cell {
    /// Construct a new active leaf over the given bounds
    pub fn new(x_start: f64, y_start: f64, x_end: f64, y_end: f64) -> Self {
        Self {
            x_start,
            y_start,
            x_end,
            y_end,
            level: 0,
            active: true,
            children: None,
        }
    }

    fn child(&self, quadrant: Quadrant) -> Self {
        let [x_start, y_start, x_end, y_end] =
            quadrant.sub_bounds([self.x_start, self.y_start, self.x_end, self.y_end]);

        Self {
            x_start,
            y_start,
            x_end,
            y_end,
            level: self.level + 1,
            active: true,
            children: None,
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Geometry
    // ----------------------------------------------------------------------------------------------------

    pub fn x_mid(&self) -> f64 {
        (self.x_start + self.x_end) / 2.0
    }

    pub fn y_mid(&self) -> f64 {
        (self.y_start + self.y_end) / 2.0
    }

    pub fn length_x(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn length_y(&self) -> f64 {
        self.y_end - self.y_start
    }

    /// Determinant of the reference-to-physical mapping over the face of the Cell
    pub fn jacobian_det(&self) -> f64 {
        self.length_x() * self.length_y() / 4.0
    }

    /// Determinant of the reference-to-physical mapping along one side of the Cell
    pub fn edge_jacobian_det(&self, side: Side) -> f64 {
        if side.is_horizontal() {
            self.length_x() / 2.0
        } else {
            self.length_y() / 2.0
        }
    }

    pub fn area(&self) -> f64 {
        self.length_x() * self.length_y()
    }

    /// Does this Cell's closed bounding box contain the point `(x, y)`
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x_start <= x && x <= self.x_end && self.y_start <= y && y <= self.y_end
    }

    /// Map a point `(xi, eta)` from the reference square onto the Cell
    pub fn map_local_to_global(&self, xi: f64, eta: f64) -> Point {
        Point::new(
            self.x_mid() + self.length_x() * xi / 2.0,
            self.y_mid() + self.length_y() * eta / 2.0,
        )
    }

    /// The Cell's corners in `[SW, SE, NW, NE]` order as `(xs, ys)`
    pub fn corner_coords(&self) -> ([f64; 4], [f64; 4]) {
        (
            [self.x_start, self.x_end, self.x_start, self.x_end],
            [self.y_start, self.y_start, self.y_end, self.y_end],
        )
    }

    /// The two end points of one of the Cell's sides as `(xs, ys)`
    pub fn side_coords(&self, side: Side) -> ([f64; 2], [f64; 2]) {
        match side {
            Side::Top => ([self.x_start, self.x_end], [self.y_end, self.y_end]),
            Side::Bottom => ([self.x_start, self.x_end], [self.y_start, self.y_start]),
            Side::Right => ([self.x_end, self.x_end], [self.y_start, self.y_end]),
            Side::Left => ([self.x_start, self.x_start], [self.y_start, self.y_end]),
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Refinement state
    // ----------------------------------------------------------------------------------------------------

    /// Number of refinements between this Cell and its base Cell
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn is_refined(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_active_leaf(&self) -> bool {
        self.active && self.is_leaf()
    }

    /// Set the active flag of a leaf. Refined Cells are never active, so the flag is left untouched on them
    pub fn set_active(&mut self, active: bool) {
        if self.is_leaf() {
            self.active = active;
        }
    }

    /// Children in [Quadrant] order; empty if this Cell is a leaf
    pub fn children(&self) -> &[Cell] {
        match &self.children {
            Some(children) => children.as_slice(),
            None => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [Cell] {
        match &mut self.children {
            Some(children) => children.as_mut_slice(),
            None => &mut [],
        }
    }

    pub fn child_at(&self, quadrant: Quadrant) -> Option<&Cell> {
        self.children
            .as_ref()
            .map(|children| &children[quadrant.index()])
    }

    /// Split this leaf into four equal children (SW, SE, NW, NE). This Cell becomes inactive.
    /// * returns an `Err` if the Cell already has children
    /// * returns an `Err` if the children would be more than [MAX_REFINEMENT_DEPTH] levels below the base Cell
    pub fn refine(&mut self) -> Result<(), RefineError> {
        if self.is_refined() {
            return Err(RefineError::CellHasChildren(self.x_mid(), self.y_mid()));
        }
        if self.level >= MAX_REFINEMENT_DEPTH {
            return Err(RefineError::MaxDepthExceeded(self.level));
        }

        self.children = Some(Box::new(Quadrant::ALL.map(|quadrant| self.child(quadrant))));
        self.active = false;

        Ok(())
    }

    /// Merge all descendants back into this Cell, leaving it as an active leaf
    pub fn delete_all_children(&mut self) {
        if let Some(mut children) = self.children.take() {
            for child in children.iter_mut() {
                child.delete_all_children();
            }
        }
        self.active = true;
    }

    // ----------------------------------------------------------------------------------------------------
    // Geometric tests
    // ----------------------------------------------------------------------------------------------------

    // Count the lattice points (seeds_per_side x seeds_per_side, both ends included) inside the geometry
    fn count_inside_seeds<G>(&self, geometry: &G, seeds_per_side: usize) -> usize
    where
        G: ImplicitGeometry + ?Sized,
    {
        let stride = |length: f64| {
            if seeds_per_side > 1 {
                length / (seeds_per_side - 1) as f64
            } else {
                0.0
            }
        };
        let (dx, dy) = (stride(self.length_x()), stride(self.length_y()));

        (0..seeds_per_side)
            .flat_map(|i| (0..seeds_per_side).map(move |j| (i, j)))
            .filter(|(i, j)| {
                geometry.evaluate(
                    self.x_start + *i as f64 * dx,
                    self.y_start + *j as f64 * dy,
                )
            })
            .count()
    }

    /// Does the boundary of `geometry` pass through this Cell
    ///
    /// This is a sampling approximation: the Cell is cut if some, but not all, of a regular lattice of
    /// `seeds_per_side^2` points are inside the geometry. Boundaries which thread between the seeds
    /// are missed; increase `seeds_per_side` to resolve finer features.
    pub fn is_cut<G>(&self, geometry: &G, seeds_per_side: usize) -> bool
    where
        G: ImplicitGeometry + ?Sized,
    {
        let inside = self.count_inside_seeds(geometry, seeds_per_side);
        0 < inside && inside < seeds_per_side.pow(2)
    }

    /// Is this Cell entirely inside `geometry` (with the same sampling approximation as [Cell::is_cut])
    ///
    /// Without any seeds nothing is known about the Cell, so it is neither inside nor cut.
    pub fn is_inside<G>(&self, geometry: &G, seeds_per_side: usize) -> bool
    where
        G: ImplicitGeometry + ?Sized,
    {
        seeds_per_side > 0
            && self.count_inside_seeds(geometry, seeds_per_side) == seeds_per_side.pow(2)
    }

    // ----------------------------------------------------------------------------------------------------
    // Leaf traversal
    // ----------------------------------------------------------------------------------------------------

    /// All leaves below (and including) this Cell in depth-first [Quadrant] order
    pub fn leaves(&self) -> Vec<&Cell> {
        let mut leaves = Vec::new();
        self.rec_leaves(false, &mut leaves);
        leaves
    }

    /// All active leaves below (and including) this Cell
    pub fn active_leaves(&self) -> Vec<&Cell> {
        let mut leaves = Vec::new();
        self.rec_leaves(true, &mut leaves);
        leaves
    }

    fn rec_leaves<'a>(&'a self, active_only: bool, leaves: &mut Vec<&'a Cell>) {
        match &self.children {
            None => {
                if !active_only || self.active {
                    leaves.push(self)
                }
            }
            Some(children) => {
                for child in children.iter() {
                    child.rec_leaves(active_only, leaves);
                }
            }
        }
    }

    /// Apply `f` to every leaf below (and including) this Cell
    pub fn for_each_leaf_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Cell),
    {
        if self.is_leaf() {
            f(self);
        } else {
            for child in self.children_mut() {
                child.for_each_leaf_mut(f);
            }
        }
    }

    /// Leaves which share part of one of this Cell's sides
    ///
    /// Only the two children adjacent to `side` are descended into at each level, so the returned
    /// leaves' sides exactly cover this Cell's side.
    pub fn side_leaves(&self, side: Side) -> SmallVec<[&Cell; EXPECTED_SIDE_LEAVES]> {
        let mut leaves = SmallVec::new();
        self.rec_side_leaves(side, false, &mut leaves);
        leaves
    }

    /// Active leaves which share part of one of this Cell's sides
    pub fn side_active_leaves(&self, side: Side) -> SmallVec<[&Cell; EXPECTED_SIDE_LEAVES]> {
        let mut leaves = SmallVec::new();
        self.rec_side_leaves(side, true, &mut leaves);
        leaves
    }

    fn rec_side_leaves<'a>(
        &'a self,
        side: Side,
        active_only: bool,
        leaves: &mut SmallVec<[&'a Cell; EXPECTED_SIDE_LEAVES]>,
    ) {
        match &self.children {
            None => {
                if !active_only || self.active {
                    leaves.push(self)
                }
            }
            Some(children) => {
                for quadrant in side.quadrants() {
                    children[quadrant.index()].rec_side_leaves(side, active_only, leaves);
                }
            }
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Quadrature
    // ----------------------------------------------------------------------------------------------------

    /// Quadrature points over the face of every active leaf below this Cell
    ///
    /// Each active leaf contributes `rule.order()^2` points (xi outer, eta inner), whose weights are
    /// the product of the 1D weights and whose jacobian determinant is the leaf's.
    pub fn integration_points(&self, rule: &QuadratureRule) -> QuadraturePoints {
        let mut points = QuadraturePoints::default();
        self.push_integration_points(rule, &mut points);
        points
    }

    pub(crate) fn push_integration_points(&self, rule: &QuadratureRule, points: &mut QuadraturePoints) {
        for leaf in self.active_leaves() {
            let j_det = leaf.jacobian_det();
            for (xi, w_xi) in rule.pairs() {
                for (eta, w_eta) in rule.pairs() {
                    points.push(leaf.map_local_to_global(xi, eta), w_xi * w_eta, j_det);
                }
            }
        }
    }

    /// Quadrature points along one side, over every active leaf adjacent to that side
    ///
    /// Each contributing leaf adds `rule.order()` points evaluated on its own side with the side's
    /// jacobian determinant.
    pub fn edge_integration_points(&self, side: Side, rule: &QuadratureRule) -> QuadraturePoints {
        let mut points = QuadraturePoints::default();
        self.push_edge_integration_points(side, rule, &mut points);
        points
    }

    pub(crate) fn push_edge_integration_points(
        &self,
        side: Side,
        rule: &QuadratureRule,
        points: &mut QuadraturePoints,
    ) {
        for leaf in self.side_active_leaves(side) {
            let j_det = leaf.edge_jacobian_det(side);
            for (t, w) in rule.pairs() {
                let (xi, eta) = side.reference_point(t);
                points.push(leaf.map_local_to_global(xi, eta), w, j_det);
            }
        }
    }

    /// Produce a Json Object that describes this Cell
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "bounds": array![self.x_start, self.y_start, self.x_end, self.y_end],
            "level": self.level,
            "active": self.is_active_leaf(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{:.5}, {:.5}] x [{:.5}, {:.5}] (level {}{})",
            self.x_start,
            self.x_end,
            self.y_start,
            self.y_end,
            self.level,
            if self.is_active_leaf() { ", active" } else { "" }
        )
    }
}

/// Flat arrays of quadrature points: coordinates, weights and jacobian determinants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadraturePoints {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub weights: Vec<f64>,
    pub jacobian_dets: Vec<f64>,
}

impl QuadraturePoints {
    pub fn push(&mut self, point: Point, weight: f64, jacobian_det: f64) {
        self.xs.push(point.x);
        self.ys.push(point.y);
        self.weights.push(weight);
        self.jacobian_dets.push(jacobian_det);
    }

    /// Append all of `other`'s points after this set's points
    pub fn append(&mut self, mut other: Self) {
        self.xs.append(&mut other.xs);
        self.ys.append(&mut other.ys);
        self.weights.append(&mut other.weights);
        self.jacobian_dets.append(&mut other.jacobian_dets);
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn coords(&self) -> impl Iterator<Item = Point> + '_ {
        self.xs
            .iter()
            .zip(self.ys.iter())
            .map(|(x, y)| Point::new(*x, *y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefineError {
    /// The Cell centered at `(x, y)` has already been refined
    CellHasChildren(f64, f64),
    MaxDepthExceeded(u8),
}

impl fmt::Display for RefineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::CellHasChildren(x, y) => write!(f, "Cell at ({}, {}) already has children; Cannot refine!", x, y),
            Self::MaxDepthExceeded(level) => write!(f, "Cell is already at refinement level {} (maximum {}); Cannot refine!", level, MAX_REFINEMENT_DEPTH),
        }
    }
}

impl std::error::Error for RefineError {}
