/// Load grid, refinement and masking parameters from a JSON file
pub mod config;
/// A frozen, tensorized copy of a grid's quadrature data
pub mod snapshot;

pub use config::{ConfigError, GridConfig};
pub use snapshot::{IntegrationSnapshot, TensorizedQuadrature};

use super::cell::{Cell, QuadraturePoints, RefineError};
use super::geometry::ImplicitGeometry;
use super::refinement::RefinementStrategy;
use super::space::{Point, Side};
use crate::integration::glq::{QuadratureError, QuadratureRule};

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use log::debug;
use std::fmt;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;
use std::sync::Arc;

/// A rectangular domain tiled by a structured array of base [Cell]s, each the root of a quadtree
///
/// Base `Cell`s are stored in row-major order: the `Cell` at indices `(i, j)` is
/// `base_cells()[j * resolution_x + i]`, with `i` counting along x and `j` along y.
///
/// ```text
///            i:  0     1     2     3
///     y_end   -------------------------
///       j: 1  |  4  |  5  |  6  |  7  |
///             -------------------------
///       j: 0  |  0  |  1  |  2  |  3  |
///     y_start -------------------------
///          x_start                   x_end
/// ```
///
/// Quantities needed for integration (quadrature points, weights and jacobian determinants over the
/// bulk and along each side) are aggregated over the active leaves of every base `Cell`.
#[derive(Debug, Clone)]
pub struct PlanarCartesianGrid {
    x_start: f64,
    y_start: f64,
    x_end: f64,
    y_end: f64,
    resolution_x: usize,
    resolution_y: usize,
    base_cells: Vec<Cell>,
    quadrature_rule: QuadratureRule,
    refinement_strategy: Option<Arc<dyn RefinementStrategy>>,
    samples: Option<Samples>,
}

impl PlanarCartesianGrid {
    /// Construct and generate a grid of `resolution_x * resolution_y` equal base `Cell`s
    pub fn new(
        x_start: f64,
        y_start: f64,
        x_end: f64,
        y_end: f64,
        resolution_x: usize,
        resolution_y: usize,
    ) -> Result<Self, GridError> {
        let mut grid = Self::blank(x_start, y_start, x_end, y_end, resolution_x, resolution_y)?;
        grid.generate()?;
        Ok(grid)
    }

    /// Construct a grid without any base `Cell`s. Call [PlanarCartesianGrid::generate] to populate it
    pub fn blank(
        x_start: f64,
        y_start: f64,
        x_end: f64,
        y_end: f64,
        resolution_x: usize,
        resolution_y: usize,
    ) -> Result<Self, GridError> {
        let bounds = [x_start, y_start, x_end, y_end];
        if bounds.iter().any(|b| !b.is_finite()) || x_end <= x_start || y_end <= y_start {
            return Err(GridError::InvalidBounds(bounds));
        }
        if resolution_x == 0 || resolution_y == 0 {
            return Err(GridError::InvalidResolution(resolution_x, resolution_y));
        }

        Ok(Self {
            x_start,
            y_start,
            x_end,
            y_end,
            resolution_x,
            resolution_y,
            base_cells: Vec::new(),
            quadrature_rule: QuadratureRule::default(),
            refinement_strategy: None,
            samples: None,
        })
    }

    /// Tile the domain with base `Cell`s
    ///
    /// The last column and row of `Cell`s take the grid's outer bounds exactly, so that the boundary
    /// of the grid is represented by the configured values rather than accumulated sums.
    pub fn generate(&mut self) -> Result<(), GridError> {
        if !self.base_cells.is_empty() {
            return Err(GridError::AlreadyGenerated);
        }

        let dx = self.length_x() / self.resolution_x as f64;
        let dy = self.length_y() / self.resolution_y as f64;

        let x_at = |i: usize| {
            if i == self.resolution_x {
                self.x_end
            } else {
                self.x_start + i as f64 * dx
            }
        };
        let y_at = |j: usize| {
            if j == self.resolution_y {
                self.y_end
            } else {
                self.y_start + j as f64 * dy
            }
        };

        let base_cells: Vec<Cell> = (0..self.resolution_y)
            .flat_map(|j| (0..self.resolution_x).map(move |i| (i, j)))
            .map(|(i, j)| Cell::new(x_at(i), y_at(j), x_at(i + 1), y_at(j + 1)))
            .collect();
        self.base_cells = base_cells;

        debug!(
            "Generated {} x {} grid over [{}, {}] x [{}, {}]",
            self.resolution_x, self.resolution_y, self.x_start, self.x_end, self.y_start, self.y_end
        );

        Ok(())
    }

    pub fn is_generated(&self) -> bool {
        !self.base_cells.is_empty()
    }

    /// Replace the (default 2-point) quadrature rule used along each axis of every `Cell`
    pub fn with_quadrature_rule(mut self, rule: QuadratureRule) -> Self {
        self.quadrature_rule = rule;
        self
    }

    pub fn set_quadrature_rule(&mut self, rule: QuadratureRule) {
        self.quadrature_rule = rule;
    }

    pub fn quadrature_rule(&self) -> &QuadratureRule {
        &self.quadrature_rule
    }

    // ----------------------------------------------------------------------------------------------------
    // Dimensions
    // ----------------------------------------------------------------------------------------------------

    pub fn x_start(&self) -> f64 {
        self.x_start
    }

    pub fn y_start(&self) -> f64 {
        self.y_start
    }

    pub fn x_end(&self) -> f64 {
        self.x_end
    }

    pub fn y_end(&self) -> f64 {
        self.y_end
    }

    /// `[x_start, y_start, x_end, y_end]`
    pub fn bounds(&self) -> [f64; 4] {
        [self.x_start, self.y_start, self.x_end, self.y_end]
    }

    pub fn resolution(&self) -> [usize; 2] {
        [self.resolution_x, self.resolution_y]
    }

    pub fn length_x(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn length_y(&self) -> f64 {
        self.y_end - self.y_start
    }

    /// Largest valid `i` index
    pub fn i_end(&self) -> usize {
        self.resolution_x - 1
    }

    /// Largest valid `j` index
    pub fn j_end(&self) -> usize {
        self.resolution_y - 1
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x_start <= x && x <= self.x_end && self.y_start <= y && y <= self.y_end
    }

    // ----------------------------------------------------------------------------------------------------
    // Cell retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn base_cells(&self) -> &[Cell] {
        &self.base_cells
    }

    /// Mutable access to the base `Cell`s for [RefinementStrategy] implementations
    pub fn base_cells_mut(&mut self) -> &mut [Cell] {
        &mut self.base_cells
    }

    fn base_index(&self, i: usize, j: usize) -> Result<usize, GridError> {
        if i < self.resolution_x && j < self.resolution_y && self.is_generated() {
            Ok(j * self.resolution_x + i)
        } else {
            Err(GridError::IndicesOutOfRange(i, j))
        }
    }

    pub fn get_cell_at_indices(&self, i: usize, j: usize) -> Result<&Cell, GridError> {
        let index = self.base_index(i, j)?;
        Ok(&self.base_cells[index])
    }

    pub fn get_cell_at_indices_mut(&mut self, i: usize, j: usize) -> Result<&mut Cell, GridError> {
        let index = self.base_index(i, j)?;
        Ok(&mut self.base_cells[index])
    }

    /// Indices of the base `Cell` containing the point `(x, y)`
    ///
    /// The returned `Cell`'s (closed) bounds always contain the point. Points on a shared edge
    /// may belong to either neighbor; points on the grid's `x_end` or `y_end` belong to the last
    /// column or row.
    pub fn get_cell_indices_from_coords(&self, x: f64, y: f64) -> Result<(usize, usize), GridError> {
        if !self.contains(x, y) {
            return Err(GridError::PointOutsideGrid(x, y));
        }

        let cell_width = self.length_x() / self.resolution_x as f64;
        let cell_height = self.length_y() / self.resolution_y as f64;

        let mut i = (((x - self.x_start) / cell_width).floor() as usize).min(self.i_end());
        let mut j = (((y - self.y_start) / cell_height).floor() as usize).min(self.j_end());

        // the estimate can land one cell off where the division rounds differently than the cell bounds
        while i > 0 && x < self.get_cell_at_indices(i, 0)?.x_start {
            i -= 1;
        }
        while i < self.i_end() && x > self.get_cell_at_indices(i, 0)?.x_end {
            i += 1;
        }
        while j > 0 && y < self.get_cell_at_indices(0, j)?.y_start {
            j -= 1;
        }
        while j < self.j_end() && y > self.get_cell_at_indices(0, j)?.y_end {
            j += 1;
        }

        Ok((i, j))
    }

    /// The base `Cell` containing the point `(x, y)`
    pub fn get_cell_from_coords(&self, x: f64, y: f64) -> Result<&Cell, GridError> {
        let (i, j) = self.get_cell_indices_from_coords(x, y)?;
        self.get_cell_at_indices(i, j)
    }

    /// The leaf `Cell` containing the point `(x, y)`
    pub fn get_leaf_from_coords(&self, x: f64, y: f64) -> Result<&Cell, GridError> {
        let mut cell = self.get_cell_from_coords(x, y)?;
        while let Some(child) = cell.children().iter().rev().find(|c| c.contains(x, y)) {
            cell = child;
        }
        Ok(cell)
    }

    /// The base `Cell`s along one side of the grid, ordered by increasing coordinate
    pub fn side_base_cells(&self, side: Side) -> Vec<&Cell> {
        if !self.is_generated() {
            return Vec::new();
        }

        match side {
            Side::Top => self.base_cells[self.j_end() * self.resolution_x..].iter().collect(),
            Side::Bottom => self.base_cells[..self.resolution_x].iter().collect(),
            Side::Right => self
                .base_cells
                .iter()
                .skip(self.i_end())
                .step_by(self.resolution_x)
                .collect(),
            Side::Left => self.base_cells.iter().step_by(self.resolution_x).collect(),
        }
    }

    /// The leaves along one side of the grid
    pub fn side_leaf_cells(&self, side: Side) -> Vec<&Cell> {
        self.side_base_cells(side)
            .into_iter()
            .flat_map(|cell| cell.side_leaves(side))
            .collect()
    }

    /// The active leaves along one side of the grid
    pub fn side_active_leaf_cells(&self, side: Side) -> Vec<&Cell> {
        self.side_base_cells(side)
            .into_iter()
            .flat_map(|cell| cell.side_active_leaves(side))
            .collect()
    }

    pub fn leaf_cells(&self) -> Vec<&Cell> {
        self.base_cells.iter().flat_map(|cell| cell.leaves()).collect()
    }

    pub fn active_leaf_cells(&self) -> Vec<&Cell> {
        self.base_cells
            .iter()
            .flat_map(|cell| cell.active_leaves())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.base_cells.iter().map(|cell| cell.leaves().len()).sum()
    }

    pub fn active_leaf_count(&self) -> usize {
        self.base_cells
            .iter()
            .map(|cell| cell.active_leaves().len())
            .sum()
    }

    // ----------------------------------------------------------------------------------------------------
    // Integration data
    // ----------------------------------------------------------------------------------------------------

    /// Quadrature points over every active leaf, in base `Cell` order
    pub fn integration_points(&self) -> QuadraturePoints {
        let mut points = QuadraturePoints::default();
        for cell in self.base_cells.iter() {
            cell.push_integration_points(&self.quadrature_rule, &mut points);
        }
        points
    }

    /// Quadrature points along one side of the grid, over the active leaves which touch it
    pub fn edge_integration_points(&self, side: Side) -> QuadraturePoints {
        let mut points = QuadraturePoints::default();
        for cell in self.side_base_cells(side) {
            cell.push_edge_integration_points(side, &self.quadrature_rule, &mut points);
        }
        points
    }

    /// Build an immutable, tensorized copy of the current integration data
    pub fn snapshot(&self) -> Result<IntegrationSnapshot, GridError> {
        IntegrationSnapshot::build(self)
    }

    // ----------------------------------------------------------------------------------------------------
    // Coordinates
    // ----------------------------------------------------------------------------------------------------

    /// The sorted, unique vertex coordinates of the leaves along one side of the grid as `(xs, ys)`
    ///
    /// Leaf sides are compared against the grid's bounds with exact floating point equality.
    /// This holds because boundary `Cell`s copy the grid's outer bounds, and refinement copies
    /// the parent's bounds onto the children which share its sides.
    pub fn side_coords(&self, side: Side) -> (Vec<f64>, Vec<f64>) {
        let bound = match side {
            Side::Top => self.y_end,
            Side::Bottom => self.y_start,
            Side::Right => self.x_end,
            Side::Left => self.x_start,
        };

        let mut along: Vec<f64> = self
            .side_base_cells(side)
            .into_iter()
            .flat_map(|cell| cell.leaves())
            .filter_map(|leaf| {
                let (xs, ys) = leaf.side_coords(side);
                if side.is_horizontal() {
                    ys.contains(&bound).then(|| xs)
                } else {
                    xs.contains(&bound).then(|| ys)
                }
            })
            .flatten()
            .collect();

        along.sort_by(|a, b| a.total_cmp(b));
        along.dedup();

        let across = vec![bound; along.len()];
        if side.is_horizontal() {
            (along, across)
        } else {
            (across, along)
        }
    }

    /// The four corners (SW, SE, NW, NE) of every active leaf as `(xs, ys)`
    pub fn corner_coords(&self) -> (Vec<f64>, Vec<f64>) {
        let leaves = self.active_leaf_cells();
        let mut xs = Vec::with_capacity(leaves.len() * 4);
        let mut ys = Vec::with_capacity(leaves.len() * 4);

        for leaf in leaves {
            let (leaf_xs, leaf_ys) = leaf.corner_coords();
            xs.extend_from_slice(&leaf_xs);
            ys.extend_from_slice(&leaf_ys);
        }

        (xs, ys)
    }

    /// Two triangles for every active leaf, indexing into [PlanarCartesianGrid::corner_coords]
    pub fn triangulate(&self) -> Vec<[usize; 3]> {
        (0..self.active_leaf_count())
            .flat_map(|i| {
                let sw = 4 * i;
                [[sw, sw + 1, sw + 3], [sw, sw + 3, sw + 2]]
            })
            .collect()
    }

    // ----------------------------------------------------------------------------------------------------
    // Samples
    // ----------------------------------------------------------------------------------------------------

    /// A regular lattice of `num_x * num_y` points across the grid (x outer, y inner), both ends included
    ///
    /// Points outside `geometry` are omitted when one is given.
    pub fn get_samples<G>(
        &self,
        geometry: Option<&G>,
        num_x: usize,
        num_y: usize,
    ) -> Result<Samples, GridError>
    where
        G: ImplicitGeometry + ?Sized,
    {
        if num_x < 2 || num_y < 2 {
            return Err(GridError::TooFewSamples(num_x, num_y));
        }

        let dx = self.length_x() / (num_x - 1) as f64;
        let dy = self.length_y() / (num_y - 1) as f64;

        let mut samples = Samples::default();
        for i in 0..num_x {
            let x = self.x_start + i as f64 * dx;
            for j in 0..num_y {
                let y = self.y_start + j as f64 * dy;
                if geometry.map_or(true, |g| g.evaluate(x, y)) {
                    samples.push(x, y);
                }
            }
        }

        Ok(samples)
    }

    /// Compute samples with [PlanarCartesianGrid::get_samples] and store them on the grid
    pub fn prepare_samples<G>(
        &mut self,
        geometry: Option<&G>,
        num_x: usize,
        num_y: usize,
    ) -> Result<(), GridError>
    where
        G: ImplicitGeometry + ?Sized,
    {
        let samples = self.get_samples(geometry, num_x, num_y)?;
        debug!("Prepared {} of {} x {} samples", samples.len(), num_x, num_y);
        self.samples = Some(samples);
        Ok(())
    }

    /// The samples stored by [PlanarCartesianGrid::prepare_samples]
    pub fn samples(&self) -> Result<&Samples, GridError> {
        self.samples.as_ref().ok_or(GridError::SamplesNotPrepared)
    }

    // ----------------------------------------------------------------------------------------------------
    // Active state
    // ----------------------------------------------------------------------------------------------------

    /// Mark each leaf active if it lies entirely inside `geometry` and inactive otherwise
    pub fn set_active_state_with_filter<G>(&mut self, geometry: &G, seeds_per_side: usize) -> Result<(), GridError>
    where
        G: ImplicitGeometry + ?Sized,
    {
        if seeds_per_side < 2 {
            return Err(GridError::TooFewSeeds(seeds_per_side));
        }

        for cell in self.base_cells.iter_mut() {
            cell.for_each_leaf_mut(&mut |leaf: &mut Cell| {
                let inside = leaf.is_inside(geometry, seeds_per_side);
                leaf.set_active(inside);
            });
        }

        debug!(
            "Masked grid: {} of {} leaves active",
            self.active_leaf_count(),
            self.leaf_count()
        );

        Ok(())
    }

    /// Set the active flag of every leaf
    pub fn set_active_state(&mut self, active: bool) {
        for cell in self.base_cells.iter_mut() {
            cell.for_each_leaf_mut(&mut |leaf: &mut Cell| leaf.set_active(active));
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Refinement
    // ----------------------------------------------------------------------------------------------------

    pub fn set_refinement_strategy(&mut self, strategy: Arc<dyn RefinementStrategy>) {
        self.refinement_strategy = Some(strategy);
    }

    pub fn refinement_strategy(&self) -> Result<&Arc<dyn RefinementStrategy>, GridError> {
        self.refinement_strategy
            .as_ref()
            .ok_or(GridError::RefinementStrategyNotSet)
    }

    /// Apply the grid's refinement strategy
    pub fn refine(&mut self, seeds_per_side: usize) -> Result<(), GridError> {
        let strategy = Arc::clone(self.refinement_strategy()?);
        strategy.refine(self, seeds_per_side)
    }

    /// Merge every base `Cell` back into a single active leaf
    pub fn delete_all_refinements(&mut self) {
        for cell in self.base_cells.iter_mut() {
            cell.delete_all_children();
        }
    }

    /// Export the grid's dimensions and every leaf to a JSON file
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        self.to_json().write_pretty(&mut w, 4)?;

        Ok(())
    }

    /// Produce a Json Object that describes this grid
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let leaves: Vec<JsonValue> = self
            .base_cells
            .iter()
            .enumerate()
            .flat_map(|(index, cell)| {
                let base = [index % self.resolution_x, index / self.resolution_x];
                cell.leaves().into_iter().map(move |leaf| {
                    let mut leaf_json = leaf.to_json();
                    leaf_json["base"] = array![base[0], base[1]];
                    leaf_json
                })
            })
            .collect();

        object! {
            "bounds": array![self.x_start, self.y_start, self.x_end, self.y_end],
            "resolution": array![self.resolution_x, self.resolution_y],
            "quadrature_order": self.quadrature_rule.order(),
            "leaves": JsonValue::from(leaves),
        }
    }
}

/// A set of sample points in the grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl Samples {
    pub fn push(&mut self, x: f64, y: f64) {
        self.xs.push(x);
        self.ys.push(y);
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.xs
            .iter()
            .zip(self.ys.iter())
            .map(|(x, y)| Point::new(*x, *y))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    AlreadyGenerated,
    RefinementStrategyNotSet,
    SamplesNotPrepared,
    IndicesOutOfRange(usize, usize),
    PointOutsideGrid(f64, f64),
    InvalidBounds([f64; 4]),
    InvalidResolution(usize, usize),
    TooFewSeeds(usize),
    TooFewSamples(usize, usize),
    Refine(RefineError),
    Quadrature(QuadratureError),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AlreadyGenerated => write!(f, "Grid already has base cells; Cannot generate Grid!"),
            Self::RefinementStrategyNotSet => write!(f, "Grid has no refinement strategy; Cannot refine Grid!"),
            Self::SamplesNotPrepared => write!(f, "Samples are not prepared; Cannot retrieve samples!"),
            Self::IndicesOutOfRange(i, j) => write!(f, "Indices ({}, {}) are outside the Grid; Cannot retrieve Cell!", i, j),
            Self::PointOutsideGrid(x, y) => write!(f, "Point ({}, {}) is outside the Grid; Cannot retrieve Cell!", x, y),
            Self::InvalidBounds(bounds) => write!(f, "Bounds {:?} do not describe a rectangle; Cannot construct Grid!", bounds),
            Self::InvalidResolution(nx, ny) => write!(f, "Resolution ({}, {}) must be at least one cell in each direction; Cannot construct Grid!", nx, ny),
            Self::TooFewSeeds(seeds) => write!(f, "{} seeds per side are too few (at least 2 are needed); Cannot test Cells against geometry!", seeds),
            Self::TooFewSamples(nx, ny) => write!(f, "{} x {} samples are too few (at least 2 are needed in each direction); Cannot generate samples!", nx, ny),
            Self::Refine(err) => write!(f, "{}", err),
            Self::Quadrature(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for GridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Refine(err) => Some(err),
            Self::Quadrature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RefineError> for GridError {
    fn from(err: RefineError) -> Self {
        Self::Refine(err)
    }
}

impl From<QuadratureError> for GridError {
    fn from(err: QuadratureError) -> Self {
        Self::Quadrature(err)
    }
}
