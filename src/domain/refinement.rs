use super::cell::{Cell, RefineError};
use super::geometry::Geometry;
use super::grid::{GridError, PlanarCartesianGrid};

use log::{debug, trace};
use std::fmt;
use std::sync::Arc;

/// A rule for adaptively subdividing the base `Cell`s of a [PlanarCartesianGrid]
///
/// Strategies must descend into already refined `Cell`s rather than refining them again,
/// so that they can be applied repeatedly or one after another.
pub trait RefinementStrategy: fmt::Debug + Send + Sync {
    /// Maximum number of levels this strategy will add below a base `Cell`
    fn depth(&self) -> u8;

    /// Refine the grid's base `Cell`s. `seeds_per_side` sets the lattice resolution of the cut tests
    fn refine(&self, grid: &mut PlanarCartesianGrid, seeds_per_side: usize) -> Result<(), GridError>;
}

/// Refine every `Cell` which is cut by the boundary of a geometry, down to a fixed depth
///
/// The finest `Cell`s along the boundary have side lengths of `base_cell_size / 2^depth`.
///
/// ```
/// use quadgrid_2d::{Geometry, PlanarCartesianGrid, RefineBoundaries};
/// use std::sync::Arc;
///
/// let mut grid = PlanarCartesianGrid::new(0.0, 0.0, 4.0, 4.0, 4, 4).unwrap();
/// grid.set_refinement_strategy(Arc::new(RefineBoundaries::new(
///     2,
///     Geometry::circular_hole(0.0, 0.0, 1.5),
/// )));
/// grid.refine(10).unwrap();
///
/// assert!(grid.leaf_count() > 16);
/// ```
#[derive(Debug, Clone)]
pub struct RefineBoundaries {
    depth: u8,
    geometry: Geometry,
}

impl RefineBoundaries {
    pub fn new(depth: u8, geometry: Geometry) -> Self {
        Self { depth, geometry }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Refine a `Cell` if it is cut, then recurse into its cut children with one less level remaining
    ///
    /// Returns the number of new refinements.
    pub fn refine_cell(
        &self,
        cell: &mut Cell,
        depth: u8,
        seeds_per_side: usize,
    ) -> Result<usize, RefineError> {
        if depth == 0 || !cell.is_cut(&self.geometry, seeds_per_side) {
            return Ok(0);
        }

        let mut num_refinements = 0;
        if cell.is_leaf() {
            cell.refine()?;
            trace!("Refined cut cell {}", cell);
            num_refinements += 1;
        }

        for child in cell.children_mut() {
            num_refinements += self.refine_cell(child, depth - 1, seeds_per_side)?;
        }

        Ok(num_refinements)
    }
}

impl RefinementStrategy for RefineBoundaries {
    fn depth(&self) -> u8 {
        self.depth
    }

    fn refine(&self, grid: &mut PlanarCartesianGrid, seeds_per_side: usize) -> Result<(), GridError> {
        if seeds_per_side < 2 {
            return Err(GridError::TooFewSeeds(seeds_per_side));
        }

        let mut num_refinements = 0;
        for cell in grid.base_cells_mut() {
            num_refinements += self.refine_cell(cell, self.depth, seeds_per_side)?;
        }

        debug!(
            "Boundary refinement (depth {}) of {:?}: {} cells refined; {} leaves",
            self.depth,
            self.geometry,
            num_refinements,
            grid.leaf_count()
        );

        Ok(())
    }
}

/// Apply a sequence of strategies one after another
#[derive(Debug, Clone, Default)]
pub struct AggregatedRefinement {
    strategies: Vec<Arc<dyn RefinementStrategy>>,
}

impl AggregatedRefinement {
    pub fn new(strategies: Vec<Arc<dyn RefinementStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with(mut self, strategy: Arc<dyn RefinementStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategies(&self) -> &[Arc<dyn RefinementStrategy>] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl RefinementStrategy for AggregatedRefinement {
    /// The deepest of the aggregated strategies
    fn depth(&self) -> u8 {
        self.strategies
            .iter()
            .map(|strategy| strategy.depth())
            .max()
            .unwrap_or(0)
    }

    fn refine(&self, grid: &mut PlanarCartesianGrid, seeds_per_side: usize) -> Result<(), GridError> {
        for strategy in self.strategies.iter() {
            strategy.refine(grid, seeds_per_side)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cell::MAX_REFINEMENT_DEPTH;

    fn unit_grid() -> PlanarCartesianGrid {
        PlanarCartesianGrid::new(0.0, 0.0, 4.0, 4.0, 4, 4).unwrap()
    }

    #[test]
    fn refinement_is_restricted_to_cut_cells() {
        let mut grid = unit_grid();
        let strategy = RefineBoundaries::new(2, Geometry::rectangle(0.5, 0.5, 1.5, 1.5));
        strategy.refine(&mut grid, 10).unwrap();

        for j in 0..4 {
            for i in 0..4 {
                let cell = grid.get_cell_at_indices(i, j).unwrap();
                if i < 2 && j < 2 {
                    assert!(cell.is_refined(), "base cell ({}, {}) was not refined", i, j);
                } else {
                    assert!(cell.is_leaf(), "base cell ({}, {}) was refined", i, j);
                }
            }
        }
    }

    #[test]
    fn refinement_depth_bounds_levels() {
        let mut grid = unit_grid();
        let strategy = RefineBoundaries::new(3, Geometry::circle(2.0, 2.0, 1.3));
        strategy.refine(&mut grid, 10).unwrap();

        let levels: Vec<u8> = grid.leaf_cells().iter().map(|c| c.level()).collect();
        assert!(levels.iter().all(|level| *level <= 3));
        assert!(levels.contains(&3));

        // only cut cells are refined further
        for leaf in grid.leaf_cells() {
            if leaf.level() < 3 && leaf.level() > 0 {
                assert!(!leaf.is_cut(strategy.geometry(), 10));
            }
        }
    }

    #[test]
    fn zero_depth_is_a_no_op() {
        let mut grid = unit_grid();
        RefineBoundaries::new(0, Geometry::circle(2.0, 2.0, 1.3))
            .refine(&mut grid, 10)
            .unwrap();
        assert_eq!(grid.leaf_count(), 16);
    }

    #[test]
    fn repeated_refinement_is_stable() {
        let mut grid = unit_grid();
        let strategy = RefineBoundaries::new(2, Geometry::circle(2.0, 2.0, 1.3));

        strategy.refine(&mut grid, 10).unwrap();
        let leaves = grid.leaf_count();

        strategy.refine(&mut grid, 10).unwrap();
        assert_eq!(grid.leaf_count(), leaves);
    }

    #[test]
    fn too_few_seeds() {
        let mut grid = unit_grid();
        let strategy = RefineBoundaries::new(2, Geometry::circle(2.0, 2.0, 1.3));
        assert_eq!(strategy.refine(&mut grid, 1), Err(GridError::TooFewSeeds(1)));
    }

    #[test]
    fn excessive_depth_fails() {
        let mut grid = PlanarCartesianGrid::new(0.0, 0.0, 1.0, 1.0, 1, 1).unwrap();
        let strategy = RefineBoundaries::new(
            MAX_REFINEMENT_DEPTH + 1,
            Geometry::custom(|x, _| x <= 1.0 / 3.0),
        );

        assert_eq!(
            strategy.refine(&mut grid, 4),
            Err(GridError::Refine(RefineError::MaxDepthExceeded(
                MAX_REFINEMENT_DEPTH
            )))
        );
    }

    #[test]
    fn aggregated_strategies_apply_in_order() {
        let left = Geometry::circle(0.0, 2.0, 1.3);
        let right = Geometry::circle(4.0, 2.0, 1.3);

        let mut separate = unit_grid();
        RefineBoundaries::new(2, left.clone())
            .refine(&mut separate, 10)
            .unwrap();
        RefineBoundaries::new(3, right.clone())
            .refine(&mut separate, 10)
            .unwrap();

        let aggregated = AggregatedRefinement::default()
            .with(Arc::new(RefineBoundaries::new(2, left)))
            .with(Arc::new(RefineBoundaries::new(3, right)));
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated.depth(), 3);

        let mut grid = unit_grid();
        grid.set_refinement_strategy(Arc::new(aggregated));
        grid.refine(10).unwrap();

        assert_eq!(grid.leaf_count(), separate.leaf_count());
        assert!(grid.leaf_count() > 16);
    }
}
