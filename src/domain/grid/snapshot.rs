use super::{GridError, PlanarCartesianGrid};
use crate::domain::cell::QuadraturePoints;
use crate::domain::space::Side;
use crate::integration::glq::{gauss_legendre_integration, tensorize_1d, tensorize_2d, QuadratureError};

use log::debug;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Quadrature points packed into `nalgebra` containers
///
/// `coords` is an `n x 2` matrix of `(x, y)` rows; `weights` and `jacobian_dets` are `n` element vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorizedQuadrature {
    coords: DMatrix<f64>,
    weights: DVector<f64>,
    jacobian_dets: DVector<f64>,
}

impl TensorizedQuadrature {
    pub fn from_points(points: &QuadraturePoints) -> Result<Self, QuadratureError> {
        Ok(Self {
            coords: tensorize_2d(&points.xs, &points.ys)?,
            weights: tensorize_1d(&points.weights),
            jacobian_dets: tensorize_1d(&points.jacobian_dets),
        })
    }

    pub fn coords(&self) -> &DMatrix<f64> {
        &self.coords
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn jacobian_dets(&self) -> &DVector<f64> {
        &self.jacobian_dets
    }

    pub fn xs(&self) -> DVector<f64> {
        self.coords.column(0).into_owned()
    }

    pub fn ys(&self) -> DVector<f64> {
        self.coords.column(1).into_owned()
    }

    /// `(coords, weights, jacobian_dets)`
    pub fn data(&self) -> (&DMatrix<f64>, &DVector<f64>, &DVector<f64>) {
        (&self.coords, &self.weights, &self.jacobian_dets)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Integrate a function sampled at each point (or a single constant) over these points
    pub fn integrate(&self, integrand: &[f64]) -> Result<f64, QuadratureError> {
        gauss_legendre_integration(
            integrand,
            self.weights.as_slice(),
            self.jacobian_dets.as_slice(),
        )
    }
}

/// An immutable copy of a grid's integration data
///
/// The grid's aggregates are computed when the snapshot is built, and never updated afterwards.
/// Build a new snapshot after refining or re-masking the grid.
///
/// ```
/// use quadgrid_2d::{IntegrationSnapshot, PlanarCartesianGrid, Side};
///
/// let grid = PlanarCartesianGrid::new(0.0, 0.0, 2.0, 1.0, 2, 1).unwrap();
/// let snapshot = IntegrationSnapshot::build(&grid).unwrap();
///
/// assert_eq!(snapshot.bulk().len(), 8);
/// assert_eq!(snapshot.edge(Side::Top).len(), 4);
/// assert!((snapshot.bulk().integrate(&[1.0]).unwrap() - 2.0).abs() < 1e-12);
/// assert!(snapshot.samples().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationSnapshot {
    bulk: TensorizedQuadrature,
    edges: [TensorizedQuadrature; 4],
    samples: Option<DMatrix<f64>>,
}

impl IntegrationSnapshot {
    pub fn build(grid: &PlanarCartesianGrid) -> Result<Self, GridError> {
        let rule = grid.quadrature_rule();

        let bulk = grid
            .base_cells()
            .par_iter()
            .map(|cell| cell.integration_points(rule))
            .collect::<Vec<_>>()
            .into_iter()
            .fold(QuadraturePoints::default(), |mut points, cell_points| {
                points.append(cell_points);
                points
            });

        let edge = |side: Side| {
            let points = grid
                .side_base_cells(side)
                .par_iter()
                .map(|cell| cell.edge_integration_points(side, rule))
                .collect::<Vec<_>>()
                .into_iter()
                .fold(QuadraturePoints::default(), |mut points, cell_points| {
                    points.append(cell_points);
                    points
                });
            TensorizedQuadrature::from_points(&points)
        };

        let samples = match grid.samples() {
            Ok(samples) => Some(tensorize_2d(&samples.xs, &samples.ys)?),
            Err(_) => None,
        };

        let snapshot = Self {
            bulk: TensorizedQuadrature::from_points(&bulk)?,
            edges: [
                edge(Side::Top)?,
                edge(Side::Bottom)?,
                edge(Side::Right)?,
                edge(Side::Left)?,
            ],
            samples,
        };

        debug!(
            "Built integration snapshot: {} bulk points; {} edge points; {} samples",
            snapshot.bulk.len(),
            snapshot.edges.iter().map(|e| e.len()).sum::<usize>(),
            snapshot.samples.as_ref().map_or(0, |s| s.nrows())
        );

        Ok(snapshot)
    }

    /// Quadrature over every active leaf
    pub fn bulk(&self) -> &TensorizedQuadrature {
        &self.bulk
    }

    /// Quadrature along one side of the grid
    pub fn edge(&self, side: Side) -> &TensorizedQuadrature {
        &self.edges[side.index()]
    }

    /// `n x 2` matrix of the grid's prepared samples
    pub fn samples(&self) -> Result<&DMatrix<f64>, GridError> {
        self.samples.as_ref().ok_or(GridError::SamplesNotPrepared)
    }

    pub fn samples_xs(&self) -> Result<DVector<f64>, GridError> {
        Ok(self.samples()?.column(0).into_owned())
    }

    pub fn samples_ys(&self) -> Result<DVector<f64>, GridError> {
        Ok(self.samples()?.column(1).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Geometry;
    use crate::domain::refinement::RefineBoundaries;
    use crate::integration::glq::QuadratureRule;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn refined_grid() -> PlanarCartesianGrid {
        let mut grid = PlanarCartesianGrid::new(0.0, 0.0, 4.0, 2.0, 4, 2).unwrap();
        grid.set_refinement_strategy(Arc::new(RefineBoundaries::new(
            2,
            Geometry::circular_hole(2.0, 1.0, 0.6),
        )));
        grid.refine(10).unwrap();
        grid
    }

    #[test]
    fn snapshot_matches_grid() {
        let grid = refined_grid();
        let snapshot = grid.snapshot().unwrap();

        let bulk = grid.integration_points();
        assert_eq!(snapshot.bulk().len(), bulk.len());
        assert_eq!(snapshot.bulk().xs().as_slice(), bulk.xs.as_slice());
        assert_eq!(snapshot.bulk().ys().as_slice(), bulk.ys.as_slice());
        assert_eq!(snapshot.bulk().weights().as_slice(), bulk.weights.as_slice());
        assert_eq!(
            snapshot.bulk().jacobian_dets().as_slice(),
            bulk.jacobian_dets.as_slice()
        );

        for side in Side::ALL {
            let edge = grid.edge_integration_points(side);
            let (coords, weights, j_dets) = snapshot.edge(side).data();
            assert_eq!(coords.nrows(), edge.len());
            assert_eq!(coords.ncols(), 2);
            assert_eq!(weights.as_slice(), edge.weights.as_slice());
            assert_eq!(j_dets.as_slice(), edge.jacobian_dets.as_slice());
            assert_eq!(snapshot.edge(side).xs().as_slice(), edge.xs.as_slice());
        }
    }

    #[test]
    fn snapshot_is_frozen() {
        let mut grid = refined_grid();
        let snapshot = grid.snapshot().unwrap();
        let area = snapshot.bulk().integrate(&[1.0]).unwrap();
        assert_relative_eq!(area, 8.0, max_relative = 1e-12);

        grid.set_active_state_with_filter(&Geometry::circular_hole(2.0, 1.0, 0.6), 10)
            .unwrap();
        assert!(grid.integration_points().len() < snapshot.bulk().len());
        assert_relative_eq!(
            snapshot.bulk().integrate(&[1.0]).unwrap(),
            area,
            max_relative = 1e-12
        );

        let masked = grid.snapshot().unwrap();
        assert!(masked.bulk().integrate(&[1.0]).unwrap() < area);
    }

    #[test]
    fn snapshot_samples() {
        let mut grid = PlanarCartesianGrid::new(0.0, 0.0, 1.0, 1.0, 2, 2).unwrap();
        assert_eq!(
            grid.snapshot().unwrap().samples(),
            Err(GridError::SamplesNotPrepared)
        );
        assert!(grid.snapshot().unwrap().samples_xs().is_err());

        grid.prepare_samples::<Geometry>(None, 3, 2).unwrap();
        let snapshot = grid.snapshot().unwrap();
        let samples = snapshot.samples().unwrap();
        assert_eq!(samples.nrows(), 6);
        assert_eq!(
            snapshot.samples_xs().unwrap().as_slice(),
            &[0.0, 0.0, 0.5, 0.5, 1.0, 1.0]
        );
        assert_eq!(
            snapshot.samples_ys().unwrap().as_slice(),
            &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn snapshot_integration() {
        let grid = PlanarCartesianGrid::new(0.0, 0.0, 2.0, 2.0, 2, 2)
            .unwrap()
            .with_quadrature_rule(QuadratureRule::gauss_legendre(3).unwrap());
        let snapshot = grid.snapshot().unwrap();

        // x * y^2 over [0, 2]^2 = 2 * 8/3
        let integrand: Vec<f64> = snapshot
            .bulk()
            .xs()
            .iter()
            .zip(snapshot.bulk().ys().iter())
            .map(|(x, y)| x * y * y)
            .collect();
        assert_relative_eq!(
            snapshot.bulk().integrate(&integrand).unwrap(),
            16.0 / 3.0,
            max_relative = 1e-12
        );

        // y along the right side = 2
        let right = snapshot.edge(Side::Right);
        let integrand: Vec<f64> = right.ys().iter().copied().collect();
        assert_relative_eq!(right.integrate(&integrand).unwrap(), 2.0, max_relative = 1e-12);

        assert!(snapshot.bulk().integrate(&[1.0, 2.0]).is_err());
    }
}
