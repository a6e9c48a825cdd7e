extern crate json;
extern crate log;
extern crate nalgebra;
extern crate rayon;
extern crate smallvec;

/// Quadtree cells, implicit geometry, refinement and the structured grid built from them
pub mod domain;
/// Gauss-Legendre quadrature rules and integration helpers
pub mod integration;

pub use domain::{
    cell::{Cell, QuadraturePoints, RefineError, MAX_REFINEMENT_DEPTH},
    geometry::{Geometry, ImplicitGeometry},
    grid::{
        ConfigError, GridConfig, GridError, IntegrationSnapshot, PlanarCartesianGrid, Samples,
        TensorizedQuadrature,
    },
    refinement::{AggregatedRefinement, RefineBoundaries, RefinementStrategy},
    space::{Point, Quadrant, Side},
};
pub use integration::glq::{gauss_legendre_integration, QuadratureRule};
