/// The recursive quadtree `Cell`
pub mod cell;
/// Implicitly defined regions and their set algebra
pub mod geometry;
/// Structured grids of base `Cell`s, their aggregated quadrature and configuration
pub mod grid;
/// Strategies for adaptive h-refinement of a grid's base cells
pub mod refinement;
/// Points, quadrants and sides used to navigate a quadtree
pub mod space;

/// Default number of seeds per cell side used by the geometric cut/inside tests
pub const DEFAULT_SEEDS_PER_SIDE: usize = 10;
