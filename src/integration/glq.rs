use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::fmt;

/// Positive abscissa of the 2-point Gauss-Legendre rule (1/√3)
pub const TWO_POINT_ABSCISSA: f64 = 0.5773502691896257;

/// A one dimensional Gauss-Legendre rule over the reference interval `(-1, 1)`
///
/// The same rule is applied along both reference axes of a `Cell`, so a rule of order `n`
/// produces `n * n` points over a cell's face and `n` points along each of its edges.
///
/// ```
/// use quadgrid_2d::integration::glq::QuadratureRule;
///
/// let rule = QuadratureRule::default();
/// assert_eq!(rule.order(), 2);
/// assert!((rule.points()[1] - 1.0 / 3.0_f64.sqrt()).abs() < 1e-15);
/// assert_eq!(rule.weights(), &[1.0, 1.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct QuadratureRule {
    points: SmallVec<[f64; 4]>,
    weights: SmallVec<[f64; 4]>,
}

impl QuadratureRule {
    /// Build an `n`-point rule. The 2-point rule uses the exact constants; other orders are computed numerically
    pub fn gauss_legendre(n: usize) -> Result<Self, QuadratureError> {
        match n {
            0 => Err(QuadratureError::ZeroOrder),
            2 => Ok(Self::default()),
            _ => {
                let (points, weights) = gauss_quadrature_points(n);
                Ok(Self {
                    points: SmallVec::from_vec(points),
                    weights: SmallVec::from_vec(weights),
                })
            }
        }
    }

    /// Number of points along one axis
    pub fn order(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Iterate over `(abscissa, weight)` pairs
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied().zip(self.weights.iter().copied())
    }
}

impl Default for QuadratureRule {
    fn default() -> Self {
        Self {
            points: SmallVec::from_slice(&[-TWO_POINT_ABSCISSA, TWO_POINT_ABSCISSA]),
            weights: SmallVec::from_slice(&[1.0, 1.0]),
        }
    }
}

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights over `(-1, 1)`
///
/// ```
/// use quadgrid_2d::integration::glq::*;
///
/// // generate 10 GLQ points and weights over the range `(-1, 1)`
/// let (points, weights) = gauss_quadrature_points(10);
/// assert_eq!(points.len(), 10);
/// assert_eq!(weights.len(), 10);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
// https://en.wikipedia.org/wiki/Gaussian_quadrature#Gauss%E2%80%93Legendre_quadrature
pub fn gauss_quadrature_points(n: usize) -> (Vec<f64>, Vec<f64>) {
    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let polymat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(polymat);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| (*weight).powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));

    xw.drain(0..).unzip()
}

/// Sum `integrand * weight * jacobian_det` over a set of quadrature points
///
/// An `integrand` of length 1 is broadcast over every point.
///
/// ```
/// use quadgrid_2d::integration::glq::gauss_legendre_integration;
///
/// // a constant integrand of 2.0 over four points of a 4 x 16 cell
/// let area = gauss_legendre_integration(&[2.0], &[1.0; 4], &[16.0; 4]).unwrap();
/// assert!((area - 128.0).abs() < 1e-12);
/// ```
pub fn gauss_legendre_integration(
    integrand: &[f64],
    weights: &[f64],
    jacobian_dets: &[f64],
) -> Result<f64, QuadratureError> {
    let broadcast = integrand.len() == 1;
    if (!broadcast && integrand.len() != weights.len()) || weights.len() != jacobian_dets.len() {
        return Err(QuadratureError::LengthMismatch {
            integrand: integrand.len(),
            weights: weights.len(),
            jacobian_dets: jacobian_dets.len(),
        });
    }

    Ok(weights
        .par_iter()
        .zip(jacobian_dets.par_iter())
        .enumerate()
        .map(|(i, (w, j_det))| {
            let f = if broadcast { integrand[0] } else { integrand[i] };
            f * w * j_det
        })
        .sum::<f64>())
}

/// Pack a flat array of values into an `n` element column vector
pub fn tensorize_1d(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}

/// Pack two flat coordinate arrays into an `n x 2` matrix (x in column 0, y in column 1)
pub fn tensorize_2d(xs: &[f64], ys: &[f64]) -> Result<DMatrix<f64>, QuadratureError> {
    if xs.len() != ys.len() {
        return Err(QuadratureError::CoordinateMismatch(xs.len(), ys.len()));
    }

    Ok(DMatrix::from_fn(xs.len(), 2, |r, c| {
        if c == 0 {
            xs[r]
        } else {
            ys[r]
        }
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuadratureError {
    ZeroOrder,
    LengthMismatch {
        integrand: usize,
        weights: usize,
        jacobian_dets: usize,
    },
    CoordinateMismatch(usize, usize),
}

impl fmt::Display for QuadratureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ZeroOrder => write!(f, "Quadrature rules need at least one point; Cannot build rule!"),
            Self::LengthMismatch {
                integrand,
                weights,
                jacobian_dets,
            } => write!(
                f,
                "Integrand ({}), weights ({}) and jacobian determinants ({}) have inconsistent lengths; Cannot integrate!",
                integrand, weights, jacobian_dets
            ),
            Self::CoordinateMismatch(nx, ny) => write!(
                f,
                "Got {} x-coordinates and {} y-coordinates; Cannot tensorize points!",
                nx, ny
            ),
        }
    }
}

impl std::error::Error for QuadratureError {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const GLQ_ACCURACY: f64 = 1e-9;
    // test points
    const X_20: [f64; 20] = [
        -0.993128599,
        -0.963971927,
        -0.912234428,
        -0.839116972,
        -0.746331906,
        -0.636053681,
        -0.510867002,
        -0.373706089,
        -0.227785851,
        -0.076526521,
        0.076526521,
        0.227785851,
        0.373706089,
        0.510867002,
        0.636053681,
        0.746331906,
        0.839116972,
        0.912234428,
        0.963971927,
        0.993128599,
    ];
    const W_20: [f64; 20] = [
        0.017614007,
        0.04060143,
        0.062672048,
        0.083276742,
        0.10193012,
        0.118194532,
        0.131688638,
        0.142096109,
        0.149172986,
        0.152753387,
        0.152753387,
        0.149172986,
        0.142096109,
        0.131688638,
        0.118194532,
        0.10193012,
        0.083276742,
        0.062672048,
        0.04060143,
        0.017614007,
    ];

    #[test]
    fn glq_point_generation() {
        let (glq_points, glq_weights) = gauss_quadrature_points(20);

        for (glq_ref, glq_test) in X_20.iter().zip(glq_points.iter()) {
            assert_abs_diff_eq!(glq_ref, glq_test, epsilon = GLQ_ACCURACY);
        }

        for (glq_w_ref, glq_w_test) in W_20.iter().zip(glq_weights.iter()) {
            assert_abs_diff_eq!(glq_w_ref, glq_w_test, epsilon = GLQ_ACCURACY);
        }
    }

    #[test]
    fn numeric_two_point_rule_matches_constants() {
        let (points, weights) = gauss_quadrature_points(2);
        let exact = QuadratureRule::default();

        for (p, p_exact) in points.iter().zip(exact.points()) {
            assert_abs_diff_eq!(p, p_exact, epsilon = 1e-12);
        }
        for w in weights {
            assert_abs_diff_eq!(w, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn rule_orders() {
        assert_eq!(QuadratureRule::gauss_legendre(0), Err(QuadratureError::ZeroOrder));

        let one = QuadratureRule::gauss_legendre(1).unwrap();
        assert_eq!(one.order(), 1);
        assert_abs_diff_eq!(one.points()[0], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(one.weights()[0], 2.0, epsilon = 1e-14);

        let three = QuadratureRule::gauss_legendre(3).unwrap();
        assert_eq!(three.order(), 3);
        // exact for polynomials up to degree 5
        let integral: f64 = three.pairs().map(|(x, w)| x.powi(4) * w).sum();
        assert_abs_diff_eq!(integral, 2.0 / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn integration_broadcast_and_mismatch() {
        let weights = [1.0; 4];
        let j_dets = [0.25; 4];

        let solution = gauss_legendre_integration(&[1.0, 2.0, 3.0, 4.0], &weights, &j_dets).unwrap();
        assert_abs_diff_eq!(solution, 2.5, epsilon = 1e-14);

        let solution = gauss_legendre_integration(&[3.0], &weights, &j_dets).unwrap();
        assert_abs_diff_eq!(solution, 3.0, epsilon = 1e-14);

        assert!(gauss_legendre_integration(&[1.0, 2.0], &weights, &j_dets).is_err());
        assert!(gauss_legendre_integration(&[1.0], &weights, &j_dets[..3]).is_err());
    }

    #[test]
    fn tensorize() {
        let coords = tensorize_2d(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(coords.nrows(), 3);
        assert_eq!(coords.ncols(), 2);
        assert_eq!(coords[(1, 0)], 2.0);
        assert_eq!(coords[(2, 1)], 6.0);

        assert_eq!(
            tensorize_2d(&[1.0], &[]),
            Err(QuadratureError::CoordinateMismatch(1, 0))
        );

        let weights = tensorize_1d(&[0.5, 1.5]);
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[1], 1.5);
    }
}
