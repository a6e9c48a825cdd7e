/// Methods to assist in Gauss-Legendre-Quadrature integration
pub mod glq;
