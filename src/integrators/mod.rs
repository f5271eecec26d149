//! Monte Carlo integrators
pub mod importance;
