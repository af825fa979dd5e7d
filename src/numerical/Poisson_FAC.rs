//! FAC multigrid level operator for side-centered `(C I + div D grad) u = f` with Robin
//! boundary conditions on block-structured adaptively refined grids.
//!
//! The operator supplies the level-local pieces of a FAC cycle (smoothing, composite residual,
//! coarsest-level solve) through `FacPreconditionerStrategy`; the cycle itself belongs to the
//! driver.

/// index boxes, boundary locations
pub mod geometry;
/// levels of patches with refinement ratios and mesh widths
pub mod hierarchy;
/// side-centered patch data and vectors over a hierarchy
pub mod side_data;
pub mod poisson_spec;
/// Robin coefficients `a u + b du/dn = g` and their providers
pub mod robin_bc;
/// classification of the faces of every patch
pub mod overlap;
/// ghost filling and fine-to-coarse restriction
pub mod transfer;
pub mod stencil;
pub mod smoother;
pub mod residual;
pub mod patch_laplace;
/// block Jacobi, sparse LU and GMRES coarsest-level solves
pub mod coarse_solvers;
pub mod fac_config;
pub mod fac_errors;
pub mod fac_strategy;
pub mod fac_operator;

mod fac_tests;
