//! Robin boundary data `a·u + b·∂u/∂n = g` (outward normal) and the ghost relations derived
//! from it.
//!
//! Two discrete relations are used on side-centered data:
//! - a *tangential* ghost sits half a cell outside the boundary, mirrored from the interior
//!   face `u_i`: `a(u_i + u_g)/2 + b(u_g - u_i)/h = g`, i.e. `u_g = alpha + beta·u_i`;
//! - a *normal* ghost sits one cell outside a face `u_b` lying on the boundary, centered
//!   difference with the interior face `u_in`: `a·u_b + b(u_g - u_in)/(2h) = g`, i.e.
//!   `u_g = u_in + gamma + delta·u_b`.
//!
//! Both relations are exact for data linear in the normal direction.
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::geometry::{BoundaryLocation, NDIM};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobinCoefs {
    pub a: f64,
    pub b: f64,
    pub g: f64,
}

impl RobinCoefs {
    pub fn new(a: f64, b: f64, g: f64) -> Self {
        Self { a, b, g }
    }

    pub fn dirichlet(g: f64) -> Self {
        Self { a: 1.0, b: 0.0, g }
    }

    pub fn neumann(g: f64) -> Self {
        Self { a: 0.0, b: 1.0, g }
    }

    pub fn is_dirichlet(&self) -> bool {
        self.b == 0.0
    }

    /// `a = b = 0` or non-finite data
    pub fn validate(&self) -> Result<(), FacError> {
        if !(self.a.is_finite() && self.b.is_finite() && self.g.is_finite()) {
            return Err(FacError::InvalidBoundaryCoefs(format!(
                "non-finite coefficients {:?}",
                self
            )));
        }
        if self.a == 0.0 && self.b == 0.0 {
            return Err(FacError::InvalidBoundaryCoefs(
                "a = b = 0 does not define a boundary condition".to_string(),
            ));
        }
        Ok(())
    }

    /// value of a Dirichlet boundary face, `g/a`
    pub fn dirichlet_value(&self, homogeneous: bool) -> f64 {
        if homogeneous { 0.0 } else { self.g / self.a }
    }

    /// `(alpha, beta)` with `u_g = alpha + beta·u_i` for a ghost half a cell outside the boundary
    pub fn tangential_ghost_weights(&self, h: f64) -> Result<(f64, f64), FacError> {
        let denom = self.a * h + 2.0 * self.b;
        if denom == 0.0 || !denom.is_finite() {
            return Err(FacError::InvalidBoundaryCoefs(format!(
                "a·h + 2b vanishes for {:?} at h = {}",
                self, h
            )));
        }
        let alpha = 2.0 * h * self.g / denom;
        let beta = -(self.a * h - 2.0 * self.b) / denom;
        Ok((alpha, beta))
    }

    /// `(gamma, delta)` with `u_g = u_in + gamma + delta·u_b` for a ghost beyond a boundary face
    pub fn normal_ghost_weights(&self, h: f64) -> Result<(f64, f64), FacError> {
        if self.b == 0.0 {
            return Err(FacError::InvalidBoundaryCoefs(format!(
                "normal ghost requested for a Dirichlet face {:?}",
                self
            )));
        }
        let gamma = 2.0 * h * self.g / self.b;
        let delta = -2.0 * h * self.a / self.b;
        Ok((gamma, delta))
    }
}

/// Source of Robin coefficients for one component axis of the side-centered field.
pub trait RobinBcCoefStrategy: Send + Sync {
    /// coefficients at boundary point `x` on `location`, component `depth`, time `time`
    fn coefs(&self, location: BoundaryLocation, x: &[f64; NDIM], depth: usize, time: f64) -> RobinCoefs;
}

/// Constant coefficients per boundary location (`2*NDIM` entries indexed by
/// `BoundaryLocation::location_index`).
#[derive(Debug, Clone, PartialEq)]
pub struct LocationIndexRobinBcCoefs {
    pub name: String,
    coefs: [RobinCoefs; 2 * NDIM],
}

impl LocationIndexRobinBcCoefs {
    /// homogeneous Dirichlet on every boundary
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            coefs: [RobinCoefs::dirichlet(0.0); 2 * NDIM],
        }
    }

    pub fn set_boundary_value(&mut self, location_index: usize, value: f64) {
        self.coefs[location_index] = RobinCoefs::dirichlet(value);
    }

    pub fn set_boundary_slope(&mut self, location_index: usize, slope: f64) {
        self.coefs[location_index] = RobinCoefs::neumann(slope);
    }

    pub fn set_raw_coefs(&mut self, location_index: usize, a: f64, b: f64, g: f64) {
        self.coefs[location_index] = RobinCoefs::new(a, b, g);
    }

    pub fn get(&self, location_index: usize) -> RobinCoefs {
        self.coefs[location_index]
    }
}

impl RobinBcCoefStrategy for LocationIndexRobinBcCoefs {
    fn coefs(&self, location: BoundaryLocation, _x: &[f64; NDIM], _depth: usize, _time: f64) -> RobinCoefs {
        self.coefs[location.location_index()]
    }
}

/// Coefficients given by a closure `(location, x, depth, time) -> RobinCoefs`.
pub struct FnRobinBcCoefs<F>
where
    F: Fn(BoundaryLocation, &[f64; NDIM], usize, f64) -> RobinCoefs + Send + Sync,
{
    f: F,
}

impl<F> FnRobinBcCoefs<F>
where
    F: Fn(BoundaryLocation, &[f64; NDIM], usize, f64) -> RobinCoefs + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> RobinBcCoefStrategy for FnRobinBcCoefs<F>
where
    F: Fn(BoundaryLocation, &[f64; NDIM], usize, f64) -> RobinCoefs + Send + Sync,
{
    fn coefs(&self, location: BoundaryLocation, x: &[f64; NDIM], depth: usize, time: f64) -> RobinCoefs {
        (self.f)(location, x, depth, time)
    }
}

/// One provider per component axis; `None` falls back to the default provider.
pub type BcCoefSet = [Option<Arc<dyn RobinBcCoefStrategy>>; NDIM];

/// Resolve the provider of `axis`, falling back to `default`.
pub fn provider_for<'a>(
    set: &'a BcCoefSet,
    default: &'a Arc<dyn RobinBcCoefStrategy>,
    axis: usize,
) -> &'a Arc<dyn RobinBcCoefStrategy> {
    set[axis].as_ref().unwrap_or(default)
}
