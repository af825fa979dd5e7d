use crate::numerical::Poisson_FAC::geometry::NDIM;

/// Coefficients of `(C·I + ∇·D∇) u = f`, constant in space. `d[k]` multiplies the second
/// derivative along direction `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonSpecifications {
    pub name: String,
    pub c: f64,
    pub d: [f64; NDIM],
}

impl PoissonSpecifications {
    /// `C = 0`, `D = 1`: the plain Laplacian.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            c: 0.0,
            d: [1.0; NDIM],
        }
    }

    pub fn with_coefficients(name: &str, c: f64, d: f64) -> Self {
        Self {
            name: name.to_string(),
            c,
            d: [d; NDIM],
        }
    }

    pub fn set_c_constant(&mut self, c: f64) {
        self.c = c;
    }

    pub fn set_c_zero(&mut self) {
        self.c = 0.0;
    }

    pub fn set_d_constant(&mut self, d: f64) {
        self.d = [d; NDIM];
    }

    pub fn set_d_per_direction(&mut self, d: [f64; NDIM]) {
        self.d = d;
    }

    pub fn c_is_zero(&self) -> bool {
        self.c == 0.0
    }

    pub fn d_is_isotropic(&self) -> bool {
        self.d.iter().all(|dk| *dk == self.d[0])
    }
}

impl Default for PoissonSpecifications {
    fn default() -> Self {
        Self::new("poisson_spec")
    }
}
