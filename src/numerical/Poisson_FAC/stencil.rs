//! Discrete operator rows of `C·u + sum_d D_d (u(q+e_d) - 2u(q) + u(q-e_d)) / h_d^2` at the
//! unknown faces of a patch.
//!
//! Ghosts across the physical boundary never enter a row: tangential ghosts are replaced by
//! `alpha + beta·u(q)` and the normal ghost of a Robin face by `u(q ∓ e_a) + gamma + delta·u(q)`,
//! so they only modify `diag` and `constant`. Every other neighbor (interior, shared, copied,
//! coarse-fine or Dirichlet face) is read from the patch data. `constant` is linear in the
//! boundary data `g` and is dropped for homogeneous boundary conditions.
//!
//! The same rows drive the smoother, the residual and the assembled patch matrices.
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::geometry::{IntVect, NDIM, shift};
use crate::numerical::Poisson_FAC::hierarchy::PatchHierarchy;
use crate::numerical::Poisson_FAC::overlap::{AxisOverlap, FaceKind, OverlapCache, PatchOverlap};
use crate::numerical::Poisson_FAC::poisson_spec::PoissonSpecifications;
use crate::numerical::Poisson_FAC::side_data::SideData;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct StencilRow {
    pub diag: f64,
    pub constant: f64,
    pub entries: Vec<(IntVect, f64)>,
    /// row lies on the physical boundary (Robin face)
    pub on_boundary: bool,
}

impl StencilRow {
    fn add_entry(&mut self, p: IntVect, coef: f64) {
        match self.entries.iter_mut().find(|(q, _)| *q == p) {
            Some(entry) => entry.1 += coef,
            None => self.entries.push((p, coef)),
        }
    }

    #[inline]
    pub fn constant(&self, homogeneous: bool) -> f64 {
        if homogeneous { 0.0 } else { self.constant }
    }

    /// `sum coef·u_nb` over the off-diagonal entries
    #[inline]
    pub fn off_diagonal(&self, data: &SideData, axis: usize, depth: usize) -> f64 {
        self.entries
            .iter()
            .map(|(p, coef)| coef * data.get(axis, p, depth))
            .sum()
    }

    /// `(A u)(q)` including the boundary constant
    #[inline]
    pub fn apply(&self, data: &SideData, axis: usize, q: &IntVect, depth: usize, homogeneous: bool) -> f64 {
        self.diag * data.get(axis, q, depth)
            + self.off_diagonal(data, axis, depth)
            + self.constant(homogeneous)
    }
}

/// Build the row of the unknown face `q` (component `depth`).
pub fn build_row(
    spec: &PoissonSpecifications,
    dx: &[f64; NDIM],
    ax: &AxisOverlap,
    q: &IntVect,
    depth: usize,
) -> Result<StencilRow, FacError> {
    let axis = ax.axis;
    let kind = ax.kind(q, depth);
    let mut row = StencilRow {
        diag: spec.c,
        constant: 0.0,
        entries: Vec::with_capacity(2 * NDIM),
        on_boundary: kind == FaceKind::RobinBoundary,
    };
    for d in 0..NDIM {
        let w = spec.d[d] / (dx[d] * dx[d]);
        row.diag -= 2.0 * w;
        for step in [-1, 1] {
            let nb = shift(q, d, step);
            if ax.kind(&nb, depth) != FaceKind::GhostPhysical {
                row.add_entry(nb, w);
                continue;
            }
            if d == axis {
                let coefs = ax.face_coefs.get(&(*q, depth)).ok_or_else(|| {
                    FacError::InvalidBoundaryCoefs(format!("no coefficients at boundary face {:?}", q))
                })?;
                let (gamma, delta) = coefs.normal_ghost_weights(dx[d])?;
                row.add_entry(shift(q, d, -step), w);
                row.diag += w * delta;
                row.constant += w * gamma;
            } else {
                let ghost = ax.ghost_coefs.get(&(nb, depth)).ok_or_else(|| {
                    FacError::InvalidBoundaryCoefs(format!("no coefficients at boundary ghost {:?}", nb))
                })?;
                let (alpha, beta) = ghost.coefs.tangential_ghost_weights(dx[d])?;
                row.diag += w * beta;
                row.constant += w * alpha;
            }
        }
    }
    if row.diag == 0.0 || !row.diag.is_finite() {
        return Err(FacError::Configuration(format!(
            "operator with C = {} and D = {:?} has a vanishing diagonal at {:?}",
            spec.c, spec.d, q
        )));
    }
    Ok(row)
}

/// Rows of all unknown faces of one patch, `rows[axis][depth]`, lexicographic within each list.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchStencil {
    pub patch_id: usize,
    pub rows: Vec<Vec<Vec<(IntVect, StencilRow)>>>,
}

impl PatchStencil {
    pub fn build(
        spec: &PoissonSpecifications,
        dx: &[f64; NDIM],
        po: &PatchOverlap,
    ) -> Result<Self, FacError> {
        let mut rows = Vec::with_capacity(NDIM);
        for ax in po.axes.iter() {
            let mut per_depth = Vec::with_capacity(ax.depth());
            for k in 0..ax.depth() {
                let list = ax
                    .unknowns(k)
                    .into_iter()
                    .map(|q| build_row(spec, dx, ax, &q, k).map(|row| (q, row)))
                    .collect::<Result<Vec<_>, FacError>>()?;
                per_depth.push(list);
            }
            rows.push(per_depth);
        }
        Ok(Self {
            patch_id: po.patch_id,
            rows,
        })
    }

    pub fn rows(&self, axis: usize, depth: usize) -> &[(IntVect, StencilRow)] {
        &self.rows[axis][depth]
    }

    pub fn num_unknowns(&self) -> usize {
        self.rows.iter().flatten().map(|r| r.len()).sum()
    }
}

/// Patch stencils of every level of the operator's range.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilCache {
    levels: BTreeMap<usize, Vec<PatchStencil>>,
}

impl StencilCache {
    pub fn build(
        spec: &PoissonSpecifications,
        hierarchy: &PatchHierarchy,
        overlap: &OverlapCache,
    ) -> Result<Self, FacError> {
        let mut levels = BTreeMap::new();
        for ln in overlap.coarsest..=overlap.finest {
            let dx = hierarchy.level(ln).dx;
            let patches = overlap
                .level(ln)
                .patches
                .iter()
                .map(|po| PatchStencil::build(spec, &dx, po))
                .collect::<Result<Vec<_>, FacError>>()?;
            levels.insert(ln, patches);
        }
        Ok(Self { levels })
    }

    pub fn level(&self, ln: usize) -> &[PatchStencil] {
        &self.levels[&ln]
    }

    pub fn patch(&self, ln: usize, id: usize) -> &PatchStencil {
        &self.levels[&ln][id]
    }
}
