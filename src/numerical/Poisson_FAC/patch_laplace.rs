//! Assembled sparse operator of one patch, one component axis and one depth.
//!
//! Rows are the stencil rows of the unknown faces. Neighbors that are not unknowns of the patch
//! (shared, copied, coarse-fine or Dirichlet faces) are held fixed, so the patch problem is
//! solved for a correction: `A δ = s (f - A u - c)`, `u += δ`. Rows of Robin boundary faces carry
//! the scale `s = 1/2`, which restores symmetry broken by folding the normal ghost onto the
//! opposite neighbor.
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::geometry::{IndexBox, IntVect, NDIM};
use crate::numerical::Poisson_FAC::overlap::PatchOverlap;
use crate::numerical::Poisson_FAC::poisson_spec::PoissonSpecifications;
use crate::numerical::Poisson_FAC::side_data::SideData;
use crate::numerical::Poisson_FAC::stencil::{StencilRow, build_row};
use crate::somelinalg::faer_solvers::{FaerMat, sparse_from_triplets};
use nalgebra::DMatrix;
use std::collections::BTreeMap;

pub const BOUNDARY_ROW_SCALE: f64 = 0.5;

pub struct PatchLaplaceOperator {
    pub patch_id: usize,
    pub axis: usize,
    pub depth: usize,
    /// unknown faces in row order
    pub unknowns: Vec<IntVect>,
    index: BTreeMap<IntVect, usize>,
    pub row_scale: Vec<f64>,
    rows: Vec<StencilRow>,
    triplets: Vec<(usize, usize, f64)>,
    pub matrix: FaerMat,
}

impl PatchLaplaceOperator {
    pub fn n(&self) -> usize {
        self.unknowns.len()
    }

    /// row of face `p`, if it is an unknown
    pub fn row_of(&self, p: &IntVect) -> Option<usize> {
        self.index.get(p).copied()
    }

    pub fn triplets(&self) -> &[(usize, usize, f64)] {
        &self.triplets
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let n = self.n();
        let mut dense = DMatrix::zeros(n, n);
        for &(i, j, v) in self.triplets.iter() {
            dense[(i, j)] += v;
        }
        dense
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        let dense = self.to_dense();
        let scale = dense.amax().max(1.0);
        (0..self.n()).all(|i| (0..i).all(|j| (dense[(i, j)] - dense[(j, i)]).abs() <= tol * scale))
    }

    /// Scaled residual `s (f - A u - c)` at the unknowns; `u` must be ghost-filled.
    pub fn residual_rhs(&self, u: &SideData, f: &SideData, homogeneous: bool) -> Vec<f64> {
        self.unknowns
            .iter()
            .zip(self.rows.iter())
            .zip(self.row_scale.iter())
            .map(|((q, row), s)| {
                s * (f.get(self.axis, q, self.depth) - row.apply(u, self.axis, q, self.depth, homogeneous))
            })
            .collect()
    }

    pub fn apply_correction(&self, u: &mut SideData, delta: &[f64]) {
        for (q, d) in self.unknowns.iter().zip(delta.iter()) {
            let value = u.get(self.axis, q, self.depth) + d;
            u.set(self.axis, q, self.depth, value);
        }
    }
}

/// Assemble the operator of `axis`/`depth` for patch `po` of a level with mesh widths `dx`.
pub fn build_patch_laplace_operator(
    spec: &PoissonSpecifications,
    dx: &[f64; NDIM],
    po: &PatchOverlap,
    axis: usize,
    depth: usize,
    ghost_width: usize,
) -> Result<PatchLaplaceOperator, FacError> {
    if axis >= NDIM || axis >= po.axes.len() {
        return Err(FacError::HierarchyMismatch(format!("no component axis {}", axis)));
    }
    let ax = &po.axes[axis];
    if depth >= ax.depth() {
        return Err(FacError::HierarchyMismatch(format!(
            "depth {} requested from an overlap of depth {}",
            depth,
            ax.depth()
        )));
    }
    let expected: IndexBox = ax.side_box.grow(ghost_width as i32);
    if expected != ax.ghost_box {
        return Err(FacError::HierarchyMismatch(format!(
            "ghost width {} does not match the overlap ghost box of patch {}",
            ghost_width, po.patch_id
        )));
    }

    let unknowns = ax.unknowns(depth);
    let index: BTreeMap<IntVect, usize> =
        unknowns.iter().enumerate().map(|(i, q)| (*q, i)).collect();
    let mut rows = Vec::with_capacity(unknowns.len());
    let mut row_scale = Vec::with_capacity(unknowns.len());
    let mut triplets = Vec::with_capacity(unknowns.len() * (2 * NDIM + 1));
    for (i, q) in unknowns.iter().enumerate() {
        let row = build_row(spec, dx, ax, q, depth)?;
        let s = if row.on_boundary { BOUNDARY_ROW_SCALE } else { 1.0 };
        triplets.push((i, i, s * row.diag));
        for (nb, coef) in row.entries.iter() {
            if let Some(&j) = index.get(nb) {
                triplets.push((i, j, s * coef));
            }
        }
        rows.push(row);
        row_scale.push(s);
    }
    let matrix = sparse_from_triplets(unknowns.len(), &triplets).map_err(FacError::SolverFailure)?;
    Ok(PatchLaplaceOperator {
        patch_id: po.patch_id,
        axis,
        depth,
        unknowns,
        index,
        row_scale,
        rows,
        triplets,
        matrix,
    })
}
