//! Composite-grid residual `r = f - A u` over a range of levels.
use crate::numerical::Poisson_FAC::side_data::{SideData, SideVector};
use crate::numerical::Poisson_FAC::stencil::{PatchStencil, StencilCache};
use crate::numerical::Poisson_FAC::transfer::GhostFillSchedule;
use log::debug;
use rayon::prelude::*;

/// `r = f - A u` at the unknown faces of one patch, zero elsewhere. `u` must be ghost-filled.
pub fn patch_residual(
    r: &mut SideData,
    u: &SideData,
    f: &SideData,
    stencil: &PatchStencil,
    homogeneous: bool,
) {
    r.fill(0.0);
    for (axis, per_depth) in stencil.rows.iter().enumerate() {
        for (k, rows) in per_depth.iter().enumerate() {
            for (q, row) in rows.iter() {
                let value = f.get(axis, q, k) - row.apply(u, axis, q, k, homogeneous);
                r.set(axis, q, k, value);
            }
        }
    }
}

/// Sum of squared residuals at the unknown faces of one level, weighted by the face volume.
/// `u` must be ghost-filled.
pub fn level_residual_sq(
    u: &[SideData],
    f: &[SideData],
    stencils: &[PatchStencil],
    volume: f64,
    homogeneous: bool,
) -> f64 {
    u.par_iter()
        .zip(f.par_iter())
        .zip(stencils.par_iter())
        .map(|((u, f), stencil)| {
            let mut sum = 0.0;
            for (axis, per_depth) in stencil.rows.iter().enumerate() {
                for (k, rows) in per_depth.iter().enumerate() {
                    for (q, row) in rows.iter() {
                        let r = f.get(axis, q, k) - row.apply(u, axis, q, k, homogeneous);
                        sum += r * r * volume;
                    }
                }
            }
            sum
        })
        .sum()
}

/// Composite residual over `[coarsest, finest]`.
///
/// `scratch` receives a synchronized copy of `solution`: coarse faces under a finer level carry
/// the restricted fine values and every level is ghost-filled (coarse-fine ghosts from the
/// synchronized coarser level) before the stencils are applied. The residual is then restricted
/// onto covered coarse faces, so fine stencils only see coarse data where no fine data exists and
/// coarse stencils see fine data where it does.
pub fn compute_composite_residual(
    residual: &mut SideVector,
    solution: &SideVector,
    rhs: &SideVector,
    coarsest: usize,
    finest: usize,
    scratch: &mut SideVector,
    schedule: &GhostFillSchedule,
    stencils: &StencilCache,
    homogeneous: bool,
) {
    let first = if coarsest > 0 { coarsest - 1 } else { coarsest };
    for ln in first..=finest {
        scratch.copy_level_from(solution, ln);
    }
    for ln in (coarsest + 1..=finest).rev() {
        schedule.restrict_vector_level(scratch, ln);
    }
    for ln in coarsest..=finest {
        schedule.fill_vector_level(scratch, ln, homogeneous);
    }
    for ln in coarsest..=finest {
        let u = scratch.level_data(ln);
        let f = rhs.level_data(ln);
        let level_stencils = stencils.level(ln);
        residual
            .level_data_mut(ln)
            .par_iter_mut()
            .enumerate()
            .for_each(|(id, r)| patch_residual(r, &u[id], &f[id], &level_stencils[id], homogeneous));
        schedule.copy_level(residual.level_data_mut(ln), ln);
    }
    for ln in (coarsest + 1..=finest).rev() {
        schedule.restrict_vector_level(residual, ln);
    }
    debug!(
        "composite residual on levels [{}, {}]: |r|_2 = {:e}",
        coarsest,
        finest,
        residual.l2_norm(coarsest, finest)
    );
}
