//! Point-relaxation (Gauss-Seidel) smoothing of the error on one level.
//!
//! Within a patch the unknowns are relaxed lexicographically with
//! `u(q) = (f(q) - constant - sum coef·u_nb) / diag`. Across patches:
//! - additive: all patches relax against the ghost values filled at the start of the sweep,
//!   in parallel (block Jacobi over patches);
//! - multiplicative: patches relax in id order and first re-read the faces they receive from
//!   already relaxed neighbors. Only neighbors with the same owner are re-read; across owners the
//!   sweep stays additive.
use crate::numerical::Poisson_FAC::fac_config::SmootherChoice;
use crate::numerical::Poisson_FAC::overlap::LevelOverlap;
use crate::numerical::Poisson_FAC::side_data::{SideData, SideVector};
use crate::numerical::Poisson_FAC::stencil::PatchStencil;
use crate::numerical::Poisson_FAC::transfer::GhostFillSchedule;
use rayon::prelude::*;

/// One lexicographic Gauss-Seidel pass over the unknowns of a patch.
pub fn relax_patch(u: &mut SideData, f: &SideData, stencil: &PatchStencil, homogeneous: bool) {
    for (axis, per_depth) in stencil.rows.iter().enumerate() {
        for (k, rows) in per_depth.iter().enumerate() {
            for (q, row) in rows.iter() {
                let rhs = f.get(axis, q, k) - row.constant(homogeneous) - row.off_diagonal(u, axis, k);
                u.set(axis, q, k, rhs / row.diag);
            }
        }
    }
}

/// `num_sweeps` relaxation sweeps of `error` on level `ln` against `residual`.
pub fn smooth_level(
    error: &mut SideVector,
    residual: &SideVector,
    ln: usize,
    num_sweeps: usize,
    choice: SmootherChoice,
    overlap: &LevelOverlap,
    schedule: &GhostFillSchedule,
    stencils: &[PatchStencil],
    homogeneous: bool,
) {
    let f = residual.level_data(ln);
    for _ in 0..num_sweeps {
        schedule.fill_vector_level(error, ln, homogeneous);
        let data = error.level_data_mut(ln);
        match choice {
            SmootherChoice::Additive => {
                data.par_iter_mut()
                    .zip(f.par_iter())
                    .zip(stencils.par_iter())
                    .for_each(|((u, f), stencil)| relax_patch(u, f, stencil, homogeneous));
            }
            SmootherChoice::Multiplicative => {
                for id in 0..data.len() {
                    let owner = overlap.patches[id].owner;
                    if id > 0 {
                        schedule.refresh_patch(data, ln, id, |src| {
                            src < id && overlap.patches[src].owner == owner
                        });
                    }
                    relax_patch(&mut data[id], &f[id], &stencils[id], homogeneous);
                }
            }
        }
    }
    // leave shared faces and ghosts consistent with the relaxed values
    schedule.fill_vector_level(error, ln, homogeneous);
}
