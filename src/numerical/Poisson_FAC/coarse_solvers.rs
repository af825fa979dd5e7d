//! Back ends of the coarsest-level solve.
//!
//! `block_jacobi` smooths; `sparse_lu` and `krylov` assemble one sparse operator per patch, axis
//! and depth and run Schwarz iterations over the patches of the level: patches are visited in id
//! order, each first re-reading the faces it receives from lower-id patches with the same owner,
//! then solving its correction problem exactly (LU) or with GMRES. The loop stops when the level
//! residual has dropped by `tolerance` relative to its initial value.
use crate::numerical::Poisson_FAC::fac_config::{CoarseSolverChoice, SmootherChoice};
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::hierarchy::PatchHierarchy;
use crate::numerical::Poisson_FAC::overlap::OverlapCache;
use crate::numerical::Poisson_FAC::patch_laplace::{PatchLaplaceOperator, build_patch_laplace_operator};
use crate::numerical::Poisson_FAC::poisson_spec::PoissonSpecifications;
use crate::numerical::Poisson_FAC::residual::level_residual_sq;
use crate::numerical::Poisson_FAC::side_data::{SideData, SideVector};
use crate::numerical::Poisson_FAC::smoother::smooth_level;
use crate::numerical::Poisson_FAC::stencil::StencilCache;
use crate::numerical::Poisson_FAC::transfer::GhostFillSchedule;
use crate::somelinalg::faer_solvers::{SparseLu, gmres_solve};
use enum_dispatch::enum_dispatch;
use log::{debug, info, warn};

/// Everything a back end reads from the operator state.
pub struct CoarseContext<'a> {
    pub hierarchy: &'a PatchHierarchy,
    pub spec: &'a PoissonSpecifications,
    pub overlap: &'a OverlapCache,
    pub schedule: &'a GhostFillSchedule,
    pub stencils: &'a StencilCache,
    pub smoother_choice: SmootherChoice,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub homogeneous: bool,
}

impl<'a> CoarseContext<'a> {
    fn face_volume(&self, ln: usize) -> f64 {
        self.hierarchy.level(ln).dx.iter().product()
    }

    fn level_residual_norm(&self, error: &SideVector, residual: &SideVector, ln: usize) -> f64 {
        level_residual_sq(
            error.level_data(ln),
            residual.level_data(ln),
            self.stencils.level(ln),
            self.face_volume(ln),
            self.homogeneous,
        )
        .sqrt()
    }
}

#[enum_dispatch]
pub enum CoarseSolverBackend {
    BlockJacobi(BlockJacobiSolver),
    SparseLu(SparseLuSolver),
    Krylov(KrylovSolver),
}

#[enum_dispatch(CoarseSolverBackend)]
pub trait CoarseLevelSolver {
    fn name(&self) -> &'static str;
    /// build whatever the back end keeps between solves
    fn assemble(&mut self, ctx: &CoarseContext<'_>, ln: usize) -> Result<(), FacError>;
    /// improve `error` on level `ln` for the right-hand side `residual`; `Ok(false)` when the
    /// tolerance was not reached
    fn solve(
        &mut self,
        ctx: &CoarseContext<'_>,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
    ) -> Result<bool, FacError>;
    fn release(&mut self);
}

impl CoarseSolverBackend {
    pub fn from_choice(choice: CoarseSolverChoice) -> Self {
        match choice {
            CoarseSolverChoice::BlockJacobi => BlockJacobiSolver::default().into(),
            CoarseSolverChoice::SparseLu => SparseLuSolver::default().into(),
            CoarseSolverChoice::Krylov => KrylovSolver::default().into(),
        }
    }
}

////////////////////////////////////////////////////////////////
//  BLOCK JACOBI
////////////////////////////////////////////////////////////////
#[derive(Debug, Default)]
pub struct BlockJacobiSolver;

impl CoarseLevelSolver for BlockJacobiSolver {
    fn name(&self) -> &'static str {
        "block_jacobi"
    }

    fn assemble(&mut self, _ctx: &CoarseContext<'_>, _ln: usize) -> Result<(), FacError> {
        Ok(())
    }

    fn solve(
        &mut self,
        ctx: &CoarseContext<'_>,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
    ) -> Result<bool, FacError> {
        smooth_level(
            error,
            residual,
            ln,
            ctx.max_iterations,
            ctx.smoother_choice,
            ctx.overlap.level(ln),
            ctx.schedule,
            ctx.stencils.level(ln),
            ctx.homogeneous,
        );
        debug!("block_jacobi: {} sweeps on level {}", ctx.max_iterations, ln);
        Ok(true)
    }

    fn release(&mut self) {}
}

/// Operators of every patch of a level, `[patch][axis * depth + k]`.
fn assemble_level_operators(
    ctx: &CoarseContext<'_>,
    ln: usize,
) -> Result<Vec<Vec<PatchLaplaceOperator>>, FacError> {
    let dx = ctx.hierarchy.level(ln).dx;
    let depth = ctx.overlap.depth;
    ctx.overlap
        .level(ln)
        .patches
        .iter()
        .map(|po| {
            let mut ops = Vec::with_capacity(po.axes.len() * depth);
            for axis in 0..po.axes.len() {
                for k in 0..depth {
                    ops.push(build_patch_laplace_operator(
                        ctx.spec,
                        &dx,
                        po,
                        axis,
                        k,
                        ctx.overlap.ghost_width,
                    )?);
                }
            }
            Ok(ops)
        })
        .collect()
}

/// Outer Schwarz loop shared by the matrix back ends. `local(patch, op_index, rhs)` returns
/// the correction of one operator.
fn schwarz_iterations<F>(
    ctx: &CoarseContext<'_>,
    operators: &[Vec<PatchLaplaceOperator>],
    error: &mut SideVector,
    residual: &SideVector,
    ln: usize,
    name: &str,
    mut local: F,
) -> Result<bool, FacError>
where
    F: FnMut(usize, usize, &PatchLaplaceOperator, &[f64]) -> Result<Vec<f64>, String>,
{
    let backup: Vec<SideData> = error.level_data(ln).to_vec();
    ctx.schedule.fill_vector_level(error, ln, ctx.homogeneous);
    let r0 = ctx.level_residual_norm(error, residual, ln);
    if r0 == 0.0 {
        return Ok(true);
    }
    let level_overlap = ctx.overlap.level(ln);
    let mut failure: Option<String> = None;
    let mut converged = false;
    let mut r = r0;
    let mut iterations = 0;
    for _ in 0..ctx.max_iterations {
        iterations += 1;
        {
            let f = residual.level_data(ln);
            let data = error.level_data_mut(ln);
            'patches: for (id, ops) in operators.iter().enumerate() {
                let owner = level_overlap.patches[id].owner;
                if id > 0 {
                    ctx.schedule.refresh_patch(data, ln, id, |src| {
                        src < id && level_overlap.patches[src].owner == owner
                    });
                }
                for (j, op) in ops.iter().enumerate() {
                    if op.n() == 0 {
                        continue;
                    }
                    let b = op.residual_rhs(&data[id], &f[id], ctx.homogeneous);
                    match local(id, j, op, &b) {
                        Ok(delta) if delta.iter().all(|v| v.is_finite()) => {
                            op.apply_correction(&mut data[id], &delta)
                        }
                        Ok(_) => {
                            failure = Some(format!("non-finite correction on patch {}", id));
                            break 'patches;
                        }
                        Err(e) => {
                            failure = Some(e);
                            break 'patches;
                        }
                    }
                }
            }
        }
        if failure.is_some() {
            break;
        }
        ctx.schedule.fill_vector_level(error, ln, ctx.homogeneous);
        r = ctx.level_residual_norm(error, residual, ln);
        debug!("{}: iteration {} on level {}, |r| = {:e}", name, iterations, ln, r);
        if !r.is_finite() {
            failure = Some("non-finite residual".to_string());
            break;
        }
        if r <= ctx.tolerance * r0 {
            converged = true;
            break;
        }
    }
    if failure.is_some() || r > r0 {
        for (dst, src) in error.level_data_mut(ln).iter_mut().zip(backup.iter()) {
            dst.copy_from(src);
        }
        warn!(
            "{} on level {} failed ({}), error left unchanged",
            name,
            ln,
            failure.unwrap_or_else(|| format!("residual grew from {:e} to {:e}", r0, r))
        );
        return Ok(false);
    }
    if converged {
        info!("{}: converged in {} iterations, |r| {:e} -> {:e}", name, iterations, r0, r);
    } else {
        warn!(
            "{}: tolerance {:e} not reached in {} iterations, |r| {:e} -> {:e}",
            name, ctx.tolerance, iterations, r0, r
        );
    }
    Ok(converged)
}

////////////////////////////////////////////////////////////////
//  SPARSE LU
////////////////////////////////////////////////////////////////
#[derive(Default)]
pub struct SparseLuSolver {
    level: Option<usize>,
    operators: Vec<Vec<PatchLaplaceOperator>>,
    /// `None` when some factorization failed
    factors: Option<Vec<Vec<Option<SparseLu>>>>,
}

impl CoarseLevelSolver for SparseLuSolver {
    fn name(&self) -> &'static str {
        "sparse_lu"
    }

    fn assemble(&mut self, ctx: &CoarseContext<'_>, ln: usize) -> Result<(), FacError> {
        self.release();
        let operators = assemble_level_operators(ctx, ln)?;
        let mut factors = Vec::with_capacity(operators.len());
        let mut ok = true;
        for ops in operators.iter() {
            let mut patch_factors = Vec::with_capacity(ops.len());
            for op in ops.iter() {
                if op.n() == 0 {
                    patch_factors.push(None);
                    continue;
                }
                match SparseLu::factorize(&op.matrix) {
                    Ok(lu) => patch_factors.push(Some(lu)),
                    Err(e) => {
                        warn!("sparse_lu: patch {} axis {}: {}", op.patch_id, op.axis, e);
                        ok = false;
                        patch_factors.push(None);
                    }
                }
            }
            factors.push(patch_factors);
        }
        self.level = Some(ln);
        self.operators = operators;
        self.factors = if ok { Some(factors) } else { None };
        info!("sparse_lu: level {} assembled, factorization ok: {}", ln, ok);
        Ok(())
    }

    fn solve(
        &mut self,
        ctx: &CoarseContext<'_>,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
    ) -> Result<bool, FacError> {
        if self.level != Some(ln) {
            return Err(FacError::NotInitialized(format!(
                "sparse_lu has no factorization for level {}",
                ln
            )));
        }
        let Some(factors) = self.factors.as_ref() else {
            warn!("sparse_lu: no usable factorization on level {}", ln);
            return Ok(false);
        };
        schwarz_iterations(ctx, &self.operators, error, residual, ln, self.name(), |id, j, _op, b| {
            match &factors[id][j] {
                Some(lu) => Ok(lu.solve(b)),
                None => Err(format!("missing factorization on patch {}", id)),
            }
        })
    }

    fn release(&mut self) {
        self.level = None;
        self.operators.clear();
        self.factors = None;
    }
}

////////////////////////////////////////////////////////////////
//  KRYLOV
////////////////////////////////////////////////////////////////
#[derive(Default)]
pub struct KrylovSolver {
    level: Option<usize>,
    operators: Vec<Vec<PatchLaplaceOperator>>,
}

impl CoarseLevelSolver for KrylovSolver {
    fn name(&self) -> &'static str {
        "krylov"
    }

    fn assemble(&mut self, ctx: &CoarseContext<'_>, ln: usize) -> Result<(), FacError> {
        self.release();
        self.operators = assemble_level_operators(ctx, ln)?;
        self.level = Some(ln);
        info!("krylov: level {} assembled", ln);
        Ok(())
    }

    fn solve(
        &mut self,
        ctx: &CoarseContext<'_>,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
    ) -> Result<bool, FacError> {
        if self.level != Some(ln) {
            return Err(FacError::NotInitialized(format!(
                "krylov has no operators for level {}",
                ln
            )));
        }
        let tol = ctx.tolerance;
        schwarz_iterations(ctx, &self.operators, error, residual, ln, self.name(), |_, _, op, b| {
            gmres_solve(&op.matrix, b, op.n() + 10, tol).map(|(x, _err, _iters)| x)
        })
    }

    fn release(&mut self) {
        self.level = None;
        self.operators.clear();
    }
}
