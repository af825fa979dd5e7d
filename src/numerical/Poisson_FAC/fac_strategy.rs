//! The capability set a FAC cycle driver needs from a level operator.
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::side_data::SideVector;

pub trait FacPreconditionerStrategy {
    /// Build all per-hierarchy state for levels `[coarsest, finest]` from the layout of
    /// `solution` and `rhs`. Reinitializing first releases the previous state.
    fn initialize_operator_state(
        &mut self,
        solution: &SideVector,
        rhs: &SideVector,
        coarsest: usize,
        finest: usize,
    ) -> Result<(), FacError>;

    /// Release the state; calling it on an uninitialized operator does nothing.
    fn deallocate_operator_state(&mut self);

    /// Relax `error` on level `ln` with `residual` as right-hand side.
    /// `pre`/`post` mark the position in the cycle and only affect logging.
    fn smooth_error(
        &mut self,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
        num_sweeps: usize,
        pre: bool,
        post: bool,
    ) -> Result<(), FacError>;

    /// Solve the error equation on the coarsest level of the operator. `Ok(false)` reports that
    /// the configured tolerance was not reached.
    fn solve_coarsest_level(
        &mut self,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
    ) -> Result<bool, FacError>;

    /// Composite residual `residual = rhs - A solution` on levels `[coarsest, finest]`.
    fn compute_residual(
        &mut self,
        residual: &mut SideVector,
        solution: &SideVector,
        rhs: &SideVector,
        coarsest: usize,
        finest: usize,
    ) -> Result<(), FacError>;
}
