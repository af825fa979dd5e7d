//! FAC level operator for the side-centered problem `(C I + div D grad) u = f`.
//!
//! The operator is either uninitialized or holds one `OperatorState` built for a hierarchy and a
//! level range: overlap cache, ghost-fill schedule, stencils, a scratch vector and the coarse
//! solver back end. The state is built into locals and committed only when every piece succeeded.
//! Setters that change the discrete problem rebuild the state for the same hierarchy and range.
//!
//! # Example
//! ```rust, ignore
//! let mut op = SCPoissonFACOperator::new("poisson", 1);
//! op.set_poisson_specifications(PoissonSpecifications::with_coefficients("helmholtz", 1.0, 1.0))?;
//! op.initialize_operator_state(&solution, &rhs, 0, hierarchy.finest_level_number())?;
//! op.compute_residual(&mut residual, &solution, &rhs, 0, 1)?;
//! op.smooth_error(&mut error, &residual, 1, 2, true, false)?;
//! let converged = op.solve_coarsest_level(&mut error, &residual, 0)?;
//! ```
use crate::numerical::Poisson_FAC::coarse_solvers::{
    CoarseContext, CoarseLevelSolver, CoarseSolverBackend,
};
use crate::numerical::Poisson_FAC::fac_config::{CoarseSolverChoice, FacConfig, SmootherChoice};
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::fac_strategy::FacPreconditionerStrategy;
use crate::numerical::Poisson_FAC::hierarchy::PatchHierarchy;
use crate::numerical::Poisson_FAC::overlap::OverlapCache;
use crate::numerical::Poisson_FAC::poisson_spec::PoissonSpecifications;
use crate::numerical::Poisson_FAC::residual::compute_composite_residual;
use crate::numerical::Poisson_FAC::robin_bc::{
    BcCoefSet, LocationIndexRobinBcCoefs, RobinBcCoefStrategy,
};
use crate::numerical::Poisson_FAC::side_data::SideVector;
use crate::numerical::Poisson_FAC::smoother::smooth_level;
use crate::numerical::Poisson_FAC::stencil::StencilCache;
use crate::numerical::Poisson_FAC::transfer::GhostFillSchedule;
use log::{debug, info, warn};
use std::sync::Arc;
use tabled::{builder::Builder, settings::Style};

/// Counters of the operator calls since construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorStatistics {
    pub initializations: usize,
    pub smooth_calls: usize,
    pub sweeps: usize,
    pub residual_evaluations: usize,
    pub coarse_solves: usize,
    pub coarse_failures: usize,
}

struct OperatorState {
    hierarchy: Arc<PatchHierarchy>,
    coarsest: usize,
    finest: usize,
    overlap: OverlapCache,
    schedule: GhostFillSchedule,
    stencils: StencilCache,
    scratch: SideVector,
    coarse_solver: CoarseSolverBackend,
}

pub struct SCPoissonFACOperator {
    object_name: String,
    depth: usize,
    spec: PoissonSpecifications,
    bc_coefs: BcCoefSet,
    default_bc: Arc<dyn RobinBcCoefStrategy>,
    config: FacConfig,
    homogeneous_bc: bool,
    solution_time: f64,
    state: Option<OperatorState>,
    stats: OperatorStatistics,
}

impl SCPoissonFACOperator {
    /// Operator for `depth` components per axis with `C = 0`, `D = 1`, homogeneous Dirichlet data
    /// and the default configuration.
    pub fn new(object_name: &str, depth: usize) -> Self {
        let default_bc: Arc<dyn RobinBcCoefStrategy> = Arc::new(LocationIndexRobinBcCoefs::new(
            &format!("{}::default_bc_coefs", object_name),
        ));
        Self {
            object_name: object_name.to_string(),
            depth,
            spec: PoissonSpecifications::new(&format!("{}::poisson_spec", object_name)),
            bc_coefs: std::array::from_fn(|_| None),
            default_bc,
            config: FacConfig::default(),
            homogeneous_bc: true,
            solution_time: 0.0,
            state: None,
            stats: OperatorStatistics::default(),
        }
    }

    pub fn from_config(object_name: &str, depth: usize, config: FacConfig) -> Result<Self, FacError> {
        config.validate()?;
        let mut op = Self::new(object_name, depth);
        op.config = config;
        Ok(op)
    }

    pub fn name(&self) -> &str {
        &self.object_name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn config(&self) -> &FacConfig {
        &self.config
    }

    pub fn poisson_specifications(&self) -> &PoissonSpecifications {
        &self.spec
    }

    pub fn statistics(&self) -> &OperatorStatistics {
        &self.stats
    }

    /// level range of the current state
    pub fn level_range(&self) -> Option<(usize, usize)> {
        self.state.as_ref().map(|s| (s.coarsest, s.finest))
    }

    /// overlap cache of the current state
    pub fn overlap_cache(&self) -> Option<&OverlapCache> {
        self.state.as_ref().map(|s| &s.overlap)
    }

    ////////////////////////////////////////////////////////////////
    //  SETTERS
    ////////////////////////////////////////////////////////////////
    pub fn set_poisson_specifications(&mut self, spec: PoissonSpecifications) -> Result<(), FacError> {
        self.spec = spec;
        self.rebuild_state()
    }

    /// One provider per component axis, `None` selects the default homogeneous Dirichlet data.
    pub fn set_physical_bc_coefs(&mut self, bc_coefs: BcCoefSet) -> Result<(), FacError> {
        self.bc_coefs = bc_coefs;
        self.rebuild_state()
    }

    /// The same provider for every component axis.
    pub fn set_physical_bc_coef(&mut self, bc_coef: Arc<dyn RobinBcCoefStrategy>) -> Result<(), FacError> {
        self.bc_coefs = std::array::from_fn(|_| Some(Arc::clone(&bc_coef)));
        self.rebuild_state()
    }

    pub fn set_smoother_choice(&mut self, choice: &str) -> Result<(), FacError> {
        self.config.smoother_choice = SmootherChoice::parse(choice)?;
        Ok(())
    }

    pub fn set_coarsest_level_solver_choice(&mut self, choice: &str) -> Result<(), FacError> {
        let parsed = CoarseSolverChoice::parse(choice)?;
        if parsed != self.config.coarse_solver_choice {
            self.config.coarse_solver_choice = parsed;
            self.rebuild_state()?;
        }
        Ok(())
    }

    pub fn set_coarsest_level_solver_tolerance(&mut self, tol: f64) -> Result<(), FacError> {
        let mut config = self.config.clone();
        config.coarse_solver_tolerance = tol;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_coarsest_level_solver_max_iterations(&mut self, max_iterations: usize) -> Result<(), FacError> {
        let mut config = self.config.clone();
        config.coarse_solver_max_iterations = max_iterations;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// stored for the cycle driver
    pub fn set_prolongation_method(&mut self, method: &str) {
        self.config.prolongation_method = method.to_string();
    }

    /// stored for the cycle driver
    pub fn set_restriction_method(&mut self, method: &str) {
        self.config.restriction_method = method.to_string();
    }

    pub fn set_homogeneous_bc(&mut self, homogeneous_bc: bool) {
        self.homogeneous_bc = homogeneous_bc;
    }

    pub fn set_solution_time(&mut self, time: f64) -> Result<(), FacError> {
        self.solution_time = time;
        self.rebuild_state()
    }

    ////////////////////////////////////////////////////////////////
    //  STATE
    ////////////////////////////////////////////////////////////////
    fn build_state(
        &self,
        hierarchy: &Arc<PatchHierarchy>,
        coarsest: usize,
        finest: usize,
        template: &SideVector,
    ) -> Result<OperatorState, FacError> {
        let overlap = OverlapCache::build(
            hierarchy,
            coarsest,
            finest,
            self.depth,
            template.ghost_width(),
            &self.bc_coefs,
            &self.default_bc,
            self.solution_time,
        )?;
        let schedule = GhostFillSchedule::build(hierarchy, &overlap);
        let stencils = StencilCache::build(&self.spec, hierarchy, &overlap)?;
        let scratch = template.clone_layout(&format!("{}::scratch", self.object_name));
        let mut coarse_solver = CoarseSolverBackend::from_choice(self.config.coarse_solver_choice);
        {
            let ctx = CoarseContext {
                hierarchy,
                spec: &self.spec,
                overlap: &overlap,
                schedule: &schedule,
                stencils: &stencils,
                smoother_choice: self.config.smoother_choice,
                tolerance: self.config.coarse_solver_tolerance,
                max_iterations: self.config.coarse_solver_max_iterations,
                homogeneous: self.homogeneous_bc,
            };
            coarse_solver.assemble(&ctx, coarsest)?;
        }
        Ok(OperatorState {
            hierarchy: Arc::clone(hierarchy),
            coarsest,
            finest,
            overlap,
            schedule,
            stencils,
            scratch,
            coarse_solver,
        })
    }

    /// Rebuild an existing state after a change of the discrete problem. On failure the operator
    /// is left uninitialized.
    fn rebuild_state(&mut self) -> Result<(), FacError> {
        let Some(old) = self.state.take() else {
            return Ok(());
        };
        let OperatorState {
            hierarchy,
            coarsest,
            finest,
            scratch,
            mut coarse_solver,
            ..
        } = old;
        coarse_solver.release();
        info!("{}: rebuilding operator state for levels [{}, {}]", self.object_name, coarsest, finest);
        let state = self.build_state(&hierarchy, coarsest, finest, &scratch)?;
        self.state = Some(state);
        Ok(())
    }

    fn state(&self, operation: &str) -> Result<&OperatorState, FacError> {
        self.state
            .as_ref()
            .ok_or_else(|| FacError::NotInitialized(format!("{}::{}", self.object_name, operation)))
    }

    /// Same hierarchy and depth; `ghosted` vectors also need the ghost width of the state.
    fn check_vector(
        depth: usize,
        state: &OperatorState,
        v: &SideVector,
        ghosted: bool,
    ) -> Result<(), FacError> {
        if !Arc::ptr_eq(v.hierarchy(), &state.hierarchy) {
            return Err(FacError::HierarchyMismatch(format!(
                "vector `{}` lives on another hierarchy",
                v.name()
            )));
        }
        if v.depth() != depth {
            return Err(FacError::HierarchyMismatch(format!(
                "vector `{}` has depth {}, operator depth is {}",
                v.name(),
                v.depth(),
                depth
            )));
        }
        if ghosted && v.ghost_width() != state.overlap.ghost_width {
            return Err(FacError::HierarchyMismatch(format!(
                "vector `{}` has ghost width {}, operator state expects {}",
                v.name(),
                v.ghost_width(),
                state.overlap.ghost_width
            )));
        }
        Ok(())
    }

    fn check_level(state: &OperatorState, ln: usize) -> Result<(), FacError> {
        if ln < state.coarsest || ln > state.finest {
            return Err(FacError::InvalidLevelRange {
                coarsest: ln,
                finest: ln,
                available: state.hierarchy.num_levels(),
            });
        }
        Ok(())
    }

    pub fn print_statistics(&self) -> String {
        let s = &self.stats;
        let rows = vec![
            vec!["operation".to_string(), "count".to_string()],
            vec!["initializations".to_string(), s.initializations.to_string()],
            vec!["smooth calls".to_string(), s.smooth_calls.to_string()],
            vec!["sweeps".to_string(), s.sweeps.to_string()],
            vec!["residual evaluations".to_string(), s.residual_evaluations.to_string()],
            vec!["coarse solves".to_string(), s.coarse_solves.to_string()],
            vec!["coarse solves not converged".to_string(), s.coarse_failures.to_string()],
        ];
        let mut table = Builder::from(rows).build();
        table.with(Style::modern_rounded());
        let text = table.to_string();
        info!("\n {} STATISTICS \n {}", self.object_name, text);
        text
    }
}

impl FacPreconditionerStrategy for SCPoissonFACOperator {
    fn initialize_operator_state(
        &mut self,
        solution: &SideVector,
        rhs: &SideVector,
        coarsest: usize,
        finest: usize,
    ) -> Result<(), FacError> {
        if self.state.is_some() {
            self.deallocate_operator_state();
        }
        let hierarchy = solution.hierarchy();
        if !Arc::ptr_eq(hierarchy, rhs.hierarchy()) {
            return Err(FacError::HierarchyMismatch(format!(
                "solution `{}` and rhs `{}` live on different hierarchies",
                solution.name(),
                rhs.name()
            )));
        }
        for v in [solution, rhs] {
            if v.depth() != self.depth {
                return Err(FacError::HierarchyMismatch(format!(
                    "vector `{}` has depth {}, operator depth is {}",
                    v.name(),
                    v.depth(),
                    self.depth
                )));
            }
        }
        if solution.ghost_width() < 1 {
            return Err(FacError::HierarchyMismatch(format!(
                "solution `{}` needs at least one ghost face",
                solution.name()
            )));
        }
        let available = hierarchy.num_levels();
        if coarsest > finest || finest >= available {
            return Err(FacError::InvalidLevelRange {
                coarsest,
                finest,
                available,
            });
        }
        let state = self.build_state(hierarchy, coarsest, finest, solution)?;
        self.state = Some(state);
        self.stats.initializations += 1;
        info!(
            "{}: initialized for levels [{}, {}], depth {}, smoother {}, coarse solver {}",
            self.object_name,
            coarsest,
            finest,
            self.depth,
            self.config.smoother_choice,
            self.config.coarse_solver_choice
        );
        Ok(())
    }

    fn deallocate_operator_state(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.coarse_solver.release();
            info!("{}: operator state deallocated", self.object_name);
        }
    }

    fn smooth_error(
        &mut self,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
        num_sweeps: usize,
        pre: bool,
        post: bool,
    ) -> Result<(), FacError> {
        let state = self.state("smooth_error")?;
        Self::check_vector(self.depth, state, error, true)?;
        Self::check_vector(self.depth, state, residual, false)?;
        Self::check_level(state, ln)?;
        let stage = if pre {
            "pre"
        } else if post {
            "post"
        } else {
            "plain"
        };
        debug!(
            "{}: {}-smoothing level {} with {} {} sweeps",
            self.object_name, stage, ln, num_sweeps, self.config.smoother_choice
        );
        smooth_level(
            error,
            residual,
            ln,
            num_sweeps,
            self.config.smoother_choice,
            state.overlap.level(ln),
            &state.schedule,
            state.stencils.level(ln),
            self.homogeneous_bc,
        );
        self.stats.smooth_calls += 1;
        self.stats.sweeps += num_sweeps;
        Ok(())
    }

    fn solve_coarsest_level(
        &mut self,
        error: &mut SideVector,
        residual: &SideVector,
        ln: usize,
    ) -> Result<bool, FacError> {
        let Some(state) = self.state.as_mut() else {
            return Err(FacError::NotInitialized(format!(
                "{}::solve_coarsest_level",
                self.object_name
            )));
        };
        Self::check_vector(self.depth, state, error, true)?;
        Self::check_vector(self.depth, state, residual, false)?;
        if ln != state.coarsest {
            return Err(FacError::InvalidLevelRange {
                coarsest: ln,
                finest: state.finest,
                available: state.hierarchy.num_levels(),
            });
        }
        let ctx = CoarseContext {
            hierarchy: &state.hierarchy,
            spec: &self.spec,
            overlap: &state.overlap,
            schedule: &state.schedule,
            stencils: &state.stencils,
            smoother_choice: self.config.smoother_choice,
            tolerance: self.config.coarse_solver_tolerance,
            max_iterations: self.config.coarse_solver_max_iterations,
            homogeneous: self.homogeneous_bc,
        };
        let converged = state.coarse_solver.solve(&ctx, error, residual, ln)?;
        self.stats.coarse_solves += 1;
        if !converged {
            self.stats.coarse_failures += 1;
            warn!(
                "{}: {} did not converge on level {}",
                self.object_name,
                state.coarse_solver.name(),
                ln
            );
        }
        Ok(converged)
    }

    fn compute_residual(
        &mut self,
        residual: &mut SideVector,
        solution: &SideVector,
        rhs: &SideVector,
        coarsest: usize,
        finest: usize,
    ) -> Result<(), FacError> {
        let Some(state) = self.state.as_mut() else {
            return Err(FacError::NotInitialized(format!(
                "{}::compute_residual",
                self.object_name
            )));
        };
        Self::check_vector(self.depth, state, residual, true)?;
        Self::check_vector(self.depth, state, solution, true)?;
        Self::check_vector(self.depth, state, rhs, false)?;
        if coarsest > finest || coarsest < state.coarsest || finest > state.finest {
            return Err(FacError::InvalidLevelRange {
                coarsest,
                finest,
                available: state.hierarchy.num_levels(),
            });
        }
        compute_composite_residual(
            residual,
            solution,
            rhs,
            coarsest,
            finest,
            &mut state.scratch,
            &state.schedule,
            &state.stencils,
            self.homogeneous_bc,
        );
        self.stats.residual_evaluations += 1;
        Ok(())
    }
}

