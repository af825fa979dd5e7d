use crate::Utils::logger::{init_logger, save_side_vector_to_csv};
use crate::numerical::Poisson_FAC::fac_config::FacConfig;
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::fac_operator::SCPoissonFACOperator;
use crate::numerical::Poisson_FAC::fac_strategy::FacPreconditionerStrategy;
use crate::numerical::Poisson_FAC::geometry::{BoundaryLocation, IndexBox};
use crate::numerical::Poisson_FAC::hierarchy::PatchHierarchy;
use crate::numerical::Poisson_FAC::poisson_spec::PoissonSpecifications;
use crate::numerical::Poisson_FAC::robin_bc::{LocationIndexRobinBcCoefs, RobinBcCoefStrategy};
use crate::numerical::Poisson_FAC::side_data::SideVector;
use log::info;
use std::sync::Arc;

/// Runs demo `example` and returns the final residual norm.
pub fn fac_examples(example: usize) -> Result<f64, FacError> {
    match example {
        // residual correction with the sparse LU coarse solver on a single patch
        1 => {
            let h = Arc::new(PatchHierarchy::uniform(
                IndexBox::new([0, 0], [15, 15]),
                [0.0, 0.0],
                [1.0, 1.0],
            )?);
            let mut u = SideVector::new("u", &h, 1, 1);
            let mut f = SideVector::new("f", &h, 1, 1);
            f.set_from_fn(|_, _, x, _| (x[0] * x[1]).sin() + 1.0);
            let mut r = f.clone_layout("r");
            let mut e = f.clone_layout("e");

            let mut op = SCPoissonFACOperator::new("example_1", 1);
            op.set_coarsest_level_solver_choice("sparse_lu")?;
            op.initialize_operator_state(&u, &f, 0, 0)?;
            let mut norm = f64::INFINITY;
            for it in 0..3 {
                op.compute_residual(&mut r, &u, &f, 0, 0)?;
                norm = r.l2_norm(0, 0);
                println!("iteration {}: |r| = {:e}", it, norm);
                e.set_to_scalar(0.0);
                op.solve_coarsest_level(&mut e, &r, 0)?;
                u.add_scaled_level(1.0, &e, 0);
            }
            println!("{}", op.print_statistics());
            Ok(norm)
        }
        // two-level composite grid, Neumann walls, smoothing on the fine level and a Krylov
        // coarse solve
        2 => {
            let mut hierarchy = PatchHierarchy::new(
                IndexBox::new([0, 0], [15, 15]),
                [0.0, 0.0],
                [1.0, 1.0],
                vec![IndexBox::new([0, 0], [7, 15]), IndexBox::new([8, 0], [15, 15])],
            )?;
            hierarchy.set_patch_owner(0, 1, 1);
            hierarchy.add_level([2, 2], vec![IndexBox::new([8, 8], [23, 23])])?;
            let h = Arc::new(hierarchy);

            let mut bc = LocationIndexRobinBcCoefs::new("walls");
            for loc in BoundaryLocation::all() {
                bc.set_boundary_slope(loc.location_index(), 0.0);
            }
            let bc: Arc<dyn RobinBcCoefStrategy> = Arc::new(bc);

            let mut op = SCPoissonFACOperator::new("example_2", 1);
            op.set_poisson_specifications(PoissonSpecifications::with_coefficients("helmholtz", 10.0, 1.0))?;
            op.set_physical_bc_coef(bc)?;
            op.set_smoother_choice("multiplicative")?;
            op.set_coarsest_level_solver_choice("krylov")?;

            let mut u = SideVector::new("u", &h, 1, 1);
            let mut f = SideVector::new("f", &h, 1, 1);
            f.set_from_fn(|_, axis, x, _| if axis == 0 { x[0] - 0.5 } else { x[1] * x[1] });
            let mut r = f.clone_layout("r");
            let mut e = f.clone_layout("e");
            op.initialize_operator_state(&u, &f, 0, 1)?;

            let mut norm = f64::INFINITY;
            for it in 0..5 {
                op.compute_residual(&mut r, &u, &f, 0, 1)?;
                norm = r.l2_norm(0, 1);
                info!("cycle {}: composite |r| = {:e}", it, norm);
                println!("cycle {}: composite |r| = {:e}", it, norm);
                e.set_to_scalar(0.0);
                op.solve_coarsest_level(&mut e, &r, 0)?;
                u.add_scaled_level(1.0, &e, 0);
                op.compute_residual(&mut r, &u, &f, 0, 1)?;
                op.smooth_error(&mut e, &r, 1, 4, true, false)?;
                u.add_scaled_level(1.0, &e, 1);
            }
            println!("{}", op.print_statistics());
            Ok(norm)
        }
        // operator configured from a task document, result written to csv
        3 => {
            let document = r#"
            fac_operator
            smoother_choice: additive
            coarse_solver_choice: block_jacobi
            coarse_solver_max_iterations: 20
            loglevel: info
            "#;
            let config = FacConfig::from_document(document)?;
            if let Some(level) = config.loglevel.as_deref() {
                init_logger(level, None)?;
            }
            let h = Arc::new(PatchHierarchy::uniform(
                IndexBox::new([0, 0], [7, 7]),
                [0.0, 0.0],
                [2.0, 1.0],
            )?);
            let mut op = SCPoissonFACOperator::from_config("example_3", 1, config)?;
            let mut e = SideVector::new("e", &h, 1, 1);
            let mut f = SideVector::new("f", &h, 1, 1);
            f.set_to_scalar(1.0);
            let mut r = f.clone_layout("r");
            op.initialize_operator_state(&e, &f, 0, 0)?;
            op.solve_coarsest_level(&mut e, &f, 0)?;
            op.compute_residual(&mut r, &e, &f, 0, 0)?;
            let path = std::env::temp_dir().join("fac_example_3.csv");
            if let Err(err) = save_side_vector_to_csv(&e, 0, &path) {
                println!("could not save {:?}: {}", path, err);
            }
            Ok(r.l2_norm(0, 0))
        }
        _ => Err(FacError::Configuration(format!("no example number {}", example))),
    }
}
