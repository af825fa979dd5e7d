#[cfg(test)]
mod tests {
    use crate::numerical::Poisson_FAC::fac_config::{CoarseSolverChoice, FacConfig, SmootherChoice};
    use crate::numerical::Poisson_FAC::fac_errors::FacError;
    use crate::numerical::Poisson_FAC::fac_operator::SCPoissonFACOperator;
    use crate::numerical::Poisson_FAC::fac_strategy::FacPreconditionerStrategy;
    use crate::numerical::Poisson_FAC::geometry::{BoundaryLocation, IndexBox, NDIM, Side};
    use crate::numerical::Poisson_FAC::hierarchy::PatchHierarchy;
    use crate::numerical::Poisson_FAC::patch_laplace::build_patch_laplace_operator;
    use crate::numerical::Poisson_FAC::poisson_spec::PoissonSpecifications;
    use crate::numerical::Poisson_FAC::robin_bc::{
        FnRobinBcCoefs, LocationIndexRobinBcCoefs, RobinBcCoefStrategy, RobinCoefs,
    };
    use crate::numerical::Poisson_FAC::side_data::SideVector;
    use nalgebra::DVector;
    use std::sync::Arc;
    use strum::IntoEnumIterator;

    fn one_patch(n: i32) -> Arc<PatchHierarchy> {
        Arc::new(
            PatchHierarchy::uniform(IndexBox::new([0, 0], [n - 1, n - 1]), [0.0, 0.0], [1.0, 1.0])
                .unwrap(),
        )
    }

    fn two_patches() -> Arc<PatchHierarchy> {
        Arc::new(
            PatchHierarchy::new(
                IndexBox::new([0, 0], [7, 7]),
                [0.0, 0.0],
                [1.0, 1.0],
                vec![IndexBox::new([0, 0], [3, 7]), IndexBox::new([4, 0], [7, 7])],
            )
            .unwrap(),
        )
    }

    fn two_levels() -> Arc<PatchHierarchy> {
        let mut h =
            PatchHierarchy::uniform(IndexBox::new([0, 0], [7, 7]), [0.0, 0.0], [1.0, 1.0]).unwrap();
        h.add_level([2, 2], vec![IndexBox::new([4, 4], [11, 11])]).unwrap();
        Arc::new(h)
    }

    fn neumann() -> Arc<dyn RobinBcCoefStrategy> {
        let mut bc = LocationIndexRobinBcCoefs::new("neumann");
        for loc in BoundaryLocation::all() {
            bc.set_boundary_slope(loc.location_index(), 0.0);
        }
        Arc::new(bc)
    }

    fn linear(x: &[f64; NDIM]) -> f64 {
        1.0 + 2.0 * x[0] - 3.0 * x[1]
    }

    const GRAD: [f64; NDIM] = [2.0, -3.0];

    /// Robin data reproducing `linear`, with `(a, b)` chosen per boundary location.
    fn linear_bc(ab: [(f64, f64); 2 * NDIM]) -> Arc<dyn RobinBcCoefStrategy> {
        Arc::new(FnRobinBcCoefs::new(move |loc: BoundaryLocation, x: &[f64; NDIM], _k, _t| {
            let (a, b) = ab[loc.location_index()];
            let dudn = loc.outward() as f64 * GRAD[loc.axis];
            RobinCoefs::new(a, b, a * linear(x) + b * dudn)
        }))
    }

    /// max difference over the faces of the side boxes of level `ln`
    fn max_diff(a: &SideVector, b: &SideVector, ln: usize) -> f64 {
        let mut max = 0.0_f64;
        for (pa, pb) in a.level_data(ln).iter().zip(b.level_data(ln).iter()) {
            for axis in 0..NDIM {
                for p in pa.side_box(axis).iter() {
                    for k in 0..pa.depth() {
                        max = max.max((pa.get(axis, &p, k) - pb.get(axis, &p, k)).abs());
                    }
                }
            }
        }
        max
    }

    #[test]
    fn test_smoothing_keeps_exact_linear_solution() {
        let dirichlet = [(1.0, 0.0); 4];
        let neumann = [(0.0, 1.0); 4];
        let robin = [(1.0, 0.5); 4];
        let mixed = [(1.0, 0.0), (2.0, 1.0), (0.0, 1.0), (1.0, 0.25)];
        for hierarchy in [one_patch(4), two_patches()] {
            for (case, ab) in [dirichlet, neumann, robin, mixed].into_iter().enumerate() {
                for smoother in ["additive", "multiplicative"] {
                    let mut op = SCPoissonFACOperator::new("consistency", 1);
                    let mut spec = PoissonSpecifications::new("laplace");
                    if case == 3 {
                        spec.set_d_per_direction([1.0, 2.5]);
                    }
                    op.set_poisson_specifications(spec).unwrap();
                    op.set_physical_bc_coef(linear_bc(ab)).unwrap();
                    op.set_smoother_choice(smoother).unwrap();
                    op.set_homogeneous_bc(false);

                    let mut exact = SideVector::new("exact", &hierarchy, 1, 1);
                    exact.set_from_fn(|_, _, x, _| linear(x));
                    let mut error = exact.clone();
                    let residual = SideVector::new("f", &hierarchy, 1, 1);
                    op.initialize_operator_state(&error, &residual, 0, 0).unwrap();
                    op.smooth_error(&mut error, &residual, 0, 3, true, false).unwrap();
                    let diff = max_diff(&error, &exact, 0);
                    assert!(diff < 1e-10, "case {} with {} smoothing: diff {}", case, smoother, diff);
                }
            }
        }
    }

    #[test]
    fn test_pre_and_post_flags_do_not_change_results() {
        let h = one_patch(4);
        let mut rhs = SideVector::new("f", &h, 1, 1);
        rhs.set_to_scalar(1.0);
        let mut results = Vec::new();
        for (pre, post) in [(true, false), (false, true), (false, false)] {
            let mut op = SCPoissonFACOperator::new("flags", 1);
            let mut e = SideVector::new("e", &h, 1, 1);
            op.initialize_operator_state(&e, &rhs, 0, 0).unwrap();
            op.smooth_error(&mut e, &rhs, 0, 2, pre, post).unwrap();
            results.push(e);
        }
        assert_eq!(max_diff(&results[0], &results[1], 0), 0.0);
        assert_eq!(max_diff(&results[0], &results[2], 0), 0.0);
    }

    #[test]
    fn test_patch_matrices_are_symmetric() {
        let robin: Arc<dyn RobinBcCoefStrategy> = {
            let mut bc = LocationIndexRobinBcCoefs::new("robin");
            for loc in BoundaryLocation::all() {
                bc.set_raw_coefs(loc.location_index(), 1.0, 1.0, 0.0);
            }
            Arc::new(bc)
        };
        let dirichlet: Arc<dyn RobinBcCoefStrategy> = Arc::new(LocationIndexRobinBcCoefs::new("d"));
        for hierarchy in [one_patch(4), two_patches()] {
            for bc in [dirichlet.clone(), neumann(), robin.clone()] {
                let mut op = SCPoissonFACOperator::new("symmetry", 1);
                op.set_physical_bc_coef(bc).unwrap();
                let u = SideVector::new("u", &hierarchy, 1, 1);
                op.initialize_operator_state(&u, &u, 0, 0).unwrap();
                let overlap = op.overlap_cache().unwrap();
                let dx = hierarchy.level(0).dx;
                for po in overlap.level(0).patches.iter() {
                    for axis in 0..NDIM {
                        let m = build_patch_laplace_operator(
                            op.poisson_specifications(),
                            &dx,
                            po,
                            axis,
                            0,
                            1,
                        )
                        .unwrap();
                        assert!(m.n() > 0);
                        assert!(m.is_symmetric(1e-12), "patch {} axis {}", po.patch_id, axis);
                    }
                }
            }
        }
    }

    #[test]
    fn test_shared_faces_belong_to_lower_patch() {
        let h = two_patches();
        let mut op = SCPoissonFACOperator::new("shared", 1);
        op.set_physical_bc_coef(neumann()).unwrap();
        let u = SideVector::new("u", &h, 1, 1);
        op.initialize_operator_state(&u, &u, 0, 0).unwrap();
        let overlap = op.overlap_cache().unwrap();
        let dx = h.level(0).dx;
        let spec = op.poisson_specifications();
        let m0 = build_patch_laplace_operator(spec, &dx, overlap.patch(0, 0), 0, 0, 1).unwrap();
        let m1 = build_patch_laplace_operator(spec, &dx, overlap.patch(0, 1), 0, 0, 1).unwrap();
        assert_eq!(m0.n(), 40);
        assert_eq!(m1.n(), 32);
        assert!(m0.row_of(&[4, 3]).is_some());
        assert!(m1.row_of(&[4, 3]).is_none());
        let m1y = build_patch_laplace_operator(spec, &dx, overlap.patch(0, 1), 1, 0, 1).unwrap();
        assert_eq!(m1y.n(), 36);
    }

    #[test]
    fn test_direct_solution_has_zero_residual() {
        let h = one_patch(6);
        let mut op = SCPoissonFACOperator::new("direct", 1);
        op.set_poisson_specifications(PoissonSpecifications::with_coefficients("helmholtz", 2.0, 1.0))
            .unwrap();
        let mut u = SideVector::new("u", &h, 1, 1);
        let mut rhs = SideVector::new("f", &h, 1, 1);
        rhs.set_from_fn(|_, _, x, _| x[0] * x[1] + 1.0);
        let mut r = SideVector::new("r", &h, 1, 1);
        op.initialize_operator_state(&u, &rhs, 0, 0).unwrap();

        let dx = h.level(0).dx;
        for axis in 0..NDIM {
            let m = build_patch_laplace_operator(
                op.poisson_specifications(),
                &dx,
                op.overlap_cache().unwrap().patch(0, 0),
                axis,
                0,
                1,
            )
            .unwrap();
            let b = m.residual_rhs(u.patch_data(0, 0), rhs.patch_data(0, 0), true);
            let delta = m.to_dense().lu().solve(&DVector::from_vec(b)).unwrap();
            m.apply_correction(u.patch_data_mut(0, 0), delta.as_slice());
        }
        op.compute_residual(&mut r, &u, &rhs, 0, 0).unwrap();
        assert!(r.max_norm(0, 0) < 1e-9, "residual {}", r.max_norm(0, 0));
        assert!(u.max_norm(0, 0) > 1e-3);
    }

    #[test]
    fn test_overlap_cache_is_deterministic() {
        let h = two_levels();
        let mut op = SCPoissonFACOperator::new("cache", 1);
        let u = SideVector::new("u", &h, 1, 1);
        op.initialize_operator_state(&u, &u, 0, 1).unwrap();
        let first = op.overlap_cache().unwrap().clone();
        op.deallocate_operator_state();
        assert!(!op.is_initialized());
        op.deallocate_operator_state();
        assert!(op.overlap_cache().is_none());
        op.initialize_operator_state(&u, &u, 0, 1).unwrap();
        assert_eq!(op.overlap_cache().unwrap(), &first);
        // reinitializing without deallocation replaces the state
        op.initialize_operator_state(&u, &u, 1, 1).unwrap();
        assert_eq!(op.level_range(), Some((1, 1)));
        assert!(!op.overlap_cache().unwrap().has_level(0));
    }

    #[test]
    fn test_coarse_solvers_on_singular_neumann_problem() {
        let h = one_patch(4);
        let mut f = SideVector::new("f", &h, 1, 1);
        f.set_to_scalar(1.0);
        let expected = [
            (CoarseSolverChoice::BlockJacobi, true),
            (CoarseSolverChoice::SparseLu, false),
            (CoarseSolverChoice::Krylov, false),
        ];
        for (choice, converged) in expected {
            let mut op = SCPoissonFACOperator::new("singular", 1);
            op.set_physical_bc_coef(neumann()).unwrap();
            let mut e = SideVector::new("e", &h, 1, 1);
            op.initialize_operator_state(&e, &f, 0, 0).unwrap();
            op.set_coarsest_level_solver_choice(&choice.to_string()).unwrap();
            assert!(op.is_initialized());
            let result = op.solve_coarsest_level(&mut e, &f, 0).unwrap();
            assert_eq!(result, converged, "{}", choice);
            assert_eq!(op.statistics().coarse_solves, 1);
            assert_eq!(op.statistics().coarse_failures, usize::from(!converged));
        }
    }

    #[test]
    fn test_coarse_solvers_converge_on_dirichlet_problem() {
        let h = one_patch(4);
        let mut f = SideVector::new("f", &h, 1, 1);
        f.set_to_scalar(1.0);
        for choice in ["sparse_lu", "krylov"] {
            let mut op = SCPoissonFACOperator::new("dirichlet", 1);
            op.set_coarsest_level_solver_choice(choice).unwrap();
            let mut e = SideVector::new("e", &h, 1, 1);
            let mut r = SideVector::new("r", &h, 1, 1);
            op.initialize_operator_state(&e, &f, 0, 0).unwrap();
            assert!(op.solve_coarsest_level(&mut e, &f, 0).unwrap(), "{}", choice);
            op.compute_residual(&mut r, &e, &f, 0, 0).unwrap();
            assert!(r.l2_norm(0, 0) <= 1e-6 * f.l2_norm(0, 0), "{}", choice);
        }
    }

    #[test]
    fn test_sparse_lu_schwarz_over_two_patches() {
        let h = two_patches();
        let mut f = SideVector::new("f", &h, 1, 1);
        f.set_from_fn(|_, _, x, _| 1.0 + x[0]);
        let config = FacConfig {
            coarse_solver_choice: CoarseSolverChoice::SparseLu,
            coarse_solver_tolerance: 1e-8,
            coarse_solver_max_iterations: 50,
            ..FacConfig::default()
        };
        let mut op = SCPoissonFACOperator::from_config("schwarz", 1, config).unwrap();
        let mut e = SideVector::new("e", &h, 1, 1);
        let mut r = SideVector::new("r", &h, 1, 1);
        op.initialize_operator_state(&e, &f, 0, 0).unwrap();
        assert!(op.solve_coarsest_level(&mut e, &f, 0).unwrap());
        op.compute_residual(&mut r, &e, &f, 0, 0).unwrap();
        assert!(r.l2_norm(0, 0) <= 1e-7 * f.l2_norm(0, 0));
    }

    #[test]
    fn test_residual_decreases_monotonically_under_smoothing() {
        let h = one_patch(4);
        let mut f = SideVector::new("f", &h, 1, 1);
        f.set_to_scalar(1.0);
        for choice in SmootherChoice::iter() {
            let config = FacConfig {
                smoother_choice: choice,
                ..FacConfig::default()
            };
            let mut op = SCPoissonFACOperator::from_config("monotone", 1, config).unwrap();
            let mut e = SideVector::new("e", &h, 1, 1);
            let mut r = SideVector::new("r", &h, 1, 1);
            op.initialize_operator_state(&e, &f, 0, 0).unwrap();
            op.compute_residual(&mut r, &e, &f, 0, 0).unwrap();
            let mut previous = r.l2_norm(0, 0);
            for sweep in 0..10 {
                op.smooth_error(&mut e, &f, 0, 1, false, false).unwrap();
                op.compute_residual(&mut r, &e, &f, 0, 0).unwrap();
                let current = r.l2_norm(0, 0);
                assert!(current < previous, "{} sweep {}: {} !< {}", choice, sweep, current, previous);
                previous = current;
            }
            assert_eq!(op.statistics().sweeps, 10);
            assert_eq!(op.statistics().residual_evaluations, 11);
            assert!(op.print_statistics().contains("residual evaluations"));
        }
    }

    #[test]
    fn test_coarsest_level_of_range_ignores_level_below() {
        let h = two_levels();
        let mut e = SideVector::new("e", &h, 1, 1);
        let f = SideVector::new("f", &h, 1, 1);
        let mut r = SideVector::new("r", &h, 1, 1);
        for choice in CoarseSolverChoice::iter() {
            let config = FacConfig {
                coarse_solver_choice: choice,
                ..FacConfig::default()
            };
            let mut op = SCPoissonFACOperator::from_config("upper_range", 1, config).unwrap();
            op.initialize_operator_state(&e, &f, 1, 1).unwrap();

            e.set_to_scalar(0.0);
            e.set_level_to_scalar(0, 1000.0);
            op.smooth_error(&mut e, &f, 1, 2, true, false).unwrap();
            assert_eq!(e.max_norm(1, 1), 0.0, "{}: smoothing", choice);

            e.set_level_to_scalar(1, 0.0);
            assert!(op.solve_coarsest_level(&mut e, &f, 1).unwrap());
            assert_eq!(e.max_norm(1, 1), 0.0, "{}: coarse solve", choice);

            op.compute_residual(&mut r, &e, &f, 1, 1).unwrap();
            assert_eq!(r.max_norm(1, 1), 0.0, "{}: residual", choice);
        }
    }

    #[test]
    fn test_composite_residual_of_exact_quadratic_solution() {
        let h = two_levels();
        let (c, d) = (1.5, 1.0);
        let exact = |axis: usize, x: &[f64; NDIM]| {
            if axis == 0 {
                x[0] * x[0] + x[0] * x[1]
            } else {
                x[1] * x[1] + x[0] * x[1]
            }
        };
        let mut bc_coefs: [Option<Arc<dyn RobinBcCoefStrategy>>; NDIM] = [None, None];
        for axis in 0..NDIM {
            bc_coefs[axis] = Some(Arc::new(FnRobinBcCoefs::new(
                move |_loc: BoundaryLocation, x: &[f64; NDIM], _k, _t| {
                    RobinCoefs::dirichlet(exact(axis, x))
                },
            )));
        }
        let mut op = SCPoissonFACOperator::new("composite", 1);
        op.set_poisson_specifications(PoissonSpecifications::with_coefficients("helmholtz", c, d))
            .unwrap();
        op.set_physical_bc_coefs(bc_coefs).unwrap();
        op.set_homogeneous_bc(false);

        let mut u = SideVector::new("u", &h, 1, 1);
        u.set_from_fn(|_, axis, x, _| exact(axis, x));
        let mut rhs = SideVector::new("f", &h, 1, 1);
        rhs.set_from_fn(|_, axis, x, _| c * exact(axis, x) + 2.0 * d);
        let mut r = SideVector::new("r", &h, 1, 1);
        op.initialize_operator_state(&u, &rhs, 0, 1).unwrap();
        op.compute_residual(&mut r, &u, &rhs, 0, 1).unwrap();
        assert!(r.max_norm(0, 1) < 1e-8, "composite residual {}", r.max_norm(0, 1));
        op.compute_residual(&mut r, &u, &rhs, 1, 1).unwrap();
        assert!(r.max_norm(1, 1) < 1e-8);

        // a perturbation of a coarse face under the fine patch is overwritten by restriction
        let mut v = u.clone();
        v.patch_data_mut(0, 0).set(0, &[4, 4], 0, 100.0);
        op.compute_residual(&mut r, &v, &rhs, 0, 1).unwrap();
        assert!(r.max_norm(0, 1) < 1e-8);
    }

    #[test]
    fn test_misuse_is_reported() {
        let h = one_patch(4);
        let other = one_patch(4);
        let mut op = SCPoissonFACOperator::new("misuse", 1);
        let mut e = SideVector::new("e", &h, 1, 1);
        let f = SideVector::new("f", &h, 1, 1);
        let mut r = SideVector::new("r", &h, 1, 1);
        assert!(matches!(
            op.smooth_error(&mut e, &f, 0, 1, true, false),
            Err(FacError::NotInitialized(_))
        ));
        assert!(matches!(
            op.solve_coarsest_level(&mut e, &f, 0),
            Err(FacError::NotInitialized(_))
        ));
        assert!(matches!(
            op.compute_residual(&mut r, &e, &f, 0, 0),
            Err(FacError::NotInitialized(_))
        ));

        let foreign = SideVector::new("foreign", &other, 1, 1);
        assert!(matches!(
            op.initialize_operator_state(&e, &foreign, 0, 0),
            Err(FacError::HierarchyMismatch(_))
        ));
        let deep = SideVector::new("deep", &h, 2, 1);
        assert!(matches!(
            op.initialize_operator_state(&deep, &deep, 0, 0),
            Err(FacError::HierarchyMismatch(_))
        ));
        let no_ghosts = SideVector::new("no_ghosts", &h, 1, 0);
        assert!(matches!(
            op.initialize_operator_state(&no_ghosts, &f, 0, 0),
            Err(FacError::HierarchyMismatch(_))
        ));
        assert!(matches!(
            op.initialize_operator_state(&e, &f, 0, 1),
            Err(FacError::InvalidLevelRange { available: 1, .. })
        ));
        assert!(!op.is_initialized());

        op.initialize_operator_state(&e, &f, 0, 0).unwrap();
        let mut foreign_error = foreign.clone();
        assert!(matches!(
            op.smooth_error(&mut foreign_error, &f, 0, 1, false, true),
            Err(FacError::HierarchyMismatch(_))
        ));
        assert!(matches!(
            op.smooth_error(&mut e, &f, 1, 1, false, true),
            Err(FacError::InvalidLevelRange { .. })
        ));
        assert!(matches!(op.set_smoother_choice("red_black"), Err(FacError::Configuration(_))));
        assert!(op.set_coarsest_level_solver_choice("amg").is_err());
        assert!(op.set_coarsest_level_solver_tolerance(0.0).is_err());
        assert_eq!(op.config().coarse_solver_tolerance, 1e-6);
        assert!(op.is_initialized());
    }

    #[test]
    fn test_degenerate_boundary_coefficients_leave_operator_uninitialized() {
        let h = one_patch(4);
        let u = SideVector::new("u", &h, 1, 1);
        let mut op = SCPoissonFACOperator::new("degenerate", 1);
        op.initialize_operator_state(&u, &u, 0, 0).unwrap();
        let mut bc = LocationIndexRobinBcCoefs::new("bad");
        bc.set_raw_coefs(BoundaryLocation::new(1, Side::Upper).location_index(), 0.0, 0.0, 1.0);
        assert!(matches!(
            op.set_physical_bc_coef(Arc::new(bc)),
            Err(FacError::InvalidBoundaryCoefs(_))
        ));
        assert!(!op.is_initialized());
        let mut bad_spec = PoissonSpecifications::new("zero");
        bad_spec.set_d_constant(0.0);
        op.set_physical_bc_coefs([None, None]).unwrap();
        op.set_poisson_specifications(bad_spec).unwrap();
        assert!(matches!(
            op.initialize_operator_state(&u, &u, 0, 0),
            Err(FacError::Configuration(_))
        ));
        assert!(!op.is_initialized());
    }

    #[test]
    fn test_setters_rebuild_initialized_state() {
        let h = one_patch(4);
        let mut f = SideVector::new("f", &h, 1, 1);
        f.set_to_scalar(1.0);
        let mut op = SCPoissonFACOperator::new("setters", 1);
        assert_eq!(op.depth(), 1);
        op.initialize_operator_state(&f, &f, 0, 0).unwrap();
        op.set_coarsest_level_solver_choice("sparse_lu").unwrap();
        op.set_solution_time(0.5).unwrap();
        op.set_poisson_specifications(PoissonSpecifications::with_coefficients("h", -1.0, 1.0))
            .unwrap();
        op.set_prolongation_method("LINEAR_REFINE");
        op.set_restriction_method("CONSERVATIVE_COARSEN");
        assert_eq!(op.config().prolongation_method, "LINEAR_REFINE");
        assert!(op.is_initialized());
        assert_eq!(op.level_range(), Some((0, 0)));
        let mut e = SideVector::new("e", &h, 1, 1);
        assert!(op.solve_coarsest_level(&mut e, &f, 0).unwrap());
        assert_eq!(op.statistics().initializations, 1);
    }
}
