//! Ghost filling and restriction of side-centered data, precomputed as schedules at
//! initialization.
//!
//! A level fill runs in three stages:
//! 1. Dirichlet boundary faces are set to `g/a` (zero for homogeneous data);
//! 2. coarse-fine faces and coarse-fine ghosts are interpolated from the next coarser level with a
//!    tensor-product quadratic Lagrange stencil on the coarse faces (shifted one-sided at the
//!    domain edge, so the interpolation reproduces polynomials of degree two per direction);
//!    on the coarsest level of the schedule they are set to zero instead;
//! 3. shared faces and ghost faces covered by a same-level neighbor are copied from the owning
//!    patch.
//! Restriction replaces every coarse face covered by the finer level with the average of the
//! `prod_{d != a} r_d` fine faces lying on it.
use crate::numerical::Poisson_FAC::geometry::{IndexBox, IntVect, NDIM};
use crate::numerical::Poisson_FAC::hierarchy::{PatchHierarchy, PatchLevel};
use crate::numerical::Poisson_FAC::overlap::{FaceKind, OverlapCache, PatchOverlap};
use crate::numerical::Poisson_FAC::side_data::{SideData, SideVector};
use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CopyTransaction {
    pub axis: usize,
    pub p: IntVect,
    pub src_patch: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationStencil {
    pub axis: usize,
    pub p: IntVect,
    /// (coarse patch, coarse face, weight)
    pub sources: Vec<(usize, IntVect, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryValue {
    pub axis: usize,
    pub p: IntVect,
    pub depth: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestrictionStencil {
    pub coarse_patch: usize,
    pub axis: usize,
    pub p: IntVect,
    /// (fine patch, fine face)
    pub sources: Vec<(usize, IntVect)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchFill {
    pub boundary_values: Vec<BoundaryValue>,
    pub interpolations: Vec<InterpolationStencil>,
    pub copies: Vec<CopyTransaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSchedule {
    pub level_number: usize,
    pub patches: Vec<PatchFill>,
    /// restriction of this level onto covered faces of level `level_number - 1`
    pub restrictions: Vec<RestrictionStencil>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GhostFillSchedule {
    pub coarsest: usize,
    pub finest: usize,
    levels: BTreeMap<usize, LevelSchedule>,
}

impl GhostFillSchedule {
    pub fn build(hierarchy: &PatchHierarchy, overlap: &OverlapCache) -> Self {
        let mut levels = BTreeMap::new();
        for ln in overlap.coarsest..=overlap.finest {
            let level = hierarchy.level(ln);
            // the coarsest level of the range sees zero coarse-fine data
            let coarser = if ln > overlap.coarsest { Some(hierarchy.level(ln - 1)) } else { None };
            let patches: Vec<PatchFill> = overlap
                .level(ln)
                .patches
                .par_iter()
                .map(|po| build_patch_fill(level, coarser, po, overlap.depth))
                .collect();
            let restrictions = if ln > overlap.coarsest {
                build_restrictions(level, overlap, ln)
            } else {
                Vec::new()
            };
            debug!(
                "fill schedule of level {}: {} copies, {} interpolated faces, {} restricted faces",
                ln,
                patches.iter().map(|p| p.copies.len()).sum::<usize>(),
                patches.iter().map(|p| p.interpolations.len()).sum::<usize>(),
                restrictions.len()
            );
            levels.insert(
                ln,
                LevelSchedule {
                    level_number: ln,
                    patches,
                    restrictions,
                },
            );
        }
        Self {
            coarsest: overlap.coarsest,
            finest: overlap.finest,
            levels,
        }
    }

    pub fn level(&self, ln: usize) -> &LevelSchedule {
        &self.levels[&ln]
    }

    /// Fill boundary, coarse-fine and same-level ghost values of one level.
    pub fn fill_level(
        &self,
        data: &mut [SideData],
        coarser: Option<&[SideData]>,
        ln: usize,
        homogeneous: bool,
    ) {
        let schedule = self.level(ln);
        data.par_iter_mut()
            .zip(schedule.patches.par_iter())
            .for_each(|(pd, fill)| {
                for bv in fill.boundary_values.iter() {
                    let value = if homogeneous { 0.0 } else { bv.value };
                    pd.set(bv.axis, &bv.p, bv.depth, value);
                }
                if let Some(coarse) = coarser {
                    interpolate_patch(pd, coarse, &fill.interpolations);
                }
            });
        self.copy_level(data, ln);
    }

    /// Same-level stage only: shared faces and neighbor ghosts from their owners.
    pub fn copy_level(&self, data: &mut [SideData], ln: usize) {
        let schedule = self.level(ln);
        let snapshot: &[SideData] = data;
        let incoming: Vec<Vec<(usize, IntVect, usize, f64)>> = schedule
            .patches
            .par_iter()
            .map(|fill| gather_copies(snapshot, &fill.copies, |_| true))
            .collect();
        data.par_iter_mut()
            .zip(incoming.into_par_iter())
            .for_each(|(pd, values)| {
                for (axis, p, k, v) in values {
                    pd.set(axis, &p, k, v);
                }
            });
    }

    /// Fill one level of a vector, coarse-fine values taken from its next coarser level (zero on
    /// the coarsest level of the schedule).
    pub fn fill_vector_level(&self, v: &mut SideVector, ln: usize, homogeneous: bool) {
        let (data, coarser) = v.level_and_coarser_mut(ln);
        self.fill_level(data, coarser, ln, homogeneous);
    }

    /// Re-copy into patch `id` the faces it receives from the neighbors selected by `accept`.
    pub fn refresh_patch<F>(&self, data: &mut [SideData], ln: usize, id: usize, accept: F)
    where
        F: Fn(usize) -> bool,
    {
        let fill = &self.level(ln).patches[id];
        let values = gather_copies(data, &fill.copies, accept);
        let pd = &mut data[id];
        for (axis, p, k, v) in values {
            pd.set(axis, &p, k, v);
        }
    }

    /// Average level `ln` onto the covered faces of level `ln - 1`.
    pub fn restrict_level(&self, coarse: &mut [SideData], fine: &[SideData], ln: usize) {
        for rs in self.level(ln).restrictions.iter() {
            let depth = coarse[rs.coarse_patch].depth();
            for k in 0..depth {
                let sum: f64 = rs
                    .sources
                    .iter()
                    .map(|(fp, q)| fine[*fp].get(rs.axis, q, k))
                    .sum();
                coarse[rs.coarse_patch].set(rs.axis, &rs.p, k, sum / rs.sources.len() as f64);
            }
        }
    }

    pub fn restrict_vector_level(&self, v: &mut SideVector, ln: usize) {
        let (coarse, fine) = v.coarser_mut_and_level(ln);
        self.restrict_level(coarse, fine, ln);
    }
}

fn gather_copies<F>(
    data: &[SideData],
    copies: &[CopyTransaction],
    accept: F,
) -> Vec<(usize, IntVect, usize, f64)>
where
    F: Fn(usize) -> bool,
{
    let mut values = Vec::with_capacity(copies.len());
    for c in copies.iter().filter(|c| accept(c.src_patch)) {
        let src = &data[c.src_patch];
        for k in 0..src.depth() {
            values.push((c.axis, c.p, k, src.get(c.axis, &c.p, k)));
        }
    }
    values
}

fn interpolate_patch(pd: &mut SideData, coarse: &[SideData], stencils: &[InterpolationStencil]) {
    for st in stencils.iter() {
        for k in 0..pd.depth() {
            let value: f64 = st
                .sources
                .iter()
                .map(|(cp, q, w)| w * coarse[*cp].get(st.axis, q, k))
                .sum();
            pd.set(st.axis, &st.p, k, value);
        }
    }
}

/// Lowest-id patch of `level` whose side box of `axis` contains `p`.
pub fn owner_of(level: &PatchLevel, axis: usize, p: &IntVect) -> Option<usize> {
    level
        .patches
        .iter()
        .find(|patch| patch.cell_box.side_box(axis).contains(p))
        .map(|patch| patch.id)
}

/// 1D Lagrange weights at coordinate `xi` on up to three consecutive nodes in `[lo, hi]`.
pub fn lagrange_weights(xi: f64, lo: i32, hi: i32) -> Vec<(i32, f64)> {
    let nearest = xi.round();
    if (xi - nearest).abs() < 1e-12 && (nearest as i32) >= lo && (nearest as i32) <= hi {
        return vec![(nearest as i32, 1.0)];
    }
    let n = (hi - lo + 1).clamp(1, 3);
    let start = (nearest as i32 - 1).clamp(lo, hi - n + 1);
    let nodes: Vec<i32> = (start..start + n).collect();
    nodes
        .iter()
        .map(|&j| {
            let w: f64 = nodes
                .iter()
                .filter(|&&m| m != j)
                .map(|&m| (xi - m as f64) / (j - m) as f64)
                .product();
            (j, w)
        })
        .collect()
}

fn interpolation_stencil(
    fine: &PatchLevel,
    coarse: &PatchLevel,
    axis: usize,
    p: &IntVect,
) -> InterpolationStencil {
    let ratio = fine.ratio_to_coarser;
    let domain = coarse.domain;
    let mut per_dir: Vec<Vec<(i32, f64)>> = Vec::with_capacity(NDIM);
    for d in 0..NDIM {
        let (xi, hi) = if d == axis {
            (p[d] as f64 / ratio[d] as f64, domain.upper[d] + 1)
        } else {
            ((p[d] as f64 + 0.5) / ratio[d] as f64 - 0.5, domain.upper[d])
        };
        per_dir.push(lagrange_weights(xi, domain.lower[d], hi));
    }
    let mut sources = Vec::new();
    let mut missing = 0;
    // tensor product, NDIM = 2
    for (j0, w0) in per_dir[0].iter() {
        for (j1, w1) in per_dir[1].iter() {
            let q = [*j0, *j1];
            match owner_of(coarse, axis, &q) {
                Some(cp) => sources.push((cp, q, w0 * w1)),
                None => missing += 1,
            }
        }
    }
    if missing > 0 {
        debug!(
            "{} coarse faces missing for interpolation at {:?} (axis {}) on level {}",
            missing, p, axis, fine.level_number
        );
    }
    InterpolationStencil {
        axis,
        p: *p,
        sources,
    }
}

fn build_patch_fill(
    level: &PatchLevel,
    coarser: Option<&PatchLevel>,
    po: &PatchOverlap,
    depth: usize,
) -> PatchFill {
    let mut fill = PatchFill::default();
    for ax in po.axes.iter() {
        let axis = ax.axis;
        for ((p, k), coefs) in ax.face_coefs.iter() {
            if ax.kind(p, *k) == FaceKind::DirichletBoundary {
                fill.boundary_values.push(BoundaryValue {
                    axis,
                    p: *p,
                    depth: *k,
                    value: coefs.dirichlet_value(false),
                });
            }
        }
        for p in ax.ghost_box.iter() {
            if !matches!(ax.kind(&p, 0), FaceKind::CoarseFine | FaceKind::GhostCoarseFine) {
                continue;
            }
            match coarser {
                Some(coarse) => fill
                    .interpolations
                    .push(interpolation_stencil(level, coarse, axis, &p)),
                None => fill.boundary_values.extend((0..depth).map(|k| BoundaryValue {
                    axis,
                    p,
                    depth: k,
                    value: 0.0,
                })),
            }
        }
        for (src, boxes) in ax.neighbors.iter() {
            for b in boxes.iter() {
                for p in b.iter() {
                    fill.copies.push(CopyTransaction {
                        axis,
                        p,
                        src_patch: *src,
                    });
                }
            }
        }
    }
    fill
}

fn build_restrictions(fine: &PatchLevel, overlap: &OverlapCache, ln: usize) -> Vec<RestrictionStencil> {
    let ratio = fine.ratio_to_coarser;
    let mut out = Vec::new();
    for po in overlap.level(ln - 1).patches.iter() {
        for ax in po.axes.iter() {
            let axis = ax.axis;
            for cp in ax.side_box.iter().filter(|p| ax.is_covered(p)) {
                let mut lower = [0; NDIM];
                let mut upper = [0; NDIM];
                for d in 0..NDIM {
                    if d == axis {
                        lower[d] = cp[d] * ratio[d];
                        upper[d] = lower[d];
                    } else {
                        lower[d] = cp[d] * ratio[d];
                        upper[d] = lower[d] + ratio[d] - 1;
                    }
                }
                let sources: Vec<(usize, IntVect)> = IndexBox::new(lower, upper)
                    .iter()
                    .filter_map(|q| owner_of(fine, axis, &q).map(|fp| (fp, q)))
                    .collect();
                if sources.is_empty() {
                    continue;
                }
                out.push(RestrictionStencil {
                    coarse_patch: po.patch_id,
                    axis,
                    p: cp,
                    sources,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::Poisson_FAC::robin_bc::{LocationIndexRobinBcCoefs, RobinBcCoefStrategy};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn two_level() -> Arc<PatchHierarchy> {
        let mut h = PatchHierarchy::uniform(IndexBox::new([0, 0], [7, 7]), [0.0, 0.0], [1.0, 1.0]).unwrap();
        h.add_level([2, 2], vec![IndexBox::new([4, 4], [11, 11])]).unwrap();
        Arc::new(h)
    }

    fn quadratic(axis: usize, x: &[f64; NDIM]) -> f64 {
        if axis == 0 {
            x[0] * x[0] + 3.0 * x[0] * x[1] - x[1] * x[1]
        } else {
            2.0 * x[1] * x[1] - x[0] * x[1] + x[0]
        }
    }

    #[test]
    fn test_lagrange_weights() {
        assert_eq!(lagrange_weights(3.0, 0, 8), vec![(3, 1.0)]);
        let w = lagrange_weights(2.25, 0, 8);
        assert_eq!(w.len(), 3);
        assert_relative_eq!(w.iter().map(|(_, w)| w).sum::<f64>(), 1.0, epsilon = 1e-14);
        let x2: f64 = w.iter().map(|(j, w)| w * (*j as f64).powi(2)).sum();
        assert_relative_eq!(x2, 2.25 * 2.25, epsilon = 1e-13);
        // one-sided at the lower edge
        let w = lagrange_weights(-0.25, 0, 8);
        assert_eq!(w.iter().map(|(j, _)| *j).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_coarse_fine_interpolation_reproduces_quadratics() {
        let h = two_level();
        let bc: Arc<dyn RobinBcCoefStrategy> = Arc::new(LocationIndexRobinBcCoefs::new("bc"));
        let overlap = OverlapCache::build(&h, 0, 1, 1, 1, &[None, None], &bc, 0.0).unwrap();
        let schedule = GhostFillSchedule::build(&h, &overlap);
        let mut v = SideVector::new("v", &h, 1, 1);
        v.set_from_fn(|ln, axis, x, _| if ln == 0 { quadratic(axis, x) } else { 0.0 });
        schedule.fill_vector_level(&mut v, 1, true);
        let ax = &overlap.patch(1, 0).axes;
        let pd = v.patch_data(1, 0);
        let mut checked = 0;
        for axis in 0..NDIM {
            for p in ax[axis].ghost_box.iter() {
                if matches!(ax[axis].kind(&p, 0), FaceKind::CoarseFine | FaceKind::GhostCoarseFine) {
                    let x = h.face_position(1, axis, &p);
                    assert_relative_eq!(pd.get(axis, &p, 0), quadratic(axis, &x), epsilon = 1e-12);
                    checked += 1;
                }
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_restriction_averages_fine_faces() {
        let h = two_level();
        let bc: Arc<dyn RobinBcCoefStrategy> = Arc::new(LocationIndexRobinBcCoefs::new("bc"));
        let overlap = OverlapCache::build(&h, 0, 1, 1, 1, &[None, None], &bc, 0.0).unwrap();
        let schedule = GhostFillSchedule::build(&h, &overlap);
        let mut v = SideVector::new("v", &h, 1, 1);
        // linear along the tangential direction: averages are exact
        v.set_from_fn(|ln, axis, x, _| if ln == 1 { 1.0 + x[0] + 2.0 * x[1] + axis as f64 } else { -7.0 });
        schedule.restrict_vector_level(&mut v, 1);
        let coarse = v.patch_data(0, 0);
        let x = h.face_position(0, 1, &[3, 4]);
        assert_relative_eq!(coarse.get(1, &[3, 4], 0), 2.0 + x[0] + 2.0 * x[1], epsilon = 1e-13);
        assert_eq!(coarse.get(0, &[1, 1], 0), -7.0);
    }

    #[test]
    fn test_same_level_copies() {
        let h = Arc::new(
            PatchHierarchy::new(
                IndexBox::new([0, 0], [7, 3]),
                [0.0, 0.0],
                [2.0, 1.0],
                vec![IndexBox::new([0, 0], [3, 3]), IndexBox::new([4, 0], [7, 3])],
            )
            .unwrap(),
        );
        let bc: Arc<dyn RobinBcCoefStrategy> = Arc::new(LocationIndexRobinBcCoefs::new("bc"));
        let overlap = OverlapCache::build(&h, 0, 0, 1, 1, &[None, None], &bc, 0.0).unwrap();
        let schedule = GhostFillSchedule::build(&h, &overlap);
        let mut v = SideVector::new("v", &h, 1, 1);
        v.level_data_mut(0)[0].fill(1.0);
        v.level_data_mut(0)[1].fill(2.0);
        schedule.fill_vector_level(&mut v, 0, true);
        // shared face owned by the lower id, ghosts from the neighbor
        assert_eq!(v.patch_data(0, 1).get(0, &[4, 2], 0), 1.0);
        assert_eq!(v.patch_data(0, 0).get(0, &[5, 2], 0), 2.0);
        assert_eq!(v.patch_data(0, 0).get(1, &[4, 2], 0), 2.0);
        // homogeneous Dirichlet boundary
        assert_eq!(v.patch_data(0, 0).get(0, &[0, 2], 0), 0.0);
    }
}
