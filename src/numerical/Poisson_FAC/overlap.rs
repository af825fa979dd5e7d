//! Per-level, per-patch, per-axis bookkeeping of the special face regions of side-centered data.
//!
//! For every patch and component axis the faces of the ghosted side box are partitioned into
//!
//! | kind | meaning |
//! |---|---|
//! | `Interior` | unknown owned by the patch |
//! | `RobinBoundary` | unknown on the physical boundary, ghost folded with the Robin relation |
//! | `DirichletBoundary` | boundary face with `b = 0`, value fixed to `g/a` |
//! | `CoarseFine` | face on the coarse-fine interface, interpolated from the coarser level |
//! | `Shared` | face duplicated by a lower-id patch of the same level, copied from it |
//! | `GhostCopy` | ghost face filled from a same-level neighbor |
//! | `GhostCoarseFine` | ghost face inside the domain not covered by the level, interpolated |
//! | `GhostPhysical` | ghost face outside the domain, never read directly |
//!
//! The regions are also kept as boxes (physical boundary boxes with their location, coarse-fine
//! boxes, and `neighbor id -> received boxes`), together with the Robin coefficients of boundary
//! faces and of tangential boundary ghosts and the coarse faces covered by the next finer level.
//! The cache is built from ordered containers only, so two builds over the same hierarchy compare
//! equal.
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::geometry::{
    BoundaryLocation, IndexBox, IntVect, NDIM, Side, remove_intersections, shift,
};
use crate::numerical::Poisson_FAC::hierarchy::{PatchHierarchy, PatchLevel};
use crate::numerical::Poisson_FAC::robin_bc::{
    BcCoefSet, RobinBcCoefStrategy, RobinCoefs, provider_for,
};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaceKind {
    Interior,
    RobinBoundary,
    DirichletBoundary,
    CoarseFine,
    Shared,
    GhostCopy,
    GhostCoarseFine,
    GhostPhysical,
}

impl FaceKind {
    /// faces relaxed by the smoother and carrying a residual
    pub fn is_unknown(&self) -> bool {
        matches!(self, FaceKind::Interior | FaceKind::RobinBoundary)
    }

    /// faces whose value is owned (not received) by the patch
    pub fn is_owned(&self) -> bool {
        matches!(
            self,
            FaceKind::Interior | FaceKind::RobinBoundary | FaceKind::DirichletBoundary | FaceKind::CoarseFine
        )
    }
}

/// Tangential boundary ghost: location of the boundary it mirrors across and its coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostCoefs {
    pub location: BoundaryLocation,
    pub coefs: RobinCoefs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisOverlap {
    pub axis: usize,
    pub side_box: IndexBox,
    pub ghost_box: IndexBox,
    pub physical_boundary: Vec<(BoundaryLocation, IndexBox)>,
    pub coarse_fine: Vec<IndexBox>,
    pub coarse_fine_ghosts: Vec<IndexBox>,
    /// neighbor patch id -> faces of the ghosted side box received from it
    pub neighbors: BTreeMap<usize, Vec<IndexBox>>,
    /// coefficients of boundary faces, keyed by `(face, depth)`
    pub face_coefs: BTreeMap<(IntVect, usize), RobinCoefs>,
    /// coefficients of tangential boundary ghosts, keyed by `(ghost face, depth)`
    pub ghost_coefs: BTreeMap<(IntVect, usize), GhostCoefs>,
    depth: usize,
    kinds: Vec<FaceKind>,
    covered: Vec<bool>,
}

impl AxisOverlap {
    #[inline]
    pub fn kind(&self, p: &IntVect, depth: usize) -> FaceKind {
        self.kinds[depth * self.ghost_box.num_points() + self.ghost_box.offset(p)]
    }

    /// true if the coarse face `p` lies under the next finer level of the range
    #[inline]
    pub fn is_covered(&self, p: &IntVect) -> bool {
        self.covered[self.side_box.offset(p)]
    }

    /// unknown faces of component `depth`, lexicographic order
    pub fn unknowns(&self, depth: usize) -> Vec<IntVect> {
        self.side_box
            .iter()
            .filter(|p| self.kind(p, depth).is_unknown())
            .collect()
    }

    pub fn count(&self, kind: FaceKind) -> usize {
        self.kinds.iter().filter(|k| **k == kind).count()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOverlap {
    pub patch_id: usize,
    pub owner: usize,
    pub cell_box: IndexBox,
    pub axes: Vec<AxisOverlap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelOverlap {
    pub level_number: usize,
    pub patches: Vec<PatchOverlap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapCache {
    pub coarsest: usize,
    pub finest: usize,
    pub depth: usize,
    pub ghost_width: usize,
    levels: BTreeMap<usize, LevelOverlap>,
}

impl OverlapCache {
    /// Build the bookkeeping for levels `[coarsest, finest]`. Fails only on degenerate Robin
    /// coefficients; the hierarchy itself is assumed valid.
    pub fn build(
        hierarchy: &PatchHierarchy,
        coarsest: usize,
        finest: usize,
        depth: usize,
        ghost_width: usize,
        bc_coefs: &BcCoefSet,
        default_bc: &Arc<dyn RobinBcCoefStrategy>,
        time: f64,
    ) -> Result<Self, FacError> {
        let mut levels = BTreeMap::new();
        for ln in coarsest..=finest {
            let finer = if ln < finest {
                Some(hierarchy.level(ln + 1))
            } else {
                None
            };
            let level = hierarchy.level(ln);
            let patches = (0..level.num_patches())
                .into_par_iter()
                .map(|id| {
                    build_patch(
                        hierarchy, level, finer, id, depth, ghost_width, bc_coefs, default_bc,
                        time,
                    )
                })
                .collect::<Result<Vec<PatchOverlap>, FacError>>()?;
            debug!(
                "overlap of level {}: {} patches, {} coarse-fine faces",
                ln,
                patches.len(),
                patches
                    .iter()
                    .flat_map(|p| p.axes.iter())
                    .map(|a| a.count(FaceKind::CoarseFine))
                    .sum::<usize>()
            );
            levels.insert(
                ln,
                LevelOverlap {
                    level_number: ln,
                    patches,
                },
            );
        }
        info!(
            "overlap cache built for levels [{}, {}], depth {}, ghost width {}",
            coarsest, finest, depth, ghost_width
        );
        Ok(Self {
            coarsest,
            finest,
            depth,
            ghost_width,
            levels,
        })
    }

    pub fn level(&self, ln: usize) -> &LevelOverlap {
        &self.levels[&ln]
    }

    pub fn patch(&self, ln: usize, id: usize) -> &PatchOverlap {
        &self.levels[&ln].patches[id]
    }

    pub fn has_level(&self, ln: usize) -> bool {
        self.levels.contains_key(&ln)
    }
}

fn build_patch(
    hierarchy: &PatchHierarchy,
    level: &PatchLevel,
    finer: Option<&PatchLevel>,
    id: usize,
    depth: usize,
    ghost_width: usize,
    bc_coefs: &BcCoefSet,
    default_bc: &Arc<dyn RobinBcCoefStrategy>,
    time: f64,
) -> Result<PatchOverlap, FacError> {
    let patch = level.patch(id);
    let mut axes = Vec::with_capacity(NDIM);
    for axis in 0..NDIM {
        let provider = provider_for(bc_coefs, default_bc, axis);
        axes.push(build_axis(
            hierarchy,
            level,
            finer,
            id,
            axis,
            depth,
            ghost_width,
            &**provider,
            time,
        )?);
    }
    Ok(PatchOverlap {
        patch_id: id,
        owner: patch.owner,
        cell_box: patch.cell_box,
        axes,
    })
}

fn build_axis(
    hierarchy: &PatchHierarchy,
    level: &PatchLevel,
    finer: Option<&PatchLevel>,
    id: usize,
    axis: usize,
    depth: usize,
    ghost_width: usize,
    provider: &dyn RobinBcCoefStrategy,
    time: f64,
) -> Result<AxisOverlap, FacError> {
    let cell_box = level.patch(id).cell_box;
    let side_box = cell_box.side_box(axis);
    let ghost_box = side_box.grow(ghost_width as i32);
    let domain = level.domain;
    let domain_sides = domain.side_box(axis);

    // faces received from same-level neighbors; the lower id owns duplicated faces
    let mut neighbors: BTreeMap<usize, Vec<IndexBox>> = BTreeMap::new();
    let mut assigned: Vec<IndexBox> = Vec::new();
    for other in level.patches.iter().filter(|p| p.id != id) {
        let Some(region) = ghost_box.intersect(&other.cell_box.side_box(axis)) else {
            continue;
        };
        let mut pieces = vec![region];
        if other.id > id {
            pieces = remove_intersections(pieces, &side_box);
        }
        for taken in assigned.iter() {
            pieces = remove_intersections(pieces, taken);
        }
        if !pieces.is_empty() {
            assigned.extend(pieces.iter().copied());
            neighbors.insert(other.id, pieces);
        }
    }

    // faces on the physical boundary: only the planes normal to `axis` can touch it
    let mut physical_boundary = Vec::new();
    for side in [Side::Lower, Side::Upper] {
        let plane = match side {
            Side::Lower => domain_sides.lower[axis],
            Side::Upper => domain_sides.upper[axis],
        };
        if let Some(b) = side_box.intersect(&domain_sides.slab(axis, plane)) {
            physical_boundary.push((BoundaryLocation::new(axis, side), b));
        }
    }

    // faces on the patch boundary whose outer cell is inside the domain but not on this level
    let mut coarse_fine = Vec::new();
    for side in [Side::Lower, Side::Upper] {
        let (outer_cells, to_face) = match side {
            Side::Lower => (cell_box.slab(axis, cell_box.lower[axis] - 1), 1),
            Side::Upper => (cell_box.slab(axis, cell_box.upper[axis] + 1), 0),
        };
        let Some(outer_cells) = outer_cells.intersect(&domain) else {
            continue;
        };
        let mut uncovered = vec![outer_cells];
        for other in level.patches.iter() {
            uncovered = remove_intersections(uncovered, &other.cell_box);
        }
        coarse_fine.extend(uncovered.into_iter().map(|b| b.shifted(axis, to_face)));
    }

    // ghost faces inside the domain that no patch of the level provides
    let mut coarse_fine_ghosts = Vec::new();
    if let Some(inside) = ghost_box.intersect(&domain_sides) {
        let mut pieces = remove_intersections(vec![inside], &side_box);
        for taken in assigned.iter() {
            pieces = remove_intersections(pieces, taken);
        }
        coarse_fine_ghosts = pieces;
    }

    let npts = ghost_box.num_points();
    let mut kinds = vec![FaceKind::GhostPhysical; npts * depth];
    let paint = |b: &IndexBox, k: usize, kind: FaceKind, kinds: &mut Vec<FaceKind>| {
        for p in b.iter() {
            kinds[k * npts + ghost_box.offset(&p)] = kind;
        }
    };
    for k in 0..depth {
        for b in coarse_fine_ghosts.iter() {
            paint(b, k, FaceKind::GhostCoarseFine, &mut kinds);
        }
        paint(&side_box, k, FaceKind::Interior, &mut kinds);
        for boxes in neighbors.values() {
            for b in boxes.iter() {
                for p in b.iter() {
                    let kind = if side_box.contains(&p) {
                        FaceKind::Shared
                    } else {
                        FaceKind::GhostCopy
                    };
                    kinds[k * npts + ghost_box.offset(&p)] = kind;
                }
            }
        }
        for b in coarse_fine.iter() {
            paint(b, k, FaceKind::CoarseFine, &mut kinds);
        }
    }

    let ln = level.level_number;
    let mut face_coefs = BTreeMap::new();
    for (location, b) in physical_boundary.iter() {
        for p in b.iter() {
            let x = hierarchy.face_position(ln, axis, &p);
            for k in 0..depth {
                let coefs = provider.coefs(*location, &x, k, time);
                coefs.validate()?;
                let kind = if coefs.is_dirichlet() {
                    FaceKind::DirichletBoundary
                } else {
                    coefs.normal_ghost_weights(level.dx[axis])?;
                    FaceKind::RobinBoundary
                };
                kinds[k * npts + ghost_box.offset(&p)] = kind;
                face_coefs.insert((p, k), coefs);
            }
        }
    }

    // tangential ghosts read by unknown faces next to the boundary
    let mut ghost_coefs = BTreeMap::new();
    for k in 0..depth {
        for q in side_box.iter() {
            if !kinds[k * npts + ghost_box.offset(&q)].is_unknown() {
                continue;
            }
            for d in (0..NDIM).filter(|d| *d != axis) {
                for (side, step) in [(Side::Lower, -1), (Side::Upper, 1)] {
                    let g = shift(&q, d, step);
                    let outside = match side {
                        Side::Lower => g[d] < domain.lower[d],
                        Side::Upper => g[d] > domain.upper[d],
                    };
                    if !outside {
                        continue;
                    }
                    let location = BoundaryLocation::new(d, side);
                    let mut x = hierarchy.face_position(ln, axis, &g);
                    x[d] = match side {
                        Side::Lower => hierarchy.x_lo[d],
                        Side::Upper => hierarchy.x_up[d],
                    };
                    let coefs = provider.coefs(location, &x, k, time);
                    coefs.validate()?;
                    coefs.tangential_ghost_weights(level.dx[d])?;
                    ghost_coefs.insert((g, k), GhostCoefs { location, coefs });
                }
            }
        }
    }

    let covered = match finer {
        Some(finer) => side_box
            .iter()
            .map(|p| face_is_covered(&domain, finer, axis, &p))
            .collect(),
        None => vec![false; side_box.num_points()],
    };

    Ok(AxisOverlap {
        axis,
        side_box,
        ghost_box,
        physical_boundary,
        coarse_fine,
        coarse_fine_ghosts,
        neighbors,
        face_coefs,
        ghost_coefs,
        depth,
        kinds,
        covered,
    })
}

/// A coarse face is covered when every adjacent coarse cell inside the domain is covered by the
/// finer level.
fn face_is_covered(domain: &IndexBox, finer: &PatchLevel, axis: usize, p: &IntVect) -> bool {
    let ratio = finer.ratio_to_coarser;
    let cells = [shift(p, axis, -1), *p];
    let mut any = false;
    for c in cells.iter().filter(|c| domain.contains(c)) {
        any = true;
        let fine_cells = IndexBox::new(*c, *c).refine(&ratio);
        if !fine_cells.iter().all(|f| finer.covers_cell(&f)) {
            return false;
        }
    }
    any
}
