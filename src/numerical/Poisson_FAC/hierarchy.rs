//! Minimal patch hierarchy: nested levels of rectangular patches, coarsest first.
//!
//! The hierarchy is built once (level 0 must tile the physical domain, finer levels are given in
//! their own refined index space) and then shared as `Arc<PatchHierarchy>`. Regridding means
//! building a new hierarchy and re-initializing every operator that cached data for the old one.
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use crate::numerical::Poisson_FAC::geometry::{IndexBox, IntVect, NDIM};

/// A rectangular region of one level. `id` is unique within the level, `owner` is the rank of
/// the worker that owns the patch data.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: usize,
    pub cell_box: IndexBox,
    pub owner: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchLevel {
    pub level_number: usize,
    /// refinement ratio to the next coarser level ([1; NDIM] on level 0)
    pub ratio_to_coarser: IntVect,
    pub dx: [f64; NDIM],
    /// physical domain in the index space of this level
    pub domain: IndexBox,
    pub patches: Vec<Patch>,
}

impl PatchLevel {
    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn patch(&self, id: usize) -> &Patch {
        &self.patches[id]
    }

    /// true if some patch of this level contains the cell
    pub fn covers_cell(&self, cell: &IntVect) -> bool {
        self.patches.iter().any(|p| p.cell_box.contains(cell))
    }

    pub fn boxes(&self) -> Vec<IndexBox> {
        self.patches.iter().map(|p| p.cell_box).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchHierarchy {
    pub x_lo: [f64; NDIM],
    pub x_up: [f64; NDIM],
    levels: Vec<PatchLevel>,
}

impl PatchHierarchy {
    /// Create a hierarchy whose level 0 is tiled by `boxes` over `domain`, spanning the physical
    /// region `[x_lo, x_up]`.
    pub fn new(
        domain: IndexBox,
        x_lo: [f64; NDIM],
        x_up: [f64; NDIM],
        boxes: Vec<IndexBox>,
    ) -> Result<Self, FacError> {
        if domain.is_empty() {
            return Err(FacError::InvalidHierarchy("empty physical domain".to_string()));
        }
        let mut dx = [0.0; NDIM];
        for d in 0..NDIM {
            if x_up[d] <= x_lo[d] {
                return Err(FacError::InvalidHierarchy(format!(
                    "x_up[{}] = {} must exceed x_lo[{}] = {}",
                    d, x_up[d], d, x_lo[d]
                )));
            }
            dx[d] = (x_up[d] - x_lo[d]) / domain.extent(d) as f64;
        }
        let patches = Self::make_patches(&domain, boxes, 0)?;
        let covered: usize = patches.iter().map(|p| p.cell_box.num_points()).sum();
        if covered != domain.num_points() {
            return Err(FacError::InvalidHierarchy(format!(
                "level 0 patches cover {} cells, domain has {}",
                covered,
                domain.num_points()
            )));
        }
        let level0 = PatchLevel {
            level_number: 0,
            ratio_to_coarser: [1; NDIM],
            dx,
            domain,
            patches,
        };
        Ok(Self {
            x_lo,
            x_up,
            levels: vec![level0],
        })
    }

    /// Single-patch, single-level hierarchy.
    pub fn uniform(domain: IndexBox, x_lo: [f64; NDIM], x_up: [f64; NDIM]) -> Result<Self, FacError> {
        Self::new(domain, x_lo, x_up, vec![domain])
    }

    /// Append a finer level. `boxes` are given in the index space of the new level.
    pub fn add_level(&mut self, ratio: IntVect, boxes: Vec<IndexBox>) -> Result<usize, FacError> {
        if ratio.iter().any(|r| *r < 1) {
            return Err(FacError::InvalidHierarchy(format!(
                "refinement ratio {:?} must be positive",
                ratio
            )));
        }
        let coarser = self
            .levels
            .last()
            .ok_or_else(|| FacError::InvalidHierarchy("hierarchy has no level 0".to_string()))?;
        let domain = coarser.domain.refine(&ratio);
        let mut dx = coarser.dx;
        for d in 0..NDIM {
            dx[d] /= ratio[d] as f64;
        }
        let level_number = self.levels.len();
        let patches = Self::make_patches(&domain, boxes, level_number)?;
        self.levels.push(PatchLevel {
            level_number,
            ratio_to_coarser: ratio,
            dx,
            domain,
            patches,
        });
        Ok(level_number)
    }

    fn make_patches(
        domain: &IndexBox,
        boxes: Vec<IndexBox>,
        level_number: usize,
    ) -> Result<Vec<Patch>, FacError> {
        if boxes.is_empty() {
            return Err(FacError::InvalidHierarchy(format!(
                "level {} has no patches",
                level_number
            )));
        }
        boxes
            .into_iter()
            .enumerate()
            .map(|(id, cell_box)| {
                if cell_box.is_empty() || !domain.contains_box(&cell_box) {
                    Err(FacError::InvalidHierarchy(format!(
                        "patch {:?} on level {} is empty or outside the domain {:?}",
                        cell_box, level_number, domain
                    )))
                } else {
                    Ok(Patch {
                        id,
                        cell_box,
                        owner: 0,
                    })
                }
            })
            .collect()
    }

    pub fn set_patch_owner(&mut self, level_number: usize, id: usize, owner: usize) {
        self.levels[level_number].patches[id].owner = owner;
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest_level_number(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn level(&self, level_number: usize) -> &PatchLevel {
        &self.levels[level_number]
    }

    pub fn levels(&self) -> &[PatchLevel] {
        &self.levels
    }

    /// Physical coordinates of the side-centered point `p` (component `axis`) on a level.
    pub fn face_position(&self, level_number: usize, axis: usize, p: &IntVect) -> [f64; NDIM] {
        let level = &self.levels[level_number];
        let mut x = [0.0; NDIM];
        for d in 0..NDIM {
            let offset = if d == axis { 0.0 } else { 0.5 };
            x[d] = self.x_lo[d] + (p[d] - level.domain.lower[d]) as f64 * level.dx[d] + offset * level.dx[d];
        }
        x
    }
}
