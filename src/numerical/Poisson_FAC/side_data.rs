//! Side-centered (face) data on patches and vectors of such data over a hierarchy.
//!
//! `SideData` keeps one array per component axis. The array of axis `a` spans the side box of
//! the patch grown by the ghost width and stores `depth` components depth-major, so that
//! component `k` of face `p` sits at `k * npts + box.offset(p)`.
use crate::numerical::Poisson_FAC::geometry::{IndexBox, IntVect, NDIM};
use crate::numerical::Poisson_FAC::hierarchy::PatchHierarchy;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SideData {
    cell_box: IndexBox,
    ghost: i32,
    depth: usize,
    ghost_boxes: [IndexBox; NDIM],
    data: [Vec<f64>; NDIM],
}

impl SideData {
    pub fn new(cell_box: IndexBox, ghost: usize, depth: usize) -> Self {
        let ghost = ghost as i32;
        let ghost_boxes: [IndexBox; NDIM] =
            std::array::from_fn(|axis| cell_box.side_box(axis).grow(ghost));
        let data: [Vec<f64>; NDIM] =
            std::array::from_fn(|axis| vec![0.0; ghost_boxes[axis].num_points() * depth]);
        Self {
            cell_box,
            ghost,
            depth,
            ghost_boxes,
            data,
        }
    }

    pub fn cell_box(&self) -> &IndexBox {
        &self.cell_box
    }

    pub fn ghost_width(&self) -> usize {
        self.ghost as usize
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// interior faces of component `axis`
    pub fn side_box(&self, axis: usize) -> IndexBox {
        self.cell_box.side_box(axis)
    }

    /// interior plus ghost faces of component `axis`
    pub fn ghost_box(&self, axis: usize) -> &IndexBox {
        &self.ghost_boxes[axis]
    }

    #[inline]
    pub fn index(&self, axis: usize, p: &IntVect, depth: usize) -> usize {
        let gb = &self.ghost_boxes[axis];
        depth * gb.num_points() + gb.offset(p)
    }

    #[inline]
    pub fn get(&self, axis: usize, p: &IntVect, depth: usize) -> f64 {
        self.data[axis][self.index(axis, p, depth)]
    }

    #[inline]
    pub fn set(&mut self, axis: usize, p: &IntVect, depth: usize, value: f64) {
        let i = self.index(axis, p, depth);
        self.data[axis][i] = value;
    }

    pub fn array(&self, axis: usize) -> &[f64] {
        &self.data[axis]
    }

    pub fn array_mut(&mut self, axis: usize) -> &mut [f64] {
        &mut self.data[axis]
    }

    pub fn fill(&mut self, value: f64) {
        for axis in 0..NDIM {
            self.data[axis].iter_mut().for_each(|x| *x = value);
        }
    }

    /// Copy all values (interior and ghosts) from data with the same layout.
    pub fn copy_from(&mut self, other: &SideData) {
        debug_assert_eq!(self.ghost_boxes, other.ghost_boxes);
        for axis in 0..NDIM {
            self.data[axis].copy_from_slice(&other.data[axis]);
        }
    }
}

/// Side-centered vector over all levels of a hierarchy (`levels[ln][patch id]`).
#[derive(Debug, Clone)]
pub struct SideVector {
    name: String,
    hierarchy: Arc<PatchHierarchy>,
    depth: usize,
    ghost: usize,
    levels: Vec<Vec<SideData>>,
}

impl SideVector {
    pub fn new(name: &str, hierarchy: &Arc<PatchHierarchy>, depth: usize, ghost: usize) -> Self {
        let levels = hierarchy
            .levels()
            .iter()
            .map(|level| {
                level
                    .patches
                    .iter()
                    .map(|patch| SideData::new(patch.cell_box, ghost, depth))
                    .collect()
            })
            .collect();
        Self {
            name: name.to_string(),
            hierarchy: Arc::clone(hierarchy),
            depth,
            ghost,
            levels,
        }
    }

    /// new zero vector with the layout of `self`
    pub fn clone_layout(&self, name: &str) -> Self {
        SideVector::new(name, &self.hierarchy, self.depth, self.ghost)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hierarchy(&self) -> &Arc<PatchHierarchy> {
        &self.hierarchy
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn ghost_width(&self) -> usize {
        self.ghost
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level_data(&self, ln: usize) -> &[SideData] {
        &self.levels[ln]
    }

    pub fn level_data_mut(&mut self, ln: usize) -> &mut Vec<SideData> {
        &mut self.levels[ln]
    }

    pub fn patch_data(&self, ln: usize, id: usize) -> &SideData {
        &self.levels[ln][id]
    }

    pub fn patch_data_mut(&mut self, ln: usize, id: usize) -> &mut SideData {
        &mut self.levels[ln][id]
    }

    /// Mutable level `ln` together with read access to level `ln - 1` (if any).
    pub fn level_and_coarser_mut(&mut self, ln: usize) -> (&mut Vec<SideData>, Option<&[SideData]>) {
        let (below, rest) = self.levels.split_at_mut(ln);
        let coarser = below.last().map(|v| v.as_slice());
        (&mut rest[0], coarser)
    }

    /// Mutable level `ln - 1` together with read access to level `ln`.
    pub fn coarser_mut_and_level(&mut self, ln: usize) -> (&mut Vec<SideData>, &[SideData]) {
        let (below, rest) = self.levels.split_at_mut(ln);
        (&mut below[ln - 1], &rest[0])
    }

    pub fn set_to_scalar(&mut self, value: f64) {
        for level in self.levels.iter_mut() {
            level.iter_mut().for_each(|pd| pd.fill(value));
        }
    }

    pub fn set_level_to_scalar(&mut self, ln: usize, value: f64) {
        self.levels[ln].iter_mut().for_each(|pd| pd.fill(value));
    }

    /// `self += alpha * other` on every face of level `ln`, ghosts included
    pub fn add_scaled_level(&mut self, alpha: f64, other: &SideVector, ln: usize) {
        for (dst, src) in self.levels[ln].iter_mut().zip(other.levels[ln].iter()) {
            for axis in 0..NDIM {
                dst.data[axis]
                    .iter_mut()
                    .zip(src.data[axis].iter())
                    .for_each(|(d, s)| *d += alpha * s);
            }
        }
    }

    pub fn copy_level_from(&mut self, other: &SideVector, ln: usize) {
        for (dst, src) in self.levels[ln].iter_mut().zip(other.levels[ln].iter()) {
            dst.copy_from(src);
        }
    }

    /// Set the interior faces of every level to `f(level, axis, x, depth)` evaluated at face
    /// positions.
    pub fn set_from_fn<F>(&mut self, f: F)
    where
        F: Fn(usize, usize, &[f64; NDIM], usize) -> f64,
    {
        let hierarchy = Arc::clone(&self.hierarchy);
        for (ln, level) in self.levels.iter_mut().enumerate() {
            for pd in level.iter_mut() {
                for axis in 0..NDIM {
                    for p in pd.side_box(axis).iter() {
                        let x = hierarchy.face_position(ln, axis, &p);
                        for k in 0..pd.depth() {
                            pd.set(axis, &p, k, f(ln, axis, &x, k));
                        }
                    }
                }
            }
        }
    }

    /// Discrete L2 norm over the interior faces of levels `[coarsest, finest]`, weighted by the
    /// face control volume. Faces shared by two patches are counted once.
    pub fn l2_norm(&self, coarsest: usize, finest: usize) -> f64 {
        let mut sum = 0.0;
        for ln in coarsest..=finest {
            let level = self.hierarchy.level(ln);
            let volume: f64 = level.dx.iter().product();
            for (id, pd) in self.levels[ln].iter().enumerate() {
                for axis in 0..NDIM {
                    for p in pd.side_box(axis).iter() {
                        let duplicated = self.levels[ln][..id]
                            .iter()
                            .any(|other| other.side_box(axis).contains(&p));
                        if duplicated {
                            continue;
                        }
                        for k in 0..self.depth {
                            let v = pd.get(axis, &p, k);
                            sum += v * v * volume;
                        }
                    }
                }
            }
        }
        sum.sqrt()
    }

    /// Maximum absolute value over the interior faces of levels `[coarsest, finest]`.
    pub fn max_norm(&self, coarsest: usize, finest: usize) -> f64 {
        let mut max = 0.0_f64;
        for ln in coarsest..=finest {
            for pd in self.levels[ln].iter() {
                for axis in 0..NDIM {
                    for p in pd.side_box(axis).iter() {
                        for k in 0..self.depth {
                            max = max.max(pd.get(axis, &p, k).abs());
                        }
                    }
                }
            }
        }
        max
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_side_data_layout() {
        let mut sd = SideData::new(IndexBox::new([0, 0], [3, 1]), 1, 2);
        assert_eq!(sd.side_box(0), IndexBox::new([0, 0], [4, 1]));
        assert_eq!(*sd.ghost_box(1), IndexBox::new([-1, -1], [4, 3]));
        assert_eq!(sd.array(0).len(), 7 * 4 * 2);
        sd.set(0, &[-1, 2], 1, 3.5);
        assert_eq!(sd.get(0, &[-1, 2], 1), 3.5);
        assert_eq!(sd.get(0, &[-1, 2], 0), 0.0);
    }

    #[test]
    fn test_vector_norms_skip_duplicated_faces() {
        let domain = IndexBox::new([0, 0], [3, 3]);
        let h = Arc::new(
            PatchHierarchy::new(
                domain,
                [0.0, 0.0],
                [1.0, 1.0],
                vec![IndexBox::new([0, 0], [1, 3]), IndexBox::new([2, 0], [3, 3])],
            )
            .unwrap(),
        );
        let mut v = SideVector::new("v", &h, 1, 1);
        v.set_to_scalar(1.0);
        // 5*4 x-faces + 4*5 y-faces, each of volume 1/16
        assert_relative_eq!(v.l2_norm(0, 0), (40.0_f64 / 16.0).sqrt(), epsilon = 1e-14);
        assert_relative_eq!(v.max_norm(0, 0), 1.0);
        let mut z = v.clone_layout("z");
        z.add_scaled_level(-2.0, &v, 0);
        assert_relative_eq!(z.max_norm(0, 0), 2.0);
    }
}
