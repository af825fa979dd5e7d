//! Index-space primitives of the block-structured grid: integer vectors, inclusive boxes,
//! boundary locations.
//!
//! Boxes follow the usual structured-AMR convention: `[lower, upper]` is inclusive in every
//! direction, a box is empty as soon as `upper[d] < lower[d]` for some `d`, and iteration runs
//! with axis 0 fastest. Side-centered (face) data for component axis `a` lives on the *side box*
//! of a cell box, i.e. the cell box with `upper[a] + 1`.

/// spatial dimension of the grid
pub const NDIM: usize = 2;

pub type IntVect = [i32; NDIM];

/// unit vector along `axis` multiplied by `k`
#[inline]
pub fn unit(axis: usize, k: i32) -> IntVect {
    let mut e = [0; NDIM];
    e[axis] = k;
    e
}

#[inline]
pub fn shift(p: &IntVect, axis: usize, k: i32) -> IntVect {
    let mut q = *p;
    q[axis] += k;
    q
}

/// Integer box in index space with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexBox {
    pub lower: IntVect,
    pub upper: IntVect,
}

impl IndexBox {
    #[inline]
    pub fn new(lower: IntVect, upper: IntVect) -> Self {
        Self { lower, upper }
    }

    pub fn empty() -> Self {
        Self {
            lower: [0; NDIM],
            upper: [-1; NDIM],
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..NDIM).any(|d| self.upper[d] < self.lower[d])
    }

    /// number of indices along `axis`
    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.upper[axis] - self.lower[axis] + 1) as usize
        }
    }

    pub fn num_points(&self) -> usize {
        (0..NDIM).map(|d| self.extent(d)).product()
    }

    #[inline]
    pub fn contains(&self, p: &IntVect) -> bool {
        (0..NDIM).all(|d| p[d] >= self.lower[d] && p[d] <= self.upper[d])
    }

    pub fn contains_box(&self, other: &IndexBox) -> bool {
        other.is_empty() || (self.contains(&other.lower) && self.contains(&other.upper))
    }

    pub fn intersect(&self, other: &IndexBox) -> Option<IndexBox> {
        let mut lower = [0; NDIM];
        let mut upper = [0; NDIM];
        for d in 0..NDIM {
            lower[d] = self.lower[d].max(other.lower[d]);
            upper[d] = self.upper[d].min(other.upper[d]);
            if upper[d] < lower[d] {
                return None;
            }
        }
        Some(IndexBox { lower, upper })
    }

    /// Grow (or shrink for negative `width`) in every direction.
    pub fn grow(&self, width: i32) -> IndexBox {
        let mut b = *self;
        for d in 0..NDIM {
            b.lower[d] -= width;
            b.upper[d] += width;
        }
        b
    }

    pub fn shifted(&self, axis: usize, k: i32) -> IndexBox {
        let mut b = *self;
        b.lower[axis] += k;
        b.upper[axis] += k;
        b
    }

    /// Side box of a cell box for the face component normal to `axis`.
    pub fn side_box(&self, axis: usize) -> IndexBox {
        let mut b = *self;
        b.upper[axis] += 1;
        b
    }

    /// Cell box refined by `ratio`.
    pub fn refine(&self, ratio: &IntVect) -> IndexBox {
        let mut b = *self;
        for d in 0..NDIM {
            b.lower[d] = self.lower[d] * ratio[d];
            b.upper[d] = (self.upper[d] + 1) * ratio[d] - 1;
        }
        b
    }

    /// Slab of the box with index `plane` along `axis`.
    pub fn slab(&self, axis: usize, plane: i32) -> IndexBox {
        let mut b = *self;
        b.lower[axis] = plane;
        b.upper[axis] = plane;
        b
    }

    /// Parts of `self` not covered by `other`, as disjoint boxes.
    pub fn difference(&self, other: &IndexBox) -> Vec<IndexBox> {
        let inter = match self.intersect(other) {
            None => return vec![*self],
            Some(inter) => inter,
        };
        let mut pieces = Vec::new();
        let mut rest = *self;
        for d in 0..NDIM {
            if rest.lower[d] < inter.lower[d] {
                let mut piece = rest;
                piece.upper[d] = inter.lower[d] - 1;
                pieces.push(piece);
                rest.lower[d] = inter.lower[d];
            }
            if rest.upper[d] > inter.upper[d] {
                let mut piece = rest;
                piece.lower[d] = inter.upper[d] + 1;
                pieces.push(piece);
                rest.upper[d] = inter.upper[d];
            }
        }
        pieces
    }

    /// Linear offset of `p` inside the box, axis 0 fastest. `p` must be contained.
    #[inline]
    pub fn offset(&self, p: &IntVect) -> usize {
        debug_assert!(self.contains(p), "{:?} not in {:?}", p, self);
        let mut off = 0usize;
        let mut stride = 1usize;
        for d in 0..NDIM {
            off += (p[d] - self.lower[d]) as usize * stride;
            stride *= self.extent(d);
        }
        off
    }

    pub fn iter(&self) -> BoxIter {
        BoxIter {
            bx: *self,
            current: self.lower,
            done: self.is_empty(),
        }
    }
}

/// Remove from every box of `boxes` its intersection with `takeaway`.
pub fn remove_intersections(boxes: Vec<IndexBox>, takeaway: &IndexBox) -> Vec<IndexBox> {
    boxes
        .into_iter()
        .flat_map(|b| b.difference(takeaway))
        .collect()
}

/// Lexicographic iterator over the indices of a box.
pub struct BoxIter {
    bx: IndexBox,
    current: IntVect,
    done: bool,
}

impl Iterator for BoxIter {
    type Item = IntVect;

    fn next(&mut self) -> Option<IntVect> {
        if self.done {
            return None;
        }
        let out = self.current;
        let mut d = 0;
        loop {
            if d == NDIM {
                self.done = true;
                break;
            }
            if self.current[d] < self.bx.upper[d] {
                self.current[d] += 1;
                break;
            }
            self.current[d] = self.bx.lower[d];
            d += 1;
        }
        Some(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Lower,
    Upper,
}

/// One of the `2*NDIM` faces of the physical domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryLocation {
    pub axis: usize,
    pub side: Side,
}

impl BoundaryLocation {
    pub fn new(axis: usize, side: Side) -> Self {
        Self { axis, side }
    }

    /// location index `2*axis + side`, the ordering used by location-indexed coefficient tables
    pub fn location_index(&self) -> usize {
        2 * self.axis
            + match self.side {
                Side::Lower => 0,
                Side::Upper => 1,
            }
    }

    pub fn from_location_index(index: usize) -> Self {
        let side = if index % 2 == 0 { Side::Lower } else { Side::Upper };
        Self {
            axis: index / 2,
            side,
        }
    }

    /// outward unit step across this boundary
    pub fn outward(&self) -> i32 {
        match self.side {
            Side::Lower => -1,
            Side::Upper => 1,
        }
    }

    pub fn all() -> Vec<BoundaryLocation> {
        (0..2 * NDIM).map(BoundaryLocation::from_location_index).collect()
    }
}
