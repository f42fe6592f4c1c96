use crate::index::{BoxDim, Offset3};

/// Axis-aligned box of voxels: `min` inclusive, `min + size` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub min: Offset3,
    pub size: BoxDim,
}

impl Region {

    pub fn new(min: Offset3, size: BoxDim) -> Self { Self { min, size } }

    /// The region covering a whole image of the given dimensions
    pub fn of_dims(dims: BoxDim) -> Self { Self { min: [0; 3], size: dims } }

    /// One past the last voxel in each dimension
    pub fn end(&self) -> Offset3 {
        let Self { min, size } = self;
        [min[0] + size[0] as isize,
         min[1] + size[1] as isize,
         min[2] + size[2] as isize]
    }

    pub fn n_voxels(&self) -> usize { self.size.iter().product() }

    pub fn is_empty(&self) -> bool { self.n_voxels() == 0 }

    pub fn contains(&self, p: Offset3) -> bool {
        let end = self.end();
        (0..3).all(|d| self.min[d] <= p[d] && p[d] < end[d])
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    /// The overlap of two regions, `None` if they share no voxel.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let (a_end, b_end) = (self.end(), other.end());
        let mut min  = [0; 3];
        let mut size = [0; 3];
        for d in 0..3 {
            let lo = self.min[d].max(other.min[d]);
            let hi = a_end[d].min(b_end[d]);
            if hi <= lo { return None }
            min [d] = lo;
            size[d] = (hi - lo) as usize;
        }
        Some(Self { min, size })
    }

    /// The part of this region lying inside an image of dimensions `dims`
    pub fn clip_to(&self, dims: BoxDim) -> Option<Self> {
        self.intersection(&Self::of_dims(dims))
    }

    /// Position of `p` relative to this region's origin
    pub fn local(&self, p: Offset3) -> Offset3 {
        [p[0] - self.min[0], p[1] - self.min[1], p[2] - self.min[2]]
    }
}
