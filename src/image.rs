//! Dense 3d `f32` raster, x varying fastest.

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::types::{BoxDim, Index1, Index3, Intensityf32, Offset3, Region};
use geometry::{index3_to_1, mirror};

pub type ImageData = Vec<Intensityf32>;

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub dims: BoxDim,
    /// Position of voxel `[0,0,0]` in the coordinate space the raster came from
    pub min: Offset3,
    pub data: ImageData,
}

impl Image {

    pub fn new(dims: BoxDim, data: ImageData) -> Result<Self> {
        Self::with_min(dims, [0; 3], data)
    }

    pub fn with_min(dims: BoxDim, min: Offset3, data: ImageData) -> Result<Self> {
        let [x, y, z] = dims;
        if data.len() != x * y * z {
            return Err(Error::DataLength { dims, got: data.len() });
        }
        Ok(Self { dims, min, data })
    }

    pub fn filled(dims: BoxDim, value: Intensityf32) -> Self {
        let [x, y, z] = dims;
        Self { dims, min: [0; 3], data: vec![value; x * y * z] }
    }

    pub fn zeros(dims: BoxDim) -> Self { Self::filled(dims, 0.0) }
    pub fn ones (dims: BoxDim) -> Self { Self::filled(dims, 1.0) }

    pub fn n_voxels(&self) -> usize { self.data.len() }

    pub fn region(&self) -> Region { Region::of_dims(self.dims) }

    /// The same raster, relocated so that its first voxel sits at the origin
    pub fn zero_min(self) -> Self { Self { min: [0; 3], ..self } }

    pub fn max(&self) -> Intensityf32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Copy `region` into `out` (laid out with `region.size`), reading
    /// coordinates outside the image by reflection at its borders.
    pub fn copy_region_mirrored(&self, region: &Region, out: &mut [Intensityf32]) {
        let [sx, sy, sz] = region.size;
        debug_assert_eq!(out.len(), sx * sy * sz);
        let lookup = |d: usize| -> Vec<usize> {
            (0..region.size[d])
                .map(|i| mirror(region.min[d] + i as isize, self.dims[d]))
                .collect()
        };
        let (xs, ys, zs) = (lookup(0), lookup(1), lookup(2));
        let [nx, ny, _] = self.dims;
        let mut o = 0;
        for &z in &zs {
            for &y in &ys {
                let row = (y + z * ny) * nx;
                for &x in &xs {
                    out[o] = self.data[row + x];
                    o += 1;
                }
            }
        }
    }

    /// Copy `region` into `out` (laid out with `region.size`), reading zero
    /// outside the image.
    pub fn copy_region_zero(&self, region: &Region, out: &mut [Intensityf32]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        let Some(inside) = region.clip_to(self.dims) else { return };
        let local = region.local(inside.min);
        let [lx, ly, lz] = local.map(|i| i as usize);
        let [sx, sy, _] = region.size;
        let [nx, ny, _] = self.dims;
        let [ix, iy, iz] = inside.min.map(|i| i as usize);
        let w = inside.size[0];
        for z in 0..inside.size[2] {
            for y in 0..inside.size[1] {
                let src = ix + (iy + y + (iz + z) * ny) * nx;
                let dst = lx + (ly + y + (lz + z) * sy) * sx;
                out[dst..dst + w].copy_from_slice(&self.data[src..src + w]);
            }
        }
    }

    /// Overwrite `region` (clipped to the image) with `src`, which is laid out
    /// with `region.size`.
    pub fn paste_region(&mut self, region: &Region, src: &[Intensityf32]) {
        let [sx, sy, sz] = region.size;
        debug_assert_eq!(src.len(), sx * sy * sz);
        let Some(inside) = region.clip_to(self.dims) else { return };
        let [lx, ly, lz] = region.local(inside.min).map(|i| i as usize);
        let [nx, ny, _] = self.dims;
        let [ix, iy, iz] = inside.min.map(|i| i as usize);
        let w = inside.size[0];
        for z in 0..inside.size[2] {
            for y in 0..inside.size[1] {
                let dst = ix + (iy + y + (iz + z) * ny) * nx;
                let from = lx + (ly + y + (lz + z) * sy) * sx;
                self.data[dst..dst + w].copy_from_slice(&src[from..from + w]);
            }
        }
    }

    /// One z-plane as a `(ny, nx)` array
    pub fn xy_slice(&self, z: usize) -> Array2<Intensityf32> {
        let [nx, ny, _] = self.dims;
        let start = z * nx * ny;
        Array2::from_shape_fn((ny, nx), |(y, x)| self.data[start + y * nx + x])
    }
}

impl core::ops::IndexMut<Index1> for Image {
    #[inline]
    fn index_mut(&mut self, i: Index1) -> &mut Self::Output { &mut self.data[i] }
}

impl core::ops::Index<Index1> for Image {
    type Output = Intensityf32;
    #[inline]
    fn index(&self, i: Index1) -> &Self::Output { &self.data[i] }
}

impl core::ops::IndexMut<Index3> for Image {
    fn index_mut(&mut self, i3: Index3) -> &mut Self::Output {
        let i1 = index3_to_1(i3, self.dims);
        &mut self.data[i1]
    }
}

impl core::ops::Index<Index3> for Image {
    type Output = Intensityf32;
    fn index(&self, i3: Index3) -> &Self::Output {
        let i1 = index3_to_1(i3, self.dims);
        &self.data[i1]
    }
}
