//! 3d FFT and circular convolution over fixed-shape block buffers.
//!
//! Plans are created once per block shape and shared read-only between
//! threads; every thread brings its own `FftScratch`.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use crate::error::{try_alloc, Result};
use crate::image::Image;
use crate::types::{BoxDim, Complexf32};

pub struct Fft3d {
    dims: BoxDim,
    forward: [Arc<dyn Fft<f32>>; 3],
    inverse: [Arc<dyn Fft<f32>>; 3],
}

/// Per-thread working memory for `Fft3d`
pub struct FftScratch {
    lane: Vec<Complexf32>,
    work: Vec<Complexf32>,
}

impl Fft3d {

    pub fn new(dims: BoxDim) -> Self {
        let mut planner = FftPlanner::new();
        let forward = dims.map(|n| planner.plan_fft_forward(n));
        let inverse = dims.map(|n| planner.plan_fft_inverse(n));
        Self { dims, forward, inverse }
    }

    pub fn dims(&self) -> BoxDim { self.dims }

    pub fn len(&self) -> usize { self.dims.iter().product() }

    pub fn scratch(&self) -> Result<FftScratch> {
        let longest = self.dims.iter().copied().max().unwrap_or(0);
        let work_len = self.forward.iter().chain(self.inverse.iter())
            .map(|plan| plan.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);
        Ok(FftScratch {
            lane: try_alloc(longest , "FFT lane buffer")?,
            work: try_alloc(work_len, "FFT scratch buffer")?,
        })
    }

    /// Unnormalized forward transform, in place
    pub fn forward(&self, data: &mut [Complexf32], scratch: &mut FftScratch) {
        self.transform(&self.forward, data, scratch);
    }

    /// Inverse transform, in place, normalized so that `inverse(forward(x)) == x`
    pub fn inverse(&self, data: &mut [Complexf32], scratch: &mut FftScratch) {
        self.transform(&self.inverse, data, scratch);
        let norm = 1.0 / self.len() as f32;
        data.iter_mut().for_each(|c| *c *= norm);
    }

    /// Circular convolution of `data` with a kernel whose transform (for this
    /// shape) is `kernel`
    pub fn convolve(&self, data: &mut [Complexf32], kernel: &[Complexf32], scratch: &mut FftScratch) {
        self.forward(data, scratch);
        data.iter_mut().zip(kernel).for_each(|(d, k)| *d *= k);
        self.inverse(data, scratch);
    }

    /// Transform of `kernel` zero-padded to this shape, with the kernel's
    /// centre voxel moved to the origin so that convolution does not shift.
    pub fn kernel_transform(&self, kernel: &Image) -> Result<Vec<Complexf32>> {
        let [nx, ny, nz] = self.dims;
        let [kx, ky, kz] = kernel.dims;
        let [cx, cy, cz] = [kx / 2, ky / 2, kz / 2];
        let mut padded: Vec<Complexf32> = try_alloc(self.len(), "PSF transform")?;
        let wrap = |i: usize, c: usize, n: usize| (i + n - c % n) % n;
        for z in 0..kz {
            for y in 0..ky {
                for x in 0..kx {
                    let value = kernel[[x, y, z]];
                    let (px, py, pz) = (wrap(x, cx, nx), wrap(y, cy, ny), wrap(z, cz, nz));
                    padded[px + (py + pz * ny) * nx].re += value;
                }
            }
        }
        let mut scratch = self.scratch()?;
        self.forward(&mut padded, &mut scratch);
        Ok(padded)
    }

    fn transform(&self, plans: &[Arc<dyn Fft<f32>>; 3], data: &mut [Complexf32], scratch: &mut FftScratch) {
        let [nx, ny, nz] = self.dims;
        debug_assert_eq!(data.len(), nx * ny * nz);
        let FftScratch { lane, work } = scratch;

        // x is contiguous: rustfft processes every consecutive run of nx at once
        plans[0].process_with_scratch(data, work);

        // y and z lanes are strided: gather, transform, scatter
        let lane_y = &mut lane[..ny];
        for z in 0..nz {
            for x in 0..nx {
                let start = z * nx * ny + x;
                for (y, c) in lane_y.iter_mut().enumerate() { *c = data[start + y * nx]; }
                plans[1].process_with_scratch(lane_y, work);
                for (y, c) in lane_y.iter().enumerate() { data[start + y * nx] = *c; }
            }
        }

        let lane_z = &mut lane[..nz];
        let plane = nx * ny;
        for start in 0..plane {
            for (z, c) in lane_z.iter_mut().enumerate() { *c = data[start + z * plane]; }
            plans[2].process_with_scratch(lane_z, work);
            for (z, c) in lane_z.iter().enumerate() { data[start + z * plane] = *c; }
        }
    }
}

/// Copy real values into the real part of a complex buffer
pub fn load_real(src: &[f32], dst: &mut [Complexf32]) {
    dst.iter_mut().zip(src).for_each(|(c, &r)| *c = Complexf32::new(r, 0.0));
}
