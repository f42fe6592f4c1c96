//! Point-spread functions and their frequency-domain transforms.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::fft::Fft3d;
use crate::image::Image;
use crate::types::{BoxDim, Complexf32};

/// How the PSF of a view was obtained
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsfType {
    /// Estimated for this view alone
    #[default]
    Independent,
    /// One PSF common to several views: its transforms are computed once and
    /// reused by every view carrying the same kernel
    Shared,
}

/// Kernels transformed at one block shape
pub struct PsfTransforms {
    pub block_size: BoxDim,
    pub kernel1: Vec<Complexf32>,
    pub kernel2: Vec<Complexf32>,
}

pub struct Psf {
    kernel1: Image,
    kernel2: Image,
    transforms: Option<Arc<PsfTransforms>>,
}

impl Psf {

    /// `kernel1` is `psf` scaled to unit sum; `kernel2` is its point
    /// reflection.
    pub fn new(psf: Image) -> Result<Self> {
        let sum: f64 = psf.data.iter().map(|&v| v as f64).sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(Error::Psf(format!("kernel sum must be positive and finite, got {sum}")));
        }
        let mut kernel1 = psf.zero_min();
        kernel1.data.iter_mut().for_each(|v| *v = (*v as f64 / sum) as f32);
        let kernel2 = point_reflection(&kernel1);
        Ok(Self { kernel1, kernel2, transforms: None })
    }

    pub fn dims   (&self) -> BoxDim { self.kernel1.dims }
    pub fn kernel1(&self) -> &Image  { &self.kernel1 }
    pub fn kernel2(&self) -> &Image  { &self.kernel2 }

    pub fn transforms(&self) -> Option<&PsfTransforms> { self.transforms.as_deref() }

    pub fn shared_transforms(&self) -> Option<Arc<PsfTransforms>> { self.transforms.clone() }

    /// Transform both kernels for blocks of the shape handled by `fft`
    pub fn precompute(&mut self, fft: &Fft3d) -> Result<()> {
        let transforms = PsfTransforms {
            block_size: fft.dims(),
            kernel1: fft.kernel_transform(&self.kernel1)?,
            kernel2: fft.kernel_transform(&self.kernel2)?,
        };
        self.transforms = Some(Arc::new(transforms));
        Ok(())
    }

    /// Adopt transforms already computed for an identical kernel
    pub fn reuse(&mut self, transforms: Arc<PsfTransforms>) {
        self.transforms = Some(transforms);
    }

    pub fn same_kernel(&self, other: &Psf) -> bool { self.kernel1 == other.kernel1 }
}

/// `out[i] = kernel[n - 1 - i]` in every dimension
fn point_reflection(kernel: &Image) -> Image {
    let mut data = kernel.data.clone();
    data.reverse();
    Image { data, ..kernel.clone() }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_eq::assert_float_eq;

    fn asymmetric() -> Image {
        let mut psf = Image::zeros([3, 3, 3]);
        psf[[1, 1, 1]] = 4.0;
        psf[[2, 1, 1]] = 2.0;
        psf[[1, 0, 2]] = 2.0;
        psf
    }

    #[test]
    fn kernel1_is_normalized() -> Result<()> {
        let psf = Psf::new(asymmetric())?;
        assert_float_eq!(psf.kernel1().data.iter().sum::<f32>(), 1.0, abs <= 1e-6);
        assert_float_eq!(psf.kernel1()[[1, 1, 1]], 0.5, abs <= 1e-7);
        Ok(())
    }

    #[test]
    fn kernel2_is_point_reflection() -> Result<()> {
        let psf = Psf::new(asymmetric())?;
        let (k1, k2) = (psf.kernel1(), psf.kernel2());
        for z in 0..3 { for y in 0..3 { for x in 0..3 {
            assert_eq!(k2[[x, y, z]], k1[[2 - x, 2 - y, 2 - z]]);
        }}}
        Ok(())
    }

    #[test]
    fn degenerate_kernels_are_rejected() {
        assert!(matches!(Psf::new(Image::zeros([3, 3, 3])), Err(Error::Psf(_))));
        let mut negative = Image::zeros([1, 1, 1]);
        negative[0] = -1.0;
        assert!(matches!(Psf::new(negative), Err(Error::Psf(_))));
    }

    #[test]
    fn mirrored_transform_is_conjugate() -> Result<()> {
        let mut psf = Psf::new(asymmetric())?;
        psf.precompute(&Fft3d::new([8, 6, 5]))?;
        let t = psf.transforms().unwrap();
        assert_eq!(t.block_size, [8, 6, 5]);
        for (a, b) in t.kernel1.iter().zip(&t.kernel2) {
            assert_float_eq!(a.re,  b.re, abs <= 1e-5);
            assert_float_eq!(a.im, -b.im, abs <= 1e-5);
        }
        Ok(())
    }
}
