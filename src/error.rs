//! Failures of the deconvolution engine.
//!
//! Everything here is local and synchronous: nothing is retried, the run is
//! abandoned and the caller decides whether to reconfigure and resubmit.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::BoxDim;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {

    #[error("dimension mismatch in {what}: expected {expected:?}, got {got:?}")]
    DimensionMismatch { what: String, expected: BoxDim, got: BoxDim },

    #[error("raster length {got} does not match dimensions {dims:?}")]
    DataLength { dims: BoxDim, got: usize },

    #[error("image and weight of view `{view}` have different bounds")]
    ImageWeightMismatch { view: String },

    #[error("view `{view}` yields no blocks for block size {block_size:?} and kernel {kernel:?}")]
    NoBlocks { view: String, block_size: BoxDim, kernel: BoxDim },

    #[error("block structure of view {view} differs from the first view it is combined with: {reason}")]
    BlockIntegrity { view: usize, reason: String },

    #[error("invalid PSF: {0}")]
    Psf(String),

    #[error("no view contributes any non-zero pixel to the output volume")]
    NoOverlap,

    #[error("average intensity is NaN")]
    NanAverage,

    #[error("PSI initialization failed: {0}")]
    InitializationFailed(String),

    #[error("out of memory allocating {bytes} bytes for {what}; increase available memory or reduce the block size")]
    OutOfMemory { what: &'static str, bytes: usize },

    #[error("no views supplied")]
    NoViews,

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error on `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Allocate a zero-filled buffer, reporting allocation failure as
/// `Error::OutOfMemory` instead of aborting the process.
pub fn try_alloc<T: Clone + Default>(n: usize, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n)
        .map_err(|_| Error::OutOfMemory { what, bytes: n.saturating_mul(std::mem::size_of::<T>()) })?;
    v.resize(n, T::default());
    Ok(v)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocation_succeeds_for_sane_sizes() -> Result<()> {
        let v: Vec<f32> = try_alloc(1000, "test buffer")?;
        assert_eq!(v.len(), 1000);
        assert!(v.iter().all(|&x| x == 0.0));
        Ok(())
    }

    #[test]
    fn absurd_allocation_is_reported() {
        let r: Result<Vec<f64>> = try_alloc(usize::MAX / 4, "absurd buffer");
        assert!(matches!(r, Err(Error::OutOfMemory { what: "absurd buffer", .. })));
    }
}
