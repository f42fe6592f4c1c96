//! The set of views taking part in one deconvolution, and the worker pool
//! they share.

use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{Error, Result};
use crate::fft::Fft3d;
use crate::psf::{PsfTransforms, PsfType};
use crate::types::BoxDim;
use crate::view::DeconView;

pub struct DeconViews {
    views: Vec<DeconView>,
    dims: BoxDim,
    pool: Arc<ThreadPool>,
    fft: Arc<Fft3d>,
}

impl DeconViews {

    /// All views must have the same dimensions and block size. The PSF
    /// transforms of every view are computed here, once.
    pub fn new(mut views: Vec<DeconView>, pool: Arc<ThreadPool>) -> Result<Self> {
        let first = views.first().ok_or(Error::NoViews)?;
        let (dims, block_size) = (first.dims(), first.block_size());
        for view in &views[1..] {
            if view.dims() != dims {
                return Err(Error::DimensionMismatch {
                    what: format!("view {}", view.name()), expected: dims, got: view.dims()
                });
            }
            if view.block_size() != block_size {
                return Err(Error::DimensionMismatch {
                    what: format!("block size of view {}", view.name()), expected: block_size, got: view.block_size()
                });
            }
        }

        let fft = Arc::new(Fft3d::new(block_size));
        pool.install(|| precompute_psfs(&mut views, &fft))?;
        info!("{} views of {:?} voxels, {} threads", views.len(), dims, pool.current_num_threads());

        Ok(Self { views, dims, pool, fft })
    }

    pub fn views    (&self) -> &[DeconView]    { &self.views }
    pub fn dims     (&self) -> BoxDim          { self.dims }
    pub fn pool     (&self) -> &ThreadPool     { &self.pool }
    pub fn fft      (&self) -> &Fft3d          { &self.fft }
    pub fn n_threads(&self) -> usize           { self.pool.current_num_threads() }
    pub fn len      (&self) -> usize           { self.views.len() }
    pub fn is_empty (&self) -> bool            { self.views.is_empty() }
}

/// Independent PSFs are transformed in parallel. A Shared PSF reuses the
/// transforms of an earlier Shared PSF with identical values.
fn precompute_psfs(views: &mut [DeconView], fft: &Fft3d) -> Result<()> {
    views.par_iter_mut()
        .filter(|v| v.psf_type() == PsfType::Independent)
        .try_for_each(|v| v.psf_mut().precompute(fft))?;

    let mut shared: Vec<usize> = vec![];
    for i in 0..views.len() {
        if views[i].psf_type() != PsfType::Shared { continue }
        let existing: Option<Arc<PsfTransforms>> = shared.iter()
            .find(|&&j| views[j].psf().same_kernel(views[i].psf()))
            .and_then(|&j| views[j].psf().shared_transforms());
        match existing {
            Some(transforms) => views[i].psf_mut().reuse(transforms),
            None => {
                if !shared.is_empty() {
                    warn!("View {} declares a shared PSF that differs from the others; transforming it separately",
                          views[i].name());
                }
                views[i].psf_mut().precompute(fft)?;
                shared.push(i);
            }
        }
    }
    Ok(())
}

/// Worker pool with `threads` threads, or one per core
pub fn default_pool(threads: Option<usize>) -> Result<Arc<ThreadPool>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .thread_name(|n| format!("decon-{n}"))
        .build()?;
    Ok(Arc::new(pool))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DeconvolutionParameters;
    use crate::image::Image;

    fn kernel(centre: f32) -> Image {
        let mut psf = Image::filled([3, 3, 3], 0.1);
        psf[[1, 1, 1]] = centre;
        psf
    }

    fn view(dims: BoxDim, psf: Image, psf_type: PsfType, pool: &ThreadPool) -> DeconView {
        let parameters = DeconvolutionParameters { block_size: [12, 12, 12], ..Default::default() };
        DeconView::new(Image::ones(dims), Image::ones(dims), psf, psf_type, &parameters, pool).unwrap()
    }

    #[test]
    fn no_views_is_an_error() -> Result<()> {
        assert!(matches!(DeconViews::new(vec![], default_pool(Some(1))?), Err(Error::NoViews)));
        Ok(())
    }

    #[test]
    fn dimensions_must_agree() -> Result<()> {
        let pool = default_pool(Some(2))?;
        let views = vec![
            view([20, 20, 20], kernel(1.0), PsfType::Independent, &pool),
            view([20, 20, 21], kernel(1.0), PsfType::Independent, &pool),
        ];
        let result = DeconViews::new(views, pool);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
        Ok(())
    }

    #[test]
    fn transforms_are_precomputed_and_shared() -> Result<()> {
        let pool = default_pool(Some(3))?;
        let views = vec![
            view([20, 20, 20], kernel(1.0), PsfType::Shared     , &pool),
            view([20, 20, 20], kernel(1.0), PsfType::Shared     , &pool),
            view([20, 20, 20], kernel(1.0), PsfType::Independent, &pool),
            view([20, 20, 20], kernel(2.0), PsfType::Shared     , &pool),
        ];
        let views = DeconViews::new(views, pool)?;
        assert_eq!(views.n_threads(), 3);
        assert_eq!(views.dims(), [20, 20, 20]);
        let t = |i: usize| views.views()[i].psf().shared_transforms().unwrap();
        assert!(views.views().iter().all(|v| v.psf().transforms().is_some()));
        assert!( Arc::ptr_eq(&t(0), &t(1)));
        assert!(!Arc::ptr_eq(&t(0), &t(2)));
        assert!(!Arc::ptr_eq(&t(0), &t(3)));
        assert_eq!(t(3).block_size, [12, 12, 12]);
        Ok(())
    }
}
