//! PSI initialized from an existing raster, in memory or on disk.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::image::Image;
use crate::init::average::{Average, Sampling};
use crate::init::PsiInitialization;
use crate::views::DeconViews;

pub struct FromRaster {
    raster: Image,
    statistics: Average,
}

impl FromRaster {
    /// The statistics are computed over all voxels if `precise`, otherwise
    /// estimated from the default number of samples.
    pub fn new(raster: Image, precise: bool, nan_fallback: bool) -> Self {
        let sampling = if precise { Sampling::Precise }
                       else       { Sampling::Approximate { samples: crate::config::default_samples() } };
        Self { raster, statistics: Average::new(sampling, false, nan_fallback) }
    }
}

impl PsiInitialization for FromRaster {
    fn run_initialization(&mut self, psi: &mut Image, views: &DeconViews) -> Result<()> {
        if self.raster.dims != psi.dims {
            return Err(Error::DimensionMismatch { what: "initial PSI raster".into(), expected: psi.dims, got: self.raster.dims });
        }
        psi.data.copy_from_slice(&self.raster.data);
        self.statistics.run_initialization(psi, views)
    }

    fn avg(&self) -> f32 { self.statistics.avg() }
    fn max(&self) -> &[f32] { self.statistics.max() }
}

/// Raw little-endian `f32` raster with the dimensions of the output volume
pub struct FromFile {
    path: PathBuf,
    precise: bool,
    nan_fallback: bool,
    loaded: Option<FromRaster>,
}

impl FromFile {
    pub fn new(path: PathBuf, precise: bool, nan_fallback: bool) -> Self {
        Self { path, precise, nan_fallback, loaded: None }
    }
}

impl PsiInitialization for FromFile {
    fn run_initialization(&mut self, psi: &mut Image, views: &DeconViews) -> Result<()> {
        let raster = Image::from_raw_file(&self.path, psi.dims)?;
        let from_raster = self.loaded.insert(FromRaster::new(raster, self.precise, self.nan_fallback));
        from_raster.run_initialization(psi, views)
    }

    fn avg(&self) -> f32 { self.loaded.as_ref().map_or(f32::NAN, |r| r.avg()) }
    fn max(&self) -> &[f32] {
        match &self.loaded {
            Some(r) => r.max(),
            None    => &[],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DeconvolutionParameters;
    use crate::psf::PsfType;
    use crate::view::DeconView;
    use crate::views::default_pool;
    use float_eq::assert_float_eq;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn one_view(dims: [usize; 3], value: f32) -> DeconViews {
        let pool = default_pool(Some(2)).unwrap();
        let parameters = DeconvolutionParameters { block_size: [8, 8, 8], ..Default::default() };
        let view = DeconView::new(Image::filled(dims, value), Image::ones(dims), Image::ones([1, 1, 1]),
                                  PsfType::Independent, &parameters, &pool).unwrap();
        DeconViews::new(vec![view], pool).unwrap()
    }

    fn ramp(dims: [usize; 3]) -> Image {
        let mut image = Image::zeros(dims);
        image.data.iter_mut().enumerate().for_each(|(i, v)| *v = i as f32);
        image
    }

    #[test]
    fn raster_is_copied_and_statistics_come_from_views() -> Result<()> {
        let dims = [5, 6, 7];
        let views = one_view(dims, 2.0);
        let mut init = FromRaster::new(ramp(dims), true, false);
        let mut psi = Image::zeros(dims);
        init.run_initialization(&mut psi, &views)?;
        assert_eq!(psi, ramp(dims));
        assert_float_eq!(init.avg(), 2.0, ulps <= 1);
        assert_eq!(init.max(), &[2.0]);
        Ok(())
    }

    #[test]
    fn mismatched_raster_is_rejected() {
        let views = one_view([5, 6, 7], 2.0);
        let mut init = FromRaster::new(ramp([5, 6, 8]), true, false);
        let result = init.run_initialization(&mut Image::zeros([5, 6, 7]), &views);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn raster_from_file() -> Result<()> {
        let dims = [4, 4, 4];
        let dir = tempdir().unwrap();
        let path = dir.path().join("psi.raw");
        ramp(dims).write_to_raw_file(&path)?;

        let views = one_view(dims, 3.0);
        let mut init = FromFile::new(path, false, false);
        let mut psi = Image::zeros(dims);
        init.run_initialization(&mut psi, &views)?;
        assert_eq!(psi, ramp(dims));
        assert_float_eq!(init.avg(), 3.0, ulps <= 1);
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let views = one_view([4, 4, 4], 3.0);
        let mut init = FromFile::new("/nonexistent/psi.raw".into(), false, false);
        assert!(init.run_initialization(&mut Image::zeros([4, 4, 4]), &views).is_err());
        assert!(init.max().is_empty());
    }
}
