//! Initial estimate of PSI.
//!
//! Every strategy fills PSI and reports the average intensity of the region
//! covered by the views, along with the peak intensity of each view (used to
//! normalize Tikhonov regularization), in view order.

pub mod average;
pub mod fused;
pub mod raster;

use log::warn;

use crate::config::PsiInit;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::views::DeconViews;

pub use average::{Average, Sampling};
pub use fused::BlurredFused;
pub use raster::{FromFile, FromRaster};

pub trait PsiInitialization {
    fn run_initialization(&mut self, psi: &mut Image, views: &DeconViews) -> Result<()>;

    /// Mean intensity over voxels covered by at least one view
    fn avg(&self) -> f32;

    /// Peak intensity of each view
    fn max(&self) -> &[f32];
}

/// The strategy selected by `choice`
pub fn initializer(choice: &PsiInit, nan_fallback: bool) -> Box<dyn PsiInitialization> {
    match *choice {
        PsiInit::BlurredFused  { sigma }         => Box::new(BlurredFused::new(sigma, nan_fallback)),
        PsiInit::AveragePrecise                  => Box::new(Average::new(Sampling::Precise, true, nan_fallback)),
        PsiInit::AverageApprox { samples }       => Box::new(Average::new(Sampling::Approximate { samples }, true, nan_fallback)),
        PsiInit::FromFile      { ref path, precise } => Box::new(FromFile::new(path.clone(), precise, nan_fallback)),
    }
}

/// Reject a NaN average, unless `fallback` allows replacing it by 1.0
pub(crate) fn checked_average(avg: f64, fallback: bool) -> Result<f32> {
    if !avg.is_nan() { return Ok(avg as f32) }
    if fallback {
        warn!("Average intensity is NaN, using 1.0 instead");
        Ok(1.0)
    } else {
        Err(Error::NanAverage)
    }
}

/// Running sum, voxel count and per-view maxima, merged across threads
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Accumulator {
    pub sum: f64,
    pub count: usize,
    pub max: Vec<f32>,
}

impl Accumulator {
    pub fn new(n_views: usize) -> Self {
        Self { sum: 0.0, count: 0, max: vec![f32::NEG_INFINITY; n_views] }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.sum += other.sum;
        self.count += other.count;
        self.max.iter_mut().zip(other.max).for_each(|(a, b)| *a = a.max(b));
        self
    }

    /// `sum / count`: NaN when nothing was counted
    pub fn mean(&self) -> f64 { self.sum / self.count as f64 }

    /// Maxima, with views that saw no data reported as 0
    pub fn maxima(self) -> Vec<f32> {
        self.max.into_iter().map(|m| if m.is_finite() { m } else { 0.0 }).collect()
    }
}
