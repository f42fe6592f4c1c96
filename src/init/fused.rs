//! PSI initialized with a blurred weighted-average fusion of the views.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::gauss::blur_in_place;
use crate::image::Image;
use crate::init::{checked_average, Accumulator, PsiInitialization};
use crate::views::DeconViews;

const CHUNK: usize = 1 << 14;

pub struct BlurredFused {
    sigma: f32,
    nan_fallback: bool,
    avg: f32,
    max: Vec<f32>,
}

impl BlurredFused {
    pub fn new(sigma: f32, nan_fallback: bool) -> Self {
        Self { sigma, nan_fallback, avg: f32::NAN, max: vec![] }
    }
}

impl PsiInitialization for BlurredFused {

    /// Every voxel becomes the weight-averaged intensity of the views holding
    /// data there. Voxels without any data get the overall average. The
    /// result is then blurred with a Gaussian of `sigma` voxels.
    fn run_initialization(&mut self, psi: &mut Image, views: &DeconViews) -> Result<()> {
        if psi.dims != views.dims() {
            return Err(Error::DimensionMismatch { what: "PSI".into(), expected: views.dims(), got: psi.dims });
        }
        let n_views = views.len();

        // ----- Weighted fusion; 0 marks voxels without data ----------------------
        let stats = views.pool().install(|| {
            psi.data.par_chunks_mut(CHUNK)
                .enumerate()
                .map(|(c, chunk)| {
                    let mut acc = Accumulator::new(n_views);
                    for (k, out) in chunk.iter_mut().enumerate() {
                        let i = c * CHUNK + k;
                        let (mut sum, mut sum_w) = (0.0_f64, 0.0_f64);
                        for (v, view) in views.views().iter().enumerate() {
                            let (value, weight) = (view.image()[i], view.weight()[i]);
                            if value > 0.0 && weight > 0.0 {
                                sum   += (value * weight) as f64;
                                sum_w += weight as f64;
                                acc.max[v] = acc.max[v].max(value);
                            }
                        }
                        *out = if sum_w > 0.0 { (sum / sum_w) as f32 } else { 0.0 };
                        if sum_w > 0.0 {
                            acc.sum += *out as f64;
                            acc.count += 1;
                        }
                    }
                    acc
                })
                .reduce(|| Accumulator::new(n_views), Accumulator::merge)
        });
        if stats.count == 0 { return Err(Error::NoOverlap) }
        self.avg = checked_average(stats.mean(), self.nan_fallback)?;
        self.max = stats.maxima();

        // ----- Fill the gaps and smooth ------------------------------------------
        let (avg, sigma) = (self.avg, self.sigma);
        views.pool().install(|| {
            psi.data.par_iter_mut().for_each(|v| if *v == 0.0 { *v = avg });
            blur_in_place(psi, [sigma; 3]);
        });
        Ok(())
    }

    fn avg(&self) -> f32 { self.avg }
    fn max(&self) -> &[f32] { &self.max }
}
