//! PSI set to the mean intensity of the views.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::Result;
use crate::image::Image;
use crate::init::{checked_average, Accumulator, PsiInitialization};
use crate::types::Index3;
use crate::views::DeconViews;

/// Voxels per parallel task of the precise scan
const CHUNK: usize = 1 << 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sampling {
    /// Every voxel of every view
    Precise,
    /// `samples` voxels per view, drawn from the three axis-aligned planes
    /// through the centre of the volume
    Approximate { samples: usize },
}

pub struct Average {
    sampling: Sampling,
    set_psi: bool,
    nan_fallback: bool,
    avg: f32,
    max: Vec<f32>,
}

impl Average {
    /// With `set_psi` false only the statistics are computed, PSI is left as
    /// it is.
    pub fn new(sampling: Sampling, set_psi: bool, nan_fallback: bool) -> Self {
        Self { sampling, set_psi, nan_fallback, avg: f32::NAN, max: vec![] }
    }
}

impl PsiInitialization for Average {
    fn run_initialization(&mut self, psi: &mut Image, views: &DeconViews) -> Result<()> {
        let stats = views.pool().install(|| statistics(self.sampling, views));
        self.avg = checked_average(stats.mean(), self.nan_fallback)?;
        self.max = stats.maxima();
        if self.set_psi {
            let avg = self.avg;
            views.pool().install(|| psi.data.par_iter_mut().for_each(|v| *v = avg));
        }
        Ok(())
    }

    fn avg(&self) -> f32 { self.avg }
    fn max(&self) -> &[f32] { &self.max }
}

/// Sum, count and per-view maxima over voxels holding data (positive
/// intensity and weight)
pub(crate) fn statistics(sampling: Sampling, views: &DeconViews) -> Accumulator {
    let n_views = views.len();
    views.views()
        .par_iter()
        .enumerate()
        .map(|(i, view)| {
            let (image, weight) = (view.image(), view.weight());
            match sampling {
                Sampling::Precise => precise(i, n_views, image, weight),
                Sampling::Approximate { samples } => approximate(i, n_views, image, weight, samples),
            }
        })
        .reduce(|| Accumulator::new(n_views), Accumulator::merge)
}

fn precise(i: usize, n_views: usize, image: &Image, weight: &Image) -> Accumulator {
    image.data.par_chunks(CHUNK)
        .zip(weight.data.par_chunks(CHUNK))
        .fold(|| Accumulator::new(n_views), |mut acc, (values, weights)| {
            for (&v, &w) in values.iter().zip(weights) {
                acc.add(i, v, w);
            }
            acc
        })
        .reduce(|| Accumulator::new(n_views), Accumulator::merge)
}

fn approximate(i: usize, n_views: usize, image: &Image, weight: &Image, samples: usize) -> Accumulator {
    let mut rng = StdRng::seed_from_u64(i as u64);
    let [nx, ny, nz] = image.dims;
    let centre = [nx / 2, ny / 2, nz / 2];
    let mut acc = Accumulator::new(n_views);
    for _ in 0..samples {
        // Pick one of the central planes, then a voxel within it
        let fixed = rng.gen_range(0..3);
        let p: Index3 = [0, 1, 2].map(|d| {
            if d == fixed { centre[d] }
            else          { rng.gen_range(0..image.dims[d]) }
        });
        acc.add(i, image[p], weight[p]);
    }
    acc
}

impl Accumulator {
    fn add(&mut self, view: usize, value: f32, weight: f32) {
        if value > 0.0 && weight > 0.0 {
            self.sum += value as f64;
            self.count += 1;
            self.max[view] = self.max[view].max(value);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DeconvolutionParameters;
    use crate::error::Error;
    use crate::psf::PsfType;
    use crate::view::DeconView;
    use crate::views::default_pool;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn views(images: Vec<Image>, weights: Vec<Image>) -> DeconViews {
        let pool = default_pool(Some(2)).unwrap();
        let parameters = DeconvolutionParameters { block_size: [8, 8, 8], filter_blocks: false, ..Default::default() };
        let views = images.into_iter().zip(weights)
            .map(|(image, weight)| DeconView::new(image, weight, Image::ones([1, 1, 1]), PsfType::Independent, &parameters, &pool).unwrap())
            .collect();
        DeconViews::new(views, pool).unwrap()
    }

    fn ramp(dims: [usize; 3]) -> Image {
        let mut image = Image::zeros(dims);
        image.data.iter_mut().enumerate().for_each(|(i, v)| *v = (i % 7) as f32);
        image
    }

    #[test]
    fn precise_average_ignores_background() -> Result<()> {
        let dims = [10, 10, 10];
        let mut second = Image::filled(dims, 4.0);
        second[0] = 9.0;
        let v = views(vec![ramp(dims), second], vec![Image::ones(dims), Image::ones(dims)]);
        let mut init = Average::new(Sampling::Precise, true, false);
        let mut psi = Image::zeros(dims);
        init.run_initialization(&mut psi, &v)?;
        // Ramp: values 1..=6 where non-zero
        let ramp_values: Vec<f64> = ramp(dims).data.iter().filter(|&&x| x > 0.0).map(|&x| x as f64).collect();
        let expected = (ramp_values.iter().sum::<f64>() + 999.0 * 4.0 + 9.0) / (ramp_values.len() + 1000) as f64;
        assert_float_eq!(init.avg(), expected as f32, rmax <= 1e-6);
        assert_eq!(init.max(), &[6.0, 9.0]);
        assert!(psi.data.iter().all(|&x| x == init.avg()));
        Ok(())
    }

    #[test]
    fn zero_weight_is_not_data() -> Result<()> {
        let dims = [6, 6, 6];
        let mut weight = Image::ones(dims);
        weight[5] = 0.0;
        let mut image = Image::ones(dims);
        image[5] = 1000.0;
        let v = views(vec![image], vec![weight]);
        let mut init = Average::new(Sampling::Precise, false, false);
        let mut psi = Image::filled(dims, 3.0);
        init.run_initialization(&mut psi, &v)?;
        assert_float_eq!(init.avg(), 1.0, ulps <= 1);
        assert_eq!(init.max(), &[1.0]);
        // Statistics only: PSI untouched
        assert!(psi.data.iter().all(|&x| x == 3.0));
        Ok(())
    }

    #[rstest(sampling, case(Sampling::Precise), case(Sampling::Approximate { samples: 500 }))]
    fn no_data_gives_nan(sampling: Sampling) {
        let dims = [6, 6, 6];
        let v = views(vec![Image::zeros(dims)], vec![Image::ones(dims)]);
        let mut psi = Image::zeros(dims);
        let mut strict = Average::new(sampling, true, false);
        assert!(matches!(strict.run_initialization(&mut psi, &v), Err(Error::NanAverage)));
        let mut lenient = Average::new(sampling, true, true);
        lenient.run_initialization(&mut psi, &v).unwrap();
        assert_eq!(lenient.avg(), 1.0);
        assert_eq!(lenient.max(), &[0.0]);
    }

    #[test]
    fn approximate_average_of_uniform_views_is_exact() -> Result<()> {
        let dims = [20, 15, 9];
        let v = views(vec![Image::filled(dims, 2.0), Image::filled(dims, 4.0)],
                      vec![Image::ones(dims), Image::ones(dims)]);
        let mut init = Average::new(Sampling::Approximate { samples: 1000 }, true, false);
        let mut psi = Image::zeros(dims);
        init.run_initialization(&mut psi, &v)?;
        assert_float_eq!(init.avg(), 3.0, abs <= 1e-5);
        assert_eq!(init.max(), &[2.0, 4.0]);
        Ok(())
    }

    #[test]
    fn approximate_average_is_reproducible() -> Result<()> {
        let dims = [16, 16, 16];
        let run = || -> Result<f32> {
            let v = views(vec![ramp(dims)], vec![Image::ones(dims)]);
            let mut init = Average::new(Sampling::Approximate { samples: 300 }, false, false);
            init.run_initialization(&mut Image::zeros(dims), &v)?;
            Ok(init.avg())
        };
        assert_eq!(run()?, run()?);
        Ok(())
    }
}
