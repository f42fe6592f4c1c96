//! Separable Gaussian smoothing of 3d rasters.

use rayon::prelude::*;

use crate::image::Image;
use geometry::{index1_to_3, index3_to_1, mirror};

/// Unnormalized Gaussian profile, zero beyond `cutoff` sigmas (if given)
fn make_gauss(sigma: f32, cutoff: Option<f32>) -> impl Fn(f32) -> f32 {
    let cutoff = cutoff.map_or(f32::INFINITY, |width| width * sigma);
    move |dx: f32| {
        if dx.abs() < cutoff {
            let y = dx / sigma;
            (-0.5 * y * y).exp()
        } else {
            0.0
        }
    }
}

/// Normalized sampled Gaussian of radius `ceil(3 sigma)`
pub fn kernel_1d(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as isize;
    let gauss = make_gauss(sigma, None);
    let mut kernel: Vec<f32> = (-radius..=radius).map(|i| gauss(i as f32)).collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Blur `image` in place with per-axis standard deviations `sigma` (in
/// voxels), reflecting at the borders. Axes with `sigma <= 0` are left alone.
pub fn blur_in_place(image: &mut Image, sigma: [f32; 3]) {
    for (axis, &s) in sigma.iter().enumerate() {
        if s > 0.0 { blur_axis(image, axis, &kernel_1d(s)) }
    }
}

fn blur_axis(image: &mut Image, axis: usize, kernel: &[f32]) {
    let dims = image.dims;
    let radius = (kernel.len() / 2) as isize;
    let n = dims[axis];
    let src = std::mem::take(&mut image.data);
    image.data = (0..src.len())
        .into_par_iter()
        .map(|i| {
            let mut p = index1_to_3(i, dims);
            let centre = p[axis] as isize;
            kernel.iter().enumerate()
                .map(|(j, k)| {
                    p[axis] = mirror(centre + j as isize - radius, n);
                    k * src[index3_to_1(p, dims)]
                })
                .sum()
        })
        .collect();
}
