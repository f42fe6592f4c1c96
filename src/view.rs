//! One input view: image, weight, PSF and the block plan derived from them.

use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::block::{count_blocks, divide_into_blocks, split_into_batches, Batch};
use crate::config::{DeconvolutionParameters, Variant};
use crate::error::{Error, Result};
use crate::filter::remove_empty_blocks;
use crate::image::Image;
use crate::psf::{Psf, PsfType};
use crate::types::BoxDim;
use crate::utils::group_digits;

/// Content filtering splits its scan into this many tasks per worker thread
const FILTER_TASKS_PER_THREAD: usize = 4;

pub struct DeconView {
    title: Option<String>,
    image: Image,
    weight: Image,
    psf: Psf,
    psf_type: PsfType,
    block_size: BoxDim,
    batches: Vec<Batch>,
}

impl DeconView {

    /// Build the view and its block plan.
    ///
    /// `image` and `weight` must cover the same bounds; both are moved to
    /// zero-min coordinates. Input pixels equal to
    /// `parameters.outside_value_img` become no-data (0), positive ones are
    /// floored to `parameters.min_value_img`.
    ///
    /// Blocks without any weight are dropped when content filtering is on;
    /// it is never applied to simultaneous runs, which need every view to
    /// keep the same blocks.
    pub fn new(
        image     : Image,
        weight    : Image,
        psf       : Image,
        psf_type  : PsfType,
        parameters: &DeconvolutionParameters,
        pool      : &ThreadPool,
    ) -> Result<Self> {
        Self::with_title(None, image, weight, psf, psf_type, parameters, pool)
    }

    pub fn with_title(
        title     : Option<String>,
        image     : Image,
        weight    : Image,
        psf       : Image,
        psf_type  : PsfType,
        parameters: &DeconvolutionParameters,
        pool      : &ThreadPool,
    ) -> Result<Self> {
        let name = title.clone().unwrap_or_else(|| "unnamed".into());
        if image.dims != weight.dims || image.min != weight.min {
            return Err(Error::ImageWeightMismatch { view: name });
        }
        let mut image = image.zero_min();
        let weight = weight.zero_min();
        let psf = Psf::new(psf)?;

        let &DeconvolutionParameters { outside_value_img, min_value_img, .. } = parameters;
        pool.install(|| {
            image.data.par_iter_mut().for_each(|v| {
                if *v == outside_value_img || *v <= 0.0 || v.is_nan() { *v = 0.0 }
                else if *v < min_value_img                            { *v = min_value_img }
            })
        });

        let block_size = parameters.block_size;
        let no_blocks = || Error::NoBlocks { view: name.clone(), block_size, kernel: psf.dims() };
        let blocks = divide_into_blocks(image.dims, block_size, psf.dims()).ok_or_else(no_blocks)?;
        let mut batches = split_into_batches(&blocks, parameters.min_parallel_blocks);
        info!("View {name}: {} blocks in {} batches", group_digits(blocks.len()), batches.len());
        for (n, batch) in batches.iter().enumerate() {
            debug!("View {name}: batch {n} holds {} blocks", batch.len());
        }

        if parameters.filter_blocks && parameters.variant == Variant::Sequential {
            let n_tasks = FILTER_TASKS_PER_THREAD * pool.current_num_threads();
            let summary = pool.install(|| remove_empty_blocks(&mut batches, &weight, n_tasks));
            info!("View {name}: removed {} blocks and {} batches without content",
                  group_digits(summary.removed_blocks), summary.removed_batches);
            if batches.is_empty() { return Err(no_blocks()) }
        }

        Ok(Self { title, image, weight, psf, psf_type, block_size, batches })
    }

    pub fn title     (&self) -> Option<&str> { self.title.as_deref() }
    pub fn name      (&self) -> &str         { self.title().unwrap_or("unnamed") }
    pub fn image     (&self) -> &Image       { &self.image }
    pub fn weight    (&self) -> &Image       { &self.weight }
    pub fn psf       (&self) -> &Psf         { &self.psf }
    pub fn psf_type  (&self) -> PsfType      { self.psf_type }
    pub fn block_size(&self) -> BoxDim       { self.block_size }
    pub fn dims      (&self) -> BoxDim       { self.image.dims }
    pub fn batches   (&self) -> &[Batch]     { &self.batches }
    pub fn n_blocks  (&self) -> usize        { count_blocks(&self.batches) }

    pub(crate) fn psf_mut(&mut self) -> &mut Psf { &mut self.psf }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pool() -> ThreadPool { rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap() }

    fn delta() -> Image {
        let mut psf = Image::zeros([3, 3, 3]);
        psf[[1, 1, 1]] = 1.0;
        psf
    }

    fn parameters() -> DeconvolutionParameters {
        DeconvolutionParameters { block_size: [10, 10, 10], ..Default::default() }
    }

    #[test]
    fn mismatched_weight_is_rejected() {
        let result = DeconView::new(Image::ones([20, 20, 20]), Image::ones([20, 20, 19]),
                                    delta(), PsfType::Independent, &parameters(), &pool());
        assert!(matches!(result, Err(Error::ImageWeightMismatch { .. })));
    }

    #[test]
    fn shifted_weight_is_rejected() {
        let weight = Image::with_min([20, 20, 20], [1, 0, 0], vec![1.0; 8000]).unwrap();
        let result = DeconView::new(Image::ones([20, 20, 20]), weight,
                                    delta(), PsfType::Independent, &parameters(), &pool());
        assert!(matches!(result, Err(Error::ImageWeightMismatch { .. })));
    }

    #[test]
    fn rasters_are_moved_to_zero_min() -> Result<()> {
        let data = vec![1.0; 8000];
        let image  = Image::with_min([20, 20, 20], [5, -3, 7], data.clone())?;
        let weight = Image::with_min([20, 20, 20], [5, -3, 7], data)?;
        let view = DeconView::new(image, weight, delta(), PsfType::Independent, &parameters(), &pool())?;
        assert_eq!(view.image().min, [0, 0, 0]);
        assert_eq!(view.weight().min, [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn kernel_too_large_for_block() {
        let result = DeconView::new(Image::ones([20, 20, 20]), Image::ones([20, 20, 20]),
                                    Image::ones([7, 7, 7]), PsfType::Independent, &parameters(), &pool());
        assert!(matches!(result, Err(Error::NoBlocks { .. })));
    }

    #[test]
    fn sentinels_are_applied() -> Result<()> {
        let mut image = Image::filled([20, 20, 20], 5.0);
        image[0] = -1.0;
        image[1] = 0.01;
        image[2] = 7.0;
        let parameters = DeconvolutionParameters {
            outside_value_img: 7.0, min_value_img: 0.5, ..parameters()
        };
        let view = DeconView::new(image, Image::ones([20, 20, 20]), delta(), PsfType::Independent, &parameters, &pool())?;
        assert_eq!(&view.image().data[..4], &[0.0, 0.5, 0.0, 5.0]);
        Ok(())
    }

    #[test]
    fn empty_blocks_are_filtered() -> Result<()> {
        let dims = [40, 8, 8];
        let mut weight = Image::zeros(dims);
        for z in 0..8 { for y in 0..8 { weight[[0, y, z]] = 1.0 } }
        let filtered = DeconView::new(Image::ones(dims), weight.clone(), delta(), PsfType::Independent, &parameters(), &pool())?;
        let unfiltered_parameters = DeconvolutionParameters { filter_blocks: false, ..parameters() };
        let unfiltered = DeconView::new(Image::ones(dims), weight.clone(), delta(), PsfType::Independent, &unfiltered_parameters, &pool())?;
        assert!(filtered.n_blocks() < unfiltered.n_blocks());
        // Simultaneous runs never filter
        let mul_parameters = DeconvolutionParameters { variant: Variant::Simultaneous, ..parameters() };
        let mul = DeconView::new(Image::ones(dims), weight, delta(), PsfType::Independent, &mul_parameters, &pool())?;
        assert_eq!(mul.n_blocks(), unfiltered.n_blocks());
        Ok(())
    }

    #[test]
    fn view_without_weight_has_no_blocks() {
        let result = DeconView::new(Image::ones([20, 20, 20]), Image::zeros([20, 20, 20]),
                                    delta(), PsfType::Independent, &parameters(), &pool());
        assert!(matches!(result, Err(Error::NoBlocks { .. })));
    }

    #[test]
    fn title_is_kept() -> Result<()> {
        let view = DeconView::with_title(Some("angle 0".into()), Image::ones([8, 8, 8]), Image::ones([8, 8, 8]),
                                         delta(), PsfType::Shared, &parameters(), &pool())?;
        assert_eq!(view.title(), Some("angle 0"));
        assert_eq!(view.psf_type(), PsfType::Shared);
        assert_eq!(view.block_size(), [10, 10, 10]);
        Ok(())
    }
}
