//! Richardson-Lucy update of one block of PSI.
//!
//! For each view taking part, the PSI block is blurred with the view's PSF,
//! the observation is divided by the blurred estimate, and the quotient is
//! blurred with the mirrored PSF. The resulting correction multiplies PSI,
//! after which the candidate is regularized, floored, and blended into the
//! old value according to the view weight.

pub mod sequential;
pub mod simultaneous;

pub use sequential::Sequential;
pub use simultaneous::Simultaneous;

use itertools::iproduct;

use crate::block::Block;
use crate::error::{try_alloc, Result};
use crate::fft::{load_real, Fft3d, FftScratch};
use crate::psf::PsfTransforms;
use crate::types::{Complexf32, Intensityf32, Ratiof32, Weightf32};
use crate::view::DeconView;

// ----- Statistics ----------------------------------------------------------------------

/// Change of PSI over some set of voxels: a block, a batch or a whole iteration
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IterationStatistics {
    /// Sum of absolute changes
    pub sum_change: f64,
    /// Largest absolute change
    pub max_change: f32,
    /// Number of blocks contributing
    pub n_blocks: usize,
}

impl IterationStatistics {
    pub fn merge(self, other: Self) -> Self {
        Self {
            sum_change: self.sum_change + other.sum_change,
            max_change: self.max_change.max(other.max_change),
            n_blocks  : self.n_blocks + other.n_blocks,
        }
    }

    #[inline]
    fn record(&mut self, change: f32) {
        self.sum_change += change as f64;
        self.max_change  = self.max_change.max(change);
    }
}

// ----- Per-voxel arithmetic ------------------------------------------------------------

/// Observation divided by the blurred estimate. Voxels without data are
/// neutral; the denominator is floored to `min_value`.
#[inline]
pub fn quotient(observed: Intensityf32, blurred: Intensityf32, min_value: f32) -> Ratiof32 {
    if observed > 0.0 { observed / blurred.max(min_value) }
    else              { 1.0 }
}

/// Tikhonov damping `(sqrt(1 + 2 lambda x) - 1) / lambda`; identity for `lambda == 0`
#[inline]
pub fn tikhonov(x: f32, lambda: f32) -> f32 {
    if lambda > 0.0 { ((1.0 + 2.0 * lambda * x).sqrt() - 1.0) / lambda }
    else            { x }
}

/// Candidate value regularized relative to the view's peak intensity `max`,
/// replaced by `min_value` when not positive (NaN included), and floored.
#[inline]
pub fn regularize(candidate: f32, lambda: f32, max: f32, min_value: f32) -> f32 {
    let value = if candidate > 0.0 {
        if lambda > 0.0 && max > 0.0 { tikhonov(candidate / max, lambda) * max }
        else                         { candidate }
    } else {
        min_value
    };
    value.max(min_value)
}

/// New PSI value: `old` moved towards the regularized candidate by `weight`
#[inline]
pub fn blend(old: f32, candidate: f32, weight: Weightf32, min_value: f32) -> f32 {
    (old + (candidate - old) * weight).max(min_value)
}

// ----- Interface used by the orchestrator ----------------------------------------------

/// What one block update reads, apart from the PSI values in the scratch
pub struct BlockContext<'a> {
    pub block: &'a Block,
    /// The views updated together, and their kernels and peak intensities
    pub views: &'a [&'a DeconView],
    pub kernels: &'a [&'a PsfTransforms],
    pub max: &'a [f32],
    pub fft: &'a Fft3d,
    pub lambda: f32,
    pub min_value: f32,
}

pub trait BlockUpdate: Sync {

    /// Indices of the views to process together, in processing order. Every
    /// group is swept over all its batches before the next one starts; views
    /// in the same group must share their block structure.
    fn view_groups(&self, n_views: usize) -> Vec<Vec<usize>>;

    /// Update the PSI block held in `scratch.psi` (laid out over the expanded
    /// region of `ctx.block`) and write the new values of the block's core
    /// into `out`.
    fn update_block(&self, ctx: &BlockContext, scratch: &mut BlockScratch, out: &mut [f32]) -> IterationStatistics;
}

/// Working memory of one worker thread, reused for every block it processes
pub struct BlockScratch {
    /// PSI over the expanded region of the current block
    pub psi: Vec<Intensityf32>,
    fft: FftScratch,
    complex: Vec<Complexf32>,
    observed: Vec<Intensityf32>,
    weight: Vec<Weightf32>,
    corrections: Vec<Vec<Ratiof32>>,
}

impl BlockScratch {
    /// Room for blocks of `fft`'s shape and groups of up to `n_views` views
    pub fn new(fft: &Fft3d, n_views: usize) -> Result<Self> {
        let n = fft.len();
        Ok(Self {
            psi        : try_alloc(n, "PSI block")?,
            fft        : fft.scratch()?,
            complex    : try_alloc(n, "FFT block")?,
            observed   : try_alloc(n, "observation block")?,
            weight     : try_alloc(n, "weight block")?,
            corrections: (0..n_views.max(1))
                .map(|_| try_alloc(n, "correction block"))
                .collect::<Result<_>>()?,
        })
    }

    /// Correction factors of view `v` of the context, left in `corrections[v]`
    fn correction(&mut self, ctx: &BlockContext, v: usize) {
        let Self { psi, fft: fft_scratch, complex, observed, corrections, .. } = self;
        let (fft, kernels) = (ctx.fft, ctx.kernels[v]);
        ctx.views[v].image().copy_region_zero(&ctx.block.expanded, observed);

        load_real(psi, complex);
        fft.convolve(complex, &kernels.kernel1, fft_scratch);
        for (c, &o) in complex.iter_mut().zip(observed.iter()) {
            *c = Complexf32::new(quotient(o, c.re, ctx.min_value), 0.0);
        }
        fft.convolve(complex, &kernels.kernel2, fft_scratch);
        for (r, c) in corrections[v].iter_mut().zip(complex.iter()) { *r = c.re }
    }

    /// Weight of view `v` of the context over the expanded region, in `weight`
    fn load_weight(&mut self, ctx: &BlockContext, v: usize) {
        ctx.views[v].weight().copy_region_zero(&ctx.block.expanded, &mut self.weight);
    }

    /// Sum of the weights of all views of the context, in `weight`
    fn load_summed_weight(&mut self, ctx: &BlockContext) {
        let Self { weight, observed, .. } = self;
        weight.iter_mut().for_each(|w| *w = 0.0);
        for view in ctx.views {
            view.weight().copy_region_zero(&ctx.block.expanded, observed);
            weight.iter_mut().zip(observed.iter()).for_each(|(s, &w)| *s += w);
        }
    }
}

/// The rows of the core of `block`: offset in the expanded buffer, offset in
/// the core buffer, and length
fn core_rows(block: &Block) -> impl Iterator<Item = (usize, usize, usize)> {
    let [lx, ly, lz] = block.expanded.local(block.core.min).map(|i| i as usize);
    let [sx, sy, _] = block.expanded.size;
    let [cx, cy, cz] = block.core.size;
    iproduct!(0..cz, 0..cy).map(move |(z, y)| {
        (lx + (ly + y + (lz + z) * sy) * sx, (y + z * cy) * cx, cx)
    })
}
