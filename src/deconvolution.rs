//! The deconvolution loop.
//!
//! Each iteration sweeps every group of views (see `BlockUpdate::view_groups`)
//! over the batches of its blocks. The blocks of a batch are computed in
//! parallel, reading PSI (mirrored at its borders) but never writing it; their
//! results are written into PSI only once the whole batch is finished, before
//! the next batch starts. The loop runs a fixed number of iterations.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info};
use ndarray::Array2;
use rayon::ThreadPool;

use crate::block::{compare_batches, count_blocks, Block};
use crate::config::{DeconvolutionParameters, Variant};
use crate::error::{try_alloc, Error, Result};
use crate::fft::Fft3d;
use crate::image::Image;
use crate::init::{initializer, PsiInitialization};
use crate::psf::PsfTransforms;
use crate::update::{BlockContext, BlockScratch, BlockUpdate, IterationStatistics, Sequential, Simultaneous};
use crate::utils::group_digits;
use crate::view::DeconView;
use crate::views::DeconViews;
use crate::writeback::WriteBackQueue;

/// Central xy-plane of PSI after some iteration
#[derive(Clone, Debug, PartialEq)]
pub struct DebugSnapshot {
    pub iteration: usize,
    pub slice: Array2<f32>,
}

pub struct MultiViewDeconvolution<U: BlockUpdate> {
    views: DeconViews,
    update: U,
    parameters: DeconvolutionParameters,
    groups: Vec<Vec<usize>>,
    psi: Image,
    avg: f32,
    max: Vec<f32>,
    init_error: Option<String>,
    debug: bool,
    debug_interval: usize,
    snapshots: Vec<DebugSnapshot>,
    history: Vec<IterationStatistics>,
}

impl<U: BlockUpdate> MultiViewDeconvolution<U> {

    /// Fails if views processed together do not share their block structure.
    /// A failing PSI initialization is not an error here: it is reported by
    /// `init_was_successful`, and `run_iterations` refuses to start.
    pub fn new(
        views     : DeconViews,
        update    : U,
        init      : &mut dyn PsiInitialization,
        parameters: DeconvolutionParameters,
    ) -> Result<Self> {
        let groups = update.view_groups(views.len());
        check_block_integrity(&views, &groups)?;

        let dims = views.dims();
        let mut psi = Image::new(dims, try_alloc(dims.iter().product(), "PSI")?)?;
        let (avg, max, init_error) = match init.run_initialization(&mut psi, &views) {
            Ok(()) if init.max().len() == views.len() => {
                let min_value = parameters.min_value;
                psi.data.iter_mut().for_each(|v| *v = v.max(min_value));
                info!("PSI initialized: average intensity {}, view maxima {:?}", init.avg(), init.max());
                (init.avg(), init.max().to_vec(), None)
            }
            Ok(()) => {
                let reason = format!("{} view maxima for {} views", init.max().len(), views.len());
                error!("PSI initialization failed: {reason}");
                (f32::NAN, vec![], Some(reason))
            }
            Err(e) => {
                error!("PSI initialization failed: {e}");
                (f32::NAN, vec![], Some(e.to_string()))
            }
        };

        let debug_interval = parameters.debug_interval;
        Ok(Self {
            views, update, parameters, groups, psi, avg, max, init_error,
            debug: debug_interval > 0, debug_interval,
            snapshots: vec![], history: vec![],
        })
    }

    pub fn init_was_successful(&self) -> bool { self.init_error.is_none() }

    pub fn psi      (&self) -> &Image                  { &self.psi }
    pub fn views    (&self) -> &DeconViews             { &self.views }
    pub fn avg      (&self) -> f32                     { self.avg }
    pub fn max      (&self) -> &[f32]                  { &self.max }
    pub fn history  (&self) -> &[IterationStatistics]  { &self.history }
    pub fn snapshots(&self) -> &[DebugSnapshot]        { &self.snapshots }

    pub fn set_debug(&mut self, debug: bool) { self.debug = debug }
    pub fn set_debug_interval(&mut self, interval: usize) { self.debug_interval = interval }

    pub fn into_result(self) -> Deconvolved {
        Deconvolved { psi: self.psi, history: self.history, snapshots: self.snapshots }
    }

    /// Run the configured number of iterations
    pub fn run_iterations(&mut self) -> Result<&[IterationStatistics]> {
        self.run_iterations_with(|_, _| ())
    }

    /// Like `run_iterations`, calling `progress` after each iteration
    pub fn run_iterations_with(&mut self, mut progress: impl FnMut(usize, &IterationStatistics)) -> Result<&[IterationStatistics]> {
        if let Some(reason) = &self.init_error {
            return Err(Error::InitializationFailed(reason.clone()));
        }
        let group_size = self.groups.iter().map(Vec::len).max().unwrap_or(1);
        let mut scratches = (0..self.views.n_threads().max(1))
            .map(|_| BlockScratch::new(self.views.fft(), group_size))
            .collect::<Result<Vec<_>>>()
            .map_err(abort)?;

        for _ in 0..self.parameters.iterations {
            let iteration = self.history.len();
            let mut stats = IterationStatistics::default();
            for group in 0..self.groups.len() {
                stats = stats.merge(self.sweep(group, &mut scratches).map_err(abort)?);
            }
            info!("Iteration {iteration}: {} blocks, sum of changes {:.6e}, max change {:.6e}",
                  group_digits(stats.n_blocks), stats.sum_change, stats.max_change);
            self.history.push(stats);
            if self.debug && self.debug_interval > 0 && (iteration + 1) % self.debug_interval == 0 {
                let z = self.psi.dims[2] / 2;
                self.snapshots.push(DebugSnapshot { iteration, slice: self.psi.xy_slice(z) });
                debug!("Iteration {iteration}: kept snapshot of plane z = {z}");
            }
            progress(iteration, &stats);
        }
        Ok(&self.history)
    }

    /// One pass of a group of views over all its batches
    fn sweep(&mut self, group: usize, scratches: &mut [BlockScratch]) -> Result<IterationStatistics> {
        let Self { views, update, parameters, groups, psi, max, .. } = self;
        let group = &groups[group];
        let members: Vec<&DeconView> = group.iter().map(|&v| &views.views()[v]).collect();
        let kernels: Vec<&PsfTransforms> = members.iter()
            .map(|view| view.psf().transforms()
                 .ok_or_else(|| Error::Psf(format!("transforms of view {} were not computed", view.name()))))
            .collect::<Result<_>>()?;
        let maxima: Vec<f32> = group.iter().map(|&v| max[v]).collect();
        let shared = Shared {
            views: &members, kernels: &kernels, max: &maxima, fft: views.fft(),
            lambda: parameters.lambda, min_value: parameters.min_value,
        };

        let Some(first) = members.first() else { return Ok(IterationStatistics::default()) };
        let batches = first.batches();
        let single_block = count_blocks(batches) == 1;
        let mut queue = WriteBackQueue::new();
        let mut stats = IterationStatistics::default();
        for (n, batch) in batches.iter().enumerate() {
            let written = queue.flush_into(psi);
            let results = process_batch(batch, &*update, &shared, psi, scratches, views.pool())?;
            for (block, values, block_stats) in results {
                stats = stats.merge(block_stats);
                if single_block { psi.paste_region(&block.core, &values) }
                else            { queue.push(block.core, values) }
            }
            debug!("Batch {n} of {}: wrote {written} blocks of the previous batch, computed {}",
                   first.name(), batch.len());
        }
        queue.flush_into(psi);
        Ok(stats)
    }
}

/// Parts of `BlockContext` common to all blocks of a sweep
struct Shared<'a> {
    views: &'a [&'a DeconView],
    kernels: &'a [&'a PsfTransforms],
    max: &'a [f32],
    fft: &'a Fft3d,
    lambda: f32,
    min_value: f32,
}

type BlockResult = (Block, Vec<f32>, IterationStatistics);

/// Compute all blocks of `batch` on `pool`. One task per scratch buffer pulls
/// blocks off the batch through a shared counter until none are left.
fn process_batch<U: BlockUpdate>(
    batch    : &[Block],
    update   : &U,
    shared   : &Shared,
    psi      : &Image,
    scratches: &mut [BlockScratch],
    pool     : &ThreadPool,
) -> Result<Vec<BlockResult>> {
    let next = AtomicUsize::new(0);
    let n_workers = scratches.len().min(batch.len());
    let mut per_worker: Vec<Vec<Result<BlockResult>>> = (0..n_workers).map(|_| vec![]).collect();

    pool.scope(|s| {
        for (scratch, results) in scratches.iter_mut().zip(per_worker.iter_mut()) {
            let next = &next;
            s.spawn(move |_| {
                while let Some(block) = batch.get(next.fetch_add(1, Ordering::Relaxed)) {
                    let ctx = BlockContext {
                        block,
                        views    : shared.views,
                        kernels  : shared.kernels,
                        max      : shared.max,
                        fft      : shared.fft,
                        lambda   : shared.lambda,
                        min_value: shared.min_value,
                    };
                    results.push(compute_block(update, &ctx, psi, scratch));
                }
            });
        }
    });

    let mut results = per_worker.into_iter().flatten().collect::<Result<Vec<_>>>()?;
    results.sort_by_key(|(block, _, _)| block.id);
    Ok(results)
}

fn compute_block<U: BlockUpdate>(update: &U, ctx: &BlockContext, psi: &Image, scratch: &mut BlockScratch) -> Result<BlockResult> {
    psi.copy_region_mirrored(&ctx.block.expanded, &mut scratch.psi);
    let mut core = try_alloc(ctx.block.core.n_voxels(), "block result")?;
    let stats = update.update_block(ctx, scratch, &mut core);
    Ok((*ctx.block, core, stats))
}

fn check_block_integrity(views: &DeconViews, groups: &[Vec<usize>]) -> Result<()> {
    for group in groups {
        let Some((&first, rest)) = group.split_first() else { continue };
        for &v in rest {
            compare_batches(views.views()[first].batches(), views.views()[v].batches())
                .map_err(|reason| Error::BlockIntegrity { view: v, reason })?;
        }
    }
    Ok(())
}

fn abort(e: Error) -> Error {
    error!("Deconvolution aborted: {e}");
    e
}

// ----- Complete runs -------------------------------------------------------------------

/// Final PSI with the convergence log and any debug snapshots
#[derive(Clone, Debug)]
pub struct Deconvolved {
    pub psi: Image,
    pub history: Vec<IterationStatistics>,
    pub snapshots: Vec<DebugSnapshot>,
}

/// Initialize and run a deconvolution with the variant and PSI
/// initialization selected in `parameters`
pub fn deconvolve(
    views     : DeconViews,
    parameters: &DeconvolutionParameters,
    progress  : impl FnMut(usize, &IterationStatistics),
) -> Result<Deconvolved> {
    let mut init = initializer(&parameters.init, parameters.nan_average_fallback);
    match parameters.variant {
        Variant::Sequential   => run(MultiViewDeconvolution::new(views, Sequential  , init.as_mut(), parameters.clone())?, progress),
        Variant::Simultaneous => run(MultiViewDeconvolution::new(views, Simultaneous, init.as_mut(), parameters.clone())?, progress),
    }
}

fn run<U: BlockUpdate>(mut decon: MultiViewDeconvolution<U>, progress: impl FnMut(usize, &IterationStatistics)) -> Result<Deconvolved> {
    decon.run_iterations_with(progress)?;
    Ok(decon.into_result())
}
