//! All views combined in every block.

use crate::update::{blend, core_rows, regularize, BlockContext, BlockScratch, BlockUpdate, IterationStatistics};

/// The corrections of all views are merged into one update per block: their
/// geometric mean multiplies PSI, and the summed weights (capped at 1) blend
/// it in. Requires every view to have the same block structure.
#[derive(Clone, Copy, Debug, Default)]
pub struct Simultaneous;

impl BlockUpdate for Simultaneous {

    fn view_groups(&self, n_views: usize) -> Vec<Vec<usize>> {
        vec![(0..n_views).collect()]
    }

    fn update_block(&self, ctx: &BlockContext, scratch: &mut BlockScratch, out: &mut [f32]) -> IterationStatistics {
        let n_views = ctx.views.len();
        for v in 0..n_views {
            scratch.correction(ctx, v);
        }

        scratch.load_summed_weight(ctx);

        // Tikhonov normalization uses the brightest view of the group
        let max = ctx.max.iter().copied().fold(0.0, f32::max);
        let (lambda, min_value) = (ctx.lambda, ctx.min_value);
        let exponent = 1.0 / n_views as f64;

        let mut stats = IterationStatistics { n_blocks: 1, ..Default::default() };
        let BlockScratch { psi, weight, corrections, .. } = scratch;
        let corrections = &corrections[..n_views];
        for (b, o, n) in core_rows(ctx.block) {
            for k in 0..n {
                let i = b + k;
                let product: f64 = corrections.iter().map(|c| c[i] as f64).product();
                let combined = if product > 0.0 { product.powf(exponent) as f32 } else { 0.0 };
                let old = psi[i];
                let candidate = regularize(old * combined, lambda, max, min_value);
                let new = blend(old, candidate, weight[i].min(1.0), min_value);
                out[o + k] = new;
                stats.record((new - old).abs());
            }
        }
        stats
    }
}
