//! Views applied one at a time.

use ndarray::azip;

use crate::update::{blend, core_rows, regularize, BlockContext, BlockScratch, BlockUpdate, IterationStatistics};

/// Every view updates PSI in turn: one sweep over all batches per view
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

impl BlockUpdate for Sequential {

    fn view_groups(&self, n_views: usize) -> Vec<Vec<usize>> {
        (0..n_views).map(|v| vec![v]).collect()
    }

    fn update_block(&self, ctx: &BlockContext, scratch: &mut BlockScratch, out: &mut [f32]) -> IterationStatistics {
        scratch.correction(ctx, 0);
        scratch.load_weight(ctx, 0);
        let (lambda, min_value, max) = (ctx.lambda, ctx.min_value, ctx.max[0]);

        let mut stats = IterationStatistics { n_blocks: 1, ..Default::default() };
        let BlockScratch { psi, weight, corrections, .. } = scratch;
        let correction = &corrections[0];
        for (b, o, n) in core_rows(ctx.block) {
            azip!((new in &mut out[o..o+n],
                   &old in &psi[b..b+n],
                   &c   in &correction[b..b+n],
                   &w   in &weight[b..b+n]) {
                let candidate = regularize(old * c, lambda, max, min_value);
                *new = blend(old, candidate, w, min_value);
                stats.record((*new - old).abs());
            });
        }
        stats
    }
}
