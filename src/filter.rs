//! Removal of blocks to which a view contributes nothing.

use rayon::prelude::*;

use crate::block::Batch;
use crate::image::Image;
use crate::types::Region;
use geometry::index1_to_3;

/// What `remove_empty_blocks` threw away
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub removed_blocks: usize,
    pub removed_batches: usize,
}

/// Remove every block whose expanded region sees only zero weight (voxels
/// outside `weight` count as zero), then every batch left empty.
///
/// The voxels of all blocks are scanned as one contiguous sequence, cut into
/// `n_tasks` equal chunks which are processed in parallel, so that the amount
/// of parallelism does not depend on how many blocks there are.
pub fn remove_empty_blocks(batches: &mut Vec<Batch>, weight: &Image, n_tasks: usize) -> FilterSummary {
    let regions: Vec<Region> = batches.iter().flatten().map(|b| b.expanded).collect();
    let keep = blocks_with_content(&regions, weight, n_tasks.max(1));

    let mut flags = keep.into_iter();
    let mut summary = FilterSummary::default();
    for batch in batches.iter_mut() {
        let before = batch.len();
        batch.retain(|_| flags.next().unwrap_or(true));
        summary.removed_blocks += before - batch.len();
    }
    let before = batches.len();
    batches.retain(|batch| !batch.is_empty());
    summary.removed_batches = before - batches.len();
    summary
}

fn blocks_with_content(regions: &[Region], weight: &Image, n_tasks: usize) -> Vec<bool> {
    // Offset of the first voxel of each block in the concatenated sequence
    let mut starts = Vec::with_capacity(regions.len() + 1);
    let mut total = 0;
    for r in regions {
        starts.push(total);
        total += r.n_voxels();
    }
    starts.push(total);
    let chunk = total.div_ceil(n_tasks).max(1);

    let found: Vec<usize> = (0..n_tasks)
        .into_par_iter()
        .flat_map_iter(|task| {
            let (lo, hi) = (task * chunk, ((task + 1) * chunk).min(total));
            scan_chunk(regions, &starts, weight, lo, hi)
        })
        .collect();

    let mut keep = vec![false; regions.len()];
    for b in found { keep[b] = true }
    keep
}

/// Blocks with non-zero weight among the voxels `lo..hi` of the sequence
fn scan_chunk(regions: &[Region], starts: &[usize], weight: &Image, lo: usize, hi: usize) -> Vec<usize> {
    let mut found = vec![];
    if lo >= hi { return found }
    // Last block starting at or before `lo`
    let first = starts.partition_point(|&s| s <= lo) - 1;
    for (b, region) in regions.iter().enumerate().skip(first) {
        let start = starts[b];
        if start >= hi { break }
        let local_lo = lo.saturating_sub(start);
        let local_hi = (hi - start).min(region.n_voxels());
        let nonzero = (local_lo..local_hi).any(|i| {
            let p = region.min;
            let [x, y, z] = index1_to_3(i, region.size);
            let q = [p[0] + x as isize, p[1] + y as isize, p[2] + z as isize];
            Region::of_dims(weight.dims).contains(q)
                && weight[q.map(|c| c as usize)] != 0.0
        });
        if nonzero { found.push(b) }
    }
    found
}
