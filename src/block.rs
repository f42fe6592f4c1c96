//! Division of a view into blocks, and of blocks into batches that can be
//! processed concurrently.
//!
//! Every block has the same buffer shape (the configured block size). Its
//! `core` is the part of the volume it updates; its `expanded` region is the
//! core grown by the support of two successive convolutions with the view's
//! kernel: `kernel - 1` voxels before and `kernel` voxels after the core,
//! `2 * kernel - 1` in total. Values in the core are then unaffected by the
//! wrap-around of the circular FFT convolution.

use itertools::iproduct;

use crate::types::{BoxDim, Region};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    /// Position in the grid-ordered list of blocks of the view
    pub id: usize,
    /// Voxels updated by this block; always inside the image
    pub core: Region,
    /// Voxels read by this block; may extend beyond the image
    pub expanded: Region,
}

/// Blocks whose expanded regions are pairwise disjoint
pub type Batch = Vec<Block>;

/// Edge length of the core of an interior block, `None` if the block size
/// cannot accommodate the kernel support in some dimension.
pub fn effective_size(block_size: BoxDim, kernel: BoxDim) -> Option<BoxDim> {
    let mut core = [0; 3];
    for d in 0..3 {
        let support = (2 * kernel[d]).checked_sub(1)?;
        core[d] = block_size[d].checked_sub(support).filter(|&c| c > 0)?;
    }
    Some(core)
}

/// Tile `image` with blocks. Cores cover every voxel exactly once; cores of
/// blocks at the upper edges of the image may be smaller than the effective
/// size. `None` when no block can be made.
pub fn divide_into_blocks(image: BoxDim, block_size: BoxDim, kernel: BoxDim) -> Option<Vec<Block>> {
    if image.iter().any(|&n| n == 0) { return None }
    let core = effective_size(block_size, kernel)?;
    let starts = |d: usize| (0..image[d]).step_by(core[d]);
    let blocks = iproduct!(starts(2), starts(1), starts(0))
        .enumerate()
        .map(|(id, (z, y, x))| {
            let min = [x, y, z];
            let size = [0, 1, 2].map(|d| core[d].min(image[d] - min[d]));
            let min = min.map(|i| i as isize);
            let expanded_min = [0, 1, 2].map(|d| min[d] - (kernel[d] as isize - 1));
            Block {
                id,
                core    : Region::new(min, size),
                expanded: Region::new(expanded_min, block_size),
            }
        })
        .collect();
    Some(blocks)
}

/// Group `blocks` into batches within which no two expanded regions overlap.
///
/// Blocks are placed first-fit in grid order, which keeps the number of
/// batches small. Afterwards, batches holding fewer than `min_parallel`
/// blocks take over blocks from the largest batches, as long as the donor
/// keeps at least `min_parallel` and no overlap is introduced. A batch may
/// still end up with a single block when nothing else fits beside it.
pub fn split_into_batches(blocks: &[Block], min_parallel: usize) -> Vec<Batch> {
    let mut batches: Vec<Batch> = vec![];
    for &block in blocks {
        match batches.iter_mut().find(|batch| fits(batch, &block)) {
            Some(batch) => batch.push(block),
            None        => batches.push(vec![block]),
        }
    }
    balance(&mut batches, min_parallel);
    for batch in &mut batches { batch.sort_by_key(|b| b.id) }
    batches
}

fn fits(batch: &[Block], block: &Block) -> bool {
    batch.iter().all(|other| !other.expanded.intersects(&block.expanded))
}

fn balance(batches: &mut [Batch], min_parallel: usize) {
    for needy in 0..batches.len() {
        let mut donors: Vec<usize> = (0..batches.len()).filter(|&d| d != needy).collect();
        donors.sort_by_key(|&d| std::cmp::Reverse(batches[d].len()));
        for donor in donors {
            let mut i = 0;
            while batches[needy].len() < min_parallel
               && batches[donor].len() > min_parallel
               && i < batches[donor].len()
            {
                let candidate = batches[donor][i];
                if fits(&batches[needy], &candidate) {
                    batches[donor].remove(i);
                    batches[needy].push(candidate);
                } else {
                    i += 1;
                }
            }
        }
    }
}

/// `Ok` when two views share an identical batch structure (same number of
/// batches, same blocks in the same places); otherwise a description of the
/// first difference.
pub fn compare_batches(a: &[Batch], b: &[Batch]) -> Result<(), String> {
    if a.len() != b.len() {
        return Err(format!("{} batches vs {}", a.len(), b.len()));
    }
    for (n, (x, y)) in a.iter().zip(b).enumerate() {
        if x.len() != y.len() {
            return Err(format!("batch {n} holds {} blocks vs {}", x.len(), y.len()));
        }
        if let Some((p, q)) = x.iter().zip(y).find(|(p, q)| p != q) {
            return Err(format!("batch {n}: block {:?} vs {:?}", p, q));
        }
    }
    Ok(())
}

pub fn count_blocks(batches: &[Batch]) -> usize { batches.iter().map(Vec::len).sum() }
