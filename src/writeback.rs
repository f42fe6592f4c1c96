//! Results of one batch, waiting to be written into PSI.
//!
//! Blocks of a batch read PSI over their expanded regions while they are
//! computed, so nothing may be written into PSI until the whole batch is
//! done. Their results are queued here and pasted, in the order they were
//! queued, before the next batch starts.

use std::collections::VecDeque;

use crate::image::Image;
use crate::types::Region;

#[derive(Debug, Default)]
pub struct WriteBackQueue {
    pending: VecDeque<(Region, Vec<f32>)>,
}

impl WriteBackQueue {
    pub fn new() -> Self { Self::default() }

    /// `values` are laid out over `region`
    pub fn push(&mut self, region: Region, values: Vec<f32>) {
        debug_assert_eq!(region.n_voxels(), values.len());
        self.pending.push_back((region, values));
    }

    pub fn len(&self) -> usize { self.pending.len() }
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    /// Paste everything queued into `psi`, oldest first, leaving the queue
    /// empty. Returns the number of blocks written.
    pub fn flush_into(&mut self, psi: &mut Image) -> usize {
        let n = self.pending.len();
        while let Some((region, values)) = self.pending.pop_front() {
            psi.paste_region(&region, &values);
        }
        n
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nothing_is_written_before_flush() {
        let mut psi = Image::zeros([4, 4, 4]);
        let mut queue = WriteBackQueue::new();
        queue.push(Region::new([0, 0, 0], [2, 2, 2]), vec![1.0; 8]);
        assert_eq!(psi, Image::zeros([4, 4, 4]));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.flush_into(&mut psi), 1);
        assert!(queue.is_empty());
        assert_eq!(psi[[1, 1, 1]], 1.0);
        assert_eq!(psi[[2, 1, 1]], 0.0);
    }

    #[test]
    fn later_entries_win() {
        let mut psi = Image::zeros([4, 1, 1]);
        let mut queue = WriteBackQueue::new();
        queue.push(Region::new([0, 0, 0], [3, 1, 1]), vec![1.0; 3]);
        queue.push(Region::new([1, 0, 0], [3, 1, 1]), vec![2.0; 3]);
        queue.flush_into(&mut psi);
        assert_eq!(psi.data, vec![1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn flushing_an_empty_queue_is_harmless() {
        let mut psi = Image::ones([2, 2, 2]);
        assert_eq!(WriteBackQueue::new().flush_into(&mut psi), 0);
        assert_eq!(psi, Image::ones([2, 2, 2]));
    }
}
