//! Integer voxel-grid geometry shared by the block partitioner, the image
//! rasters and the write-back pipeline.

mod index;
mod region;

pub use index::{index3_to_1, index1_to_3, mirror, BoxDim, Index1, Index3, Offset3};
pub use region::Region;
