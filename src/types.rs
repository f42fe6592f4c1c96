pub use geometry::{BoxDim, Index1, Index3, Offset3, Region};

pub type Intensityf32 = f32;
pub type Weightf32    = f32;
pub type Ratiof32     = f32;

/// Complex sample used by the frequency-domain convolutions
pub type Complexf32 = num_complex::Complex<f32>;
