//! Run parameters.
//!
//! `DeconvolutionParameters` is built once (from defaults, code, or a TOML
//! file via `deconvolution::Config`) and handed by reference to every
//! component; nothing reads configuration from global state.

pub mod deconvolution;

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::BoxDim;

/// How the views are combined within one iteration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// One view at a time: every view updates PSI in turn
    #[default]
    #[serde(alias = "seq")]
    Sequential,
    /// All views at once: corrections are combined per block
    #[serde(alias = "mul")]
    Simultaneous,
}

/// Choice of initial PSI
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PsiInit {
    /// Weighted fusion of all views, then Gaussian blur
    BlurredFused {
        #[serde(default = "default_sigma")]
        sigma: f32,
    },
    /// Exact mean over all covered voxels of all views
    AveragePrecise,
    /// Mean estimated from a subsample of each view
    AverageApprox {
        #[serde(default = "default_samples")]
        samples: usize,
    },
    /// Raw `f32` raster of the output dimensions
    FromFile {
        path: PathBuf,
        /// Compute the normalization statistics exactly rather than by sampling
        #[serde(default)]
        precise: bool,
    },
}

impl Default for PsiInit {
    fn default() -> Self { Self::BlurredFused { sigma: default_sigma() } }
}

pub fn default_sigma() -> f32 { 5.0 }
pub fn default_samples() -> usize { 1000 }

#[derive(Clone, Debug, PartialEq)]
pub struct DeconvolutionParameters {

    /// Number of passes over all views; there is no convergence-based exit
    pub iterations: usize,

    /// Shape of every block buffer, kernel support included
    pub block_size: BoxDim,

    /// Batches smaller than this borrow blocks from larger ones when possible
    pub min_parallel_blocks: usize,

    /// Tikhonov regularization strength; 0 disables regularization
    pub lambda: f32,

    /// Floor for PSI values
    pub min_value: f32,

    /// Floor for positive input values
    pub min_value_img: f32,

    /// Input value marking voxels without data
    pub outside_value_img: f32,

    /// Skip blocks in which a view has zero weight
    pub filter_blocks: bool,

    pub variant: Variant,

    pub init: PsiInit,

    /// Replace a NaN average intensity by 1.0 instead of failing
    pub nan_average_fallback: bool,

    /// Keep a PSI snapshot every this many iterations; 0 disables
    pub debug_interval: usize,
}

impl Default for DeconvolutionParameters {
    fn default() -> Self {
        Self {
            iterations: 10,
            block_size: [256, 256, 256],
            min_parallel_blocks: 1,
            lambda: 0.0006,
            min_value: 0.0001,
            min_value_img: 0.0,
            outside_value_img: 0.0,
            filter_blocks: true,
            variant: Variant::default(),
            init: PsiInit::default(),
            nan_average_fallback: false,
            debug_interval: 0,
        }
    }
}
