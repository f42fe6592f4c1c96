//! Block-parallel multi-view Richardson-Lucy deconvolution.
//!
//! Several views of one volume, each with its own weight and point-spread
//! function, are combined into a single deconvolved estimate (PSI). The
//! volume is processed in blocks; blocks whose supports do not overlap are
//! grouped into batches and updated in parallel.

pub mod types;
pub mod error;
pub mod utils;
pub mod image;
pub mod io;
pub mod fft;
pub mod gauss;
pub mod block;
pub mod filter;
pub mod psf;
pub mod config;
pub mod view;
pub mod views;
pub mod init;
pub mod update;
pub mod writeback;
pub mod deconvolution;

pub use crate::config::{DeconvolutionParameters, PsiInit, Variant};
pub use crate::deconvolution::{deconvolve, Deconvolved, MultiViewDeconvolution};
pub use crate::error::{Error, Result};
pub use crate::image::Image;
pub use crate::psf::PsfType;
pub use crate::update::IterationStatistics;
pub use crate::view::DeconView;
pub use crate::views::{default_pool, DeconViews};
