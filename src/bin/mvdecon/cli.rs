use std::path::PathBuf;

use mvdecon::types::BoxDim;
use mvdecon::utils::parse_triplet;

/// Command line interface for `mvdecon` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "mvdecon",
    about = "Multi-view Richardson-Lucy deconvolution of raw f32 volumes",
)]
pub (super) struct Cli {
    /// TOML file describing the views and the deconvolution parameters
    pub config: PathBuf,

    /// Raw f32 output file for the deconvolved volume
    #[clap(short, long)]
    pub out: PathBuf,

    /// Maximum number of rayon threads (overrides the configuration file)
    #[clap(short = 'j', long)]
    pub threads: Option<usize>,

    /// Number of iterations (overrides the configuration file)
    #[clap(short, long)]
    pub iterations: Option<usize>,

    /// Block size, e.g. `128,128,64` (overrides the configuration file)
    #[clap(short, long, value_parser = parse_triplet::<usize>)]
    pub block_size: Option<BoxDim>,

    /// Directory in which debug snapshots are written as raw f32 planes
    #[clap(long)]
    pub snapshots: Option<PathBuf>,

    /// Log level specification, in `flexi_logger` syntax
    #[clap(short, long, default_value = "info")]
    pub log_level: String,
}
