use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use mvdecon::config::deconvolution::read_config_file;

/// Parse a deconvolution configuration file and show how it was understood
#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "parse_config")]
struct Cli {
    /// Configuration file
    config_file: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let config = read_config_file(&args.config_file)?;

    println!("Volume: {:?}", config.dims());
    for (n, view) in config.views.iter().enumerate() {
        println!("View {n}: {view:?}");
    }
    println!("{:#?}", config.parameters());
    Ok(())
}
