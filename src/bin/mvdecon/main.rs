mod cli;
mod progress;

use std::error::Error;
use std::fs::create_dir_all;
use std::path::Path;

use clap::Parser;
use flexi_logger::Logger;
use log::info;
use rayon::ThreadPool;

use mvdecon::config::deconvolution::{read_config_file, View};
use mvdecon::io::raw;
use mvdecon::types::BoxDim;
use mvdecon::utils::{group_digits, timing::Stages};
use mvdecon::{deconvolve, default_pool, DeconView, DeconViews, DeconvolutionParameters, Image};

use cli::Cli;
use progress::Progress;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let _logger = Logger::try_with_str(&args.log_level)?.start()?;

    let config = read_config_file(&args.config)?;
    let mut parameters = config.parameters();
    if let Some(iterations) = args.iterations { parameters.iterations = iterations }
    if let Some(block_size) = args.block_size { parameters.block_size = block_size }
    let pool = default_pool(args.threads.or(config.threads))?;
    info!("{parameters:?}");

    // Before starting the potentially long computation, make sure that we can
    // write the result to the requested destination
    if let Some(parent) = args.out.parent() { create_dir_all(parent)? }
    if let Some(dir) = &args.snapshots { create_dir_all(dir)? }

    let mut stages = Stages::new();
    stages.start("Loading views");
    let views = config.views.iter()
        .map(|view| load_view(view, config.dims(), &parameters, &pool))
        .collect::<mvdecon::Result<Vec<_>>>()?;
    stages.start("Transforming PSFs");
    let views = DeconViews::new(views, pool)?;
    stages.start("Deconvolving");
    println!();
    let bar = Progress::new(parameters.iterations);
    let result = deconvolve(views, &parameters, |iteration, stats| bar.iteration_done(iteration, stats))?;
    bar.finish();

    stages.start(format!("Writing {}", args.out.display()));
    result.psi.write_to_raw_file(&args.out)?;
    if let Some(dir) = &args.snapshots {
        for snapshot in &result.snapshots {
            let path = dir.join(format!("psi_{:03}.raw", snapshot.iteration));
            raw::write(snapshot.slice.iter().copied(), &path)?;
        }
    }
    let stages = stages.finish();
    let total = stages.iter().map(|(_, d)| d.as_millis()).sum::<u128>();
    info!("finished in {} ms", group_digits(total));
    Ok(())
}

fn load_view(view: &View, dims: BoxDim, parameters: &DeconvolutionParameters, pool: &ThreadPool) -> mvdecon::Result<DeconView> {
    let image = Image::from_raw_file(&view.image, dims)?;
    let weight = match &view.weight {
        Some(path) => Image::from_raw_file(path, dims)?,
        None       => Image::ones(dims),
    };
    let (x, y, z) = view.psf_dims;
    let psf = Image::from_raw_file(&view.psf, [x, y, z])?;
    let title = view.title.clone().or_else(|| file_name(&view.image));
    DeconView::with_title(title, image, weight, psf, view.psf_type, parameters, pool)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
