//! Configuration file parser for multi-view deconvolution

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{DeconvolutionParameters, PsiInit, Variant};
use crate::error::{Error, Result};
use crate::psf::PsfType;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Number of deconvolution iterations to perform
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Dimensions of the output volume, shared by every view
    pub dims: (usize, usize, usize),

    #[serde(default = "default_block_size")]
    pub block_size: (usize, usize, usize),

    #[serde(default = "default_min_parallel_blocks")]
    pub min_parallel_blocks: usize,

    #[serde(default = "default_lambda")]
    pub lambda: f32,

    #[serde(default = "default_min_value")]
    pub min_value: f32,

    #[serde(default)]
    pub min_value_img: f32,

    #[serde(default)]
    pub outside_value_img: f32,

    #[serde(default = "yes")]
    pub filter_blocks: bool,

    #[serde(default)]
    pub variant: Variant,

    #[serde(default)]
    pub init: PsiInit,

    #[serde(default)]
    pub nan_average_fallback: bool,

    #[serde(default)]
    pub debug_interval: usize,

    /// Size of the worker pool; all available cores if absent
    pub threads: Option<usize>,

    #[serde(default, rename = "view")]
    pub views: Vec<View>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct View {
    pub title: Option<String>,
    pub image: PathBuf,
    /// Uniform weight if absent
    pub weight: Option<PathBuf>,
    pub psf: PathBuf,
    pub psf_dims: (usize, usize, usize),
    #[serde(default)]
    pub psf_type: PsfType,
}

fn default_iterations() -> usize { DeconvolutionParameters::default().iterations }
fn default_block_size() -> (usize, usize, usize) {
    let [x, y, z] = DeconvolutionParameters::default().block_size;
    (x, y, z)
}
fn default_min_parallel_blocks() -> usize { DeconvolutionParameters::default().min_parallel_blocks }
fn default_lambda() -> f32 { DeconvolutionParameters::default().lambda }
fn default_min_value() -> f32 { DeconvolutionParameters::default().min_value }
fn yes() -> bool { true }

impl Config {
    pub fn dims(&self) -> [usize; 3] {
        let (x, y, z) = self.dims;
        [x, y, z]
    }

    pub fn parameters(&self) -> DeconvolutionParameters {
        let (bx, by, bz) = self.block_size;
        DeconvolutionParameters {
            iterations: self.iterations,
            block_size: [bx, by, bz],
            min_parallel_blocks: self.min_parallel_blocks,
            lambda: self.lambda,
            min_value: self.min_value,
            min_value_img: self.min_value_img,
            outside_value_img: self.outside_value_img,
            filter_blocks: self.filter_blocks,
            variant: self.variant,
            init: self.init.clone(),
            nan_average_fallback: self.nan_average_fallback,
            debug_interval: self.debug_interval,
        }
    }
}

pub fn read_config_file(path: &Path) -> Result<Config> {
    let config: String = fs::read_to_string(path)
        .map_err(|e| Error::io(path, e))?;
    toml::from_str(&config)
        .map_err(|e| Error::Config(format!("`{}`: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ----- Some helpers to make the tests more concise ---------------------------------
    fn parse<'d, D: Deserialize<'d>>(input: &'d str) -> D {
        toml::from_str(input).unwrap()
    }
    fn parse_carefully<'d, D: Deserialize<'d>>(input: &'d str) -> std::result::Result<D, toml::de::Error> {
        toml::from_str(input)
    }
    //  ---  Macro for concise assertions about values of parsed fields -------------------
    macro_rules! check {
        ($type:ident($text:expr).$field:ident = $expected:expr) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            assert_eq!(config.$field, $expected);
        };
        ($type:ident($text:expr) fields: $($field:ident = $expected:expr);+$(;)?) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            $(assert_eq!(config.$field, $expected);)*
        }
    }

    // ----- Test deserializing of individual aspects of the Config type ----------------
    #[test]
    fn config_defaults() {
        check!{Config("dims = [10, 20, 30]") fields:
               dims                = (10, 20, 30);
               iterations          = 10;
               block_size          = (256, 256, 256);
               min_parallel_blocks = 1;
               filter_blocks       = true;
               variant             = Variant::Sequential;
               init                = PsiInit::BlurredFused { sigma: 5.0 };
               debug_interval      = 0;
               threads             = None;
        }
    }

    #[test]
    fn config_iterations_and_blocks() {
        check!{Config(r#"
                 dims = [1, 2, 3]
                 iterations = 4
                 block_size = [64, 64, 32]
                 min_parallel_blocks = 8
                 lambda = 0.0
               "#) fields:
               iterations          = 4;
               block_size          = (64, 64, 32);
               min_parallel_blocks = 8;
               lambda              = 0.0;
        }
    }

    #[test]
    fn config_variants() {
        check!(Config("dims = [1,1,1] \n variant = 'mul'"         ).variant = Variant::Simultaneous);
        check!(Config("dims = [1,1,1] \n variant = 'simultaneous'").variant = Variant::Simultaneous);
        check!(Config("dims = [1,1,1] \n variant = 'seq'"         ).variant = Variant::Sequential);
    }

    #[test]
    fn config_init() {
        check!(Config(r#"
                 dims = [1,1,1]
                 init = { kind = "average_approx" }
               "#).init = PsiInit::AverageApprox { samples: 1000 });
        check!(Config(r#"
                 dims = [1,1,1]
                 init = { kind = "blurred_fused", sigma = 2.5 }
               "#).init = PsiInit::BlurredFused { sigma: 2.5 });
        check!(Config(r#"
                 dims = [1,1,1]
                 [init]
                 kind = "from_file"
                 path = "psi.raw"
               "#).init = PsiInit::FromFile { path: "psi.raw".into(), precise: false });
    }

    #[test]
    fn config_views() {
        let config: Config = parse(r#"
                 dims = [100, 100, 50]

                 [[view]]
                 image = "v0.raw"
                 weight = "w0.raw"
                 psf = "p0.raw"
                 psf_dims = [9, 9, 15]

                 [[view]]
                 title = "angle 45"
                 image = "v1.raw"
                 psf = "p1.raw"
                 psf_dims = [9, 9, 15]
                 psf_type = "shared"
              "#);
        assert_eq!(config.views.len(), 2);
        assert_eq!(config.views[0].weight, Some("w0.raw".into()));
        assert_eq!(config.views[0].psf_type, PsfType::Independent);
        assert_eq!(config.views[1].weight, None);
        assert_eq!(config.views[1].title.as_deref(), Some("angle 45"));
        assert_eq!(config.views[1].psf_type, PsfType::Shared);
        assert_eq!(config.views[1].psf_dims, (9, 9, 15));
    }

    #[test]
    fn parameters_mirror_config() {
        let config: Config = parse(r#"
                 dims = [8, 8, 8]
                 iterations = 3
                 block_size = [16, 16, 16]
                 variant = "mul"
               "#);
        let parameters = config.parameters();
        assert_eq!(parameters.iterations, 3);
        assert_eq!(parameters.block_size, [16, 16, 16]);
        assert_eq!(parameters.variant, Variant::Simultaneous);
        assert_eq!(parameters.lambda, DeconvolutionParameters::default().lambda);
    }

    // ----- Make sure that unknown or missing fields are not accepted -------------------
    #[test]
    fn config_reject_unknown_field() {
        assert!(parse_carefully::<Config>("dims = [1,1,1] \n unknown_field = 666").is_err());
    }

    #[test]
    fn config_reject_missing_dims() {
        assert!(parse_carefully::<Config>("iterations = 3").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = read_config_file(Path::new("/nonexistent/deconvolution.toml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
