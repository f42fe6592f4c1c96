//! Persistence of rasters for the command-line front end and file-based
//! PSI initialisation. Richer formats belong to external collaborators.

pub mod raw;

use std::path::Path;

use crate::error::{Error, Result};
use crate::image::Image;
use crate::types::BoxDim;

impl Image {

    /// Load a raw little-endian `f32` raster, which must hold exactly as many
    /// values as `dims` requires.
    pub fn from_raw_file(path: &Path, dims: BoxDim) -> Result<Self> {
        let data = raw::read(path).map_err(|e| Error::io(path, e))?;
        Image::new(dims, data)
    }

    pub fn write_to_raw_file(&self, path: &Path) -> Result<()> {
        raw::write(self.data.iter().copied(), path)
            .map_err(|e| Error::io(path, e))
    }
}
