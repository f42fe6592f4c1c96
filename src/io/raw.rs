//! Headerless little-endian `f32` rasters.
//!
//! The file carries no dimensions; callers check the number of values
//! against the grid they expect.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;

const WIDTH: usize = std::mem::size_of::<f32>();

pub fn write(values: impl IntoIterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for value in values {
        out.write_all(&value.to_le_bytes())?;
    }
    out.flush()
}

/// Every value in the file. A file whose size is not a whole number of
/// values is rejected as `InvalidData`.
pub fn read(path: &Path) -> std::io::Result<Vec<f32>> {
    let mut bytes = vec![];
    File::open(path)?.read_to_end(&mut bytes)?;
    let trailing = bytes.len() % WIDTH;
    if trailing != 0 {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("{trailing} trailing bytes after {} values", bytes.len() / WIDTH),
        ));
    }
    Ok(bytes.chunks_exact(WIDTH)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
