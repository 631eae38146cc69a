use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::VdbError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn open_file(path: &Path) -> Result<fs::File, VdbError> {
    fs::File::open(path)
        .map_err(|err| VdbError::Filesystem(format!("open {}: {err}", path.display())))
}

/// Opens a text input, decompressing transparently when it starts with the
/// gzip magic bytes.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, VdbError> {
    let mut reader = BufReader::new(open_file(path)?);
    let is_gzip = reader
        .fill_buf()
        .map_err(|err| VdbError::Filesystem(format!("read {}: {err}", path.display())))?
        .starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), VdbError> {
    fs::create_dir_all(path)
        .map_err(|err| VdbError::Filesystem(format!("create {}: {err}", path.display())))
}
