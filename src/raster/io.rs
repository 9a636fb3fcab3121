//! Raster file IO (`.grid` files, bincode-encoded)

use crate::error::StorageError;
use crate::raster::Raster;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub fn write_raster(raster: &Raster, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, raster).map_err(|e| {
        StorageError::invalid_data(format!(
            "Failed to write raster {}: {}",
            path.display(),
            e
        ))
    })
}

pub fn read_raster(path: &Path) -> Result<Raster, StorageError> {
    let file = File::open(path).map_err(|e| {
        StorageError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to open raster {}: {}", path.display(), e),
        ))
    })?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
        StorageError::invalid_data(format!("Failed to read raster {}: {}", path.display(), e))
    })
}
