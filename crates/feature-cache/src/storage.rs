//! On-disk feature cache layout, entry writers, and whole-file loaders.
//!
//! An entry lives at `<dir>/<key>.<ext>` and is never rewritten once present.

use std::path::{Path, PathBuf};

use ndarray::Array1;
use ndarray_npy::{read_npy, write_npy};

use crate::types::{FeatureError, FeatureResult, NPY_EXTENSION, RAW_EXTENSION};

/// Suffix marking the end of a cache key in a source file name.
const KEY_SUFFIX: &str = ".jpg";

/// Suffix of an entry still being written.
const PARTIAL_SUFFIX: &str = "partial";

/// Feature data ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureData {
    /// Fetched bytes, stored as a 1-D `uint8` array.
    Bytes(Vec<u8>),
    /// Fetched bytes, stored verbatim.
    Raw(Vec<u8>),
    /// Model output, stored as a 1-D `float32` array.
    Floats(Vec<f32>),
}

impl FeatureData {
    pub fn extension(&self) -> &'static str {
        match self {
            FeatureData::Raw(_) => RAW_EXTENSION,
            FeatureData::Bytes(_) | FeatureData::Floats(_) => NPY_EXTENSION,
        }
    }
}

/// Derive the cache key of a source image: its base file name, cut at the
/// first `.jpg`.
pub fn cache_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.find(KEY_SUFFIX) {
        Some(idx) => name[..idx].to_string(),
        None => name,
    }
}

/// A directory of cached feature entries.
#[derive(Debug, Clone)]
pub struct FeatureCache {
    dir: PathBuf,
}

impl FeatureCache {
    /// Open a cache directory, creating it if needed.
    pub fn open(dir: &Path) -> FeatureResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{key}.{extension}"))
    }

    pub fn contains(&self, key: &str, extension: &str) -> bool {
        self.entry_path(key, extension).exists()
    }

    /// Persist `data` under `key` and return the entry path.
    ///
    /// Data goes to a sibling partial file first and is renamed into place,
    /// so an interrupted write never leaves an entry that looks complete.
    pub fn write(&self, key: &str, data: &FeatureData) -> FeatureResult<PathBuf> {
        let path = self.entry_path(key, data.extension());
        let partial = self
            .dir
            .join(format!("{key}.{}.{PARTIAL_SUFFIX}", data.extension()));

        match data {
            FeatureData::Bytes(bytes) => write_npy(&partial, &Array1::from(bytes.clone()))?,
            FeatureData::Floats(values) => write_npy(&partial, &Array1::from(values.clone()))?,
            FeatureData::Raw(bytes) => std::fs::write(&partial, bytes)?,
        }
        std::fs::rename(&partial, &path)?;

        tracing::debug!("Wrote feature entry {}", path.display());
        Ok(path)
    }
}

/// Read a whole file into memory.
pub fn load_raw_bytes(path: &Path) -> FeatureResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| FeatureError::LocalIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a whole file as a sequence of `u8` elements, header bytes included.
pub fn load_as_vector(path: &Path) -> FeatureResult<Array1<u8>> {
    Ok(Array1::from(load_raw_bytes(path)?))
}

/// Decode the payload of a `uint8` `.npy` entry.
pub fn read_npy_bytes(path: &Path) -> FeatureResult<Array1<u8>> {
    Ok(read_npy(path)?)
}

/// Decode the payload of a `float32` `.npy` entry.
pub fn read_npy_floats(path: &Path) -> FeatureResult<Array1<f32>> {
    Ok(read_npy(path)?)
}
