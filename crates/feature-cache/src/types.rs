//! Core data types for feature variants, error policies, and batch reports.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which remote endpoint (and encoding) produces a feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSize {
    /// Size 64: the service's own embedding.
    Embedding64,
    /// Size 50: the "fv50" variant.
    Fv50,
    /// Size 2000: the raw, unprocessed vector.
    Raw2000,
}

impl FeatureSize {
    pub const ALL: [FeatureSize; 3] = [Self::Embedding64, Self::Fv50, Self::Raw2000];

    /// The numeric selector used by callers and the command line.
    pub fn value(self) -> u32 {
        match self {
            Self::Embedding64 => 64,
            Self::Fv50 => 50,
            Self::Raw2000 => 2000,
        }
    }

    /// File extension of a cache entry holding this variant.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Raw2000 => RAW_EXTENSION,
            _ => NPY_EXTENSION,
        }
    }
}

impl TryFrom<u32> for FeatureSize {
    type Error = FeatureError;

    fn try_from(value: u32) -> FeatureResult<Self> {
        match value {
            64 => Ok(Self::Embedding64),
            50 => Ok(Self::Fv50),
            2000 => Ok(Self::Raw2000),
            other => Err(FeatureError::InvalidArgument(format!(
                "Invalid feature size {other}, expected one of 64, 50, 2000"
            ))),
        }
    }
}

impl fmt::Display for FeatureSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Extension of serialized array entries.
pub const NPY_EXTENSION: &str = "npy";

/// Extension of raw (size 2000) entries.
pub const RAW_EXTENSION: &str = "raw";

/// What a batch does when a single item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Propagate the first failure and stop the batch.
    Abort,
    /// Log the failure, record it in the report, continue with the next item.
    SkipAndLog,
}

/// Outcome of a cache build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub total: usize,
    pub processed: usize,
    pub skipped_existing: usize,
    pub failed: Vec<FailedItem>,
}

/// A source file whose feature could not be computed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of merging two feature directories.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub merged: usize,
    pub skipped_existing: usize,
    /// File names present in the first directory with no readable match.
    pub missing: Vec<String>,
}

/// Errors that can occur while fetching, caching, or merging features.
#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Could not get feature vector from {url}: HTTP {status}: {body}")]
    RemoteService {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unable to read {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Array file error: {0}")]
    Npy(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),
}

impl From<ndarray_npy::WriteNpyError> for FeatureError {
    fn from(e: ndarray_npy::WriteNpyError) -> Self {
        FeatureError::Npy(e.to_string())
    }
}

impl From<ndarray_npy::ReadNpyError> for FeatureError {
    fn from(e: ndarray_npy::ReadNpyError) -> Self {
        FeatureError::Npy(e.to_string())
    }
}

/// Convenience result type.
pub type FeatureResult<T> = Result<T, FeatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_from_supported_values() {
        for size in FeatureSize::ALL {
            assert_eq!(FeatureSize::try_from(size.value()).unwrap(), size);
        }
    }

    #[test]
    fn test_size_rejects_other_values() {
        for value in [0u32, 1, 49, 65, 128, 1999, 2001] {
            let err = FeatureSize::try_from(value).unwrap_err();
            assert!(matches!(err, FeatureError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_extension_by_size() {
        assert_eq!(FeatureSize::Embedding64.extension(), "npy");
        assert_eq!(FeatureSize::Fv50.extension(), "npy");
        assert_eq!(FeatureSize::Raw2000.extension(), "raw");
    }

    #[test]
    fn test_remote_error_message_carries_status() {
        let err = FeatureError::RemoteService {
            url: "http://localhost/feature/".to_string(),
            status: 503,
            body: "busy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("busy"));
    }
}
