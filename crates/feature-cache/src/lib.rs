//! feature-cache — fetch image feature vectors from a remote service, cache them on disk, merge and load them.

pub mod builder;
pub mod capture;
pub mod embedding;
pub mod fetcher;
pub mod merge;
pub mod storage;
pub mod types;

pub use builder::{CacheBuilder, DualSize, FeaturePolicy, ModelInference, SingleSize};
pub use capture::{encode_jpeg, is_supported_format, list_images, load_rgb};
pub use embedding::{ClipTransform, FeatureExtractor, ImageTransform, OnnxExtractor};
pub use fetcher::{
    Endpoints, FeatureFetcher, FeatureTransport, HttpTransport, TransportResponse, UploadFile,
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
};
pub use merge::FeatureMerger;
pub use storage::{
    cache_key, load_as_vector, load_raw_bytes, read_npy_bytes, read_npy_floats, FeatureCache,
    FeatureData,
};
pub use types::*;
