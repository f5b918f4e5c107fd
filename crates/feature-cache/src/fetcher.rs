//! Remote feature retrieval over multipart HTTP uploads.
//!
//! One attempt per call: no retry, no backoff. The HTTP client sits behind
//! [`FeatureTransport`] so callers (and tests) can substitute their own.

use std::path::Path;
use std::time::Duration;

use image::DynamicImage;
use reqwest::blocking::multipart::{Form, Part};

use crate::capture::encode_jpeg;
use crate::types::{FeatureError, FeatureResult, FeatureSize};

/// Default timeout for one feature request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default host of the feature service.
pub const DEFAULT_BASE_URL: &str = "http://akiwi.eu";

/// Multipart field name the service reads the image from.
const UPLOAD_FIELD: &str = "file";

/// Filename sent for in-memory images.
const IMAGE_UPLOAD_NAME: &str = "img.jpg";

/// One file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Read a file for upload under its own base name.
    pub fn from_path(path: &Path) -> FeatureResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| FeatureError::LocalIo {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(IMAGE_UPLOAD_NAME)
            .to_string();

        Ok(Self {
            file_name,
            mime: None,
            bytes,
        })
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Sends a single-file multipart POST and returns whatever came back.
///
/// Implementations report transport failures (timeouts, refused connections)
/// as errors; any HTTP status, success or not, is a response.
pub trait FeatureTransport {
    fn post_file(&self, url: &str, file: UploadFile) -> FeatureResult<TransportResponse>;
}

impl<T: FeatureTransport + ?Sized> FeatureTransport for &T {
    fn post_file(&self, url: &str, file: UploadFile) -> FeatureResult<TransportResponse> {
        (**self).post_file(url, file)
    }
}

impl<T: FeatureTransport + ?Sized> FeatureTransport for Box<T> {
    fn post_file(&self, url: &str, file: UploadFile) -> FeatureResult<TransportResponse> {
        (**self).post_file(url, file)
    }
}

/// Blocking `reqwest` transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> FeatureResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FeatureTransport for HttpTransport {
    fn post_file(&self, url: &str, file: UploadFile) -> FeatureResult<TransportResponse> {
        let mut part = Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(mime) = file.mime.as_deref() {
            part = part.mime_str(mime)?;
        }
        let form = Form::new().part(UPLOAD_FIELD, part);

        let resp = self.client.post(url).multipart(form).send()?;
        let status = resp.status().as_u16();
        let body = resp.bytes()?.to_vec();
        Ok(TransportResponse { status, body })
    }
}

/// Endpoint URL for each feature variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub embedding64: String,
    pub fv50: String,
    pub raw2000: String,
}

impl Endpoints {
    /// Endpoints on a service hosted at `base_url`.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            embedding64: format!("{base}/mxnet/feature/"),
            fv50: format!("{base}/feature/fv50/"),
            raw2000: format!("{base}/mxnet/feature/raw/"),
        }
    }

    pub fn url_for(&self, size: FeatureSize) -> &str {
        match size {
            FeatureSize::Embedding64 => &self.embedding64,
            FeatureSize::Fv50 => &self.fv50,
            FeatureSize::Raw2000 => &self.raw2000,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

/// Fetches feature vectors for images from the remote service.
pub struct FeatureFetcher<T> {
    transport: T,
    endpoints: Endpoints,
}

impl FeatureFetcher<HttpTransport> {
    /// Fetcher over HTTP with the given endpoints and request timeout.
    pub fn http(endpoints: Endpoints, timeout: Duration) -> FeatureResult<Self> {
        Ok(Self::new(HttpTransport::new(timeout)?, endpoints))
    }
}

impl<T: FeatureTransport> FeatureFetcher<T> {
    pub fn new(transport: T, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch the feature vector for encoded image bytes.
    ///
    /// `size` must be 64, 50 or 2000; anything else fails before a request
    /// is made.
    pub fn fetch_by_size(&self, bytes: Vec<u8>, size: u32) -> FeatureResult<Vec<u8>> {
        let size = FeatureSize::try_from(size)?;
        self.fetch(
            UploadFile {
                file_name: IMAGE_UPLOAD_NAME.to_string(),
                mime: None,
                bytes,
            },
            size,
        )
    }

    /// Fetch the feature vector for an image file on disk.
    pub fn fetch_for_file(&self, path: &Path, size: u32) -> FeatureResult<Vec<u8>> {
        let size = FeatureSize::try_from(size)?;
        self.fetch(UploadFile::from_path(path)?, size)
    }

    /// Fetch the feature vector for an in-memory image, re-encoded as JPEG.
    pub fn fetch_for_image(&self, img: &DynamicImage, size: u32) -> FeatureResult<Vec<u8>> {
        let size = FeatureSize::try_from(size)?;
        let bytes = encode_jpeg(img)?;
        self.fetch(
            UploadFile {
                file_name: IMAGE_UPLOAD_NAME.to_string(),
                mime: Some("image/jpeg".to_string()),
                bytes,
            },
            size,
        )
    }

    /// Single request to the endpoint for `size`; the body of a 200 is the feature.
    pub fn fetch(&self, file: UploadFile, size: FeatureSize) -> FeatureResult<Vec<u8>> {
        let url = self.endpoints.url_for(size);
        tracing::debug!(
            "Requesting size {size} feature for {} ({} bytes) from {url}",
            file.file_name,
            file.bytes.len()
        );

        let resp = self.transport.post_file(url, file)?;
        if resp.status != 200 {
            return Err(FeatureError::RemoteService {
                url: url.to_string(),
                status: resp.status,
                body: String::from_utf8_lossy(&resp.body).into_owned(),
            });
        }
        Ok(resp.body)
    }
}
