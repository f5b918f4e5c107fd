//! Batch cache building: one entry per source image, computed at most once.

use std::path::{Path, PathBuf};

use crate::embedding::{extract_from_file, FeatureExtractor, ImageTransform};
use crate::fetcher::{FeatureFetcher, FeatureTransport, UploadFile};
use crate::storage::{cache_key, FeatureCache, FeatureData};
use crate::types::{
    BuildReport, ErrorPolicy, FailedItem, FeatureResult, FeatureSize, NPY_EXTENSION,
};

/// Items between two progress events.
pub const PROGRESS_INTERVAL: usize = 100;

/// How a batch computes the feature for one source file.
pub trait FeaturePolicy {
    /// Extension of the entries this policy writes.
    fn extension(&self) -> &'static str;

    /// Error containment used when the caller does not choose one.
    fn default_error_policy(&self) -> ErrorPolicy;

    fn compute(&mut self, path: &Path) -> FeatureResult<FeatureData>;
}

/// One fetch at a fixed size; the body is stored as-is.
pub struct SingleSize<T> {
    fetcher: FeatureFetcher<T>,
    size: FeatureSize,
}

impl<T: FeatureTransport> SingleSize<T> {
    /// Fails with `InvalidArgument` unless `size` is 64, 50 or 2000.
    pub fn new(fetcher: FeatureFetcher<T>, size: u32) -> FeatureResult<Self> {
        Ok(Self {
            fetcher,
            size: FeatureSize::try_from(size)?,
        })
    }
}

impl<T: FeatureTransport> FeaturePolicy for SingleSize<T> {
    fn extension(&self) -> &'static str {
        self.size.extension()
    }

    fn default_error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Abort
    }

    fn compute(&mut self, path: &Path) -> FeatureResult<FeatureData> {
        let feature = self.fetcher.fetch(UploadFile::from_path(path)?, self.size)?;
        Ok(match self.size {
            FeatureSize::Raw2000 => FeatureData::Raw(feature),
            _ => FeatureData::Bytes(feature),
        })
    }
}

/// Size 64 and size 50 features, stored back to back.
pub struct DualSize<T> {
    fetcher: FeatureFetcher<T>,
}

impl<T: FeatureTransport> DualSize<T> {
    pub fn new(fetcher: FeatureFetcher<T>) -> Self {
        Self { fetcher }
    }
}

impl<T: FeatureTransport> FeaturePolicy for DualSize<T> {
    fn extension(&self) -> &'static str {
        NPY_EXTENSION
    }

    fn default_error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::SkipAndLog
    }

    fn compute(&mut self, path: &Path) -> FeatureResult<FeatureData> {
        let upload = UploadFile::from_path(path)?;
        let mut feature = self.fetcher.fetch(upload.clone(), FeatureSize::Embedding64)?;
        let feature50 = self.fetcher.fetch(upload, FeatureSize::Fv50)?;
        // Plain byte concatenation, not a numeric merge.
        feature.extend_from_slice(&feature50);
        Ok(FeatureData::Bytes(feature))
    }
}

/// Features computed by a local model instead of the remote service.
pub struct ModelInference<X, M> {
    extractor: X,
    transform: M,
}

impl<X: FeatureExtractor, M: ImageTransform> ModelInference<X, M> {
    pub fn new(extractor: X, transform: M) -> Self {
        Self {
            extractor,
            transform,
        }
    }
}

impl<X: FeatureExtractor, M: ImageTransform> FeaturePolicy for ModelInference<X, M> {
    fn extension(&self) -> &'static str {
        NPY_EXTENSION
    }

    fn default_error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::SkipAndLog
    }

    fn compute(&mut self, path: &Path) -> FeatureResult<FeatureData> {
        let feature = extract_from_file(path, &mut self.extractor, &self.transform)?;
        Ok(FeatureData::Floats(feature))
    }
}

/// Runs a [`FeaturePolicy`] over a list of source files into a cache directory.
pub struct CacheBuilder<P> {
    policy: P,
    error_policy: ErrorPolicy,
}

impl<P: FeaturePolicy> CacheBuilder<P> {
    pub fn new(policy: P) -> Self {
        let error_policy = policy.default_error_policy();
        Self {
            policy,
            error_policy,
        }
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Compute and store an entry for every file whose entry is not already
    /// in `save_dir`.
    ///
    /// Under [`ErrorPolicy::Abort`] the first failing file ends the batch with
    /// its error; under [`ErrorPolicy::SkipAndLog`] it is recorded in the
    /// report and the batch moves on.
    pub fn build(&mut self, files: &[PathBuf], save_dir: &Path) -> FeatureResult<BuildReport> {
        let cache = FeatureCache::open(save_dir)?;
        let extension = self.policy.extension();
        let total = files.len();
        let mut report = BuildReport {
            total,
            ..Default::default()
        };

        for (idx, file) in files.iter().enumerate() {
            if idx % PROGRESS_INTERVAL == 0 {
                tracing::info!("Processed {idx} / {total}");
            }

            let key = cache_key(file);
            if cache.contains(&key, extension) {
                report.skipped_existing += 1;
                continue;
            }

            let result = self
                .policy
                .compute(file)
                .and_then(|data| cache.write(&key, &data));

            match result {
                Ok(_) => report.processed += 1,
                Err(e) => match self.error_policy {
                    ErrorPolicy::Abort => return Err(e),
                    ErrorPolicy::SkipAndLog => {
                        tracing::warn!("Problem with file {}: {e}", file.display());
                        report.failed.push(FailedItem {
                            path: file.clone(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        tracing::info!(
            "Cache build done: {} written, {} already cached, {} failed",
            report.processed,
            report.skipped_existing,
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;

    use super::*;
    use crate::fetcher::tests::FakeTransport;
    use crate::fetcher::Endpoints;
    use crate::storage::{load_raw_bytes, read_npy_bytes, read_npy_floats};
    use crate::types::FeatureError;

    fn write_sources(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_single_size_writes_entries() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = write_sources(src.path(), &["a.jpg", "b.jpg"]);

        let transport = FakeTransport::ok();
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let mut builder = CacheBuilder::new(SingleSize::new(fetcher, 64).unwrap());
        let report = builder.build(&files, out.path()).unwrap();

        assert_eq!(report.processed, 2);
        let stored = read_npy_bytes(&out.path().join("a.npy")).unwrap();
        assert_eq!(
            stored.to_vec(),
            FakeTransport::body_for("http://akiwi.eu/mxnet/feature/")
        );
    }

    #[test]
    fn test_single_size_raw_entry() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = write_sources(src.path(), &["a.jpg"]);

        let transport = FakeTransport::ok();
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let mut builder = CacheBuilder::new(SingleSize::new(fetcher, 2000).unwrap());
        builder.build(&files, out.path()).unwrap();

        let stored = load_raw_bytes(&out.path().join("a.raw")).unwrap();
        assert_eq!(
            stored,
            FakeTransport::body_for("http://akiwi.eu/mxnet/feature/raw/")
        );
    }

    #[test]
    fn test_single_size_rejects_invalid_size() {
        let transport = FakeTransport::ok();
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let err = SingleSize::new(fetcher, 100).err().unwrap();
        assert!(matches!(err, FeatureError::InvalidArgument(_)));
    }

    #[test]
    fn test_existing_entry_is_not_fetched() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = write_sources(src.path(), &["a.jpg", "b.jpg"]);
        std::fs::write(out.path().join("a.npy"), b"old").unwrap();

        let transport = FakeTransport::ok();
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let mut builder = CacheBuilder::new(SingleSize::new(fetcher, 50).unwrap());
        let report = builder.build(&files, out.path()).unwrap();

        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(transport.call_count(), 1);
        assert!(transport.calls.borrow()[0].1.file_name == "b.jpg");
        assert_eq!(std::fs::read(out.path().join("a.npy")).unwrap(), b"old");
    }

    #[test]
    fn test_rerun_makes_no_calls() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = write_sources(src.path(), &["a.jpg", "b.jpg"]);

        let first = FakeTransport::ok();
        CacheBuilder::new(DualSize::new(FeatureFetcher::new(&first, Endpoints::default())))
            .build(&files, out.path())
            .unwrap();
        assert_eq!(first.call_count(), 4);

        let second = FakeTransport::ok();
        let report =
            CacheBuilder::new(DualSize::new(FeatureFetcher::new(&second, Endpoints::default())))
                .build(&files, out.path())
                .unwrap();
        assert_eq!(second.call_count(), 0);
        assert_eq!(report.skipped_existing, 2);
    }

    #[test]
    fn test_dual_size_concatenates_bytes() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = write_sources(src.path(), &["cat.jpg"]);

        let transport = FakeTransport::ok();
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let mut builder = CacheBuilder::new(DualSize::new(fetcher));
        builder.build(&files, out.path()).unwrap();

        let mut expected = FakeTransport::body_for("http://akiwi.eu/mxnet/feature/");
        expected.extend(FakeTransport::body_for("http://akiwi.eu/feature/fv50/"));
        let stored = read_npy_bytes(&out.path().join("cat.npy")).unwrap();
        assert_eq!(stored.to_vec(), expected);
    }

    #[test]
    fn test_default_error_policies() {
        let transport = FakeTransport::ok();
        let single = CacheBuilder::new(
            SingleSize::new(FeatureFetcher::new(&transport, Endpoints::default()), 64).unwrap(),
        );
        let dual = CacheBuilder::new(DualSize::new(FeatureFetcher::new(
            &transport,
            Endpoints::default(),
        )));
        assert_eq!(single.error_policy(), ErrorPolicy::Abort);
        assert_eq!(dual.error_policy(), ErrorPolicy::SkipAndLog);
    }

    #[test]
    fn test_abort_stops_on_first_failure() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = write_sources(src.path(), &["a.jpg", "b.jpg"]);

        let transport = FakeTransport::with_status(502);
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let mut builder = CacheBuilder::new(SingleSize::new(fetcher, 64).unwrap());
        let err = builder.build(&files, out.path()).unwrap_err();

        assert!(matches!(err, FeatureError::RemoteService { status: 502, .. }));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_skip_and_log_continues() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut files = write_sources(src.path(), &["a.jpg", "b.jpg"]);
        files.insert(1, src.path().join("missing.jpg"));

        let transport = FakeTransport::with_status(404);
        let fetcher = FeatureFetcher::new(&transport, Endpoints::default());
        let mut builder = CacheBuilder::new(SingleSize::new(fetcher, 64).unwrap())
            .with_error_policy(ErrorPolicy::SkipAndLog);
        let report = builder.build(&files, out.path()).unwrap();

        assert_eq!(report.failed.len(), 3);
        assert_eq!(report.failed[1].path, src.path().join("missing.jpg"));
        assert_eq!(report.processed, 0);
        // The missing file never reaches the transport.
        assert_eq!(transport.call_count(), 2);
        assert!(!out.path().join("a.npy").exists());
    }

    struct ConstExtractor(Vec<f32>);

    impl FeatureExtractor for ConstExtractor {
        fn extract(&mut self, _input: Array4<f32>) -> FeatureResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct TinyTransform;

    impl ImageTransform for TinyTransform {
        fn apply(&self, _img: &image::DynamicImage) -> FeatureResult<Array4<f32>> {
            Ok(Array4::zeros((1, 3, 2, 2)))
        }
    }

    #[test]
    fn test_model_inference_policy() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = src.path().join("good.jpg");
        image::DynamicImage::new_rgb8(4, 4).save(&good).unwrap();
        let bad = src.path().join("bad.jpg");
        std::fs::write(&bad, b"not an image").unwrap();

        let policy = ModelInference::new(ConstExtractor(vec![1.5, 2.5]), TinyTransform);
        let mut builder = CacheBuilder::new(policy);
        let report = builder.build(&[bad.clone(), good], out.path()).unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, bad);
        let stored = read_npy_floats(&out.path().join("good.npy")).unwrap();
        assert_eq!(stored.to_vec(), vec![1.5, 2.5]);
    }
}
