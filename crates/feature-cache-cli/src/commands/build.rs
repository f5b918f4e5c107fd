//! Command: build — populate a feature cache directory from source images.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use feature_cache::{
    BuildReport, CacheBuilder, ClipTransform, DualSize, ErrorPolicy, FeatureFetcher,
    FeaturePolicy, ModelInference, OnnxExtractor, SingleSize,
};

use crate::config::FetchConfig;

/// How each entry is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyChoice {
    Single(u32),
    Dual,
    Model(PathBuf),
}

impl PolicyChoice {
    /// Pick exactly one of the mutually exclusive build flags.
    pub fn from_flags(size: Option<u32>, dual: bool, model: Option<PathBuf>) -> anyhow::Result<Self> {
        match (size, dual, model) {
            (Some(size), false, None) => Ok(Self::Single(size)),
            (None, true, None) => Ok(Self::Dual),
            (None, false, Some(model)) => Ok(Self::Model(model)),
            (None, false, None) => bail!("One of --size, --dual or --model is required"),
            _ => bail!("--size, --dual and --model are mutually exclusive"),
        }
    }
}

pub fn execute(
    config: &FetchConfig,
    files: &[PathBuf],
    save_dir: &Path,
    policy: PolicyChoice,
    on_error: Option<ErrorPolicy>,
) -> anyhow::Result<BuildReport> {
    tracing::info!(
        "Building feature cache in {} for {} images ({policy:?})",
        save_dir.display(),
        files.len()
    );

    let report = match policy {
        PolicyChoice::Single(size) => {
            let fetcher = FeatureFetcher::http(config.endpoints(), config.timeout)
                .context("Failed to create HTTP client")?;
            run(SingleSize::new(fetcher, size)?, on_error, files, save_dir)?
        }
        PolicyChoice::Dual => {
            let fetcher = FeatureFetcher::http(config.endpoints(), config.timeout)
                .context("Failed to create HTTP client")?;
            run(DualSize::new(fetcher), on_error, files, save_dir)?
        }
        PolicyChoice::Model(model_path) => {
            let extractor = OnnxExtractor::new(&model_path)
                .with_context(|| format!("Failed to load model {}", model_path.display()))?;
            run(
                ModelInference::new(extractor, ClipTransform),
                on_error,
                files,
                save_dir,
            )?
        }
    };

    Ok(report)
}

fn run<P: FeaturePolicy>(
    policy: P,
    on_error: Option<ErrorPolicy>,
    files: &[PathBuf],
    save_dir: &Path,
) -> anyhow::Result<BuildReport> {
    let mut builder = CacheBuilder::new(policy);
    if let Some(on_error) = on_error {
        builder = builder.with_error_policy(on_error);
    }
    Ok(builder.build(files, save_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_flags() {
        assert_eq!(PolicyChoice::from_flags(Some(64), false, None).unwrap(), PolicyChoice::Single(64));
        assert_eq!(PolicyChoice::from_flags(None, true, None).unwrap(), PolicyChoice::Dual);
        assert_eq!(
            PolicyChoice::from_flags(None, false, Some(PathBuf::from("m.onnx"))).unwrap(),
            PolicyChoice::Model(PathBuf::from("m.onnx"))
        );
        assert!(PolicyChoice::from_flags(None, false, None).is_err());
        assert!(PolicyChoice::from_flags(Some(64), true, None).is_err());
    }

    #[test]
    fn test_missing_model_fails_before_work() {
        let out = tempfile::tempdir().unwrap();
        let config = FetchConfig::resolve(Some("http://127.0.0.1:9"), Some(1)).unwrap();
        let result = execute(
            &config,
            &[PathBuf::from("a.jpg")],
            &out.path().join("cache"),
            PolicyChoice::Model(PathBuf::from("/nonexistent/model.onnx")),
            None,
        );
        assert!(result.is_err());
        assert!(!out.path().join("cache").exists());
    }
}
