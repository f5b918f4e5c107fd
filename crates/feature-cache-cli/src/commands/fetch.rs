//! Command: fetch — retrieve one feature vector for one image.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use feature_cache::FeatureFetcher;

use crate::config::FetchConfig;

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub image: String,
    pub size: u32,
    pub bytes: usize,
    pub written: Option<PathBuf>,
}

pub fn execute(
    config: &FetchConfig,
    image: &Path,
    size: u32,
    out: Option<&Path>,
) -> anyhow::Result<FetchOutcome> {
    let fetcher = FeatureFetcher::http(config.endpoints(), config.timeout)
        .context("Failed to create HTTP client")?;
    let feature = fetcher.fetch_for_file(image, size)?;

    if let Some(out) = out {
        std::fs::write(out, &feature)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        tracing::info!("Wrote {} feature bytes to {}", feature.len(), out.display());
    }

    Ok(FetchOutcome {
        image: super::display(image),
        size,
        bytes: feature.len(),
        written: out.map(Path::to_path_buf),
    })
}
