//! Command: merge — concatenate same-named entries of two feature directories.

use std::path::Path;

use anyhow::Context;

use feature_cache::{FeatureMerger, MergeReport};

pub fn execute(dir_a: &Path, dir_b: &Path, save_dir: &Path) -> anyhow::Result<MergeReport> {
    FeatureMerger
        .merge(dir_a, dir_b, save_dir)
        .with_context(|| {
            format!(
                "Failed to merge {} with {} into {}",
                dir_a.display(),
                dir_b.display(),
                save_dir.display()
            )
        })
}
