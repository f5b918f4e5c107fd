//! Merge two feature directories by concatenating same-named entries.

use std::path::Path;

use crate::storage::load_raw_bytes;
use crate::types::{FeatureResult, MergeReport};

/// Items between two progress events.
pub const MERGE_PROGRESS_INTERVAL: usize = 1000;

/// Concatenates entries of a first directory with their namesakes in a second.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureMerger;

impl FeatureMerger {
    /// For every file in `dir_a`, write `dir_a/<name> ++ dir_b/<name>` to
    /// `save_dir/<name>`.
    ///
    /// Outputs that already exist are left alone. A name with no readable
    /// counterpart is reported in [`MergeReport::missing`] and produces no
    /// output. Only failing to list `dir_a` or to create `save_dir` is an
    /// error.
    pub fn merge(&self, dir_a: &Path, dir_b: &Path, save_dir: &Path) -> FeatureResult<MergeReport> {
        std::fs::create_dir_all(save_dir)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir_a)? {
            names.push(entry?.file_name());
        }
        names.sort();

        let mut report = MergeReport::default();
        for (idx, name) in names.iter().enumerate() {
            if idx % MERGE_PROGRESS_INTERVAL == 0 {
                tracing::info!("Merged {idx} / {}", names.len());
            }

            let display_name = name.to_string_lossy().into_owned();
            let save_path = save_dir.join(name);
            if save_path.exists() {
                report.skipped_existing += 1;
                continue;
            }

            let merged = load_raw_bytes(&dir_a.join(name)).and_then(|mut feature| {
                feature.extend(load_raw_bytes(&dir_b.join(name))?);
                Ok(feature)
            });

            match merged {
                Ok(feature) => {
                    std::fs::write(&save_path, feature)?;
                    report.merged += 1;
                }
                Err(e) => {
                    tracing::warn!("Unable to find matching file: {display_name} ({e})");
                    report.missing.push(display_name);
                }
            }
        }

        tracing::info!(
            "Merge done: {} merged, {} already present, {} without a match",
            report.merged,
            report.skipped_existing,
            report.missing.len()
        );
        Ok(report)
    }
}
