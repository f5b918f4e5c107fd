//! Command implementations behind the `feature-cache` binary.

pub mod build;
pub mod fetch;
pub mod merge;
pub mod show;

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Expand command-line inputs into source image paths.
///
/// Files are taken as given; directories contribute their image files
/// (non-recursive, sorted). Order of inputs is preserved.
pub fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = feature_cache::list_images(input)
                .with_context(|| format!("Failed to list images in {}", input.display()))?;
            tracing::debug!("{} images in {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Display name for a path in command output.
pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
