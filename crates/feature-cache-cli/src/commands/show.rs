//! Command: show — summarize one cached feature entry.

use std::path::Path;

use serde::Serialize;

use feature_cache::{load_as_vector, read_npy_bytes, read_npy_floats};

/// Number of leading elements included in a summary.
const HEAD_LEN: usize = 16;

/// How to interpret an entry on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntryFormat {
    /// Whole file as bytes, header included.
    Raw,
    /// Payload of a uint8 `.npy` array.
    NpyU8,
    /// Payload of a float32 `.npy` array.
    NpyF32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub path: String,
    pub len: usize,
    pub head: Vec<String>,
}

pub fn execute(path: &Path, format: EntryFormat) -> anyhow::Result<EntrySummary> {
    let (len, head) = match format {
        EntryFormat::Raw => {
            let v = load_as_vector(path)?;
            (v.len(), v.iter().take(HEAD_LEN).map(u8::to_string).collect())
        }
        EntryFormat::NpyU8 => {
            let v = read_npy_bytes(path)?;
            (v.len(), v.iter().take(HEAD_LEN).map(u8::to_string).collect())
        }
        EntryFormat::NpyF32 => {
            let v = read_npy_floats(path)?;
            (v.len(), v.iter().take(HEAD_LEN).map(|x| format!("{x:.6}")).collect())
        }
    };

    Ok(EntrySummary {
        path: super::display(path),
        len,
        head,
    })
}
