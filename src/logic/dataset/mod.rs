//! Dataset Module - Keystroke Capture Records & Partitioning
//!
//! Raw captures, their split labels, the arrival-order partitioner and the
//! JSONL import/export format.

pub mod record;
pub mod partition;
pub mod dsl;
pub mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

use std::path::PathBuf;

pub use record::{DataSplit, NewCapture, RawKeystrokeCapture, StoredCapture};
pub use partition::{assign_splits, fallback_split, split_counts};

/// Label captures of one user in arrival order (70/15/15).
pub fn partition_user(captures: Vec<NewCapture>) -> Vec<NewCapture> {
    let splits = assign_splits(captures.len());
    captures
        .into_iter()
        .zip(splits)
        .map(|(capture, split)| capture.with_split(split))
        .collect()
}

/// Default directory for capture files
pub fn get_dataset_dir() -> PathBuf {
    crate::constants::get_data_dir().join("captures")
}
