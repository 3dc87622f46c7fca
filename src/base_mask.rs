//! Derive the per-lane `--use-bases-mask` strings that reconcile the index
//! lengths a samplesheet declares with the cycles the instrument actually
//! read.

use crate::error::{Error, Result};
use crate::samplesheet::SampleSheet;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Mask segment for one index read: the samplesheet index length against the
/// cycles the sequencer read for it.
fn index_segment(samplesheet_len: u64, read_len: u64) -> Result<String> {
    if samplesheet_len > read_len {
        return Err(Error::usage(
            "Sample sheet indicates that index is longer than what was read by the sequencer!",
        ));
    }
    if samplesheet_len == 0 {
        // No index in the samplesheet, mask the whole read off.
        return Ok("n*".to_string());
    }
    if samplesheet_len < read_len {
        // Mask the extra cycles at the end.
        Ok(format!("i{samplesheet_len}n*"))
    } else {
        Ok(format!("i{samplesheet_len}"))
    }
}

/// Compute a bases-mask string per lane from the index lengths in the
/// samplesheet. Assumes all indexes within a lane have the same length: the
/// first sample row seen in a lane is taken as representative, and
/// homogeneity is not verified.
///
/// `index_lengths` maps read number to cycle count for the indexed reads, in
/// read order, as reported by [`crate::run_info::RunInfo::index_lengths`].
/// Lanes with no samples do not appear in the result.
pub fn compute_base_masks(
    samplesheet: &SampleSheet,
    index_lengths: &BTreeMap<u64, u64>,
    is_single_read: bool,
) -> Result<BTreeMap<u32, String>> {
    let mut base_masks = BTreeMap::new();

    let sorted = samplesheet
        .samples
        .iter()
        .sorted_by_key(|row| row.lane);
    for (lane, mut rows) in &sorted.chunk_by(|row| row.lane) {
        let rep = match rows.next() {
            Some(row) => row,
            None => continue,
        };

        let index1 = rep.index1.trim();
        let index2 = rep.index2.as_deref().unwrap_or("").trim();

        let mut segments = vec!["y*".to_string()];
        for (&samplesheet_len, &read_len) in [index1.len() as u64, index2.len() as u64]
            .iter()
            .zip(index_lengths.values())
        {
            segments.push(index_segment(samplesheet_len, read_len)?);
        }
        if !is_single_read {
            segments.push("y*".to_string());
        }

        base_masks.insert(lane, segments.join(","));
    }

    Ok(base_masks)
}
