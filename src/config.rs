// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Merge site-wide defaults, per-request overrides and instrument-reported
//! run metadata into one immutable [`ResolvedRunConfig`]. Resolution happens
//! once per start request; nothing here is mutated afterwards.

use crate::base_mask::compute_base_masks;
use crate::command::BuilderKind;
use crate::error::{Error, Result};
use crate::lanes::parse_lane_spec;
use crate::run_info::{default_instrument_prefixes, InstrumentPrefix, RunInfo};
use crate::samplesheet::{archive_samplesheet, write_samplesheet, SampleSheet};
use log::{debug, error, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SAMPLESHEET_FILE: &str = "SampleSheet.csv";

/// One supported tool version: which command builder renders it and where
/// its binary lives.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct VersionConfig {
    pub builder: BuilderKind,
    pub binary: PathBuf,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct MachineTypeConfig {
    pub bclconvert_version: String,
}

fn default_thread_count() -> u32 {
    1
}

/// Site-wide service configuration, typically deserialized from the config
/// file the service is deployed with.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeneralConfig {
    /// Search roots probed, in order, for runfolders by name.
    pub runfolder_path: Vec<PathBuf>,
    pub default_output_path: PathBuf,
    /// Output directories must be immediate children of one of these.
    pub allowed_output_folders: Vec<PathBuf>,
    pub bclconvert_logs_path: PathBuf,
    /// Supported tool versions, keyed by version string.
    pub versions: BTreeMap<String, VersionConfig>,
    /// Machine type to tool version, used when a request names no version.
    pub machine_type: BTreeMap<String, MachineTypeConfig>,
    #[serde(default = "default_instrument_prefixes")]
    pub instrument_prefixes: Vec<InstrumentPrefix>,
    #[serde(default)]
    pub bcl_sampleproject_subdirectories: bool,
    #[serde(default)]
    pub sample_name_column_enabled: bool,
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default)]
    pub no_lane_splitting: bool,
    #[serde(default)]
    pub fastq_gzip_compression_level: Option<u32>,
    #[serde(default)]
    pub num_unknown_barcodes_reported: Option<u32>,
    #[serde(default)]
    pub output_legacy_stats: bool,
    #[serde(default = "default_thread_count")]
    pub bcl_num_parallel_tiles: u32,
    #[serde(default = "default_thread_count")]
    pub bcl_num_conversion_threads: u32,
    #[serde(default = "default_thread_count")]
    pub bcl_num_compression_threads: u32,
    #[serde(default = "default_thread_count")]
    pub bcl_num_decompression_threads: u32,
}

impl GeneralConfig {
    pub fn machine_versions(&self) -> BTreeMap<String, String> {
        self.machine_type
            .iter()
            .map(|(machine, cfg)| (machine.clone(), cfg.bclconvert_version.clone()))
            .collect()
    }
}

/// Optional per-request settings carried in a start request. Every field
/// overrides the corresponding site default when set.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct RunOverrides {
    pub bclconvert_version: Option<String>,
    pub output: Option<PathBuf>,
    /// A complete samplesheet as raw text. When given, it replaces the one
    /// in the runfolder (the old sheet is archived first).
    pub samplesheet: Option<String>,
    pub barcode_mismatches: Option<String>,
    pub tiles: Option<String>,
    pub exclude_tiles: Option<String>,
    pub use_base_mask: Option<String>,
    /// Lane selection, resolved into a tile filter when `tiles` is not set.
    pub bcl_only_lane: Option<String>,
    pub create_indexes: Option<bool>,
    pub bcl_num_parallel_tiles: Option<u32>,
    pub bcl_num_conversion_threads: Option<u32>,
    pub bcl_num_compression_threads: Option<u32>,
    pub bcl_num_decompression_threads: Option<u32>,
    pub additional_args: Option<String>,
}

/// The fully merged configuration for one conversion run. Constructed once
/// per start request and owned by it until handed to the command builder.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResolvedRunConfig {
    pub version: String,
    pub runfolder: PathBuf,
    pub output: PathBuf,
    pub samplesheet_file: PathBuf,
    pub barcode_mismatches: Option<String>,
    pub tiles: Option<String>,
    pub exclude_tiles: Option<String>,
    pub use_base_mask: Option<String>,
    /// Per-lane masks derived from the samplesheet and the run metadata,
    /// surfaced to the operator alongside the resolved configuration.
    pub base_masks: BTreeMap<u32, String>,
    pub create_indexes: bool,
    pub bcl_num_parallel_tiles: u32,
    pub bcl_num_conversion_threads: u32,
    pub bcl_num_compression_threads: u32,
    pub bcl_num_decompression_threads: u32,
    pub additional_args: Option<String>,
    pub nbr_of_cores: usize,
    pub bcl_sampleproject_subdirectories: bool,
    pub sample_name_column_enabled: bool,
    pub strict_mode: bool,
    pub no_lane_splitting: bool,
    pub fastq_gzip_compression_level: Option<u32>,
    pub num_unknown_barcodes_reported: Option<u32>,
    pub output_legacy_stats: bool,
}

/// An output directory is valid iff its parent is one of the allow-listed
/// folders. Checked before anything destructive happens to it.
pub(crate) fn validate_output_dir(output: &Path, allowed: &[PathBuf]) -> Result<()> {
    let abs_output = std::path::absolute(output)?;
    let parent = abs_output.parent();

    for dir in allowed {
        if parent == Some(std::path::absolute(dir)?.as_path()) {
            return Ok(());
        }
    }

    let message = format!(
        "Invalid output directory {} was specified. Allowed dirs were: {allowed:?}",
        output.display()
    );
    error!("{message}");
    Err(Error::usage(message))
}

impl ResolvedRunConfig {
    /// Resolve a start request against the site configuration and the
    /// metadata in the named runfolder.
    pub fn resolve(
        general: &GeneralConfig,
        overrides: RunOverrides,
        runfolder_name: &str,
    ) -> Result<ResolvedRunConfig> {
        let runfolder = general
            .runfolder_path
            .iter()
            .map(|root| root.join(runfolder_name))
            .find(|p| p.is_dir())
            .ok_or_else(|| Error::RunfolderNotFound {
                name: runfolder_name.to_string(),
            })?;

        let samplesheet_file = runfolder.join(SAMPLESHEET_FILE);
        if let Some(text) = &overrides.samplesheet {
            debug!("got a new samplesheet, using it instead of the one in the runfolder");
            if samplesheet_file.exists() {
                archive_samplesheet(&samplesheet_file)?;
            }
            write_samplesheet(text, &samplesheet_file)?;
        }

        let run_info = RunInfo::from_runfolder(&runfolder)?;
        let version = match overrides.bclconvert_version {
            Some(v) if !v.is_empty() => v,
            _ => run_info
                .version_from_instrument(&general.instrument_prefixes, &general.machine_versions())?,
        };

        let output = match overrides.output {
            Some(output) => output,
            None => {
                let output = general.default_output_path.join(runfolder_name);
                if !output.exists() {
                    fs::create_dir(&output)?;
                }
                output
            }
        };
        validate_output_dir(&output, &general.allowed_output_folders)?;

        let bcl_num_parallel_tiles = overrides
            .bcl_num_parallel_tiles
            .unwrap_or(general.bcl_num_parallel_tiles);
        let bcl_num_conversion_threads = overrides
            .bcl_num_conversion_threads
            .unwrap_or(general.bcl_num_conversion_threads);
        let bcl_num_compression_threads = overrides
            .bcl_num_compression_threads
            .unwrap_or(general.bcl_num_compression_threads);
        let bcl_num_decompression_threads = overrides
            .bcl_num_decompression_threads
            .unwrap_or(general.bcl_num_decompression_threads);

        let nbr_of_cores = num_cpus::get();
        let threads_requested = (bcl_num_conversion_threads
            + bcl_num_compression_threads
            + bcl_num_decompression_threads) as usize;
        if nbr_of_cores < threads_requested {
            warn!("bcl-convert will use {threads_requested} threads, {nbr_of_cores} exist!");
        }

        let tiles = match (overrides.tiles, &overrides.bcl_only_lane) {
            (Some(tiles), _) => Some(tiles),
            (None, Some(lanes)) => Some(parse_lane_spec(Some(lanes.as_str()))?),
            (None, None) => None,
        };

        let samplesheet = SampleSheet::from_file(&samplesheet_file)?;
        let base_masks = compute_base_masks(
            &samplesheet,
            &run_info.index_lengths(),
            run_info.is_single_read(),
        )?;

        Ok(ResolvedRunConfig {
            version,
            runfolder,
            output,
            samplesheet_file,
            barcode_mismatches: overrides.barcode_mismatches,
            tiles,
            exclude_tiles: overrides.exclude_tiles,
            use_base_mask: overrides.use_base_mask,
            base_masks,
            create_indexes: overrides.create_indexes.unwrap_or(false),
            bcl_num_parallel_tiles,
            bcl_num_conversion_threads,
            bcl_num_compression_threads,
            bcl_num_decompression_threads,
            additional_args: overrides.additional_args,
            nbr_of_cores,
            bcl_sampleproject_subdirectories: general.bcl_sampleproject_subdirectories,
            sample_name_column_enabled: general.sample_name_column_enabled,
            strict_mode: general.strict_mode,
            no_lane_splitting: general.no_lane_splitting,
            fastq_gzip_compression_level: general.fastq_gzip_compression_level,
            num_unknown_barcodes_reported: general.num_unknown_barcodes_reported,
            output_legacy_stats: general.output_legacy_stats,
        })
    }
}
