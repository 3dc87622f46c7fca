//! Render a [`ResolvedRunConfig`] into the argument list for the external
//! conversion binary, and the filesystem side effects a runner performs
//! around it. Builder selection is a closed enum resolved when the site
//! configuration is loaded, so an unmapped builder kind fails at startup
//! rather than at request time.

use crate::config::{validate_output_dir, GeneralConfig, ResolvedRunConfig, VersionConfig};
use crate::error::{Error, Result};
use log::{debug, error, info, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const UNALIGNED_LINK: &str = "Unaligned";

/// The command builders this crate knows how to construct. Site config names
/// one per tool version; a name outside this set is rejected while the
/// config is deserialized.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum BuilderKind {
    BclConvert,
}

/// Creates runners for resolved run configurations, dispatching on the
/// version registry built from site config.
pub struct RunnerFactory {
    versions: BTreeMap<String, VersionConfig>,
    allowed_output_folders: Vec<PathBuf>,
}

impl RunnerFactory {
    pub fn new(general: &GeneralConfig) -> RunnerFactory {
        RunnerFactory {
            versions: general.versions.clone(),
            allowed_output_folders: general.allowed_output_folders.clone(),
        }
    }

    /// The tool versions this service can run, as configured.
    pub fn available_versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    /// Build the runner for `config.version`, failing with a lookup error if
    /// no builder is registered for it. Has no side effects.
    pub fn create_runner(&self, config: ResolvedRunConfig) -> Result<Runner> {
        let entry = self
            .versions
            .get(&config.version)
            .ok_or_else(|| Error::UnknownVersion {
                version: config.version.clone(),
            })?;
        Ok(match entry.builder {
            BuilderKind::BclConvert => Runner::BclConvert(BclConvertRunner {
                binary: entry.binary.clone(),
                allowed_output_folders: self.allowed_output_folders.clone(),
                config,
            }),
        })
    }
}

/// A configured conversion runner, one variant per supported builder kind.
pub enum Runner {
    BclConvert(BclConvertRunner),
}

impl Runner {
    pub fn config(&self) -> &ResolvedRunConfig {
        match self {
            Runner::BclConvert(r) => &r.config,
        }
    }

    fn allowed_output_folders(&self) -> &[PathBuf] {
        match self {
            Runner::BclConvert(r) => &r.allowed_output_folders,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Runner::BclConvert(r) => r.version(),
        }
    }

    pub fn build_command(&self) -> Vec<String> {
        match self {
            Runner::BclConvert(r) => r.build_command(),
        }
    }

    pub fn validate_output(&self) -> Result<()> {
        validate_output_dir(&self.config().output, self.allowed_output_folders())
    }

    /// Remove the output directory if it exists. An already-absent directory
    /// is success; the allow-list is checked before anything is deleted.
    pub fn delete_output(&self) -> Result<()> {
        self.validate_output()?;
        let output = &self.config().output;
        info!("found a directory at output path {:?}, will remove it", output);
        match fs::remove_dir_all(output) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no such output directory {:?}, will not remove it", output);
                Ok(())
            }
            Err(e) => {
                error!("error removing output directory {:?}: {e}", output);
                Err(e.into())
            }
        }
    }

    /// Create `<runfolder>/Unaligned` pointing at the output directory. A
    /// pre-existing link is replaced; any other failure is propagated.
    pub fn symlink_output_to_unaligned(&self) -> Result<()> {
        let link = self.config().runfolder.join(UNALIGNED_LINK);
        let target = &self.config().output;
        debug!("creating symlink from {:?} to {:?}", link, target);
        match std::os::unix::fs::symlink(target, &link) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("symlink {:?} already exists, will remove and recreate it", link);
                fs::remove_file(&link)?;
                std::os::unix::fs::symlink(target, &link)?;
                Ok(())
            }
            Err(e) => {
                error!("problem creating symlink from {:?} to {:?}: {e}", link, target);
                Err(e.into())
            }
        }
    }
}

/// Command builder for `bcl-convert` 4.x.
pub struct BclConvertRunner {
    binary: PathBuf,
    allowed_output_folders: Vec<PathBuf>,
    config: ResolvedRunConfig,
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

impl BclConvertRunner {
    /// bcl-convert has no way to report its own version, so trust the
    /// configured one.
    fn version(&self) -> &str {
        &self.config.version
    }

    fn build_command(&self) -> Vec<String> {
        let c = &self.config;
        let mut cmd = vec![
            path_arg(&self.binary),
            "--bcl-inputdirectory".to_string(),
            path_arg(&c.runfolder),
            "--sample-sheet".to_string(),
            path_arg(&c.samplesheet_file),
            "--output-directory".to_string(),
            path_arg(&c.output),
            "--force".to_string(),
        ];

        let mut push_opt = |flag: &str, value: &Option<String>| {
            if let Some(value) = value {
                cmd.push(flag.to_string());
                cmd.push(value.clone());
            }
        };
        push_opt("--mismatches", &c.barcode_mismatches);
        push_opt("--tiles", &c.tiles);
        push_opt("--exclude-tiles", &c.exclude_tiles);

        let mut push_bool = |flag: &str, value: bool| {
            cmd.push(flag.to_string());
            cmd.push(value.to_string());
        };
        push_bool(
            "--bcl-sampleproject-subdirectories",
            c.bcl_sampleproject_subdirectories,
        );
        push_bool("--sample-name-column-enabled", c.sample_name_column_enabled);
        push_bool("--create-fastq-for-index-reads", c.create_indexes);
        push_bool("--strict-mode", c.strict_mode);

        if let Some(level) = c.fastq_gzip_compression_level {
            cmd.push("--fastq-gzip-compression-level".to_string());
            cmd.push(level.to_string());
        }

        cmd.push("--no-lane-splitting".to_string());
        cmd.push(c.no_lane_splitting.to_string());

        if let Some(n) = c.num_unknown_barcodes_reported {
            cmd.push("--num-unknown-barcodes-reported".to_string());
            cmd.push(n.to_string());
        }

        cmd.push("--output-legacy-stats".to_string());
        cmd.push(c.output_legacy_stats.to_string());

        cmd.push("--bcl-num-parallel-tiles".to_string());
        cmd.push(c.bcl_num_parallel_tiles.to_string());
        cmd.push("--bcl-num-conversion-threads".to_string());
        cmd.push(c.bcl_num_conversion_threads.to_string());
        cmd.push("--bcl-num-compression-threads".to_string());
        cmd.push(c.bcl_num_compression_threads.to_string());
        cmd.push("--bcl-num-decompression-threads".to_string());
        cmd.push(c.bcl_num_decompression_threads.to_string());

        // The base-mask override carries its own flags, e.g.
        // "--use-bases-mask y*,i6,i6,y* --use-bases-mask 1:y*,i5,i5,y*".
        if let Some(mask) = &c.use_base_mask {
            cmd.extend(mask.split_whitespace().map(str::to_string));
        }

        if let Some(args) = &c.additional_args {
            cmd.extend(args.split_whitespace().map(str::to_string));
        }

        debug!("command: {:?}", cmd);
        cmd
    }
}
