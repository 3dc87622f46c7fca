// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Turn a sequencing-run description (runfolder, run metadata, samplesheet)
//! into a validated `bcl-convert` invocation and manage its lifecycle as an
//! asynchronous job.
//!
//! The crate resolves three sources of truth (request overrides, site-wide
//! defaults, and instrument-reported run metadata) into one immutable
//! [`ResolvedRunConfig`], derives per-lane demultiplexing masks, renders the
//! command line for the configured tool version, and hands the command to an
//! external job queue through the [`JobQueue`] trait. It performs no base
//! calling or demultiplexing itself.

pub mod base_mask;
pub mod command;
pub mod config;
pub mod error;
pub mod lanes;
pub mod logs;
pub mod orchestrator;
pub mod run_info;
pub mod samplesheet;

pub use crate::base_mask::compute_base_masks;
pub use crate::command::{BuilderKind, Runner, RunnerFactory};
pub use crate::config::{GeneralConfig, ResolvedRunConfig, RunOverrides};
pub use crate::error::{Error, Result};
pub use crate::lanes::parse_lane_spec;
pub use crate::logs::LogFileProvider;
pub use crate::orchestrator::{JobQueue, JobState, Orchestrator, StartedJob};
pub use crate::run_info::RunInfo;
pub use crate::samplesheet::{SampleRow, SampleSheet};
