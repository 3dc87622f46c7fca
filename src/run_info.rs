//! Deserializes the `RunInfo.xml` file a sequencer leaves in the runfolder
//! into the read/index-cycle structure and instrument identity the
//! configuration resolver needs.

use crate::error::{Error, Result};
use serde::de;
use serde::Deserialize as _;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const RUN_INFO_FILE: &str = "RunInfo.xml";

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct RunInfo {
    #[serde(rename = "Version", default)]
    pub version: u32,
    #[serde(rename = "Run")]
    pub run: Run,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Run {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Flowcell", default)]
    pub flowcell: String,
    #[serde(rename = "Instrument", default)]
    pub instrument: String,
    #[serde(rename = "Date", default)]
    pub date: String,
    #[serde(rename = "Reads")]
    pub reads: Reads,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Reads {
    #[serde(rename = "Read", default)]
    pub read: Vec<Read>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Read {
    #[serde(rename = "Number", default)]
    pub number: u64,
    #[serde(rename = "NumCycles", default)]
    pub num_cycles: u64,
    #[serde(rename = "IsIndexedRead", deserialize_with = "bool_from_string")]
    pub is_indexed_read: bool,
}

fn bool_from_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: de::Deserializer<'de>,
{
    match String::deserialize(deserializer)?.as_ref() {
        "Y" => Ok(true),
        "N" => Ok(false),
        other => Err(de::Error::invalid_value(
            de::Unexpected::Str(other),
            &"Y or N",
        )),
    }
}

/// One row of the ordered instrument-name prefix table. The first prefix that
/// matches the reported instrument decides the machine type.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct InstrumentPrefix {
    pub prefix: String,
    pub machine_type: String,
}

/// The prefix table Illumina instrument serial numbers follow.
pub fn default_instrument_prefixes() -> Vec<InstrumentPrefix> {
    [
        ("M", "MiSeq"),
        ("D", "HiSeq 2500"),
        ("SN", "HiSeq 2000"),
        ("ST", "HiSeq X"),
        ("A", "NovaSeq"),
        ("NS", "NextSeq 500"),
        ("NB", "NextSeq 500 D"),
        ("NDX", "NextSeq 550 DX"),
        ("K", "HiSeq 4000"),
        ("FS", "ISeq 100"),
    ]
    .iter()
    .map(|&(prefix, machine_type)| InstrumentPrefix {
        prefix: prefix.to_string(),
        machine_type: machine_type.to_string(),
    })
    .collect()
}

impl RunInfo {
    /// Parse a `RunInfo.xml` file, failing if it is absent or if the
    /// instrument name or read list is missing.
    pub fn from_file(path: &Path) -> Result<RunInfo> {
        let xml = fs::read_to_string(path)?;
        let info: RunInfo =
            serde_xml_rs::from_str(&xml).map_err(|e| Error::RunInfoFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if info.run.instrument.is_empty() {
            return Err(Error::RunInfoFormat {
                path: path.to_path_buf(),
                message: "missing instrument name".to_string(),
            });
        }
        if info.run.reads.read.is_empty() {
            return Err(Error::RunInfoFormat {
                path: path.to_path_buf(),
                message: "missing read list".to_string(),
            });
        }
        Ok(info)
    }

    pub fn from_runfolder(runfolder: &Path) -> Result<RunInfo> {
        RunInfo::from_file(&runfolder.join(RUN_INFO_FILE))
    }

    /// Cycle count of each indexed read, keyed by read number, in document
    /// order.
    pub fn index_lengths(&self) -> BTreeMap<u64, u64> {
        self.run
            .reads
            .read
            .iter()
            .filter(|r| r.is_indexed_read)
            .map(|r| (r.number, r.num_cycles))
            .collect()
    }

    /// True iff fewer than two reads are non-indexed.
    pub fn is_single_read(&self) -> bool {
        self.run
            .reads
            .read
            .iter()
            .filter(|r| !r.is_indexed_read)
            .count()
            < 2
    }

    /// Derive the tool version to use from the instrument name: the first
    /// matching prefix decides the machine type, which `machine_versions`
    /// maps to a version. An instrument no prefix matches is a usage error.
    pub fn version_from_instrument(
        &self,
        prefixes: &[InstrumentPrefix],
        machine_versions: &BTreeMap<String, String>,
    ) -> Result<String> {
        let instrument = &self.run.instrument;
        let machine_type = prefixes
            .iter()
            .find(|p| instrument.starts_with(&p.prefix))
            .map(|p| &p.machine_type)
            .ok_or_else(|| {
                Error::usage(format!(
                    "instrument '{instrument}' does not match any known machine type prefix"
                ))
            })?;
        machine_versions.get(machine_type).cloned().ok_or_else(|| {
            Error::usage(format!(
                "no bcl-convert version configured for machine type '{machine_type}'"
            ))
        })
    }
}
