// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Parse Illumina samplesheets. Only the `[Data]` section is interpreted;
//! the Header/Reads/Settings sections before it are skipped over. Also holds
//! the helpers for swapping in a request-supplied samplesheet while keeping
//! a timestamped copy of the one already in the runfolder.

use crate::error::{Error, Result};
use chrono::Local;
use log::debug;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DATA_SECTION: &str = "[Data]";

/// One entry of the samplesheet `[Data]` section. Optional columns that are
/// absent from the header parse to `None`, which is distinct from a column
/// that is present but empty.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct SampleRow {
    pub lane: u32,
    pub sample_id: String,
    pub sample_name: String,
    pub sample_plate: Option<String>,
    pub sample_well: Option<String>,
    pub index1: String,
    pub index2: Option<String>,
    pub sample_project: Option<String>,
    pub description: Option<String>,
}

/// An ordered set of [`SampleRow`]s, immutable once parsed.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct SampleSheet {
    pub samples: Vec<SampleRow>,
}

impl SampleSheet {
    pub fn from_file(path: &Path) -> Result<SampleSheet> {
        let text = fs::read_to_string(path)?;
        SampleSheet::from_string(&text)
    }

    /// Scan to the `[Data]` marker, read the column header on the next line,
    /// then map every following non-empty line into a [`SampleRow`] by column
    /// name. Unrecognized columns are ignored.
    pub fn from_string(text: &str) -> Result<SampleSheet> {
        let mut lines = text.lines();

        for line in lines.by_ref() {
            if line.split(',').next().map(str::trim) == Some(DATA_SECTION) {
                break;
            }
        }

        let header = lines
            .next()
            .ok_or_else(|| Error::usage("samplesheet has no [Data] section"))?;
        let columns: HashMap<&str, usize> = header
            .split(',')
            .enumerate()
            .map(|(idx, name)| (name.trim(), idx))
            .collect();

        let mut samples = Vec::new();
        for line in lines {
            let fields: Vec<&str> = line.split(',').collect();
            if fields.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            samples.push(SampleRow::from_fields(&columns, &fields)?);
        }

        Ok(SampleSheet { samples })
    }
}

impl SampleRow {
    fn from_fields(columns: &HashMap<&str, usize>, fields: &[&str]) -> Result<SampleRow> {
        let required = |name: &str| -> Result<String> {
            columns
                .get(name)
                .and_then(|&idx| fields.get(idx))
                .map(|v| v.to_string())
                .ok_or_else(|| {
                    Error::usage(format!(
                        "samplesheet data row is missing required column '{}': {}",
                        name,
                        fields.join(",")
                    ))
                })
        };
        let optional = |name: &str| -> Option<String> {
            columns
                .get(name)
                .and_then(|&idx| fields.get(idx))
                .map(|v| v.to_string())
        };

        let lane = match optional("Lane").filter(|v| !v.is_empty()) {
            Some(v) => v.parse::<u32>().map_err(|_| {
                Error::usage(format!("samplesheet lane '{v}' is not a positive integer"))
            })?,
            None => 1,
        };

        Ok(SampleRow {
            lane,
            sample_id: required("Sample_ID")?,
            sample_name: required("Sample_Name")?,
            sample_plate: optional("Sample_Plate"),
            sample_well: optional("Sample_Well"),
            index1: required("index")?,
            index2: optional("index2"),
            sample_project: optional("Sample_Project"),
            description: optional("Description"),
        })
    }
}

/// Move an existing samplesheet aside, appending a timestamp to its name,
/// and return the archived path.
pub fn archive_samplesheet(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::usage(format!("invalid samplesheet path {path:?}")))?;
    let archived = path.with_file_name(format!(
        "{name}{}",
        Local::now().format("%Y%m%d-%H%M%S")
    ));
    fs::rename(path, &archived)?;
    debug!("archived samplesheet {:?} to {:?}", path, archived);
    Ok(archived)
}

/// Write a request-supplied samplesheet byte-for-byte.
pub fn write_samplesheet(text: &str, path: &Path) -> Result<()> {
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const TINY_SAMPLESHEET: &str = "\
,,,,,,,,
[Data],,,,,,,,
Lane,Sample_ID,Sample_Name,Sample_Plate,Sample_Well,I7_Index_ID,index,Sample_Project,Description
1,1,1,,,,CAGATC,Dummy-Project,LIBRARY_NAME:SX444_1
1,2,2,,,,ACTTGA,Dummy-Project,LIBRARY_NAME:SX444_2
";

    #[test]
    fn test_read_samples() {
        let sheet = SampleSheet::from_string(TINY_SAMPLESHEET).unwrap();
        let expected = vec![
            SampleRow {
                lane: 1,
                sample_id: "1".to_string(),
                sample_name: "1".to_string(),
                sample_plate: Some(String::new()),
                sample_well: Some(String::new()),
                index1: "CAGATC".to_string(),
                index2: None,
                sample_project: Some("Dummy-Project".to_string()),
                description: Some("LIBRARY_NAME:SX444_1".to_string()),
            },
            SampleRow {
                lane: 1,
                sample_id: "2".to_string(),
                sample_name: "2".to_string(),
                sample_plate: Some(String::new()),
                sample_well: Some(String::new()),
                index1: "ACTTGA".to_string(),
                index2: None,
                sample_project: Some("Dummy-Project".to_string()),
                description: Some("LIBRARY_NAME:SX444_2".to_string()),
            },
        ];
        assert_eq!(sheet.samples, expected);
    }

    #[test]
    fn test_samplerow_defaults() {
        // Columns absent from the header parse to None, and lane defaults to 1.
        let sheet = SampleSheet::from_string(
            "[Data]\nSample_ID,Sample_Name,index,Sample_Project\n1,1,CAGATC,Dummy-Project\n",
        )
        .unwrap();
        let row = &sheet.samples[0];
        assert_eq!(row.lane, 1);
        assert_eq!(row.sample_plate, None);
        assert_eq!(row.sample_well, None);
        assert_eq!(row.index2, None);
        assert_eq!(row.description, None);
    }

    #[test]
    fn test_no_data_section() {
        let err = SampleSheet::from_string("[Header]\nfoo,bar\n").unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_row_missing_required_column() {
        let err = SampleSheet::from_string("[Data]\nLane,Sample_ID,Sample_Name,index\n1,sample\n")
            .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_bad_lane() {
        let err =
            SampleSheet::from_string("[Data]\nLane,Sample_ID,Sample_Name,index\nX,s,s,ACGT\n")
                .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_write_and_archive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SampleSheet.csv");

        write_samplesheet(TINY_SAMPLESHEET, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), TINY_SAMPLESHEET);

        // Replacing the sheet keeps a timestamped copy of the old one.
        let archived = archive_samplesheet(&path).unwrap();
        write_samplesheet("replacement", &path).unwrap();
        assert_eq!(fs::read_to_string(&archived).unwrap(), TINY_SAMPLESHEET);
        assert_eq!(fs::read_to_string(&path).unwrap(), "replacement");
        assert!(archived
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("SampleSheet.csv2"));
    }
}
