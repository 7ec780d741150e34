// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests.
//!
//! [`FakeStore`] is a [`DatasetStore`] whose datasets are directories holding
//! JSON files rather than casacore tables. Everything about a fake dataset
//! lives inside its directory, so the file-system operations provided by
//! [`DatasetStore`] work on it unchanged.

use std::{
    cell::Cell,
    fs,
    path::{Path, PathBuf},
};

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::store::{DatasetIndex, DatasetStore, DdRow, RowKey, SpwRow, SpwTables, StoreError};

const INDEX_FILE: &str = "index.json";
/// Spw tables are kept in a sub-table so that they're shared like real ones.
const SPW_TABLES_FILE: &str = "SPECTRAL_WINDOW/tables.json";

/// Sub-tables that every fake dataset gets.
pub(crate) const FAKE_SUBTABLES: [&str; 5] =
    ["ANTENNA", "FIELD", "POINTING", "SPECTRAL_WINDOW", "SYSCAL"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct FakeRow {
    pub(crate) scan: u32,
    pub(crate) ddid: u32,
    pub(crate) field: u32,
    pub(crate) gps_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct FakeDataset {
    pub(crate) rows: Vec<FakeRow>,
    pub(crate) dd_spws: Vec<u32>,
    pub(crate) spw_num_chans: Vec<u32>,
    pub(crate) field_names: Vec<String>,
}

impl FakeDataset {
    /// A dataset with one data description per spw and `rows_per_combo` rows
    /// for every scan and spw combination, except those listed in `nulls`.
    /// Rows of scan `s` are timestamped `1000 * s + k` GPS seconds.
    pub(crate) fn grid(
        scans: &[u32],
        num_spws: u32,
        nulls: &[(u32, u32)],
        rows_per_combo: u32,
    ) -> FakeDataset {
        let mut rows = vec![];
        for &scan in scans {
            for spw in 0..num_spws {
                if nulls.contains(&(scan, spw)) {
                    continue;
                }
                for k in 0..rows_per_combo {
                    rows.push(FakeRow {
                        scan,
                        ddid: spw,
                        field: 0,
                        gps_seconds: 1000.0 * scan as f64 + k as f64,
                    });
                }
            }
        }
        FakeDataset {
            rows,
            dd_spws: (0..num_spws).collect(),
            spw_num_chans: vec![64; num_spws as usize],
            field_names: vec!["3C286".to_string()],
        }
    }

    fn into_index(self) -> DatasetIndex {
        DatasetIndex {
            rows: self
                .rows
                .into_iter()
                .map(|r| RowKey {
                    scan: r.scan,
                    ddid: r.ddid,
                    field: r.field,
                    time: Epoch::from_gpst_seconds(r.gps_seconds),
                })
                .collect(),
            dd_spws: self.dd_spws,
            spw_num_chans: self.spw_num_chans,
            field_names: self.field_names,
        }
    }
}

pub(crate) fn spw_row(i: u32) -> SpwRow {
    let ref_frequency = 1.0e9 + i as f64 * 1.0e6;
    SpwRow {
        name: format!("SPW{i}"),
        ref_frequency,
        num_chan: 4,
        chan_freq: (0..4).map(|c| ref_frequency + c as f64 * 250e3).collect(),
        chan_width: vec![250e3; 4],
        effective_bw: vec![250e3; 4],
        resolution: vec![250e3; 4],
        total_bandwidth: 1e6,
        meas_freq_ref: 5,
        net_sideband: 1,
        flag_row: false,
    }
}

/// The spw sub-tables of a dataset holding the given spws, one data
/// description each.
pub(crate) fn spw_tables(spws: &[u32]) -> SpwTables {
    SpwTables {
        spws: spws.iter().map(|&i| spw_row(i)).collect(),
        dds: (0..spws.len() as u32)
            .map(|spw_id| DdRow {
                spw_id,
                polarization_id: 0,
                flag_row: false,
            })
            .collect(),
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    /// How many times an index has been read.
    pub(crate) index_reads: Cell<usize>,
}

impl FakeStore {
    pub(crate) fn new() -> FakeStore {
        FakeStore::default()
    }

    /// Create a fake dataset on disk.
    pub(crate) fn create(&self, path: &Path, dataset: &FakeDataset, tables: &SpwTables) {
        fs::create_dir_all(path).unwrap();
        for subtable in FAKE_SUBTABLES {
            let dir = path.join(subtable);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("table.dat"), subtable).unwrap();
        }
        fs::write(
            path.join(INDEX_FILE),
            serde_json::to_string(dataset).unwrap(),
        )
        .unwrap();
        fs::write(
            path.join(SPW_TABLES_FILE),
            serde_json::to_string(tables).unwrap(),
        )
        .unwrap();
    }
}

impl DatasetStore for FakeStore {
    fn read_index(&self, dataset: &Path) -> Result<DatasetIndex, StoreError> {
        self.index_reads.set(self.index_reads.get() + 1);
        if let Some(manifest) = self.read_manifest(dataset)? {
            let mut index = DatasetIndex::default();
            for member in manifest.members {
                index.append(self.read_index(&dataset.join(member))?);
            }
            return Ok(index);
        }

        let contents = fs::read_to_string(dataset.join(INDEX_FILE))
            .map_err(|_| StoreError::BadDataset(dataset.to_path_buf()))?;
        let fake: FakeDataset = serde_json::from_str(&contents)
            .map_err(|_| StoreError::BadDataset(dataset.to_path_buf()))?;
        Ok(fake.into_index())
    }

    fn read_spw_tables(&self, dataset: &Path) -> Result<SpwTables, StoreError> {
        let contents = fs::read_to_string(dataset.join(SPW_TABLES_FILE))?;
        serde_json::from_str(&contents).map_err(|_| StoreError::BadDataset(dataset.to_path_buf()))
    }

    fn write_spw_tables(&self, dataset: &Path, tables: &SpwTables) -> Result<(), StoreError> {
        let have = self.read_spw_tables(dataset)?;
        if tables.dds.len() < have.dds.len() {
            return Err(StoreError::TableShrink {
                dataset: dataset.to_path_buf(),
                table: "DATA_DESCRIPTION",
                have: have.dds.len(),
                want: tables.dds.len(),
            });
        }
        let contents = serde_json::to_string(tables)
            .map_err(|_| StoreError::BadDataset(dataset.to_path_buf()))?;
        fs::write(dataset.join(SPW_TABLES_FILE), contents)?;
        Ok(())
    }
}

/// Paths of `n` partition outputs in a staging directory, in the same form as
/// planned outputs.
pub(crate) fn partition_paths(staging: &Path, stem: &str, n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| staging.join(format!("{stem}.{i:04}.ms")))
        .collect()
}
