// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to interface with CASA measurement sets.
//!
//! More info: https://casa.nrao.edu/Memos/229.html#SECTION00060000000000000000

use std::path::Path;

use hifitime::Epoch;
use log::{debug, trace};
use marlu::rubbl_casatables;
use rubbl_casatables::{Table, TableOpenMode};

use super::{DatasetIndex, DatasetStore, DdRow, RowKey, SpwRow, SpwTables, StoreError};

/// A [`DatasetStore`] for measurement sets on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsStore;

/// Open a measurement set table. If `table` is `None`, then open the base
/// table.
fn open_table(ms: &Path, table: Option<&str>, mode: TableOpenMode) -> Result<Table, StoreError> {
    let t = Table::open(format!("{}/{}", ms.display(), table.unwrap_or("")), mode)?;
    Ok(t)
}

fn to_index(value: i32, table: &str, column: &'static str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::NegativeIndex {
        table: table.to_string(),
        column,
        value,
    })
}

fn read_id_col(table: &mut Table, table_name: &str, column: &'static str) -> Result<Vec<u32>, StoreError> {
    let values: Vec<i32> = table.get_col_as_vec(column)?;
    values
        .into_iter()
        .map(|v| to_index(v, table_name, column))
        .collect()
}

impl MsStore {
    fn read_single_index(&self, ms: &Path) -> Result<DatasetIndex, StoreError> {
        let mut main_table = open_table(ms, None, TableOpenMode::Read)?;
        if main_table.n_rows() == 0 {
            return Err(StoreError::MainTableEmpty(ms.to_path_buf()));
        }
        let scans = read_id_col(&mut main_table, "MAIN", "SCAN_NUMBER")?;
        let ddids = read_id_col(&mut main_table, "MAIN", "DATA_DESC_ID")?;
        let fields = read_id_col(&mut main_table, "MAIN", "FIELD_ID")?;
        let utc_times: Vec<f64> = main_table.get_col_as_vec("TIME")?;
        let rows = scans
            .into_iter()
            .zip(ddids)
            .zip(fields)
            .zip(utc_times)
            .map(|(((scan, ddid), field), utc_time)| RowKey {
                scan,
                ddid,
                field,
                // casacore stores the times as UTC seconds... but with an
                // offset.
                time: Epoch::from_utc_seconds(
                    utc_time - hifitime::J1900_OFFSET * hifitime::SECONDS_PER_DAY,
                ),
            })
            .collect::<Vec<_>>();
        trace!("Read {} main-table rows from {}", rows.len(), ms.display());

        let mut dd_table = open_table(ms, Some("DATA_DESCRIPTION"), TableOpenMode::Read)?;
        let dd_spws = read_id_col(&mut dd_table, "DATA_DESCRIPTION", "SPECTRAL_WINDOW_ID")?;

        let mut spw_table = open_table(ms, Some("SPECTRAL_WINDOW"), TableOpenMode::Read)?;
        let spw_num_chans = read_id_col(&mut spw_table, "SPECTRAL_WINDOW", "NUM_CHAN")?;

        let mut field_table = open_table(ms, Some("FIELD"), TableOpenMode::Read)?;
        let field_names: Vec<String> = field_table.get_col_as_vec("NAME")?;

        Ok(DatasetIndex {
            rows,
            dd_spws,
            spw_num_chans,
            field_names,
        })
    }
}

impl DatasetStore for MsStore {
    fn read_index(&self, dataset: &Path) -> Result<DatasetIndex, StoreError> {
        if !dataset.exists() {
            return Err(StoreError::BadDataset(dataset.to_path_buf()));
        }

        match self.read_manifest(dataset)? {
            None => self.read_single_index(dataset),
            Some(manifest) => {
                debug!(
                    "{} is a multi-part dataset with {} members",
                    dataset.display(),
                    manifest.members.len()
                );
                if manifest.members.is_empty() {
                    return Err(StoreError::NoMembers(dataset.to_path_buf()));
                }
                let mut index = DatasetIndex::default();
                for member in &manifest.members {
                    index.append(self.read_single_index(&dataset.join(member))?);
                }
                Ok(index)
            }
        }
    }

    fn read_spw_tables(&self, dataset: &Path) -> Result<SpwTables, StoreError> {
        let mut spw_table = open_table(dataset, Some("SPECTRAL_WINDOW"), TableOpenMode::Read)?;
        let mut spws = Vec::with_capacity(spw_table.n_rows() as usize);
        for i_row in 0..spw_table.n_rows() {
            let num_chan: i32 = spw_table.get_cell("NUM_CHAN", i_row)?;
            spws.push(SpwRow {
                name: spw_table.get_cell("NAME", i_row)?,
                ref_frequency: spw_table.get_cell("REF_FREQUENCY", i_row)?,
                num_chan: to_index(num_chan, "SPECTRAL_WINDOW", "NUM_CHAN")?,
                chan_freq: spw_table.get_cell_as_vec("CHAN_FREQ", i_row)?,
                chan_width: spw_table.get_cell_as_vec("CHAN_WIDTH", i_row)?,
                effective_bw: spw_table.get_cell_as_vec("EFFECTIVE_BW", i_row)?,
                resolution: spw_table.get_cell_as_vec("RESOLUTION", i_row)?,
                total_bandwidth: spw_table.get_cell("TOTAL_BANDWIDTH", i_row)?,
                meas_freq_ref: spw_table.get_cell("MEAS_FREQ_REF", i_row)?,
                net_sideband: spw_table.get_cell("NET_SIDEBAND", i_row)?,
                flag_row: spw_table.get_cell("FLAG_ROW", i_row)?,
            });
        }

        let mut dd_table = open_table(dataset, Some("DATA_DESCRIPTION"), TableOpenMode::Read)?;
        let mut dds = Vec::with_capacity(dd_table.n_rows() as usize);
        for i_row in 0..dd_table.n_rows() {
            let spw_id: i32 = dd_table.get_cell("SPECTRAL_WINDOW_ID", i_row)?;
            let polarization_id: i32 = dd_table.get_cell("POLARIZATION_ID", i_row)?;
            dds.push(DdRow {
                spw_id: to_index(spw_id, "DATA_DESCRIPTION", "SPECTRAL_WINDOW_ID")?,
                polarization_id: to_index(polarization_id, "DATA_DESCRIPTION", "POLARIZATION_ID")?,
                flag_row: dd_table.get_cell("FLAG_ROW", i_row)?,
            });
        }

        Ok(SpwTables { spws, dds })
    }

    fn write_spw_tables(&self, dataset: &Path, tables: &SpwTables) -> Result<(), StoreError> {
        let mut spw_table =
            open_table(dataset, Some("SPECTRAL_WINDOW"), TableOpenMode::ReadWrite)?;
        grow_table(&mut spw_table, dataset, "SPECTRAL_WINDOW", tables.spws.len())?;
        for (i_row, spw) in tables.spws.iter().enumerate() {
            let i_row = i_row as u64;
            spw_table.put_cell("NAME", i_row, &spw.name)?;
            spw_table.put_cell("REF_FREQUENCY", i_row, &spw.ref_frequency)?;
            spw_table.put_cell("NUM_CHAN", i_row, &(spw.num_chan as i32))?;
            spw_table.put_cell("CHAN_FREQ", i_row, &spw.chan_freq)?;
            spw_table.put_cell("CHAN_WIDTH", i_row, &spw.chan_width)?;
            spw_table.put_cell("EFFECTIVE_BW", i_row, &spw.effective_bw)?;
            spw_table.put_cell("RESOLUTION", i_row, &spw.resolution)?;
            spw_table.put_cell("TOTAL_BANDWIDTH", i_row, &spw.total_bandwidth)?;
            spw_table.put_cell("MEAS_FREQ_REF", i_row, &spw.meas_freq_ref)?;
            spw_table.put_cell("NET_SIDEBAND", i_row, &spw.net_sideband)?;
            spw_table.put_cell("FLAG_ROW", i_row, &spw.flag_row)?;
        }

        let mut dd_table =
            open_table(dataset, Some("DATA_DESCRIPTION"), TableOpenMode::ReadWrite)?;
        grow_table(&mut dd_table, dataset, "DATA_DESCRIPTION", tables.dds.len())?;
        for (i_row, dd) in tables.dds.iter().enumerate() {
            let i_row = i_row as u64;
            dd_table.put_cell("SPECTRAL_WINDOW_ID", i_row, &(dd.spw_id as i32))?;
            dd_table.put_cell("POLARIZATION_ID", i_row, &(dd.polarization_id as i32))?;
            dd_table.put_cell("FLAG_ROW", i_row, &dd.flag_row)?;
        }

        debug!(
            "Wrote {} spectral windows and {} data descriptions to {}",
            tables.spws.len(),
            tables.dds.len(),
            dataset.display()
        );
        Ok(())
    }
}

fn grow_table(
    table: &mut Table,
    dataset: &Path,
    name: &'static str,
    want: usize,
) -> Result<(), StoreError> {
    let have = table.n_rows() as usize;
    if want < have {
        return Err(StoreError::TableShrink {
            dataset: dataset.to_path_buf(),
            table: name,
            have,
            want,
        });
    }
    if want > have {
        table.add_rows(want - have)?;
    }
    Ok(())
}
