// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Merging the spectral window and data description tables of partitions.

use std::path::PathBuf;

use log::{debug, trace};

use super::ConsolidateError;
use crate::store::{DdRow, SpwTables};

/// Data description placeholder for IDs that belonged to partitions that
/// weren't created.
const PLACEHOLDER_DD: DdRow = DdRow {
    spw_id: 0,
    polarization_id: 0,
    flag_row: true,
};

/// Merge the tables of partitions, each given with the first data description
/// ID it was assigned. Identical spectral windows are stored once. Local data
/// description `j` of a partition becomes `id_start + j`.
pub(super) fn merge_spw_tables(
    parts: &[(PathBuf, u32, SpwTables)],
) -> Result<SpwTables, ConsolidateError> {
    let mut merged = SpwTables::default();
    let mut dds: Vec<Option<DdRow>> = vec![];

    for (path, id_start, tables) in parts {
        // Where each of this partition's spws went.
        let spw_map: Vec<u32> = tables
            .spws
            .iter()
            .map(|spw| match merged.spws.iter().position(|m| m == spw) {
                Some(i) => i as u32,
                None => {
                    merged.spws.push(spw.clone());
                    merged.spws.len() as u32 - 1
                }
            })
            .collect();

        for (j, dd) in tables.dds.iter().enumerate() {
            let id = id_start + j as u32;
            let slot = id as usize;
            if dds.len() <= slot {
                dds.resize(slot + 1, None);
            }
            if dds[slot].is_some() {
                return Err(ConsolidateError::DdOverlap {
                    id,
                    partition: path.clone(),
                });
            }
            let spw_id = spw_map
                .get(dd.spw_id as usize)
                .copied()
                .unwrap_or(dd.spw_id);
            trace!("{}: DD {j} -> {id} (spw {} -> {spw_id})", path.display(), dd.spw_id);
            dds[slot] = Some(DdRow { spw_id, ..*dd });
        }
    }

    let num_placeholders = dds.iter().filter(|dd| dd.is_none()).count();
    if num_placeholders > 0 {
        debug!("Filling {num_placeholders} data description gaps left by missing partitions");
    }
    merged.dds = dds
        .into_iter()
        .map(|dd| dd.unwrap_or(PLACEHOLDER_DD))
        .collect();
    Ok(merged)
}
