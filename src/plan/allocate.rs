// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Allocation of the first data description ID of each partition.
//!
//! Partitions along the spw axis each get their own DATA_DESCRIPTION table.
//! For the main tables of the partitions to agree with a merged
//! DATA_DESCRIPTION table, partition `p` numbers its data descriptions from
//! the total number of distinct data descriptions of the partitions before
//! it.

use std::{collections::BTreeMap, path::Path};

use log::debug;

use crate::selection::{ScanSelection, SelectionError, SelectionExpr, SelectionResolver, SpwSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub spw_group: usize,

    /// `None` when only separating by spw.
    pub scan_group: Option<usize>,

    pub id_start: u32,
    pub dd_count: u32,
}

/// Allocate the first data description ID of every non-null combination of
/// spw and scan groups. Spw groups are visited in the outer loop, scan groups
/// in the inner loop. If there are no scan groups, the scans of `base` are
/// used with every spw group.
///
/// Combinations that select no data are skipped and don't advance the count.
pub fn allocate_id_starts(
    resolver: &SelectionResolver,
    dataset: &Path,
    base: &SelectionExpr,
    scan_groups: &BTreeMap<usize, ScanSelection>,
    spw_groups: &BTreeMap<usize, SpwSelection>,
) -> Result<Vec<Allocation>, SelectionError> {
    let scan_groups: Vec<(Option<usize>, &ScanSelection)> = if scan_groups.is_empty() {
        vec![(None, &base.scan)]
    } else {
        scan_groups.iter().map(|(&i, s)| (Some(i), s)).collect()
    };

    let mut allocations = vec![];
    let mut total = 0;
    for (&spw_group, spw) in spw_groups {
        for &(scan_group, scan) in &scan_groups {
            let expr = base.with_scans_and_spws(scan.clone(), spw.clone());
            let dd_count = resolver.resolve(dataset, &expr)?.ddids.len() as u32;
            if dd_count == 0 {
                debug!("Ignoring the null combination of scan='{scan}' and spw='{spw}'");
                continue;
            }

            allocations.push(Allocation {
                spw_group,
                scan_group,
                id_start: total,
                dd_count,
            });
            total += dd_count;
        }
    }

    Ok(allocations)
}
