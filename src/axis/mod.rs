// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Separation axes, and deciding whether a transformation can be applied to
//! the parts of an already-partitioned dataset independently.


use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hifitime::{Duration, Epoch};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    plan::PlanError,
    selection::{SelectionError, SelectionResolver},
};

/// The dimension along which a dataset is split into independently
/// processable parts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum SeparationAxis {
    #[strum(to_string = "scan")]
    #[serde(rename = "scan")]
    Scan,

    #[strum(to_string = "spw")]
    #[serde(rename = "spw")]
    Spw,

    #[strum(to_string = "scan,spw", serialize = "auto", serialize = "both")]
    #[serde(rename = "scan,spw", alias = "auto", alias = "both")]
    ScanSpw,
}

impl SeparationAxis {
    pub fn includes_spw(self) -> bool {
        matches!(self, SeparationAxis::Spw | SeparationAxis::ScanSpw)
    }
}

/// Time averaging requested of a transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAverage {
    pub bin: Duration,

    /// Do averages cross scan boundaries?
    pub span_scans: bool,
}

/// The parts of a requested transformation that matter for partitioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub combine_spws: bool,

    /// The number of spws to separate each input spw into.
    pub nspw: u32,

    pub time_average: Option<TimeAverage>,
}

impl Default for Transform {
    fn default() -> Transform {
        Transform {
            combine_spws: false,
            nspw: 1,
            time_average: None,
        }
    }
}

impl Transform {
    /// Does this transformation combine or redistribute spws?
    pub fn redistributes_spws(&self) -> bool {
        self.combine_spws || self.nspw > 1
    }

    /// The averaging bin, if this transformation averages across scans.
    pub fn scan_spanning_bin(&self) -> Option<Duration> {
        match self.time_average {
            Some(TimeAverage {
                bin,
                span_scans: true,
            }) => Some(bin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisDecision {
    /// Each part can be transformed on its own.
    Proceed,

    /// The output must be treated as separated along this axis instead.
    FallBackAxis(SeparationAxis),

    /// The dataset must be processed as a single unit.
    Reject,
}

/// What one part of a partitioned dataset holds.
#[derive(Debug, Clone, PartialEq)]
pub struct PartSummary {
    pub path: PathBuf,
    pub spws: BTreeSet<u32>,

    /// The first and last row time of each scan.
    pub scan_times: BTreeMap<u32, (Epoch, Epoch)>,
}

impl PartSummary {
    /// The time between the earliest and latest rows belonging to the given
    /// scans. Zero if the part has none of them.
    pub fn time_span(&self, scans: &BTreeSet<u32>) -> Duration {
        let mut span: Option<(Epoch, Epoch)> = None;
        for (_, &(first, last)) in self.scan_times.iter().filter(|(s, _)| scans.contains(*s)) {
            span = Some(match span {
                None => (first, last),
                Some((min, max)) => (
                    if first < min { first } else { min },
                    if last > max { last } else { max },
                ),
            });
        }
        match span {
            Some((min, max)) => max - min,
            None => Duration::from_seconds(0.0),
        }
    }
}

/// Summarise the parts of a partitioned dataset.
pub fn summarise_parts(
    resolver: &SelectionResolver,
    parts: &[PathBuf],
) -> Result<Vec<PartSummary>, SelectionError> {
    parts
        .iter()
        .map(|part| summarise_part(resolver, part))
        .collect()
}

fn summarise_part(resolver: &SelectionResolver, part: &Path) -> Result<PartSummary, SelectionError> {
    let index = resolver.index(part)?;
    let mut spws = BTreeSet::new();
    let mut scan_times: BTreeMap<u32, (Epoch, Epoch)> = BTreeMap::new();
    for row in &index.rows {
        if let Some(spw) = index.spw_of(row.ddid) {
            spws.insert(spw);
        }
        scan_times
            .entry(row.scan)
            .and_modify(|(first, last)| {
                if row.time < *first {
                    *first = row.time;
                }
                if row.time > *last {
                    *last = row.time;
                }
            })
            .or_insert((row.time, row.time));
    }
    Ok(PartSummary {
        path: part.to_path_buf(),
        spws,
        scan_times,
    })
}

/// Decide whether `transform` can be applied to each of `parts` on its own.
///
/// * If spws are combined or redistributed, every part must contain every
///   selected spw; otherwise the output must be separated by scan.
/// * If time averaging spans scans, the selected scans of every part must span
///   at least the averaging bin; otherwise the output must be separated by
///   spw.
/// * If both are requested and both checks fail, there is no safe axis. If
///   only one fails, fall back to the axis of the check that passed.
pub fn validate_axis(
    existing_axis: SeparationAxis,
    parts: &[PartSummary],
    transform: &Transform,
    selected_spws: &BTreeSet<u32>,
    selected_scans: &BTreeSet<u32>,
) -> AxisDecision {
    debug!(
        "Validating {} parts separated by '{existing_axis}' against {transform:?}",
        parts.len()
    );

    let spw_check = transform.redistributes_spws().then(|| {
        match parts.iter().find(|p| !selected_spws.is_subset(&p.spws)) {
            Some(p) => {
                warn!(
                    "Cannot combine or separate spws in parallel because {} does not contain all the selected spws",
                    p.path.display()
                );
                false
            }
            None => true,
        }
    });

    let time_check = transform.scan_spanning_bin().map(|bin| {
        match parts.iter().find(|p| p.time_span(selected_scans) < bin) {
            Some(p) => {
                warn!(
                    "Cannot average across scans in parallel because the selected scans of {} span less than {bin}",
                    p.path.display()
                );
                false
            }
            None => true,
        }
    });

    match (spw_check, time_check) {
        (Some(false), Some(false)) => AxisDecision::Reject,
        (Some(false), _) => AxisDecision::FallBackAxis(SeparationAxis::Scan),
        (_, Some(false)) => AxisDecision::FallBackAxis(SeparationAxis::Spw),
        _ => AxisDecision::Proceed,
    }
}

/// Check that a new multi-part output separated along `axis` can hold the
/// output of `transform`.
pub fn validate_output_axis(axis: SeparationAxis, transform: &Transform) -> Result<(), PlanError> {
    if axis != SeparationAxis::Scan && transform.redistributes_spws() {
        return Err(PlanError::SpwRedistributionNeedsScanAxis { axis });
    }
    if axis != SeparationAxis::Spw && transform.scan_spanning_bin().is_some() {
        warn!("Time averaging across scans may lead to wrong results when the separation axis is not spw");
    }
    Ok(())
}
