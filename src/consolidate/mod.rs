// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning the partitions created by jobs into a multi-part dataset.
//!
//! The consolidated dataset is a directory holding a manifest and the
//! partitions under [`SUBMS_DIR`]. The first surviving partition is the
//! "master"; the other partitions share its sub-tables.

mod error;
mod merge;

pub use error::ConsolidateError;

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use regex::Regex;
use vec1::Vec1;

use crate::{
    axis::SeparationAxis,
    constants::{LINKED_SUBTABLES, SUBMS_DIR},
    exec::JobResults,
    plan::{PartitionPlan, PartitionSpec},
    store::{DatasetStore, Manifest, SpwTables},
};

lazy_static::lazy_static! {
    static ref PARTITION_NAME: Regex = Regex::new(r"^(.*)\.(\d{4})\.([^.]+)$").unwrap();
}

/// The result of consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedDataset {
    pub path: PathBuf,
    pub axis: SeparationAxis,

    /// The members, in order.
    pub members: Vec1<PathBuf>,

    /// Planned partitions that weren't created.
    pub failed: Vec<PathBuf>,
}

pub struct ConsolidationEngine<'a> {
    store: &'a dyn DatasetStore,
}

impl<'a> ConsolidationEngine<'a> {
    pub fn new(store: &'a dyn DatasetStore) -> ConsolidationEngine<'a> {
        ConsolidationEngine { store }
    }

    /// Consolidate the partitions of `plan` that `results` says were
    /// created. Failed partitions are reported in the result but are not an
    /// error unless no partition was created.
    ///
    /// Survivors stay in the staging directory until their new names and
    /// merged spw tables are known, and are moved back if moving any of them
    /// fails; consolidation can be run again after those errors. Errors after
    /// all survivors were moved leave them in the consolidated dataset.
    pub fn consolidate(
        &self,
        plan: &PartitionPlan,
        results: &JobResults,
    ) -> Result<ConsolidatedDataset, ConsolidateError> {
        if plan.output == plan.staging_dir {
            return Err(ConsolidateError::OutputIsStagingDir(plan.output.clone()));
        }

        let planned: HashSet<&Path> = plan.partitions.iter().map(|p| p.output.as_path()).collect();
        for path in results.keys() {
            if !planned.contains(path.as_path()) {
                warn!("Ignoring the result of unplanned output {}", path.display());
            }
        }

        // Partitions are already in index order.
        let (survivors, failures): (Vec<&PartitionSpec>, Vec<&PartitionSpec>) = plan
            .partitions
            .iter()
            .partition(|p| results.get(&p.output).copied().unwrap_or(false));

        for failure in &failures {
            warn!("Partition {} was not created", failure.output.display());
            self.store.remove_dataset(&failure.output)?;
        }
        if survivors.is_empty() {
            return Err(ConsolidateError::NoSuccessfulPartitions {
                attempted: plan.partitions.len(),
            });
        }

        // Survivors are renumbered if there are gaps.
        let subms_dir = plan.output.join(SUBMS_DIR);
        let members = survivors
            .iter()
            .enumerate()
            .map(|(new_index, survivor)| {
                let name = if failures.is_empty() {
                    file_name(&survivor.output)?
                } else {
                    renumbered_name(&survivor.output, new_index)?
                };
                Ok(subms_dir.join(name))
            })
            .collect::<Result<Vec<_>, ConsolidateError>>()?;

        let needs_merge =
            plan.merge_spw_tables && survivors.iter().all(|s| s.id_start.is_some());
        let merged = if needs_merge {
            Some(self.merge_spw_tables(&survivors)?)
        } else {
            None
        };

        if plan.output.exists() {
            info!("Replacing {}", plan.output.display());
            self.store.remove_dataset(&plan.output)?;
        }
        self.move_survivors(plan, &survivors, &members)?;

        if let Some(merged) = merged {
            self.store.write_spw_tables(&members[0], &merged)?;
        }
        self.share_subtables(&members)?;

        let manifest = Manifest {
            axis: plan.axis,
            members: members
                .iter()
                .map(|m| Path::new(SUBMS_DIR).join(m.file_name().unwrap_or_default()))
                .collect(),
        };
        self.store.write_manifest(&plan.output, &manifest)?;

        if let Err(e) = fs::remove_dir(&plan.staging_dir) {
            warn!(
                "Couldn't remove the staging directory {}: {e}",
                plan.staging_dir.display()
            );
        }

        let failed: Vec<PathBuf> = failures.iter().map(|f| f.output.clone()).collect();
        info!(
            "Consolidated {} of {} partitions into {} (separated by '{}')",
            members.len(),
            plan.partitions.len(),
            plan.output.display(),
            plan.axis
        );
        Ok(ConsolidatedDataset {
            path: plan.output.clone(),
            axis: plan.axis,
            // Not empty; there's at least one survivor.
            members: Vec1::try_from_vec(members).map_err(|_| {
                ConsolidateError::NoSuccessfulPartitions {
                    attempted: plan.partitions.len(),
                }
            })?,
            failed,
        })
    }

    /// Merge the spw tables of all survivors.
    fn merge_spw_tables(
        &self,
        survivors: &[&PartitionSpec],
    ) -> Result<SpwTables, ConsolidateError> {
        let mut parts = Vec::with_capacity(survivors.len());
        for survivor in survivors {
            let tables = self.store.read_spw_tables(&survivor.output)?;
            parts.push((survivor.output.clone(), survivor.id_start.unwrap_or(0), tables));
        }
        let merged = merge::merge_spw_tables(&parts)?;
        debug!(
            "Merged spw tables have {} spws and {} data descriptions",
            merged.spws.len(),
            merged.dds.len()
        );
        Ok(merged)
    }

    /// Move survivors to their members. If a move fails, the survivors moved
    /// so far are put back and the partial output is removed.
    fn move_survivors(
        &self,
        plan: &PartitionPlan,
        survivors: &[&PartitionSpec],
        members: &[PathBuf],
    ) -> Result<(), ConsolidateError> {
        for (i, (survivor, member)) in survivors.iter().zip(members).enumerate() {
            let e = match self.store.move_dataset(&survivor.output, member) {
                Ok(()) => continue,
                Err(e) => e,
            };
            warn!(
                "Couldn't move {}; putting the partitions back in {}",
                survivor.output.display(),
                plan.staging_dir.display()
            );
            for (moved, member) in survivors[..i].iter().zip(members) {
                if let Err(e) = self.store.move_dataset(member, &moved.output) {
                    warn!(
                        "Couldn't move {} back to {}: {e}",
                        member.display(),
                        moved.output.display()
                    );
                }
            }
            if let Err(e) = self.store.remove_dataset(&plan.output) {
                warn!("Couldn't remove {}: {e}", plan.output.display());
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Give every member the master's sub-tables.
    fn share_subtables(&self, members: &[PathBuf]) -> Result<(), ConsolidateError> {
        let (master, others) = match members.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        let subtables = self.store.list_subtables(master)?;
        debug!(
            "Sharing sub-tables {subtables:?} of {} with {} other members",
            master.display(),
            others.len()
        );
        for member in others {
            for subtable in &subtables {
                if LINKED_SUBTABLES.contains(&subtable.as_str()) {
                    self.store.link_subtable(master, member, subtable)?;
                } else {
                    self.store.copy_subtable(master, member, subtable)?;
                }
            }
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> Result<String, ConsolidateError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ConsolidateError::BadPartitionName(path.to_path_buf()))
}

/// Replace the four-digit index of a partition's name.
fn renumbered_name(path: &Path, index: usize) -> Result<String, ConsolidateError> {
    let name = file_name(path)?;
    let caps = PARTITION_NAME
        .captures(&name)
        .ok_or_else(|| ConsolidateError::BadPartitionName(path.to_path_buf()))?;
    Ok(format!("{}.{index:04}.{}", &caps[1], &caps[3]))
}
