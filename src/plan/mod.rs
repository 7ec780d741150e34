// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Planning the partitions of a dataset and the jobs that create them.

mod allocate;
mod error;

pub use allocate::{allocate_id_starts, Allocation};
pub use error::PlanError;

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vec1::Vec1;

use crate::{
    axis::{validate_output_axis, SeparationAxis, Transform},
    constants::*,
    partition::{reattach_channel_ranges, split_indexed, split_list},
    selection::{ResolvedSelection, ScanSelection, SelectionExpr, SelectionResolver, SpwSelection},
};

/// A task parameter with one value per selected spw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerSpwParam {
    pub name: String,
    pub values: Vec<Value>,
}

/// Everything needed to plan the partitioning of a dataset.
#[derive(Debug, Clone)]
pub struct PartitionRequest {
    pub input: PathBuf,
    pub output: PathBuf,

    /// The name of the task that creates each partition.
    pub task: String,

    pub selection: SelectionExpr,
    pub axis: SeparationAxis,
    pub num_partitions: usize,
    pub per_spw_param: Option<PerSpwParam>,

    /// Parameters given to the task unchanged, unless overridden per
    /// partition.
    pub params: BTreeMap<String, Value>,

    /// Replace an existing output.
    pub overwrite: bool,

    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub index: usize,

    /// The dataset this partition is made from.
    pub input: PathBuf,

    pub scan: ScanSelection,
    pub spw: SpwSelection,

    /// The first data description ID of this partition in the consolidated
    /// dataset. Only set when separating by spw.
    pub id_start: Option<u32>,

    /// The number of distinct data descriptions of this partition.
    pub dd_count: Option<u32>,

    /// This partition's values of the per-spw parameter.
    pub sliced_param: Option<Value>,

    pub output: PathBuf,
}

/// A task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub task: String,
    pub params: BTreeMap<String, Value>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionPlan {
    pub axis: SeparationAxis,
    pub input: PathBuf,
    pub output: PathBuf,

    /// Where partitions are written before they're consolidated.
    pub staging_dir: PathBuf,

    pub task: String,
    pub selection: SelectionExpr,
    pub params: BTreeMap<String, Value>,
    pub per_spw_param_name: Option<String>,
    pub partitions: Vec1<PartitionSpec>,

    /// Do the spectral window and data description tables of the partitions
    /// need to be merged?
    pub merge_spw_tables: bool,
}

impl PartitionPlan {
    /// The job that creates each partition, in partition order.
    pub fn jobs(&self) -> Vec<Job> {
        self.partitions.iter().map(|p| self.job(p)).collect()
    }

    fn job(&self, partition: &PartitionSpec) -> Job {
        let mut params = self.params.clone();
        let mut set = |key: &str, value: Value| {
            params.insert(key.to_string(), value);
        };

        set(PARAM_INPUT, path_value(&partition.input));
        set(PARAM_OUTPUT, path_value(&partition.output));
        if !partition.scan.is_all() {
            set(PARAM_SCAN, Value::String(partition.scan.to_string()));
        }
        if !partition.spw.is_all() {
            set(PARAM_SPW, Value::String(partition.spw.to_string()));
        }
        if !self.selection.field.is_all() {
            set(PARAM_FIELD, Value::String(self.selection.field.to_string()));
        }
        for (key, value) in &self.selection.passthrough {
            set(key.as_str(), Value::String(value.clone()));
        }
        if let Some(id_start) = partition.id_start {
            set(PARAM_DDI_START, Value::from(id_start));
        }
        if let (Some(name), Some(value)) = (&self.per_spw_param_name, &partition.sliced_param) {
            set(name.as_str(), value.clone());
        }

        Job {
            task: self.task.clone(),
            params,
            output: partition.output.clone(),
        }
    }

    /// Remove any previous staging directory and create an empty one.
    pub fn create_staging_dir(&self) -> Result<(), PlanError> {
        if self.staging_dir.exists() {
            debug!(
                "Removing the old staging directory {}",
                self.staging_dir.display()
            );
            fs::remove_dir_all(&self.staging_dir)?;
        }
        fs::create_dir_all(&self.staging_dir)?;
        Ok(())
    }

    pub fn read(file: &Path) -> Result<PartitionPlan, PlanError> {
        let contents = fs::read_to_string(file)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write(&self, file: &Path) -> Result<(), PlanError> {
        fs::write(file, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn path_value(p: &Path) -> Value {
    Value::String(p.display().to_string())
}

/// Where the partitions of an output go.
struct OutputLayout {
    staging_dir: PathBuf,
    stem: String,
    extension: String,
}

impl OutputLayout {
    fn new(output: &Path) -> Result<OutputLayout, PlanError> {
        let stem = match output.file_stem().and_then(|s| s.to_str()) {
            Some(s) if !s.is_empty() && s != "." && s != ".." => s.to_string(),
            _ => return Err(PlanError::BadOutputName(output.to_path_buf())),
        };
        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(DEFAULT_DATASET_EXTENSION)
            .to_string();
        let parent = output.parent().unwrap_or_else(|| Path::new(""));
        Ok(OutputLayout {
            staging_dir: parent.join(format!("{stem}.{STAGING_SUFFIX}")),
            stem,
            extension,
        })
    }

    fn partition(&self, index: usize) -> PathBuf {
        self.staging_dir
            .join(format!("{}.{index:04}.{}", self.stem, self.extension))
    }
}

/// Check the input and output of a request.
fn check_io(request: &PartitionRequest) -> Result<OutputLayout, PlanError> {
    if !request.input.exists() {
        return Err(PlanError::InputMissing(request.input.clone()));
    }
    if request.output.as_os_str().is_empty() {
        return Err(PlanError::EmptyOutput);
    }
    let layout = OutputLayout::new(&request.output)?;
    if layout.staging_dir == request.output {
        return Err(PlanError::OutputIsStagingDir(request.output.clone()));
    }
    if request.output.exists() && !request.overwrite {
        return Err(PlanError::OutputExists(request.output.clone()));
    }

    let mut flag_versions = OsString::from(request.output.as_os_str());
    flag_versions.push(".");
    flag_versions.push(FLAG_VERSIONS_SUFFIX);
    let flag_versions = PathBuf::from(flag_versions);
    if flag_versions.exists() && !request.overwrite {
        return Err(PlanError::FlagVersionsExist(flag_versions));
    }

    if request.num_partitions == 0 {
        return Err(PlanError::ZeroPartitions);
    }
    Ok(layout)
}

fn check_per_spw_param(
    request: &PartitionRequest,
    resolved: &ResolvedSelection,
) -> Result<(), PlanError> {
    if let Some(param) = &request.per_spw_param {
        if param.values.len() != resolved.spws.len() {
            return Err(PlanError::ParamLengthMismatch {
                name: param.name.clone(),
                got: param.values.len(),
                expected: resolved.spws.len(),
            });
        }
    }
    Ok(())
}

/// Clamp a requested number of groups to the number of items.
fn clamp(requested: usize, len: usize) -> NonZeroUsize {
    // Both are non-zero by the time this is called.
    NonZeroUsize::new(requested.min(len)).unwrap_or(NonZeroUsize::MIN)
}

/// Builds [`PartitionPlan`]s.
pub struct JobListBuilder<'a, 'b> {
    resolver: &'b SelectionResolver<'a>,
}

impl<'a, 'b> JobListBuilder<'a, 'b> {
    pub fn new(resolver: &'b SelectionResolver<'a>) -> JobListBuilder<'a, 'b> {
        JobListBuilder { resolver }
    }

    /// Plan the partitioning of a dataset. Nothing is written; see
    /// [`PartitionPlan::create_staging_dir`].
    pub fn build(&self, request: &PartitionRequest) -> Result<PartitionPlan, PlanError> {
        let layout = check_io(request)?;
        let resolved = self.resolver.resolve(&request.input, &request.selection)?;
        if resolved.scans.is_empty() {
            return Err(PlanError::NoScans);
        }
        if resolved.spws.is_empty() {
            return Err(PlanError::NoSpws);
        }
        check_per_spw_param(request, &resolved)?;
        validate_output_axis(request.axis, &request.transform)?;

        let scans: Vec<u32> = resolved.scans.iter().copied().collect();
        let spws: Vec<u32> = resolved.spws.iter().copied().collect();
        debug!(
            "Selection of {} has {} rows in scans {scans:?} and spws {spws:?}",
            request.input.display(),
            resolved.num_rows,
        );

        let partitions = match request.axis {
            SeparationAxis::Scan => self.separate_scans(request, &layout, &scans),
            SeparationAxis::Spw => {
                let nspw = clamp(request.num_partitions, spws.len());
                self.separate_spws(request, &layout, &spws, nspw, &[])?
            }
            SeparationAxis::ScanSpw => {
                let nspw = clamp(request.num_partitions, spws.len());
                let nscan = request.num_partitions.div_ceil(nspw.get()).min(scans.len());
                debug!("Separating into {nspw} spw groups and {nscan} scan groups");
                let scan_groups = if nscan > 1 {
                    split_list(&scans, clamp(nscan, scans.len()))
                } else {
                    vec![]
                };
                self.separate_spws(request, &layout, &spws, nspw, &scan_groups)?
            }
        };

        let partitions = Vec1::try_from_vec(partitions).map_err(|_| PlanError::NoScans)?;
        info!(
            "Planned {} partitions of {} separated by '{}'",
            partitions.len(),
            request.input.display(),
            request.axis
        );
        Ok(self.plan(request, layout, request.axis, partitions, request.axis.includes_spw()))
    }

    /// Plan one job per part of an already-partitioned dataset. Parts are not
    /// separated further, and the output keeps the axis of the input.
    pub fn build_from_parts(
        &self,
        request: &PartitionRequest,
        existing_axis: SeparationAxis,
        parts: &[PathBuf],
    ) -> Result<PartitionPlan, PlanError> {
        let layout = check_io(request)?;
        let resolved = self.resolver.resolve(&request.input, &request.selection)?;
        check_per_spw_param(request, &resolved)?;

        let whole_param = request
            .per_spw_param
            .as_ref()
            .map(|p| Value::Array(p.values.clone()));
        let partitions = parts
            .iter()
            .enumerate()
            .map(|(index, part)| PartitionSpec {
                index,
                input: part.clone(),
                scan: request.selection.scan.clone(),
                spw: request.selection.spw.clone(),
                id_start: None,
                dd_count: None,
                sliced_param: whole_param.clone(),
                output: layout.partition(index),
            })
            .collect();
        let partitions = Vec1::try_from_vec(partitions)
            .map_err(|_| PlanError::NoParts(request.input.clone()))?;
        info!(
            "Planned one job for each of the {} parts of {}",
            partitions.len(),
            request.input.display()
        );
        Ok(self.plan(request, layout, existing_axis, partitions, false))
    }

    fn plan(
        &self,
        request: &PartitionRequest,
        layout: OutputLayout,
        axis: SeparationAxis,
        partitions: Vec1<PartitionSpec>,
        merge_spw_tables: bool,
    ) -> PartitionPlan {
        PartitionPlan {
            axis,
            input: request.input.clone(),
            output: request.output.clone(),
            staging_dir: layout.staging_dir,
            task: request.task.clone(),
            selection: request.selection.clone(),
            params: request.params.clone(),
            per_spw_param_name: request.per_spw_param.as_ref().map(|p| p.name.clone()),
            partitions,
            merge_spw_tables,
        }
    }

    fn separate_scans(
        &self,
        request: &PartitionRequest,
        layout: &OutputLayout,
        scans: &[u32],
    ) -> Vec<PartitionSpec> {
        let whole_param = request
            .per_spw_param
            .as_ref()
            .map(|p| Value::Array(p.values.clone()));
        split_list(scans, clamp(request.num_partitions, scans.len()))
            .into_iter()
            .enumerate()
            .map(|(index, group)| PartitionSpec {
                index,
                input: request.input.clone(),
                scan: ScanSelection::from_ids(&group),
                spw: request.selection.spw.clone(),
                id_start: None,
                dd_count: None,
                sliced_param: whole_param.clone(),
                output: layout.partition(index),
            })
            .collect()
    }

    /// Separate by spw, and also by scan if there are scan groups.
    fn separate_spws(
        &self,
        request: &PartitionRequest,
        layout: &OutputLayout,
        spws: &[u32],
        nspw: NonZeroUsize,
        scan_groups: &[Vec<u32>],
    ) -> Result<Vec<PartitionSpec>, PlanError> {
        let spw_groups = split_indexed(spws, nspw);
        let spw_selections = reattach_channel_ranges(&request.selection.spw, &spw_groups);
        let scan_selections: BTreeMap<usize, ScanSelection> = scan_groups
            .iter()
            .map(|g| ScanSelection::from_ids(g))
            .enumerate()
            .collect();
        let sliced_params = request
            .per_spw_param
            .as_ref()
            .map(|p| split_indexed(&p.values, nspw));

        let allocations = allocate_id_starts(
            self.resolver,
            &request.input,
            &request.selection,
            &scan_selections,
            &spw_selections,
        )?;

        let mut partitions = Vec::with_capacity(allocations.len());
        for (index, a) in allocations.into_iter().enumerate() {
            let scan = match a.scan_group {
                Some(g) => scan_selections[&g].clone(),
                None => request.selection.scan.clone(),
            };
            let spw = spw_selections[&a.spw_group].clone();
            trace!(
                "Partition {index}: scan='{scan}' spw='{spw}' ddistart={}",
                a.id_start
            );
            partitions.push(PartitionSpec {
                index,
                input: request.input.clone(),
                scan,
                spw,
                id_start: Some(a.id_start),
                dd_count: Some(a.dd_count),
                sliced_param: sliced_params
                    .as_ref()
                    .map(|s| Value::Array(s[&a.spw_group].clone())),
                output: layout.partition(index),
            });
        }
        Ok(partitions)
    }
}
