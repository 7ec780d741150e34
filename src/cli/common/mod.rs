// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. e.g. the `plan` and `run`
//! subcommands both partition a dataset, so the same partitioning arguments
//! are shared between them.

mod printers;
#[cfg(test)]
mod tests;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};

use std::{
    borrow::Cow,
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::MultiMsError;
use crate::{
    axis::{
        summarise_parts, validate_axis, validate_output_axis, AxisDecision, SeparationAxis,
        TimeAverage, Transform,
    },
    constants::DEFAULT_NUM_PARTITIONS,
    consolidate::{ConsolidatedDataset, ConsolidationEngine},
    exec::JobExecutor,
    plan::{JobListBuilder, PartitionPlan, PartitionRequest, PerSpwParam},
    selection::{SelectionExpr, SelectionResolver, PASSTHROUGH_KEYS},
    store::{DatasetStore, Manifest},
    unit_parsing::parse_duration,
};

/// The task run for each partition if none is given.
pub(super) const DEFAULT_TASK: &str = "mstransform";

// Task parameters that describe a transformation.
const PARAM_COMBINE_SPWS: &str = "combinespws";
const PARAM_NSPW: &str = "nspw";
const PARAM_TIME_AVERAGE: &str = "timeaverage";
const PARAM_TIME_BIN: &str = "timebin";
const PARAM_TIME_SPAN: &str = "timespan";

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    static ref AXIS_HELP: String =
        format!("The axis to separate the dataset along. Valid axes are: {}. Default: {}",
                SeparationAxis::iter().join(", "), SeparationAxis::ScanSpw);

    static ref NUM_PARTITIONS_HELP: String =
        format!("The number of partitions to create. Fewer are created if there aren't enough scans or spws. Default: {DEFAULT_NUM_PARTITIONS}");

    static ref TASK_HELP: String =
        format!("The name of the task that creates each partition. Default: {DEFAULT_TASK}");
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(MultiMsError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(MultiMsError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(MultiMsError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Arguments describing how to partition a dataset.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct PartitionArgs {
    /// Path to the input dataset. This may be a multi-part dataset.
    #[clap(short, long, parse(from_os_str), help_heading = "INPUT AND OUTPUT")]
    pub(super) input: Option<PathBuf>,

    /// Path to the consolidated multi-part output dataset.
    #[clap(short, long, parse(from_os_str), help_heading = "INPUT AND OUTPUT")]
    pub(super) output: Option<PathBuf>,

    /// Replace the output if it already exists.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    #[serde(default)]
    pub(super) overwrite: bool,

    #[clap(short, long, help = AXIS_HELP.as_str(), help_heading = "PARTITIONING")]
    pub(super) axis: Option<String>,

    #[clap(short, long, help = NUM_PARTITIONS_HELP.as_str(), help_heading = "PARTITIONING")]
    pub(super) num_partitions: Option<usize>,

    #[clap(short, long, help = TASK_HELP.as_str(), help_heading = "PARTITIONING")]
    pub(super) task: Option<String>,

    /// A parameter given to every task, as key=value. The value is read as
    /// JSON if possible, otherwise it is a string. May be given many times.
    #[clap(long = "task-param", multiple_occurrences(true), help_heading = "PARTITIONING")]
    pub(super) task_params: Option<Vec<String>>,

    /// The name of a task parameter that takes one value per selected spw.
    #[clap(long, help_heading = "PARTITIONING")]
    pub(super) per_spw_param_name: Option<String>,

    /// The values of the per-spw parameter, one per selected spw.
    #[clap(long, multiple_values(true), help_heading = "PARTITIONING")]
    pub(super) per_spw_param_values: Option<Vec<String>>,

    /// Scans to select, e.g. "1~3,7". Default: all.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) scan: Option<String>,

    /// Spws to select, optionally with channels, e.g. "0:5~10,2". Default:
    /// all.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) spw: Option<String>,

    /// Fields to select by ID or name, e.g. "0,3C286". Default: all.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) field: Option<String>,

    /// Given to tasks untouched.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) antenna: Option<String>,

    /// Given to tasks untouched.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) timerange: Option<String>,

    /// Given to tasks untouched.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) correlation: Option<String>,

    /// Given to tasks untouched.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) uvrange: Option<String>,

    /// Given to tasks untouched.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) intent: Option<String>,

    /// Given to tasks untouched.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) observation: Option<String>,
}

impl PartitionArgs {
    /// Prefer the values in `self`.
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            input: self.input.or(other.input),
            output: self.output.or(other.output),
            overwrite: self.overwrite || other.overwrite,
            axis: self.axis.or(other.axis),
            num_partitions: self.num_partitions.or(other.num_partitions),
            task: self.task.or(other.task),
            task_params: self.task_params.or(other.task_params),
            per_spw_param_name: self.per_spw_param_name.or(other.per_spw_param_name),
            per_spw_param_values: self.per_spw_param_values.or(other.per_spw_param_values),
            scan: self.scan.or(other.scan),
            spw: self.spw.or(other.spw),
            field: self.field.or(other.field),
            antenna: self.antenna.or(other.antenna),
            timerange: self.timerange.or(other.timerange),
            correlation: self.correlation.or(other.correlation),
            uvrange: self.uvrange.or(other.uvrange),
            intent: self.intent.or(other.intent),
            observation: self.observation.or(other.observation),
        }
    }

    pub(super) fn parse(self, transform: TransformArgs) -> Result<PartitionRequest, MultiMsError> {
        let Self {
            input,
            output,
            overwrite,
            axis,
            num_partitions,
            task,
            task_params,
            per_spw_param_name,
            per_spw_param_values,
            scan,
            spw,
            field,
            antenna,
            timerange,
            correlation,
            uvrange,
            intent,
            observation,
        } = self;

        let input = input.ok_or(CliArgsError::NoInput)?;
        let output = output.ok_or(CliArgsError::NoOutput)?;
        let axis = match axis {
            Some(a) => SeparationAxis::from_str(&a).map_err(|_| CliArgsError::BadAxis(a))?,
            None => SeparationAxis::ScanSpw,
        };

        let selection = SelectionArgs {
            scan,
            spw,
            field,
            // In the order of PASSTHROUGH_KEYS.
            passthrough: [antenna, timerange, correlation, uvrange, intent, observation],
        }
        .parse()?;

        let per_spw_param = match (per_spw_param_name, per_spw_param_values) {
            (Some(name), Some(values)) => Some(PerSpwParam {
                name,
                values: values.iter().map(|v| parse_value(v)).collect(),
            }),
            (None, None) => None,
            _ => return Err(CliArgsError::PerSpwParamIncomplete.into()),
        };

        let (transform, mut params) = transform.parse()?;
        for kv in task_params.unwrap_or_default() {
            let (key, value) = kv
                .split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .ok_or_else(|| CliArgsError::BadTaskParam(kv.clone()))?;
            params.insert(key.trim().to_string(), parse_value(value));
        }

        Ok(PartitionRequest {
            input,
            output,
            task: task.unwrap_or_else(|| DEFAULT_TASK.to_string()),
            selection,
            axis,
            num_partitions: num_partitions.unwrap_or(DEFAULT_NUM_PARTITIONS),
            per_spw_param,
            params,
            overwrite,
            transform,
        })
    }
}

/// Arguments describing the transformation the tasks perform. These are
/// given to the tasks and are used to decide how a dataset may be
/// partitioned.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct TransformArgs {
    /// The tasks combine all spws into one.
    #[clap(long, help_heading = "TRANSFORMATION")]
    #[serde(default)]
    pub(super) combine_spws: bool,

    /// The tasks separate each spw into this many spws.
    #[clap(long, help_heading = "TRANSFORMATION")]
    pub(super) nspw: Option<u32>,

    /// The tasks average in time with this bin, e.g. "30s", "1.5min".
    #[clap(long, help_heading = "TRANSFORMATION")]
    pub(super) time_bin: Option<String>,

    /// Time averages may span scan boundaries.
    #[clap(long, help_heading = "TRANSFORMATION")]
    #[serde(default)]
    pub(super) time_span_scans: bool,
}

impl TransformArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        Self {
            combine_spws: self.combine_spws || other.combine_spws,
            nspw: self.nspw.or(other.nspw),
            time_bin: self.time_bin.or(other.time_bin),
            time_span_scans: self.time_span_scans || other.time_span_scans,
        }
    }

    /// Get the transformation and the task parameters that request it.
    pub(super) fn parse(self) -> Result<(Transform, BTreeMap<String, Value>), MultiMsError> {
        let Self {
            combine_spws,
            nspw,
            time_bin,
            time_span_scans,
        } = self;

        let mut params = BTreeMap::new();
        if combine_spws {
            params.insert(PARAM_COMBINE_SPWS.to_string(), Value::Bool(true));
        }
        let nspw = match nspw {
            Some(0) => return Err(CliArgsError::ZeroNspw.into()),
            Some(n) => {
                params.insert(PARAM_NSPW.to_string(), Value::from(n));
                n
            }
            None => 1,
        };
        let time_average = match time_bin {
            Some(s) => {
                let bin = parse_duration(&s)?;
                params.insert(PARAM_TIME_AVERAGE.to_string(), Value::Bool(true));
                params.insert(PARAM_TIME_BIN.to_string(), Value::String(s));
                if time_span_scans {
                    params.insert(PARAM_TIME_SPAN.to_string(), Value::from("scan"));
                }
                Some(TimeAverage {
                    bin,
                    span_scans: time_span_scans,
                })
            }
            None => {
                if time_span_scans {
                    "Ignoring --time-span-scans because no time bin was given".warn();
                }
                None
            }
        };

        Ok((
            Transform {
                combine_spws,
                nspw,
                time_average,
            },
            params,
        ))
    }
}

struct SelectionArgs {
    scan: Option<String>,
    spw: Option<String>,
    field: Option<String>,
    passthrough: [Option<String>; PASSTHROUGH_KEYS.len()],
}

impl SelectionArgs {
    fn parse(self) -> Result<SelectionExpr, MultiMsError> {
        let mut selection = SelectionExpr::default();
        if let Some(s) = self.scan {
            selection.scan = s.parse()?;
        }
        if let Some(s) = self.spw {
            selection.spw = s.parse()?;
        }
        if let Some(s) = self.field {
            selection.field = s.parse()?;
        }
        for (key, value) in PASSTHROUGH_KEYS.into_iter().zip(self.passthrough) {
            if let Some(value) = value {
                selection.passthrough.insert(key.to_string(), value);
            }
        }
        Ok(selection)
    }
}

/// Read a value as JSON, falling back to a plain string.
fn parse_value(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
}

/// Where a plan is written if no file is given: next to the output, with the
/// output's extension replaced.
pub(super) fn default_plan_file(output: &Path) -> PathBuf {
    output.with_extension("plan.json")
}

/// The parts of a multi-part dataset, and the axis they were separated along.
pub(super) fn read_parts(
    store: &dyn DatasetStore,
    dataset: &Path,
) -> Result<Option<(SeparationAxis, Vec<PathBuf>)>, MultiMsError> {
    Ok(store
        .read_manifest(dataset)?
        .map(|Manifest { axis, members }| {
            let parts = members.iter().map(|m| dataset.join(m)).collect();
            (axis, parts)
        }))
}

/// Can the transformation be applied to each part of a multi-part dataset on
/// its own?
pub(super) fn decide_axis(
    resolver: &SelectionResolver,
    dataset: &Path,
    existing_axis: SeparationAxis,
    parts: &[PathBuf],
    selection: &SelectionExpr,
    transform: &Transform,
) -> Result<AxisDecision, MultiMsError> {
    let summaries = summarise_parts(resolver, parts)?;
    let resolved = resolver.resolve(dataset, selection)?;
    trace!("Selection resolved to {resolved:?}");
    Ok(validate_axis(
        existing_axis,
        &summaries,
        transform,
        &resolved.spws,
        &resolved.scans,
    ))
}

/// Plan the partitions of the requested input. If the input is already
/// partitioned, the transformation decides whether its parts are used as
/// they are.
pub(super) fn plan_partitions(
    store: &dyn DatasetStore,
    mut request: PartitionRequest,
) -> Result<PartitionPlan, MultiMsError> {
    let resolver = SelectionResolver::new(store);
    let builder = JobListBuilder::new(&resolver);

    let (existing_axis, parts) = match read_parts(store, &request.input)? {
        Some(p) => p,
        None => return Ok(builder.build(&request)?),
    };
    debug!(
        "{} is already separated by '{existing_axis}' into {} parts",
        request.input.display(),
        parts.len()
    );
    let decision = decide_axis(
        &resolver,
        &request.input,
        existing_axis,
        &parts,
        &request.selection,
        &request.transform,
    )?;
    // A new output can only hold redistributed spws when separated by scan.
    let decision = match decision {
        AxisDecision::FallBackAxis(axis)
            if validate_output_axis(axis, &request.transform).is_err() =>
        {
            debug!("Falling back to '{axis}' isn't possible for {:?}", request.transform);
            AxisDecision::Reject
        }
        d => d,
    };
    let plan = match decision {
        AxisDecision::Proceed => builder.build_from_parts(&request, existing_axis, &parts)?,
        AxisDecision::FallBackAxis(axis) => {
            format!("The parts of the input can't be transformed independently; separating the output by '{axis}' instead").warn();
            request.axis = axis;
            builder.build(&request)?
        }
        AxisDecision::Reject => {
            "The input can't be transformed in parallel; it will be processed as one partition"
                .warn();
            request.axis = SeparationAxis::Scan;
            request.num_partitions = 1;
            builder.build(&request)?
        }
    };
    Ok(plan)
}

/// Run the jobs of a plan and consolidate their outputs.
pub(super) fn execute_and_consolidate(
    store: &dyn DatasetStore,
    executor: &dyn JobExecutor,
    plan: &PartitionPlan,
) -> Result<ConsolidatedDataset, MultiMsError> {
    plan.create_staging_dir()?;
    let jobs = plan.jobs();
    info!("Running {} jobs", jobs.len());
    let results = executor.execute(&jobs);
    let consolidated = ConsolidationEngine::new(store).consolidate(plan, &results)?;
    for failed in &consolidated.failed {
        format!("Partition {} failed and was left out", failed.display()).warn();
    }
    Ok(consolidated)
}

/// Describe a plan to the user.
pub(super) fn print_plan(plan: &PartitionPlan) {
    let mut printer = InfoPrinter::new("Partitioning".into());
    printer.push_block(vec![
        format!("Input:  {}", plan.input.display()).into(),
        format!("Output: {}", plan.output.display()).into(),
    ]);
    printer.push_line(format!("Task '{}', separating by '{}'", plan.task, plan.axis).into());
    let block: Vec<Cow<'static, str>> = plan
        .partitions
        .iter()
        .map(|p| {
            let or_all = |s: String| if s.is_empty() { "all".to_string() } else { s };
            let mut line = format!(
                "{:>4}: scans {}, spws {}",
                p.index,
                or_all(p.scan.to_string()),
                or_all(p.spw.to_string())
            );
            if let Some(id_start) = p.id_start {
                line.push_str(&format!(", DDs from {id_start}"));
            }
            line.into()
        })
        .collect();
    printer.push_block(block);
    printer.display();
}

#[derive(thiserror::Error, Debug)]
pub(super) enum CliArgsError {
    #[error("No input dataset was specified")]
    NoInput,

    #[error("No output dataset was specified")]
    NoOutput,

    #[error("No plan file was specified")]
    NoPlan,

    #[error("No program to run the tasks was specified")]
    NoProgram,

    #[error("'{0}' is not a separation axis")]
    BadAxis(String),

    #[error("Task parameter '{0}' is not of the form key=value")]
    BadTaskParam(String),

    #[error("A per-spw parameter needs both a name and values")]
    PerSpwParamIncomplete,

    #[error("nspw must be at least 1")]
    ZeroNspw,

    #[error("{0} is not a multi-part dataset")]
    NotPartitioned(PathBuf),
}
