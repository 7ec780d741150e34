// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{fs, path::PathBuf};

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    default_plan_file, display_warnings, plan_partitions, print_plan, PartitionArgs,
    TransformArgs, ARG_FILE_HELP,
};
use crate::{store::MsStore, MultiMsError, PartitionRequest};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct PlanArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// Where to write the plan. Default: next to the output, e.g.
    /// "out.plan.json" for "out.ms".
    #[clap(long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(super) plan_file: Option<PathBuf>,

    /// Also write the jobs of the plan to this JSON file, for running them
    /// elsewhere.
    #[clap(long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(super) jobs_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "partition")]
    #[serde(default)]
    pub(super) partition_args: PartitionArgs,

    #[clap(flatten)]
    #[serde(rename = "transform")]
    #[serde(default)]
    pub(super) transform_args: TransformArgs,
}

impl PlanArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified
    /// into a single struct. Where applicable, it will prefer CLI parameters
    /// over those in the file.
    pub(super) fn merge(self) -> Result<PlanArgs, MultiMsError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Ensure all of the file args are accounted for by pattern
            // matching.
            let PlanArgs {
                args_file: _,
                plan_file,
                jobs_file,
                partition_args,
                transform_args,
            } = unpack_arg_file!(arg_file);

            Ok(PlanArgs {
                args_file: None,
                plan_file: cli_args.plan_file.or(plan_file),
                jobs_file: cli_args.jobs_file.or(jobs_file),
                partition_args: cli_args.partition_args.merge(partition_args),
                transform_args: cli_args.transform_args.merge(transform_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<(PartitionRequest, PathBuf, Option<PathBuf>), MultiMsError> {
        let Self {
            args_file: _,
            plan_file,
            jobs_file,
            partition_args,
            transform_args,
        } = self;

        let request = partition_args.parse(transform_args)?;
        let plan_file = plan_file.unwrap_or_else(|| default_plan_file(&request.output));
        Ok((request, plan_file, jobs_file))
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), MultiMsError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let (request, plan_file, jobs_file) = self.parse()?;

        let plan = plan_partitions(&MsStore, request)?;
        print_plan(&plan);
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        plan.create_staging_dir()?;
        plan.write(&plan_file)?;
        info!("Wrote the plan to {}", plan_file.display());
        if let Some(jobs_file) = jobs_file {
            let jobs = serde_json::to_string_pretty(&plan.jobs())
                .map_err(|e| MultiMsError::Generic(e.to_string()))?;
            fs::write(&jobs_file, jobs)?;
            info!("Wrote {} jobs to {}", plan.partitions.len(), jobs_file.display());
        }
        Ok(())
    }
}
