// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, execute_and_consolidate, plan_partitions, print_plan, CliArgsError,
    PartitionArgs, TransformArgs, ARG_FILE_HELP,
};
use crate::{exec::CommandExecutor, store::MsStore, MultiMsError};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RunArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The program that runs tasks. It is run as "<program> <task> <job
    /// file>" for each partition, where the job file is a JSON object of the
    /// task's parameters.
    #[clap(short, long, parse(from_os_str), help_heading = "EXECUTION")]
    pub(super) program: Option<PathBuf>,

    /// The number of jobs to run at once. Default: the number of CPUs.
    #[clap(long, help_heading = "EXECUTION")]
    pub(super) num_threads: Option<usize>,

    #[clap(flatten)]
    #[serde(rename = "partition")]
    #[serde(default)]
    pub(super) partition_args: PartitionArgs,

    #[clap(flatten)]
    #[serde(rename = "transform")]
    #[serde(default)]
    pub(super) transform_args: TransformArgs,
}

impl RunArgs {
    pub(super) fn merge(self) -> Result<RunArgs, MultiMsError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let RunArgs {
                args_file: _,
                program,
                num_threads,
                partition_args,
                transform_args,
            } = unpack_arg_file!(arg_file);

            Ok(RunArgs {
                args_file: None,
                program: cli_args.program.or(program),
                num_threads: cli_args.num_threads.or(num_threads),
                partition_args: cli_args.partition_args.merge(partition_args),
                transform_args: cli_args.transform_args.merge(transform_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), MultiMsError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let Self {
            args_file: _,
            program,
            num_threads,
            partition_args,
            transform_args,
        } = self;

        let program = program.ok_or(CliArgsError::NoProgram)?;
        let request = partition_args.parse(transform_args)?;
        let plan = plan_partitions(&MsStore, request)?;
        print_plan(&plan);
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let executor = CommandExecutor::new(program, num_threads)?;
        let consolidated = execute_and_consolidate(&MsStore, &executor, &plan)?;
        display_warnings();
        info!(
            "{} has {} members",
            consolidated.path.display(),
            consolidated.members.len()
        );
        Ok(())
    }
}
