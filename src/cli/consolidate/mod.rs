// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{display_warnings, print_plan, CliArgsError, Warn, ARG_FILE_HELP};
use crate::{
    exec::{read_results, JobResults},
    store::MsStore,
    ConsolidationEngine, MultiMsError, PartitionPlan,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ConsolidateArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The plan written by the "plan" subcommand.
    #[clap(short, long, parse(from_os_str))]
    pub(super) plan: Option<PathBuf>,

    /// A JSON object of each job's output and whether it succeeded. If this
    /// isn't given, a job succeeded if its output exists.
    #[clap(short, long, parse(from_os_str))]
    pub(super) results: Option<PathBuf>,
}

impl ConsolidateArgs {
    pub(super) fn merge(self) -> Result<ConsolidateArgs, MultiMsError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let ConsolidateArgs {
                args_file: _,
                plan,
                results,
            } = unpack_arg_file!(arg_file);

            Ok(ConsolidateArgs {
                args_file: None,
                plan: cli_args.plan.or(plan),
                results: cli_args.results.or(results),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<(PartitionPlan, JobResults), MultiMsError> {
        let plan_file = self.plan.ok_or(CliArgsError::NoPlan)?;
        let plan = PartitionPlan::read(&plan_file)?;
        let results = match self.results {
            Some(file) => read_results(&file)?,
            None => plan
                .partitions
                .iter()
                .map(|p| (p.output.clone(), p.output.exists()))
                .collect(),
        };
        Ok((plan, results))
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), MultiMsError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let (plan, results) = self.parse()?;
        print_plan(&plan);

        let num_successes = results.values().filter(|&&ok| ok).count();
        if num_successes < plan.partitions.len() {
            format!(
                "Only {num_successes} of {} jobs reported success",
                plan.partitions.len()
            )
            .warn();
        }
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let consolidated = ConsolidationEngine::new(&MsStore).consolidate(&plan, &results)?;
        for failed in consolidated.failed {
            format!("Partition {} failed and was left out", failed.display()).warn();
        }
        display_warnings();
        info!(
            "{} has {} members",
            consolidated.path.display(),
            consolidated.members.len()
        );
        Ok(())
    }
}
