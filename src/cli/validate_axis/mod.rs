// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{decide_axis, display_warnings, read_parts, CliArgsError, TransformArgs, ARG_FILE_HELP};
use crate::{
    selection::SelectionExpr, store::MsStore, AxisDecision, MultiMsError, SelectionResolver,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ValidateAxisArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// Path to the multi-part dataset.
    #[clap(short, long, parse(from_os_str))]
    pub(super) input: Option<PathBuf>,

    /// Scans to select. Default: all.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) scan: Option<String>,

    /// Spws to select. Default: all.
    #[clap(long, help_heading = "SELECTION")]
    pub(super) spw: Option<String>,

    #[clap(flatten)]
    #[serde(rename = "transform")]
    #[serde(default)]
    pub(super) transform_args: TransformArgs,
}

impl ValidateAxisArgs {
    pub(super) fn merge(self) -> Result<ValidateAxisArgs, MultiMsError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let ValidateAxisArgs {
                args_file: _,
                input,
                scan,
                spw,
                transform_args,
            } = unpack_arg_file!(arg_file);

            Ok(ValidateAxisArgs {
                args_file: None,
                input: cli_args.input.or(input),
                scan: cli_args.scan.or(scan),
                spw: cli_args.spw.or(spw),
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
            input,
            scan,
            spw,
            transform_args,
        } = self;

        let input = input.ok_or(CliArgsError::NoInput)?;
        let mut selection = SelectionExpr::default();
        if let Some(s) = scan {
            selection.scan = s.parse()?;
        }
        if let Some(s) = spw {
            selection.spw = s.parse()?;
        }
        let (transform, _) = transform_args.parse()?;
        display_warnings();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let (existing_axis, parts) =
            read_parts(&MsStore, &input)?.ok_or_else(|| CliArgsError::NotPartitioned(input.clone()))?;
        let resolver = SelectionResolver::new(&MsStore);
        let decision = decide_axis(&resolver, &input, existing_axis, &parts, &selection, &transform)?;
        match decision {
            AxisDecision::Proceed => info!(
                "The {} parts of {} (separated by '{existing_axis}') can be transformed independently",
                parts.len(),
                input.display()
            ),
            AxisDecision::FallBackAxis(axis) => info!(
                "The parts of {} can't be transformed independently; the output must be separated by '{axis}'",
                input.display()
            ),
            AxisDecision::Reject => info!(
                "{} can't be transformed in parallel; it must be processed as one dataset",
                input.display()
            ),
        }
        Ok(())
    }
}
