// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all multims-related errors. This should be the *only* error
//! enum that is publicly visible from the command line.

use thiserror::Error;

use super::common::CliArgsError;
use crate::{
    consolidate::ConsolidateError, exec::ExecError, plan::PlanError, selection::SelectionError,
    store::StoreError, unit_parsing::UnitParseError,
};

const SELECTION_HINT: &str = "Scans and spws are selected with ID ranges like '0~3,7'; spws may carry channel ranges like '0:5~10;20~30'.";

/// The *only* publicly visible error from the multims binary. Each error
/// message should include a hint, unless it's "generic".
#[derive(Error, Debug)]
pub enum MultiMsError {
    /// An error with the command-line arguments.
    #[error("{0}\n\nSee --help for the available arguments.")]
    Args(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files hold the same arguments as the command line, in toml or json.")]
    ArgFile(String),

    /// An error related to selections.
    #[error("{0}\n\n{SELECTION_HINT}")]
    Selection(String),

    /// An error found while planning partitions. Nothing has been run.
    #[error("{0}\n\nNo jobs were run.")]
    Plan(String),

    /// An error related to reading or writing datasets.
    #[error("{0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv).")]
    Store(String),

    /// An error related to running jobs.
    #[error("{0}\n\nIf jobs are run elsewhere, their results can be handed to the 'consolidate' subcommand.")]
    Exec(String),

    /// An error found while consolidating partitions.
    #[error("{0}\n\nThe partitions that were created are left in the staging directory.")]
    Consolidate(String),

    /// A generic error that can't be clarified further with a hint, e.g. IO
    /// errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<CliArgsError> for MultiMsError {
    fn from(e: CliArgsError) -> Self {
        let s = e.to_string();
        match e {
            CliArgsError::NoInput
            | CliArgsError::NoOutput
            | CliArgsError::NoPlan
            | CliArgsError::NoProgram
            | CliArgsError::BadAxis(_)
            | CliArgsError::BadTaskParam(_)
            | CliArgsError::PerSpwParamIncomplete
            | CliArgsError::ZeroNspw => Self::Args(s),
            CliArgsError::NotPartitioned(_) => Self::Store(s),
        }
    }
}

impl From<UnitParseError> for MultiMsError {
    fn from(e: UnitParseError) -> Self {
        Self::Args(e.to_string())
    }
}

impl From<SelectionError> for MultiMsError {
    fn from(e: SelectionError) -> Self {
        let s = e.to_string();
        match e {
            SelectionError::Parse { .. }
            | SelectionError::InvertedRange { .. }
            | SelectionError::ChannelOutOfRange { .. } => Self::Selection(s),
            SelectionError::Store(e) => Self::from(e),
        }
    }
}

impl From<PlanError> for MultiMsError {
    fn from(e: PlanError) -> Self {
        let s = e.to_string();
        match e {
            PlanError::InputMissing(_)
            | PlanError::EmptyOutput
            | PlanError::BadOutputName(_)
            | PlanError::OutputExists(_)
            | PlanError::OutputIsStagingDir(_)
            | PlanError::FlagVersionsExist(_)
            | PlanError::ZeroPartitions
            | PlanError::NoParts(_)
            | PlanError::ParamLengthMismatch { .. }
            | PlanError::SpwRedistributionNeedsScanAxis { .. } => Self::Plan(s),
            PlanError::NoScans | PlanError::NoSpws => Self::Selection(s),
            PlanError::Selection(e) => Self::from(e),
            PlanError::Json(_) => Self::Generic(s),
            PlanError::IO(e) => Self::from(e),
        }
    }
}

impl From<StoreError> for MultiMsError {
    fn from(e: StoreError) -> Self {
        let s = e.to_string();
        match e {
            StoreError::IO(e) => Self::from(e),
            _ => Self::Store(s),
        }
    }
}

impl From<ExecError> for MultiMsError {
    fn from(e: ExecError) -> Self {
        let s = e.to_string();
        match e {
            ExecError::ThreadPool(_) | ExecError::BadResults { .. } => Self::Exec(s),
            ExecError::Json(_) => Self::Generic(s),
            ExecError::IO(e) => Self::from(e),
        }
    }
}

impl From<ConsolidateError> for MultiMsError {
    fn from(e: ConsolidateError) -> Self {
        let s = e.to_string();
        match e {
            ConsolidateError::NoSuccessfulPartitions { .. }
            | ConsolidateError::DdOverlap { .. }
            | ConsolidateError::OutputIsStagingDir(_)
            | ConsolidateError::BadPartitionName(_) => Self::Consolidate(s),
            ConsolidateError::Store(e) => Self::from(e),
            ConsolidateError::IO(e) => Self::from(e),
        }
    }
}

impl From<std::io::Error> for MultiMsError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
