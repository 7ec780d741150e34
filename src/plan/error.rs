// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors found while planning partitions. All of these are found before any
//! job exists.

use std::path::PathBuf;

use thiserror::Error;

use crate::{axis::SeparationAxis, selection::SelectionError};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Input dataset {0} was not found")]
    InputMissing(PathBuf),

    #[error("No output dataset was specified")]
    EmptyOutput,

    #[error("Output {0} isn't usable as the name of a dataset")]
    BadOutputName(PathBuf),

    #[error("Output dataset {0} already exists; will not overwrite it")]
    OutputExists(PathBuf),

    #[error("Output {0} would also be the staging directory of its partitions; use an extension other than '.data'")]
    OutputIsStagingDir(PathBuf),

    #[error("The flag versions {0} of the output dataset already exist")]
    FlagVersionsExist(PathBuf),

    #[error("The number of partitions must be at least 1")]
    ZeroPartitions,

    #[error("The selection doesn't include any scans")]
    NoScans,

    #[error("The selection doesn't include any spws")]
    NoSpws,

    #[error("The partitioned input {0} doesn't have any parts")]
    NoParts(PathBuf),

    #[error("Number of values for {name} ({got}) is different from the number of selected spws ({expected})")]
    ParamLengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("Spws can only be combined or redistributed when separating by scan, not by '{axis}'")]
    SpwRedistributionNeedsScanAxis { axis: SeparationAxis },

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Couldn't (de)serialise the plan: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
