// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with consolidating partitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ConsolidateError {
    #[error("None of the {attempted} partitions were successfully created")]
    NoSuccessfulPartitions { attempted: usize },

    #[error("Data description {id} of {partition} overlaps with that of an earlier partition")]
    DdOverlap { id: u32, partition: PathBuf },

    #[error("Output {0} is also the staging directory of the plan; consolidating would delete the partitions")]
    OutputIsStagingDir(PathBuf),

    #[error("Partition {0} isn't named like <name>.NNNN.<ext>; cannot renumber it")]
    BadPartitionName(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
