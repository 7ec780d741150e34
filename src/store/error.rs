// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading and writing datasets.

use std::path::PathBuf;

use marlu::rubbl_casatables;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Supplied dataset path {0} does not exist or is not readable!")]
    BadDataset(PathBuf),

    #[error("The main table of dataset {0} contains no rows!")]
    MainTableEmpty(PathBuf),

    #[error("Found a negative value ({value}) in the {column} column of {table}; all IDs must be non-negative")]
    NegativeIndex {
        table: String,
        column: &'static str,
        value: i32,
    },

    #[error("Couldn't parse the manifest {file}: {err}")]
    BadManifest { file: PathBuf, err: String },

    #[error("Multi-part dataset {0} has a manifest without any members")]
    NoMembers(PathBuf),

    #[error("Refusing to shrink the {table} table of {dataset} from {have} rows to {want}")]
    TableShrink {
        dataset: PathBuf,
        table: &'static str,
        have: usize,
        want: usize,
    },

    #[error("Error when trying to interface with measurement set: {0}")]
    Table(#[from] rubbl_casatables::TableError),

    #[error("Error from casacore: {0}")]
    Casacore(#[from] rubbl_casatables::CasacoreError),

    #[error("Couldn't serialise the manifest: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
