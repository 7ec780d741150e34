// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Couldn't set up a thread pool for the jobs: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Couldn't parse the job results in {file}: {err}")]
    BadResults { file: PathBuf, err: serde_json::Error },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
