// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running jobs.
//!
//! Jobs are run by something outside of this crate; all that's needed back is
//! whether each job's output was created. [`CommandExecutor`] runs a program
//! once per job on the local machine. Results from other executors can be
//! handed over as JSON files.

mod error;

pub use error::ExecError;

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::plan::Job;

/// Whether each job succeeded, keyed by the job's output.
pub type JobResults = BTreeMap<PathBuf, bool>;

pub trait JobExecutor {
    fn execute(&self, jobs: &[Job]) -> JobResults;
}

/// Runs `<program> <task> <job file>` for every job, where the job file is a
/// JSON object of the job's parameters. A job succeeds if the program exits
/// successfully and the job's output exists.
pub struct CommandExecutor {
    program: PathBuf,
    pool: rayon::ThreadPool,
}

impl CommandExecutor {
    /// If `num_threads` is `None`, one job is run per CPU.
    pub fn new(program: PathBuf, num_threads: Option<usize>) -> Result<CommandExecutor, ExecError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.unwrap_or(0))
            .build()?;
        Ok(CommandExecutor { program, pool })
    }

    fn run(&self, job: &Job) -> Result<bool, ExecError> {
        let mut job_file = OsString::from(job.output.as_os_str());
        job_file.push(".json");
        let job_file = PathBuf::from(job_file);
        fs::write(&job_file, serde_json::to_string_pretty(&job.params)?)?;

        trace!(
            "Running {} {} {}",
            self.program.display(),
            job.task,
            job_file.display()
        );
        let status = Command::new(&self.program)
            .arg(&job.task)
            .arg(&job_file)
            .status()?;
        if let Err(e) = fs::remove_file(&job_file) {
            warn!("Couldn't remove job file {}: {e}", job_file.display());
        }

        if !status.success() {
            warn!("Job for {} failed with {status}", job.output.display());
            return Ok(false);
        }
        if !job.output.exists() {
            warn!(
                "Job for {} succeeded but didn't create its output",
                job.output.display()
            );
            return Ok(false);
        }
        Ok(true)
    }
}

impl JobExecutor for CommandExecutor {
    fn execute(&self, jobs: &[Job]) -> JobResults {
        debug!(
            "Running {} jobs on {} threads",
            jobs.len(),
            self.pool.current_num_threads()
        );
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let ok = match self.run(job) {
                        Ok(ok) => ok,
                        Err(e) => {
                            warn!("Couldn't run the job for {}: {e}", job.output.display());
                            false
                        }
                    };
                    (job.output.clone(), ok)
                })
                .collect()
        })
    }
}

pub fn read_results(file: &Path) -> Result<JobResults, ExecError> {
    let contents = fs::read_to_string(file)?;
    serde_json::from_str(&contents).map_err(|err| ExecError::BadResults {
        file: file.to_path_buf(),
        err,
    })
}

pub fn write_results(file: &Path, results: &JobResults) -> Result<(), ExecError> {
    fs::write(file, serde_json::to_string_pretty(results)?)?;
    Ok(())
}
