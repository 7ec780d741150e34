// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Partition interferometric measurement sets for parallel processing, and
consolidate the per-partition results into a single multi-part dataset.
 */

pub mod axis;
mod cli;
pub mod consolidate;
pub mod constants;
pub mod exec;
pub mod partition;
pub mod plan;
pub mod selection;
pub mod store;
pub(crate) mod unit_parsing;

#[cfg(test)]
mod tests;

// Re-exports.
pub use axis::{validate_axis, AxisDecision, SeparationAxis, TimeAverage, Transform};
pub use cli::{MultiMs, MultiMsError};
pub use consolidate::{ConsolidateError, ConsolidatedDataset, ConsolidationEngine};
pub use exec::{CommandExecutor, ExecError, JobExecutor, JobResults};
pub use plan::{Job, JobListBuilder, PartitionPlan, PartitionRequest, PartitionSpec, PlanError};
pub use selection::{ResolvedSelection, SelectionError, SelectionExpr, SelectionResolver};
pub use store::{DatasetStore, MsStore, StoreError};
