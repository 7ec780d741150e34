// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! Names of task parameters are those understood by the tasks that get run on
//! each partition; they are not interpreted here beyond being overridden.

/// Sub-tables that are symlinked to the master partition's copy rather than
/// copied during consolidation. These can be large (per-antenna, per-time).
pub const LINKED_SUBTABLES: [&str; 2] = ["POINTING", "SYSCAL"];

/// The name of the directory inside a consolidated dataset that holds the
/// member sub-datasets.
pub const SUBMS_DIR: &str = "SUBMSS";

/// The file inside a consolidated dataset that lists its members and the
/// separation axis.
pub const MANIFEST_FILE: &str = "MULTIMS.toml";

/// Appended to the output stem to make the staging directory that holds
/// partition outputs before consolidation.
pub const STAGING_SUFFIX: &str = "data";

/// The extension used for partition outputs when the output path has none.
pub const DEFAULT_DATASET_EXTENSION: &str = "ms";

/// Flag versions of a dataset live next to it with this suffix.
pub const FLAG_VERSIONS_SUFFIX: &str = "flagversions";

/// The default number of partitions to create.
pub const DEFAULT_NUM_PARTITIONS: usize = 8;

pub const PARAM_INPUT: &str = "vis";
pub const PARAM_OUTPUT: &str = "outputvis";
pub const PARAM_SCAN: &str = "scan";
pub const PARAM_SPW: &str = "spw";
pub const PARAM_FIELD: &str = "field";
pub const PARAM_DDI_START: &str = "ddistart";
