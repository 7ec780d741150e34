// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Access to the dataset store.
//!
//! Everything that touches the on-disk format of a dataset goes through the
//! [`DatasetStore`] trait. Only the row index and the spectral-window and
//! data-description sub-tables need format-specific code; moving datasets
//! around and sharing sub-tables between them is done on the file system by
//! the provided methods.

mod error;
mod ms;
#[cfg(test)]
mod tests;

pub use error::StoreError;
pub use ms::MsStore;

use std::{
    fs,
    path::{Path, PathBuf},
};

use hifitime::Epoch;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{axis::SeparationAxis, constants::MANIFEST_FILE};

/// The index columns of a single main-table row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowKey {
    pub scan: u32,
    pub ddid: u32,
    pub field: u32,
    pub time: Epoch,
}

/// Everything needed to resolve selections against a dataset, without any of
/// the visibilities.
#[derive(Debug, Clone, Default)]
pub struct DatasetIndex {
    /// One entry per main-table row.
    pub rows: Vec<RowKey>,

    /// The spectral window of each data description, indexed by DDID.
    pub dd_spws: Vec<u32>,

    /// The number of channels in each spectral window, indexed by spw ID.
    pub spw_num_chans: Vec<u32>,

    /// The name of each field, indexed by field ID.
    pub field_names: Vec<String>,
}

impl DatasetIndex {
    /// The spectral window that a data description refers to, if the data
    /// description exists.
    pub fn spw_of(&self, ddid: u32) -> Option<u32> {
        self.dd_spws.get(ddid as usize).copied()
    }

    /// Add the rows of a member of a multi-part dataset. Members share their
    /// sub-tables, so only the rows are taken from `other` unless this index
    /// doesn't have any sub-table information yet.
    pub fn append(&mut self, other: DatasetIndex) {
        self.rows.extend(other.rows);
        if self.dd_spws.len() < other.dd_spws.len() {
            self.dd_spws = other.dd_spws;
        }
        if self.spw_num_chans.len() < other.spw_num_chans.len() {
            self.spw_num_chans = other.spw_num_chans;
        }
        if self.field_names.is_empty() {
            self.field_names = other.field_names;
        }
    }
}

/// A row of a SPECTRAL_WINDOW sub-table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpwRow {
    pub name: String,
    pub ref_frequency: f64,
    pub num_chan: u32,
    pub chan_freq: Vec<f64>,
    pub chan_width: Vec<f64>,
    pub effective_bw: Vec<f64>,
    pub resolution: Vec<f64>,
    pub total_bandwidth: f64,
    pub meas_freq_ref: i32,
    pub net_sideband: i32,
    pub flag_row: bool,
}

/// A row of a DATA_DESCRIPTION sub-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdRow {
    pub spw_id: u32,
    pub polarization_id: u32,
    pub flag_row: bool,
}

/// The SPECTRAL_WINDOW and DATA_DESCRIPTION sub-tables of a dataset. These
/// are the sub-tables that depend on how a dataset was split along the spw
/// axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpwTables {
    pub spws: Vec<SpwRow>,
    pub dds: Vec<DdRow>,
}

/// The persisted description of a multi-part dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub axis: SeparationAxis,

    /// Member sub-datasets, relative to the multi-part dataset, in their final
    /// order.
    pub members: Vec<PathBuf>,
}

pub trait DatasetStore {
    /// Read the row index of a dataset. A multi-part dataset is read as the
    /// concatenation of its members.
    fn read_index(&self, dataset: &Path) -> Result<DatasetIndex, StoreError>;

    fn read_spw_tables(&self, dataset: &Path) -> Result<SpwTables, StoreError>;

    /// Replace the SPECTRAL_WINDOW and DATA_DESCRIPTION rows of a dataset.
    /// Sub-tables may grow but must not shrink.
    fn write_spw_tables(&self, dataset: &Path, tables: &SpwTables) -> Result<(), StoreError>;

    /// The names of the sub-tables of a dataset. Sub-tables are directories
    /// with upper-case names.
    fn list_subtables(&self, dataset: &Path) -> Result<Vec<String>, StoreError> {
        let mut names = vec![];
        for entry in fs::read_dir(dataset)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let is_table_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
            // Linked sub-tables count too.
            let file_type = entry.file_type()?;
            if is_table_name && (file_type.is_dir() || file_type.is_symlink()) {
                names.push(name);
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Copy the sub-table `name` of `from` into `to`, replacing whatever `to`
    /// had.
    fn copy_subtable(&self, from: &Path, to: &Path, name: &str) -> Result<(), StoreError> {
        let src = from.join(name);
        let dst = to.join(name);
        trace!("Copying {} to {}", src.display(), dst.display());
        remove_path(&dst)?;
        copy_dir_recursive(&src, &dst)?;
        Ok(())
    }

    /// Make the sub-table `name` of `to` a link to that of `from`.
    fn link_subtable(&self, from: &Path, to: &Path, name: &str) -> Result<(), StoreError> {
        let dst = to.join(name);
        // Siblings get a relative link so that the consolidated dataset can be
        // moved as a whole.
        let target = match (from.parent(), to.parent(), from.file_name()) {
            (Some(p1), Some(p2), Some(from_name)) if p1 == p2 => {
                Path::new("..").join(from_name).join(name)
            }
            _ => fs::canonicalize(from)?.join(name),
        };
        trace!("Linking {} to {}", dst.display(), target.display());
        remove_path(&dst)?;
        make_link(&target, &dst)?;
        Ok(())
    }

    fn move_dataset(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        debug!("Moving {} to {}", from.display(), to.display());
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)?;
        Ok(())
    }

    /// Remove a dataset if it exists.
    fn remove_dataset(&self, dataset: &Path) -> Result<(), StoreError> {
        remove_path(dataset)?;
        Ok(())
    }

    /// Read the manifest of a multi-part dataset. `None` is returned for
    /// ordinary datasets.
    fn read_manifest(&self, dataset: &Path) -> Result<Option<Manifest>, StoreError> {
        let manifest_file = dataset.join(MANIFEST_FILE);
        if !manifest_file.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&manifest_file)?;
        let manifest = toml::from_str(&contents).map_err(|e| StoreError::BadManifest {
            file: manifest_file,
            err: e.to_string(),
        })?;
        Ok(Some(manifest))
    }

    fn write_manifest(&self, dataset: &Path, manifest: &Manifest) -> Result<(), StoreError> {
        fs::create_dir_all(dataset)?;
        let contents = toml::to_string(manifest)?;
        fs::write(dataset.join(MANIFEST_FILE), contents)?;
        Ok(())
    }
}

/// Remove a file, symlink or directory tree if it exists. Symlinks are removed
/// without touching what they point to.
fn remove_path(path: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(src)?;
    if !metadata.is_dir() {
        fs::copy(src, dst)?;
        return Ok(());
    }

    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        copy_dir_recursive(&entry.path(), &dst.join(entry.file_name()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

// Without symlinks, fall back to copying.
#[cfg(not(unix))]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    let resolved = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target.to_path_buf(),
    };
    copy_dir_recursive(&resolved, link)
}
