// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Resolving selections against datasets.

mod error;
mod expr;

pub use error::SelectionError;
pub use expr::*;

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    rc::Rc,
};

use log::trace;

use crate::store::{DatasetIndex, DatasetStore};

/// The concrete indices that a selection picks out of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub scans: BTreeSet<u32>,
    pub spws: BTreeSet<u32>,
    pub ddids: BTreeSet<u32>,
    pub num_rows: usize,
}

impl ResolvedSelection {
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }
}

/// Resolves [`SelectionExpr`]s against datasets in a [`DatasetStore`].
///
/// The row index of each dataset is read from the store once and kept for the
/// lifetime of the resolver.
pub struct SelectionResolver<'a> {
    store: &'a dyn DatasetStore,
    cache: RefCell<HashMap<PathBuf, Rc<DatasetIndex>>>,
}

impl<'a> SelectionResolver<'a> {
    pub fn new(store: &'a dyn DatasetStore) -> SelectionResolver<'a> {
        SelectionResolver {
            store,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &'a dyn DatasetStore {
        self.store
    }

    /// Get the row index of a dataset, reading it if necessary.
    pub fn index(&self, dataset: &Path) -> Result<Rc<DatasetIndex>, SelectionError> {
        if let Some(index) = self.cache.borrow().get(dataset) {
            return Ok(Rc::clone(index));
        }

        trace!("Reading the index of {}", dataset.display());
        let index = Rc::new(self.store.read_index(dataset)?);
        self.cache
            .borrow_mut()
            .insert(dataset.to_path_buf(), Rc::clone(&index));
        Ok(index)
    }

    /// Resolve a selection. Pass-through selections are not applied. A valid
    /// selection that matches nothing gives an empty result.
    pub fn resolve(
        &self,
        dataset: &Path,
        expr: &SelectionExpr,
    ) -> Result<ResolvedSelection, SelectionError> {
        let index = self.index(dataset)?;
        check_selection(&index, expr)?;

        let mut resolved = ResolvedSelection::default();
        let mut field_matches: HashMap<u32, bool> = HashMap::new();
        for row in &index.rows {
            if !expr.scan.matches(row.scan) {
                continue;
            }
            let spw = match index.spw_of(row.ddid) {
                Some(spw) if expr.spw.matches(spw) => spw,
                _ => continue,
            };
            let field_ok = *field_matches.entry(row.field).or_insert_with(|| {
                expr.field.matches(
                    row.field,
                    index.field_names.get(row.field as usize).map(String::as_str),
                )
            });
            if !field_ok {
                continue;
            }

            resolved.scans.insert(row.scan);
            resolved.spws.insert(spw);
            resolved.ddids.insert(row.ddid);
            resolved.num_rows += 1;
        }

        Ok(resolved)
    }

    /// The distinct data description IDs of the rows in the given scans and
    /// spws.
    pub fn resolve_ddids(
        &self,
        dataset: &Path,
        scan: &ScanSelection,
        spw: &SpwSelection,
    ) -> Result<BTreeSet<u32>, SelectionError> {
        let expr = SelectionExpr {
            scan: scan.clone(),
            spw: spw.clone(),
            ..Default::default()
        };
        Ok(self.resolve(dataset, &expr)?.ddids)
    }
}

/// Check the parts of a selection that can only be checked against a dataset.
fn check_selection(index: &DatasetIndex, expr: &SelectionExpr) -> Result<(), SelectionError> {
    let check_range = |kind, r: &IdRange| {
        if r.is_inverted() {
            Err(SelectionError::InvertedRange {
                kind,
                start: r.start,
                end: r.end,
            })
        } else {
            Ok(())
        }
    };

    if let ScanSelection::Ranges(ranges) = &expr.scan {
        for r in ranges {
            check_range("scan", r)?;
        }
    }

    if let FieldSelection::Items(items) = &expr.field {
        for item in items {
            if let FieldItem::Ids(r) = item {
                check_range("field", r)?;
            }
        }
    }

    if let SpwSelection::Items(items) = &expr.spw {
        for item in items {
            check_range("spw", &item.ids)?;
            for chans in &item.chans {
                if chans.start > chans.end {
                    return Err(SelectionError::InvertedRange {
                        kind: "channel",
                        start: chans.start,
                        end: chans.end,
                    });
                }
                // Only spws that exist can be checked; the others select
                // nothing.
                for (spw, &num_chans) in index
                    .spw_num_chans
                    .iter()
                    .enumerate()
                    .filter(|(spw, _)| item.ids.contains(*spw as u32))
                {
                    if chans.end >= num_chans {
                        return Err(SelectionError::ChannelOutOfRange {
                            spw: spw as u32,
                            chan: chans.end,
                            num_chans,
                        });
                    }
                }
            }
        }
    }

    Ok(())
}
