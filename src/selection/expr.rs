// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Structured selection expressions.
//!
//! Selections are kept structured everywhere in this crate and only turned
//! into the store's textual syntax when handed to a task. The textual syntax
//! is:
//!
//! * scans: `""` or `"*"` for everything, otherwise comma-separated IDs or
//!   inclusive ranges, e.g. `"1,3~5"`;
//! * spws: as for scans, but each item may be followed by channel ranges, e.g.
//!   `"0:5~10;20~30,2~3"`;
//! * fields: as for scans, but items may also be field names.

use std::{collections::BTreeMap, fmt, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::SelectionError;

/// Selection keys that are passed to tasks untouched.
pub const PASSTHROUGH_KEYS: [&str; 6] = [
    "antenna",
    "timerange",
    "correlation",
    "uvrange",
    "intent",
    "observation",
];

/// An inclusive range of IDs. Inverted ranges parse fine but are rejected when
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IdRange {
    pub start: u32,
    pub end: u32,
}

impl IdRange {
    pub fn single(id: u32) -> IdRange {
        IdRange { start: id, end: id }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.start <= id && id <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    fn parse(kind: &'static str, s: &str) -> Result<IdRange, SelectionError> {
        let parse_id = |id: &str| -> Result<u32, SelectionError> {
            id.trim().parse().map_err(|_| SelectionError::Parse {
                kind,
                input: s.to_string(),
                reason: format!("'{}' is not a non-negative integer", id.trim()),
            })
        };
        match s.split_once('~') {
            Some((start, end)) => Ok(IdRange {
                start: parse_id(start)?,
                end: parse_id(end)?,
            }),
            None => Ok(IdRange::single(parse_id(s)?)),
        }
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}~{}", self.start, self.end)
        }
    }
}

/// Split a selection string into its comma-separated items. `None` is
/// returned when the string selects everything.
fn items(s: &str) -> Option<Vec<&str>> {
    let s = s.trim();
    if s.is_empty() || s == "*" {
        None
    } else {
        Some(s.split(',').map(str::trim).collect())
    }
}

fn parse_ranges(kind: &'static str, s: &str) -> Result<Option<Vec<IdRange>>, SelectionError> {
    match items(s) {
        None => Ok(None),
        Some(items) => items
            .into_iter()
            .map(|item| {
                if item.is_empty() {
                    Err(SelectionError::Parse {
                        kind,
                        input: s.to_string(),
                        reason: "empty item".to_string(),
                    })
                } else {
                    IdRange::parse(kind, item)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
    }
}

/// Implement the string form used for (de)serialisation on top of `Display`
/// and `FromStr`.
macro_rules! string_form {
    ($t:ty) => {
        impl From<$t> for String {
            fn from(sel: $t) -> String {
                sel.to_string()
            }
        }

        impl TryFrom<String> for $t {
            type Error = SelectionError;

            fn try_from(s: String) -> Result<$t, SelectionError> {
                s.parse()
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ScanSelection {
    #[default]
    All,
    Ranges(Vec<IdRange>),
}

impl ScanSelection {
    /// Select exactly these scans.
    pub fn from_ids(ids: &[u32]) -> ScanSelection {
        ScanSelection::Ranges(ids.iter().copied().map(IdRange::single).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ScanSelection::All)
    }

    pub fn matches(&self, scan: u32) -> bool {
        match self {
            ScanSelection::All => true,
            ScanSelection::Ranges(ranges) => ranges.iter().any(|r| r.contains(scan)),
        }
    }
}

impl FromStr for ScanSelection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<ScanSelection, SelectionError> {
        Ok(match parse_ranges("scan", s)? {
            None => ScanSelection::All,
            Some(ranges) => ScanSelection::Ranges(ranges),
        })
    }
}

impl fmt::Display for ScanSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanSelection::All => Ok(()),
            ScanSelection::Ranges(ranges) => write!(f, "{}", ranges.iter().join(",")),
        }
    }
}

string_form!(ScanSelection);

/// An inclusive range of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChanRange {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for ChanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        IdRange {
            start: self.start,
            end: self.end,
        }
        .fmt(f)
    }
}

/// One comma-separated item of a spw selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpwItem {
    pub ids: IdRange,

    /// Empty means all channels.
    pub chans: Vec<ChanRange>,
}

impl fmt::Display for SpwItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ids)?;
        if !self.chans.is_empty() {
            write!(f, ":{}", self.chans.iter().join(";"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SpwSelection {
    #[default]
    All,
    Items(Vec<SpwItem>),
}

impl SpwSelection {
    /// Select exactly these spws, with all of their channels.
    pub fn from_ids(ids: &[u32]) -> SpwSelection {
        SpwSelection::Items(
            ids.iter()
                .map(|&id| SpwItem {
                    ids: IdRange::single(id),
                    chans: vec![],
                })
                .collect(),
        )
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SpwSelection::All)
    }

    pub fn matches(&self, spw: u32) -> bool {
        match self {
            SpwSelection::All => true,
            SpwSelection::Items(items) => items.iter().any(|i| i.ids.contains(spw)),
        }
    }

    /// The channel ranges given for a spw. If the spw was named more than once,
    /// the ranges of all of its items are returned in order.
    pub fn chans_of(&self, spw: u32) -> Vec<ChanRange> {
        match self {
            SpwSelection::All => vec![],
            SpwSelection::Items(items) => items
                .iter()
                .filter(|i| i.ids.contains(spw))
                .flat_map(|i| i.chans.iter().copied())
                .collect(),
        }
    }
}

impl FromStr for SpwSelection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<SpwSelection, SelectionError> {
        let items = match items(s) {
            None => return Ok(SpwSelection::All),
            Some(items) => items,
        };

        let mut spw_items = Vec::with_capacity(items.len());
        for item in items {
            let (ids, chans) = match item.split_once(':') {
                Some((ids, chans)) => (ids, Some(chans)),
                None => (item, None),
            };
            if ids.trim().is_empty() {
                return Err(SelectionError::Parse {
                    kind: "spw",
                    input: s.to_string(),
                    reason: "empty item".to_string(),
                });
            }
            let ids = IdRange::parse("spw", ids)?;
            let chans = match chans {
                None => vec![],
                Some(chans) => chans
                    .split(';')
                    .map(|c| {
                        IdRange::parse("channel", c).map(|r| ChanRange {
                            start: r.start,
                            end: r.end,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            };
            spw_items.push(SpwItem { ids, chans });
        }
        Ok(SpwSelection::Items(spw_items))
    }
}

impl fmt::Display for SpwSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpwSelection::All => Ok(()),
            SpwSelection::Items(items) => write!(f, "{}", items.iter().join(",")),
        }
    }
}

string_form!(SpwSelection);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldItem {
    Ids(IdRange),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FieldSelection {
    #[default]
    All,
    Items(Vec<FieldItem>),
}

impl FieldSelection {
    pub fn is_all(&self) -> bool {
        matches!(self, FieldSelection::All)
    }

    /// Does the field with this ID and name match?
    pub fn matches(&self, id: u32, name: Option<&str>) -> bool {
        match self {
            FieldSelection::All => true,
            FieldSelection::Items(items) => items.iter().any(|i| match i {
                FieldItem::Ids(r) => r.contains(id),
                FieldItem::Name(n) => Some(n.as_str()) == name,
            }),
        }
    }
}

impl FromStr for FieldSelection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<FieldSelection, SelectionError> {
        let items = match items(s) {
            None => return Ok(FieldSelection::All),
            Some(items) => items,
        };
        let mut field_items = Vec::with_capacity(items.len());
        for item in items {
            if item.is_empty() {
                return Err(SelectionError::Parse {
                    kind: "field",
                    input: s.to_string(),
                    reason: "empty item".to_string(),
                });
            }
            // Anything that doesn't look like IDs is a name.
            let looks_numeric = item
                .chars()
                .all(|c| c.is_ascii_digit() || c == '~' || c.is_whitespace());
            field_items.push(if looks_numeric {
                FieldItem::Ids(IdRange::parse("field", item)?)
            } else {
                FieldItem::Name(item.to_string())
            });
        }
        Ok(FieldSelection::Items(field_items))
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelection::All => Ok(()),
            FieldSelection::Items(items) => write!(
                f,
                "{}",
                items
                    .iter()
                    .map(|i| match i {
                        FieldItem::Ids(r) => r.to_string(),
                        FieldItem::Name(n) => n.clone(),
                    })
                    .join(",")
            ),
        }
    }
}

string_form!(FieldSelection);

/// A selection over a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionExpr {
    pub scan: ScanSelection,
    pub spw: SpwSelection,
    pub field: FieldSelection,

    /// Selections that aren't resolved here (e.g. "antenna"), keyed by their
    /// task parameter name.
    pub passthrough: BTreeMap<String, String>,
}

impl SelectionExpr {
    /// The same selection but for the given scans and spws.
    pub fn with_scans_and_spws(&self, scan: ScanSelection, spw: SpwSelection) -> SelectionExpr {
        SelectionExpr {
            scan,
            spw,
            field: self.field.clone(),
            passthrough: self.passthrough.clone(),
        }
    }
}
