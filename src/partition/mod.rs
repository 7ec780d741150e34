// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Splitting lists of scans and spws into groups.

#[cfg(test)]
mod tests;

use std::{collections::BTreeMap, num::NonZeroUsize};

use crate::selection::{IdRange, SpwItem, SpwSelection};

/// The boundaries of `n` groups over `len` items. Group `i` starts at
/// `round(len / n * i)`, rounding half away from zero.
fn boundaries(len: usize, n: NonZeroUsize) -> Vec<usize> {
    let n = n.get();
    let step = len as f64 / n as f64;
    (0..=n)
        .map(|i| ((step * i as f64).round() as usize).min(len))
        .collect()
}

/// Split `items` into exactly `n` contiguous groups whose sizes differ by at
/// most one. If `n` is larger than the number of items, some groups are
/// empty; callers should clamp `n` first.
pub fn split_list<T: Clone>(items: &[T], n: NonZeroUsize) -> Vec<Vec<T>> {
    boundaries(items.len(), n)
        .windows(2)
        .map(|w| items[w[0]..w[1]].to_vec())
        .collect()
}

/// As [`split_list`], but keyed by group index.
pub fn split_indexed<T: Clone>(items: &[T], n: NonZeroUsize) -> BTreeMap<usize, Vec<T>> {
    split_list(items, n).into_iter().enumerate().collect()
}

/// Give each spw in each group the channel ranges it had in `original`. Spws
/// without channel ranges select all of their channels.
pub fn reattach_channel_ranges(
    original: &SpwSelection,
    groups: &BTreeMap<usize, Vec<u32>>,
) -> BTreeMap<usize, SpwSelection> {
    groups
        .iter()
        .map(|(&i, spws)| {
            let items = spws
                .iter()
                .map(|&spw| SpwItem {
                    ids: IdRange::single(spw),
                    chans: original.chans_of(spw),
                })
                .collect();
            (i, SpwSelection::Items(items))
        })
        .collect()
}
