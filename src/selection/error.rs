// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with selecting data.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Couldn't parse {kind} selection '{input}': {reason}")]
    Parse {
        kind: &'static str,
        input: String,
        reason: String,
    },

    #[error("The {kind} range {start}~{end} is inverted")]
    InvertedRange {
        kind: &'static str,
        start: u32,
        end: u32,
    },

    #[error("Channel {chan} was selected for spw {spw}, but it only has {num_chans} channels")]
    ChannelOutOfRange { spw: u32, chan: u32, num_chans: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
