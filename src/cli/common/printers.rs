// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pretty printers for reporting information.

use std::{borrow::Cow, sync::Mutex};

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNINGS: Mutex<Vec<Vec<Cow<'static, str>>>> = Mutex::new(vec![]);
}

/// Lines of blocks drawn as a tree, each with the symbol that precedes it.
fn tree<'a>(
    blocks: &'a [Vec<Cow<'static, str>>],
) -> impl Iterator<Item = (char, &'a Cow<'static, str>)> + 'a {
    let num_blocks = blocks.len();
    blocks.iter().enumerate().flat_map(move |(i_block, block)| {
        let num_lines = block.len();
        block.iter().enumerate().map(move |(i_line, line)| {
            let symbol = match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
                (0, true, true) => UP_AND_RIGHT,
                (0, _, _) => VERTICAL_AND_RIGHT,
                _ => VERTICAL,
            };
            (symbol, line)
        })
    })
}

pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        if !block.is_empty() {
            self.blocks.push(block);
        }
    }

    pub(crate) fn display(self) {
        log::info!("{}", console::style(self.title).bold());
        for (symbol, line) in tree(&self.blocks) {
            log::info!("{symbol} {line}");
        }
        log::info!("");
    }
}

pub(crate) trait Warn {
    fn warn(self);
}

fn push_warning(block: Vec<Cow<'static, str>>) {
    match WARNINGS.lock() {
        Ok(mut warnings) => warnings.push(block),
        // Nothing has been displayed yet; show it now rather than lose it.
        Err(_) => block.iter().for_each(|line| log::warn!("{line}")),
    }
}

impl Warn for &'static str {
    fn warn(self) {
        push_warning(vec![self.into()]);
    }
}

impl Warn for String {
    fn warn(self) {
        push_warning(vec![self.into()]);
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        push_warning(self);
    }
}

/// Print out any warnings that have been collected, then forget them.
pub(crate) fn display_warnings() {
    log::debug!("Displaying warnings");
    let mut warnings = match WARNINGS.lock() {
        Ok(w) => w,
        Err(poisoned) => poisoned.into_inner(),
    };
    if warnings.is_empty() {
        return;
    }

    log::warn!("{}", console::style("Warnings").bold());
    for (symbol, line) in tree(&warnings) {
        log::warn!("{symbol} {line}");
    }
    log::warn!("");
    warnings.clear();
}
