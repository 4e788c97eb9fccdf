// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Pretty printers for reporting information.
use std::{borrow::Cow, sync::Mutex};

use log::Level;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

type Block = Vec<Cow<'static, str>>;

lazy_static::lazy_static! {
    static ref COLLECTED_WARNINGS: Mutex<Vec<Block>> = Mutex::new(vec![]);
}

/// Log a titled group of blocks with box-drawing connectors, the last line of
/// the last block getting the corner.
fn display_blocks(level: Level, title: &str, blocks: &[Block]) {
    log::log!(level, "{}", console::style(title).bold());
    let num_blocks = blocks.len();
    for (i_block, block) in blocks.iter().enumerate() {
        let num_lines = block.len();
        for (i_line, line) in block.iter().enumerate() {
            let symbol = match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
                (0, true, true) => UP_AND_RIGHT,
                (0, _, _) => VERTICAL_AND_RIGHT,
                _ => VERTICAL,
            };
            log::log!(level, "{symbol} {line}");
        }
    }
    log::log!(level, "");
}

/// Info reported at the start of a stage, grouped under a bold title.
pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Block>,
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

    pub(crate) fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        display_blocks(Level::Info, &self.title, &self.blocks);
    }
}

/// Collect a warning for deferred display, so warnings come out grouped
/// rather than interleaved with the stage summary.
pub(crate) trait Warn {
    fn warn(self);
}

impl Warn for &'static str {
    fn warn(self) {
        COLLECTED_WARNINGS.lock().unwrap().push(vec![self.into()]);
    }
}

impl Warn for String {
    fn warn(self) {
        COLLECTED_WARNINGS.lock().unwrap().push(vec![self.into()]);
    }
}

impl Warn for Cow<'static, str> {
    fn warn(self) {
        COLLECTED_WARNINGS.lock().unwrap().push(vec![self]);
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        COLLECTED_WARNINGS.lock().unwrap().push(self);
    }
}

/// Print out any warnings that have been collected as arguments were parsed.
/// This should only be called once, before a stage starts running.
pub(crate) fn display_warnings() {
    let mut warnings = COLLECTED_WARNINGS.lock().unwrap();
    if warnings.is_empty() {
        return;
    }
    display_blocks(Level::Warn, "Warnings", &warnings);
    warnings.clear();
}
