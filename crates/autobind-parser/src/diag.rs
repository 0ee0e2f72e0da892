//! Skip reporting shared by the extraction passes

use std::cell::Cell;

use autobind_core::config::ParseConfig;
use tracing::{debug, warn};

/// Reports skipped declarations and counts them
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    warnings: bool,
    trace: bool,
    skipped: Cell<usize>,
}

impl Diagnostics {
    pub(crate) fn new(config: &ParseConfig) -> Self {
        Self {
            warnings: config.warnings,
            trace: config.trace,
            skipped: Cell::new(0),
        }
    }

    /// Record one skipped item
    pub(crate) fn skip(&self, what: &str, detail: &str) {
        self.skipped.set(self.skipped.get() + 1);
        if self.warnings {
            warn!("Skipping {}: {}", what, detail);
        } else {
            debug!("Skipping {}: {}", what, detail);
        }
    }

    /// Per-item tracing, only when parse tracing is on
    pub(crate) fn trace(&self, message: impl FnOnce() -> String) {
        if self.trace {
            debug!("{}", message());
        }
    }

    pub(crate) fn skipped(&self) -> usize {
        self.skipped.get()
    }
}
