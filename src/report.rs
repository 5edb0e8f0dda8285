//! Reporting sink handed to the loader and extractor.
//!
//! Core code never touches the global subscriber directly; it reports
//! through a `Reporter` so tests can capture what happened.

use std::path::Path;

use tracing::{error, info, warn};

use crate::loader::LoadError;
use crate::parser::extract::SkipReason;

pub trait Reporter: Send + Sync {
    fn payload_loaded(&self, path: &Path);
    fn load_failed(&self, err: &LoadError);
    fn no_listings(&self);
    fn listing_skipped(&self, index: usize, item_id: Option<&str>, reason: &SkipReason);
    fn batch_done(&self, extracted: usize, skipped: usize);
}

/// Forwards every report to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn payload_loaded(&self, path: &Path) {
        info!(path = %path.display(), "Successfully read JSON file");
    }

    fn load_failed(&self, err: &LoadError) {
        error!(kind = err.kind(), "{}", err);
    }

    fn no_listings(&self) {
        warn!("No items found in data");
    }

    fn listing_skipped(&self, index: usize, item_id: Option<&str>, reason: &SkipReason) {
        error!(
            index,
            item_id = item_id.unwrap_or("-"),
            "Error processing item: {}",
            reason
        );
    }

    fn batch_done(&self, extracted: usize, skipped: usize) {
        info!(extracted, skipped, "Successfully processed {} items", extracted);
    }
}
