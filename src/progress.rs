//! Observer trait for pipeline state changes.
//!
//! Register an [`Arc<dyn PipelineObserver>`] with
//! [`crate::PipelineBuilder::observer`] to receive every state change the
//! controller makes, in the order it makes them:
//!
//! ```text
//! cleared
//! status(reading) → status(converting) → pages_created([pending; N])
//! status(extracting)
//!   page_updated(0, processing) → page_updated(0, complete | error)
//!   page_updated(1, processing) → …
//! status(complete)
//! ```
//!
//! Observers only read; the records they receive are borrowed from the
//! controller and must be cloned if kept.
//!
//! # Example
//!
//! ```rust
//! use pdf2png::{PageRecord, PipelineObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct CountFinished(AtomicUsize);
//!
//! impl PipelineObserver for CountFinished {
//!     fn on_page_updated(&self, _index: usize, record: &PageRecord) {
//!         if record.status.is_terminal() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::output::{OverallStatus, PageRecord};
use serde::Serialize;
use std::sync::Arc;

/// Receives pipeline events.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Every call is made from the controller's task, one
/// at a time.
pub trait PipelineObserver: Send + Sync {
    /// Prior run's state was discarded; the page collection is now empty.
    fn on_cleared(&self) {}

    /// The overall status changed.
    fn on_status_changed(&self, status: &OverallStatus) {
        let _ = status;
    }

    /// Rasterisation finished; one `pending` record per page, in page order.
    fn on_pages_created(&self, records: &[PageRecord]) {
        let _ = records;
    }

    /// Record `index` (0-based) changed status.
    fn on_page_updated(&self, index: usize, record: &PageRecord) {
        let _ = (index, record);
    }
}

/// An observer that ignores everything.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias for the type stored by the pipeline.
pub type SharedObserver = Arc<dyn PipelineObserver>;

/// Owned form of one observer call, used by the stream API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Cleared,
    StatusChanged { status: OverallStatus },
    PagesCreated { records: Vec<PageRecord> },
    PageUpdated { index: usize, record: PageRecord },
}

/// Fan-out over every registered observer.
#[derive(Clone, Default)]
pub(crate) struct Observers(Vec<SharedObserver>);

impl Observers {
    pub(crate) fn push(&mut self, observer: SharedObserver) {
        self.0.push(observer);
    }

    pub(crate) fn cleared(&self) {
        self.0.iter().for_each(|o| o.on_cleared());
    }

    pub(crate) fn status(&self, status: &OverallStatus) {
        self.0.iter().for_each(|o| o.on_status_changed(status));
    }

    pub(crate) fn pages_created(&self, records: &[PageRecord]) {
        self.0.iter().for_each(|o| o.on_pages_created(records));
    }

    pub(crate) fn page_updated(&self, index: usize, record: &PageRecord) {
        self.0.iter().for_each(|o| o.on_page_updated(index, record));
    }
}
