//! Service layer: the ingestion pipeline.
//!
//! [`Ingestor`] drives the poll cycle, [`Reconciler`] projects each decoded
//! event onto the store, [`Notifier`] delivers per-user notifications and
//! [`MetadataRefresher`] rewrites listing metadata on demand.

pub mod ingestion;
pub mod metadata_refresh;
pub mod notifier;
pub mod reconciler;

pub use ingestion::{CycleReport, Ingestor};
pub use metadata_refresh::MetadataRefresher;
pub use notifier::{Notifier, PersistingNotifier};
pub use reconciler::{Outcome, Reconciler};
