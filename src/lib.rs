//! Lead lifecycle and assignment engine.
//!
//! Tracks sales leads through a pipeline of stages, schedules follow-up
//! contact from stage and call history, rotates new-lead assignment across a
//! pool of callers with a persisted round-robin cursor, and derives
//! funnel/performance analytics from the deduplicated lead set.
//!
//! Leads are deduplicated by phone fingerprint (digits only); the record
//! store is SQLite behind [`db::CrmDb`]. All core operations are synchronous
//! transformations over fetched data; the only cross-request coordination
//! point is the assignment cursor, advanced atomically in the store.

pub mod analytics;
pub mod callers;
pub mod db;
pub mod dedupe;
pub mod error;
pub mod importer;
pub mod leads;
pub mod migrations;
pub mod notification;
pub mod rotator;
pub mod scheduler;
pub mod stage;
pub mod util;

pub use db::CrmDb;
pub use error::{CrmError, CrmResult};
pub use stage::Stage;
