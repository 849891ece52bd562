//! Batch ingestion progress tracker
//!
//! Tracks a batch of files submitted together for AI/OCR cutlist extraction:
//! per-file stage and status, aggregate completion, estimated time remaining
//! and cooperative cancellation, shared between concurrent pipeline workers
//! and polling clients.
//!
//! # Overview
//!
//! - **Types** ([`types`]): snapshot, file and aggregate records
//! - **Aggregation** ([`aggregate`]): statistics derived from file records
//! - **Sessions** ([`session`]): initial snapshot for a batch
//! - **File updates** ([`file_progress`]): pure per-file transitions
//! - **Lifecycle** ([`lifecycle`]): complete, fail or cancel a whole session
//! - **Store** ([`store`]): concurrent map with idle expiry and cancellation
//! - **Formatting** ([`format`]): ETA and stage labels for display
//!
//! Every function outside the store is pure: it takes a snapshot and returns
//! a new one. The store is the only shared state and is constructed
//! explicitly, once, by the host process.
//!
//! # Example
//!
//! ```no_run
//! use cutlist_progress::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SessionStore::new(TrackerConfig::default());
//!     let _sweeper = store.spawn_sweeper();
//!
//!     let id = new_session_id();
//!     let files = [FileInput::new("kitchen.pdf"), FileInput::new("wardrobe.jpg")];
//!     store.set(&id, init(&id, &files, None));
//!
//!     store.update(&id, |s| start_file(s, 0usize, None));
//!     store.update(&id, |s| update_file_stage(s, 0usize, FileStage::Ocr, 50, None));
//!     store.update(&id, |s| {
//!         complete_file(s, 0usize, 12, CompletionDetails::with_confidence(0.9), None)
//!     });
//!
//!     let snapshot = store.get(&id).expect("session is live");
//!     println!("{}% done", snapshot.overall.overall_progress);
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod file_progress;
pub mod format;
pub mod lifecycle;
pub mod session;
pub mod simulate;
pub mod store;
pub mod types;

pub mod prelude {
    pub use crate::aggregate::recalc;
    pub use crate::config::TrackerConfig;
    pub use crate::file_progress::{
        cancel_file, cancel_file_at, complete_file, complete_file_at, fail_file, fail_file_at,
        start_file, start_file_at, update_file, update_file_at, update_file_stage,
        update_file_stage_at,
    };
    pub use crate::format::{format_eta, stage_label};
    pub use crate::lifecycle::{
        cancel_session, cancel_session_at, complete_session, complete_session_at, fail_session,
        fail_session_at,
    };
    pub use crate::session::{init, init_at, new_session_id};
    pub use crate::store::{SessionStore, SweeperHandle};
    pub use crate::types::{
        CompletionDetails, FileInput, FileProgress, FileRef, FileStage, FileStatus, FileUpdate,
        OverallStats, Ownership, SessionStatus, Snapshot,
    };
}

pub use store::SessionStore;
pub use types::Snapshot;
