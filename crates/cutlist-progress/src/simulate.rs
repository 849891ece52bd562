//! Simulated ingestion pipeline
//!
//! Drives a [`SessionStore`] the way the extraction pipeline does: one task
//! per file walking the stage sequence, a poller reading the snapshot, and an
//! optional cancellation request partway through. Used by the
//! `cutlist-progress simulate` command and the integration tests.

use futures::future::join_all;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cutlist_common::{CutlistError, Result};

use crate::file_progress::{
    cancel_file, complete_file, fail_file, start_file, update_file_stage,
};
use crate::format::{format_eta, format_file_size, stage_label};
use crate::lifecycle::{cancel_session, complete_session};
use crate::session::{init, new_session_id};
use crate::store::SessionStore;
use crate::types::{
    CompletionDetails, FileInput, FileStage, FileStatus, SessionStatus, Snapshot,
};

/// Stage/progress checkpoints a worker reports after `start_file`.
const STAGE_PLAN: [(FileStage, u8); 4] = [
    (FileStage::Detecting, 20),
    (FileStage::Ocr, 50),
    (FileStage::Parsing, 75),
    (FileStage::Validating, 90),
];

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub files: usize,
    /// Time each stage takes
    pub stage_delay: Duration,
    pub poll_interval: Duration,
    /// Request cancellation this long after the session starts
    pub cancel_after: Option<Duration>,
    /// Fail every n-th file (1-based)
    pub fail_every: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            files: 4,
            stage_delay: Duration::from_millis(200),
            poll_interval: Duration::from_millis(250),
            cancel_after: None,
            fail_every: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.files == 0 {
            return Err(CutlistError::InvalidInput(
                "Simulation needs at least one file".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(CutlistError::InvalidInput(
                "Poll interval must be greater than 0".to_string(),
            ));
        }
        if self.fail_every == Some(0) {
            return Err(CutlistError::InvalidInput(
                "fail_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn should_fail(&self, index: usize) -> bool {
        self.fail_every.is_some_and(|n| (index + 1) % n == 0)
    }
}

/// Run one simulated batch to completion and return its final snapshot.
pub async fn run_simulation(store: &SessionStore, config: SimulationConfig) -> Result<Arc<Snapshot>> {
    config.validate()?;

    let session_id = new_session_id();
    let inputs: Vec<FileInput> = (0..config.files)
        .map(|i| FileInput::with_size(format!("cutlist_{:02}.pdf", i + 1), 180_000 + i as u64 * 45_000))
        .collect();
    let total_bytes: u64 = inputs.iter().filter_map(|f| f.size).sum();

    store.set(&session_id, init(&session_id, &inputs, None));
    info!(
        session_id = %session_id,
        files = config.files,
        size = %format_file_size(total_bytes),
        "Simulated ingestion started"
    );

    let token = store
        .cancellation_token(&session_id)
        .ok_or_else(|| CutlistError::SessionNotFound(session_id.clone()))?;

    let workers: Vec<_> = (0..config.files)
        .map(|index| {
            tokio::spawn(run_worker(
                store.clone(),
                session_id.clone(),
                index,
                token.clone(),
                config.clone(),
            ))
        })
        .collect();

    let canceller = config.cancel_after.map(|after| {
        let store = store.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let accepted = store.request_cancellation(&session_id);
            info!(session_id = %session_id, accepted, "Simulated cancellation request");
        })
    });

    let all_workers = join_all(workers);
    tokio::pin!(all_workers);
    let mut ticker = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            results = &mut all_workers => {
                for result in results {
                    if let Err(e) = result {
                        warn!(session_id = %session_id, error = %e, "Worker task failed");
                    }
                }
                break;
            }
            _ = ticker.tick() => {
                if let Some(snapshot) = store.get(&session_id) {
                    log_progress(&snapshot);
                }
            }
        }
    }

    if let Some(canceller) = canceller {
        canceller.abort();
    }

    let finalized = store.update(&session_id, |snapshot| {
        if snapshot.cancel_requested && snapshot.status != SessionStatus::Complete {
            cancel_session(snapshot, None)
        } else if snapshot.status == SessionStatus::Complete {
            complete_session(snapshot, Some("All files processed"))
        } else {
            snapshot.clone()
        }
    });

    let snapshot = finalized.ok_or(CutlistError::SessionNotFound(session_id))?;
    info!(
        session_id = %snapshot.session_id,
        status = %snapshot.status,
        processed = snapshot.overall.processed_files,
        failed = snapshot.overall.failed_files,
        cancelled = snapshot.overall.cancelled_files,
        items = snapshot.overall.total_items_found,
        "Simulated ingestion finished"
    );
    Ok(snapshot)
}

/// Write `snapshot` as pretty-printed JSON, the same body a polling client
/// receives.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!(path = %path.display(), session_id = %snapshot.session_id, "Snapshot written");
    Ok(())
}

async fn run_worker(
    store: SessionStore,
    session_id: String,
    index: usize,
    token: CancellationToken,
    config: SimulationConfig,
) {
    if store.is_cancellation_requested(&session_id) {
        debug!(session_id = %session_id, file_index = index, "Cancelled before start");
        return;
    }

    store.update(&session_id, |s| start_file(s, index, None));

    for (stage, progress) in STAGE_PLAN {
        tokio::select! {
            _ = token.cancelled() => {
                store.update(&session_id, |s| cancel_file(s, index, None));
                debug!(session_id = %session_id, file_index = index, "Worker observed cancellation");
                return;
            }
            _ = tokio::time::sleep(config.stage_delay) => {}
        }

        let message = format!("File {}: {}", index + 1, stage_label(stage));
        store.update(&session_id, |s| {
            update_file_stage(s, index, stage, progress, Some(message.as_str()))
        });
    }

    if config.should_fail(index) {
        store.update(&session_id, |s| fail_file(s, index, "Simulated OCR timeout", None));
        return;
    }

    let items = 3 + (index as u32 * 7) % 11;
    let details = CompletionDetails {
        confidence: Some(0.75 + (index % 5) as f64 * 0.05),
        template_detected: Some(index % 2 == 0),
        template_id: (index % 2 == 0).then(|| "tpl_generic_cutlist".to_string()),
    };
    store.update(&session_id, |s| complete_file(s, index, items, details, None));
}

fn log_progress(snapshot: &Snapshot) {
    let active = snapshot
        .files
        .iter()
        .filter(|f| f.status == FileStatus::Processing)
        .map(|f| format!("{} ({})", f.file_name, stage_label(f.stage)))
        .collect::<Vec<_>>()
        .join(", ");

    info!(
        session_id = %snapshot.session_id,
        progress = snapshot.overall.overall_progress,
        done = snapshot.overall.finished_files(),
        total = snapshot.overall.total_files,
        eta = %format_eta(snapshot.overall.eta_seconds),
        active = %active,
        "Progress"
    );
}
