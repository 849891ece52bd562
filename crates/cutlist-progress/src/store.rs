//! Concurrent, TTL-evicting session store
//!
//! The store is the one shared, mutable piece of the tracker: a map from
//! session id to the latest [`Snapshot`]. Writers follow
//! read-current -> compute-new -> write-new using the pure functions of this
//! crate. Snapshots are held as `Arc<Snapshot>` and replaced wholesale, so a
//! reader never observes a half-applied update.
//!
//! Sessions expire after `session_ttl` without a write. Expiry is enforced
//! lazily on reads and by a background sweeper ([`SessionStore::spawn_sweeper`]).
//!
//! # Example
//!
//! ```no_run
//! use cutlist_progress::{config::TrackerConfig, file_progress, session, store::SessionStore};
//! use cutlist_progress::types::FileInput;
//!
//! # async fn run() {
//! let store = SessionStore::new(TrackerConfig::default());
//! let _sweeper = store.spawn_sweeper();
//!
//! let id = session::new_session_id();
//! store.set(&id, session::init(&id, &[FileInput::new("a.pdf")], None));
//! store.update(&id, |snap| file_progress::start_file(snap, 0usize, None));
//!
//! if store.is_cancellation_requested(&id) {
//!     // stop starting new work
//! }
//! # }
//! ```

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::types::{EpochMillis, SessionStatus, Snapshot};

#[derive(Debug)]
struct SessionEntry {
    snapshot: Arc<Snapshot>,
    cancel: CancellationToken,
}

impl SessionEntry {
    fn new(snapshot: Arc<Snapshot>) -> Self {
        let cancel = CancellationToken::new();
        if snapshot.cancel_requested {
            cancel.cancel();
        }
        Self { snapshot, cancel }
    }

    /// Store `next`, keeping the cancellation flag and token in agreement.
    /// A flag that was ever raised stays raised.
    fn replace(&mut self, mut next: Snapshot) -> Arc<Snapshot> {
        if self.cancel.is_cancelled() || self.snapshot.cancel_requested {
            next.cancel_requested = true;
        }
        if next.cancel_requested {
            self.cancel.cancel();
        }
        self.snapshot = Arc::new(next);
        Arc::clone(&self.snapshot)
    }
}

type SessionMap = DashMap<String, SessionEntry>;

fn is_expired(snapshot: &Snapshot, now: EpochMillis, ttl_ms: i64) -> bool {
    now.saturating_sub(snapshot.overall.last_update_at) > ttl_ms
}

fn sweep_map(sessions: &SessionMap, now: EpochMillis, ttl_ms: i64) -> usize {
    let mut evicted = 0usize;
    sessions.retain(|session_id, entry| {
        if is_expired(&entry.snapshot, now, ttl_ms) {
            debug!(session_id = %session_id, "Evicting expired session");
            evicted += 1;
            false
        } else {
            true
        }
    });
    evicted
}

/// Process-wide progress board. Construct once and share by cloning.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<SessionMap>,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn now(&self) -> EpochMillis {
        self.clock.now_millis()
    }

    /// Current reading of the store's clock, for the `*_at` update helpers.
    pub fn now_millis(&self) -> EpochMillis {
        self.now()
    }

    fn expired(&self, snapshot: &Snapshot, now: EpochMillis) -> bool {
        is_expired(snapshot, now, self.config.ttl_millis())
    }

    /// Drop `session_id` if it is still expired at `now`.
    fn evict_if_expired(&self, session_id: &str, now: EpochMillis) {
        let removed = self
            .sessions
            .remove_if(session_id, |_, entry| self.expired(&entry.snapshot, now));
        if removed.is_some() {
            debug!(session_id, "Evicted expired session on access");
        }
    }

    /// Current snapshot, or `None` if the session is unknown or has been idle
    /// longer than the TTL (in which case it is evicted).
    pub fn get(&self, session_id: &str) -> Option<Arc<Snapshot>> {
        let now = self.now();
        {
            let entry = self.sessions.get(session_id)?;
            if !self.expired(&entry.snapshot, now) {
                return Some(Arc::clone(&entry.snapshot));
            }
        }
        self.evict_if_expired(session_id, now);
        None
    }

    /// Store `snapshot` as the session's current state.
    ///
    /// `overall.lastUpdateAt` is always stamped with the store's clock, so a
    /// caller-supplied timestamp can never make a live session look stale.
    /// Last writer wins; prefer [`SessionStore::update`] for read-modify-write.
    pub fn set(&self, session_id: &str, mut snapshot: Snapshot) -> Arc<Snapshot> {
        let now = self.now();
        snapshot.overall.last_update_at = now;

        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.expired(&occupied.get().snapshot, now) {
                    let entry = SessionEntry::new(Arc::new(snapshot));
                    let stored = Arc::clone(&entry.snapshot);
                    occupied.insert(entry);
                    stored
                } else {
                    occupied.get_mut().replace(snapshot)
                }
            },
            Entry::Vacant(vacant) => {
                debug!(session_id, files = snapshot.files.len(), "Tracking new session");
                let entry = SessionEntry::new(Arc::new(snapshot));
                let stored = Arc::clone(&entry.snapshot);
                vacant.insert(entry);
                stored
            },
        }
    }

    /// Apply `f` to the current snapshot and store the result.
    ///
    /// `f` runs while the session's slot is locked, so two `update` calls on
    /// the same session never lose each other's changes. It must be quick
    /// and must not call back into the store. Returns `None` (and does not
    /// call `f`) when the session is absent or expired.
    pub fn update<F>(&self, session_id: &str, f: F) -> Option<Arc<Snapshot>>
    where
        F: FnOnce(&Snapshot) -> Snapshot,
    {
        let now = self.now();
        {
            let mut entry = self.sessions.get_mut(session_id)?;
            if !self.expired(&entry.snapshot, now) {
                let mut next = f(entry.snapshot.as_ref());
                next.overall.last_update_at = now;
                return Some(entry.replace(next));
            }
        }
        self.evict_if_expired(session_id, now);
        None
    }

    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id, "Session deleted");
        }
        removed
    }

    /// Whether a live (unexpired) session exists.
    pub fn has(&self, session_id: &str) -> bool {
        let now = self.now();
        self.sessions
            .get(session_id)
            .is_some_and(|entry| !self.expired(&entry.snapshot, now))
    }

    /// Ids of all unexpired sessions, in no particular order.
    pub fn list_active(&self) -> Vec<String> {
        let now = self.now();
        self.sessions
            .iter()
            .filter(|entry| !self.expired(&entry.snapshot, now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of held entries, including expired ones not yet swept.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Ask the pipeline to stop a session.
    ///
    /// Only a live session that is still processing accepts the request.
    /// This writes directly rather than through [`SessionStore::update`] so
    /// the flag lands even while workers are busy computing their next
    /// snapshot; it also fires the session's cancellation token.
    pub fn request_cancellation(&self, session_id: &str) -> bool {
        let now = self.now();
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            debug!(session_id, "Cancellation requested for unknown session");
            return false;
        };

        if self.expired(&entry.snapshot, now) {
            drop(entry);
            self.evict_if_expired(session_id, now);
            return false;
        }

        if entry.snapshot.status != SessionStatus::Processing {
            debug!(
                session_id,
                status = %entry.snapshot.status,
                "Cancellation rejected, session is not processing"
            );
            return false;
        }

        let mut next = Snapshot::clone(&entry.snapshot);
        next.cancel_requested = true;
        next.overall.last_update_at = now;
        entry.replace(next);

        info!(session_id, "Cancellation requested");
        true
    }

    /// Cheap check for workers between stages. An expired session reads as
    /// not cancelled, like any other absent session.
    pub fn is_cancellation_requested(&self, session_id: &str) -> bool {
        let now = self.now();
        self.sessions.get(session_id).is_some_and(|entry| {
            !self.expired(&entry.snapshot, now)
                && (entry.snapshot.cancel_requested || entry.cancel.is_cancelled())
        })
    }

    /// Token that fires when cancellation is requested for the session.
    ///
    /// Lets a worker `select!` on cancellation instead of polling.
    pub fn cancellation_token(&self, session_id: &str) -> Option<CancellationToken> {
        let now = self.now();
        self.sessions
            .get(session_id)
            .filter(|entry| !self.expired(&entry.snapshot, now))
            .map(|entry| entry.cancel.clone())
    }

    /// Evict every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let evicted = sweep_map(&self.sessions, self.now(), self.config.ttl_millis());
        if evicted > 0 {
            info!(evicted, remaining = self.sessions.len(), "Swept expired sessions");
        }
        evicted
    }

    /// Start the periodic eviction task on the current tokio runtime.
    ///
    /// The task holds only a weak reference to the map: it ends on its own
    /// once every clone of the store is dropped, and it never keeps the
    /// runtime from shutting down. Dropping the returned handle stops it.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let sessions: Weak<SessionMap> = Arc::downgrade(&self.sessions);
        let clock = Arc::clone(&self.clock);
        let ttl_ms = self.config.ttl_millis();
        let period = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(sessions) = sessions.upgrade() else {
                    debug!("Session store dropped, stopping sweeper");
                    break;
                };
                let evicted = sweep_map(&sessions, clock.now_millis(), ttl_ms);
                if evicted > 0 {
                    info!(evicted, remaining = sessions.len(), "Swept expired sessions");
                }
            }
        });

        info!(interval_secs = period.as_secs(), "Session sweeper started");
        SweeperHandle { handle }
    }
}

/// Owns the background sweeper task; aborts it on drop.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::file_progress::{complete_file, start_file};
    use crate::session::init_at;
    use crate::types::{CompletionDetails, FileInput};
    use std::time::Duration;

    const MINUTE: i64 = 60_000;

    fn store_at(start: EpochMillis) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let store = SessionStore::with_clock(TrackerConfig::default(), clock.clone());
        (store, clock)
    }

    fn snapshot(id: &str) -> Snapshot {
        init_at(id, &[FileInput::new("a.pdf"), FileInput::new("b.pdf")], None, 0)
    }

    #[test]
    fn test_set_stamps_last_update() {
        let (store, _clock) = store_at(5 * MINUTE);
        let mut snap = snapshot("s1");
        snap.overall.last_update_at = 1;
        let stored = store.set("s1", snap);
        assert_eq!(stored.overall.last_update_at, 5 * MINUTE);
        assert_eq!(store.get("s1").unwrap().overall.last_update_at, 5 * MINUTE);
    }

    #[test]
    fn test_get_expires_after_ttl() {
        let (store, clock) = store_at(0);
        store.set("s1", snapshot("s1"));

        clock.advance_millis(30 * MINUTE);
        assert!(store.get("s1").is_some(), "exactly at TTL is still live");

        clock.advance_millis(1);
        assert!(store.get("s1").is_none());
        assert_eq!(store.count(), 0, "expired entry is evicted on read");
    }

    #[test]
    fn test_writes_extend_ttl_but_reads_do_not() {
        let (store, clock) = store_at(0);
        store.set("s1", snapshot("s1"));

        clock.advance_millis(20 * MINUTE);
        assert!(store.get("s1").is_some());
        store.update("s1", |s| start_file(s, 0usize, None));

        clock.advance_millis(20 * MINUTE);
        assert!(store.get("s1").is_some());

        clock.advance_millis(11 * MINUTE);
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn test_update_missing_session() {
        let (store, _clock) = store_at(0);
        let mut called = false;
        let result = store.update("nope", |s| {
            called = true;
            s.clone()
        });
        assert!(result.is_none());
        assert!(!called);
    }

    #[test]
    fn test_admin_operations() {
        let (store, clock) = store_at(0);
        store.set("s1", snapshot("s1"));
        clock.advance_millis(10 * MINUTE);
        store.set("s2", snapshot("s2"));

        assert!(store.has("s1"));
        assert_eq!(store.count(), 2);
        let mut active = store.list_active();
        active.sort();
        assert_eq!(active, vec!["s1".to_string(), "s2".to_string()]);

        clock.advance_millis(25 * MINUTE);
        assert!(!store.has("s1"));
        assert_eq!(store.list_active(), vec!["s2".to_string()]);
        assert_eq!(store.count(), 2, "not swept yet");
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.count(), 1);

        assert!(store.delete("s2"));
        assert!(!store.delete("s2"));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_request_cancellation_only_while_processing() {
        let (store, _clock) = store_at(0);
        store.set("s1", snapshot("s1"));

        assert!(!store.is_cancellation_requested("s1"));
        assert!(store.request_cancellation("s1"));
        assert!(store.is_cancellation_requested("s1"));
        assert!(store.get("s1").unwrap().cancel_requested);

        assert!(!store.request_cancellation("unknown"));
    }

    #[test]
    fn test_request_cancellation_rejected_when_complete() {
        let (store, _clock) = store_at(0);
        store.set("s1", snapshot("s1"));
        let done = store
            .update("s1", |s| {
                let s = complete_file(s, 0usize, 1, CompletionDetails::default(), None);
                complete_file(&s, 1usize, 1, CompletionDetails::default(), None)
            })
            .unwrap();
        assert_eq!(done.status, SessionStatus::Complete);

        assert!(!store.request_cancellation("s1"));
        assert!(!store.get("s1").unwrap().cancel_requested);
        assert!(!store.is_cancellation_requested("s1"));
    }

    #[test]
    fn test_cancel_flag_is_monotonic() {
        let (store, _clock) = store_at(0);
        let stale = snapshot("s1");
        store.set("s1", stale.clone());
        assert!(store.request_cancellation("s1"));

        // A worker writing back a copy read before the request.
        let stored = store.set("s1", start_file(&stale, 0usize, None));
        assert!(stored.cancel_requested);
        assert!(store.is_cancellation_requested("s1"));
    }

    #[test]
    fn test_cancellation_flag_expires_with_session() {
        let (store, clock) = store_at(0);
        store.set("s1", snapshot("s1"));
        assert!(store.request_cancellation("s1"));

        clock.advance_millis(31 * MINUTE);
        assert_eq!(store.count(), 1, "not swept yet");
        assert!(!store.has("s1"));
        assert!(!store.is_cancellation_requested("s1"));
        assert!(store.cancellation_token("s1").is_none());
    }

    #[tokio::test]
    async fn test_cancellation_token_fires() {
        let (store, _clock) = store_at(0);
        store.set("s1", snapshot("s1"));
        let token = store.cancellation_token("s1").unwrap();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn(async move { token.cancelled().await });
        assert!(store.request_cancellation("s1"));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("token should fire")
            .unwrap();

        assert!(store.cancellation_token("missing").is_none());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let (store, _clock) = store_at(0);
        store.set("s1", snapshot("s1"));
        let held = store.get("s1").unwrap();
        store.update("s1", |s| start_file(s, 1usize, None));
        assert_eq!(held.files[1].progress, 0);
        assert_eq!(store.get("s1").unwrap().files[1].progress, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_expired_sessions() {
        let clock = Arc::new(ManualClock::new(0));
        let config = TrackerConfig {
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        };
        let store = SessionStore::with_clock(config, clock.clone());
        let sweeper = store.spawn_sweeper();

        store.set("s1", snapshot("s1"));
        clock.advance_millis(31 * MINUTE);

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(store.count(), 0);
        assert!(store.list_active().is_empty());
        assert!(!sweeper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_store_dropped() {
        let config = TrackerConfig {
            session_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
        };
        let store = SessionStore::new(config);
        let sweeper = store.spawn_sweeper();
        drop(store);

        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert!(sweeper.is_finished());
    }
}
