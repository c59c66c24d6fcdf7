// ── Lock state reconciliation ──
//
// The single writer of the current LockState. Stream events, query results,
// and optimistic command results all land here and are published to
// subscribers through `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::watch;

use lockwatch_api::{ActivityLogEntry, LockState, MotionClip, MotionEvent};

use crate::stream::Subscription;

/// Which entry point produced the current lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Pushed by the device over the event stream.
    Stream,
    /// Returned by an explicit `GET /lock/state`.
    Query,
    /// Stamped locally after a command was acknowledged.
    Optimistic,
}

/// The current lock state plus where and when it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub state: LockState,
    pub source: UpdateSource,
    pub received_at: DateTime<Utc>,
}

/// Reactive store for the device's lock state and history views.
///
/// Every lock update is a total replacement: last write wins, there is no
/// field-level merging. `watch::Sender::send_replace` serializes concurrent
/// writers, so no external locking is needed.
pub struct LockStore {
    lock: watch::Sender<Option<Arc<LockRecord>>>,
    activity: watch::Sender<Arc<Vec<ActivityLogEntry>>>,
    clips: watch::Sender<Arc<Vec<MotionClip>>>,
    last_motion: watch::Sender<Option<MotionEvent>>,
}

impl Default for LockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LockStore {
    pub fn new() -> Self {
        let (lock, _) = watch::channel(None);
        let (activity, _) = watch::channel(Arc::new(Vec::new()));
        let (clips, _) = watch::channel(Arc::new(Vec::new()));
        let (last_motion, _) = watch::channel(None);

        Self {
            lock,
            activity,
            clips,
            last_motion,
        }
    }

    // ── Lock state entry points ──────────────────────────────────────

    /// A `lock_state` event from the device. Always wins.
    pub fn apply_stream_event(&self, state: LockState) {
        self.replace(state, UpdateSource::Stream);
    }

    /// The result of an explicit state query.
    pub fn apply_query_result(&self, state: LockState) {
        self.replace(state, UpdateSource::Query);
    }

    /// A command the device acknowledged. Stamped with the local clock and
    /// overwritten by the next stream event.
    pub fn apply_optimistic_command(&self, is_locked: bool) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.replace(LockState::new(is_locked, timestamp), UpdateSource::Optimistic);
    }

    fn replace(&self, state: LockState, source: UpdateSource) {
        tracing::debug!(locked = state.is_locked, ?source, "lock state updated");
        self.lock.send_replace(Some(Arc::new(LockRecord {
            state,
            source,
            received_at: Utc::now(),
        })));
    }

    // ── Lock state read model ────────────────────────────────────────

    /// The current lock state, if any update has arrived yet.
    pub fn lock_state(&self) -> Option<LockState> {
        self.lock.borrow().as_ref().map(|r| r.state.clone())
    }

    pub fn lock_record(&self) -> Option<Arc<LockRecord>> {
        self.lock.borrow().clone()
    }

    pub fn subscribe_lock(&self) -> Subscription<Option<Arc<LockRecord>>> {
        Subscription::new(self.lock.subscribe())
    }

    // ── History views ────────────────────────────────────────────────

    /// Replace the activity list with the result of a successful fetch.
    pub fn replace_activity(&self, entries: Vec<ActivityLogEntry>) {
        self.activity.send_replace(Arc::new(entries));
    }

    pub fn activity_snapshot(&self) -> Arc<Vec<ActivityLogEntry>> {
        self.activity.borrow().clone()
    }

    /// Replace the clip list with the result of a successful fetch.
    pub fn replace_clips(&self, clips: Vec<MotionClip>) {
        self.clips.send_replace(Arc::new(clips));
    }

    pub fn clips_snapshot(&self) -> Arc<Vec<MotionClip>> {
        self.clips.borrow().clone()
    }

    // ── Motion ───────────────────────────────────────────────────────

    pub fn record_motion(&self, event: MotionEvent) {
        tracing::info!(clip = ?event.clip, "motion detected");
        self.last_motion.send_replace(Some(event));
    }

    pub fn last_motion(&self) -> Option<MotionEvent> {
        self.last_motion.borrow().clone()
    }

    pub fn subscribe_motion(&self) -> Subscription<Option<MotionEvent>> {
        Subscription::new(self.last_motion.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn starts_empty() {
        let store = LockStore::new();
        assert!(store.lock_state().is_none());
        assert!(store.activity_snapshot().is_empty());
        assert!(store.last_motion().is_none());
    }

    #[test]
    fn stream_events_are_last_write_wins() {
        let store = LockStore::new();
        let events = [
            LockState::new(true, "2026-01-05T10:00:00"),
            LockState::new(false, "2026-01-05T10:01:00"),
            LockState::new(false, "2026-01-05T09:00:00"),
            LockState::new(true, "2026-01-05T10:02:00"),
        ];
        for event in &events {
            store.apply_stream_event(event.clone());
        }
        assert_eq!(store.lock_state(), Some(events[3].clone()));
    }

    #[test]
    fn stale_event_after_reconnect_still_replaces() {
        let store = LockStore::new();
        store.apply_stream_event(LockState::new(true, "2026-01-05T10:05:00"));
        store.apply_stream_event(LockState::new(false, "2026-01-05T10:00:00"));
        assert_eq!(
            store.lock_state(),
            Some(LockState::new(false, "2026-01-05T10:00:00"))
        );
    }

    #[test]
    fn stream_overrides_optimistic() {
        let store = LockStore::new();
        store.apply_optimistic_command(true);
        let record = store.lock_record().unwrap();
        assert!(record.state.is_locked);
        assert_eq!(record.source, UpdateSource::Optimistic);
        assert!(DateTime::parse_from_rfc3339(&record.state.timestamp).is_ok());

        store.apply_stream_event(LockState::new(false, "T"));
        let record = store.lock_record().unwrap();
        assert_eq!(record.state, LockState::new(false, "T"));
        assert_eq!(record.source, UpdateSource::Stream);
    }

    #[test]
    fn query_result_replaces_wholesale() {
        let store = LockStore::new();
        store.apply_stream_event(LockState::new(true, "a"));
        store.apply_query_result(LockState::new(true, "b"));
        let record = store.lock_record().unwrap();
        assert_eq!(record.state.timestamp, "b");
        assert_eq!(record.source, UpdateSource::Query);
    }

    #[tokio::test]
    async fn subscribers_see_each_update() {
        let store = LockStore::new();
        let mut sub = store.subscribe_lock();
        assert!(sub.current().is_none());

        store.apply_stream_event(LockState::new(true, "a"));
        let seen = sub.changed().await.unwrap().unwrap();
        assert_eq!(seen.state.timestamp, "a");
        assert_eq!(sub.current().as_ref().unwrap().state.timestamp, "a");
    }

    #[test]
    fn history_lists_replace_wholesale() {
        let store = LockStore::new();
        store.replace_activity(vec![ActivityLogEntry {
            id: Some("1".into()),
            action: "Door locked".into(),
            timestamp: "a".into(),
            user: None,
            details: None,
        }]);
        store.replace_activity(Vec::new());
        assert!(store.activity_snapshot().is_empty());
    }
}
