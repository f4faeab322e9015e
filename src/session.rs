use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::form::PredictionForm;
use crate::models::NlpQueryResponse;
use crate::render::{render, RenderedResult};

pub const MIN_QUERY_LEN: usize = 3;
pub const MAX_QUERY_LEN: usize = 500;

/// One answered query
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub query: String,
    pub response: NlpQueryResponse,
    pub rendered: RenderedResult,
    pub recorded_at: DateTime<Utc>,
}

/// Query history, newest first.
/// Entries are only ever prepended, never edited or removed one by one.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct QueryHistory {
    entries: Vec<QueryRecord>,
}

impl QueryHistory {
    pub fn record(&mut self, query: &str, response: NlpQueryResponse) -> &QueryRecord {
        let record = QueryRecord {
            id: Uuid::new_v4(),
            query: query.to_string(),
            rendered: render(&response),
            response,
            recorded_at: Utc::now(),
        };
        self.entries.insert(0, record);
        &self.entries[0]
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[QueryRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trims and length-checks a query before it is sent anywhere
pub fn normalize_query(raw: &str) -> Result<String, String> {
    let query = raw.trim();
    let len = query.chars().count();
    if len < MIN_QUERY_LEN {
        return Err(format!("Query must be at least {} characters", MIN_QUERY_LEN));
    }
    if len > MAX_QUERY_LEN {
        return Err(format!("Query must be at most {} characters", MAX_QUERY_LEN));
    }
    Ok(query.to_string())
}

/// Everything one dashboard tab keeps between requests
#[derive(Debug, Clone)]
pub struct DashboardSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub history: QueryHistory,
    pub form: PredictionForm,
}

impl DashboardSession {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_seen: now,
            history: QueryHistory::default(),
            form: PredictionForm::new(),
        }
    }
}

/// In-memory sessions keyed by id; nothing survives a restart
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, DashboardSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let session = DashboardSession::new();
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        id
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<DashboardSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Runs `f` against the session under the read lock
    pub async fn read_session<T>(&self, id: Uuid, f: impl FnOnce(&DashboardSession) -> T) -> Option<T> {
        self.sessions.read().await.get(&id).map(f)
    }

    /// Runs `f` against the session under the write lock and marks it
    /// as seen. Never await upstream calls inside `f`.
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut DashboardSession) -> T,
    ) -> Option<T> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(&id).map(|session| {
            session.last_seen = Utc::now();
            f(session)
        })
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session last seen before `cutoff`
    pub async fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen >= cutoff);
        before - sessions.len()
    }

    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle));
        match cutoff {
            Some(cutoff) => self.evict_before(cutoff).await,
            None => 0,
        }
    }

    /// Periodically evicts sessions idle for longer than `idle`.
    /// Closed tabs never send a delete, so this is what bounds the store.
    pub fn spawn_eviction(&self, idle: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle(idle).await;
                if evicted > 0 {
                    info!(evicted, "evicted idle sessions");
                }
            }
        })
    }

    /// Tracks one in-flight prediction. Dropped before `finish`, it
    /// clears the pending flag so the form does not stay locked.
    pub fn submission(&self, id: Uuid) -> SubmissionGuard {
        SubmissionGuard {
            store: self.clone(),
            id,
            armed: true,
        }
    }
}

pub struct SubmissionGuard {
    store: SessionStore,
    id: Uuid,
    armed: bool,
}

impl SubmissionGuard {
    pub fn finish(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id;
        debug!(session_id = %id, "prediction request abandoned");

        if let Ok(mut sessions) = self.store.sessions.try_write() {
            if let Some(session) = sessions.get_mut(&id) {
                session.form.cancel();
            }
            return;
        }

        // Lock is busy; clear the flag once it frees up
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = self.store.clone();
            handle.spawn(async move {
                store.with_session(id, |session| session.form.cancel()).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_response(message: &str) -> NlpQueryResponse {
        NlpQueryResponse {
            success: true,
            intent: "general".to_string(),
            confidence: 0.5,
            result_type: "text".to_string(),
            data: json!(null),
            message: message.to_string(),
            interpretation: String::new(),
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut history = QueryHistory::default();
        for query in ["Q1", "Q2", "Q3"] {
            history.record(query, text_response(query));
        }

        let queries: Vec<&str> = history.entries().iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["Q3", "Q2", "Q1"]);
    }

    #[test]
    fn test_record_renders_response() {
        let mut history = QueryHistory::default();
        let record = history.record("Average age?", text_response("36 years"));

        assert_eq!(
            record.rendered,
            RenderedResult::Text { message: "36 years".to_string(), link: None }
        );
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_normalize_query_bounds() {
        assert_eq!(normalize_query("  Show trends  ").unwrap(), "Show trends");
        assert!(normalize_query(" hi ").is_err());
        assert!(normalize_query(&"x".repeat(MAX_QUERY_LEN + 1)).is_err());
        assert!(normalize_query(&"x".repeat(MAX_QUERY_LEN)).is_ok());
    }

    #[tokio::test]
    async fn test_store_create_update_remove() {
        let store = SessionStore::new();
        let id = store.create().await;

        let recorded = store
            .with_session(id, |session| {
                session.history.record("Show trends", text_response("ok"));
                session.history.len()
            })
            .await;
        assert_eq!(recorded, Some(1));

        let snapshot = store.snapshot(id).await.unwrap();
        assert_eq!(snapshot.history.entries()[0].query, "Show trends");

        assert!(store.remove(id).await);
        assert!(store.snapshot(id).await.is_none());
        assert_eq!(store.with_session(id, |_| ()).await, None);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.create().await;
        let b = store.create().await;

        store
            .with_session(a, |session| {
                session.history.record("Only in A", text_response("a"));
            })
            .await;

        assert_eq!(store.snapshot(b).await.unwrap().history.len(), 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let store = SessionStore::new();
        let stale = store.create().await;
        let fresh = store.create().await;

        let hour = chrono::Duration::hours(1);
        store
            .with_session(stale, |session| session.last_seen = Utc::now() - hour * 2)
            .await;

        assert_eq!(store.evict_before(Utc::now() - hour).await, 1);
        assert!(!store.contains(stale).await);
        assert!(store.contains(fresh).await);

        assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_writes_refresh_last_seen() {
        let store = SessionStore::new();
        let id = store.create().await;
        let created = store.snapshot(id).await.unwrap().last_seen;

        store
            .with_session(id, |session| session.last_seen = created - chrono::Duration::hours(3))
            .await;
        store.with_session(id, |_| ()).await;

        assert!(store.snapshot(id).await.unwrap().last_seen >= created);
        assert_eq!(store.read_session(id, |session| session.id).await, Some(id));
    }

    #[tokio::test]
    async fn test_dropped_submission_clears_pending() {
        let store = SessionStore::new();
        let id = store.create().await;

        store
            .with_session(id, |session| session.form.begin_submit().map(|_| ()))
            .await
            .unwrap()
            .unwrap();
        drop(store.submission(id));

        let pending = store.read_session(id, |session| session.form.view().pending).await;
        assert_eq!(pending, Some(false));
    }

    #[tokio::test]
    async fn test_finished_submission_leaves_form_alone() {
        let store = SessionStore::new();
        let id = store.create().await;

        store
            .with_session(id, |session| session.form.begin_submit().map(|_| ()))
            .await
            .unwrap()
            .unwrap();
        store.submission(id).finish();

        let pending = store.read_session(id, |session| session.form.view().pending).await;
        assert_eq!(pending, Some(true));
    }
}
