//! Process-local registry of in-flight analyses.
//!
//! Generalizes the reference media server's `ScanManager` active-scan map
//! from scan progress to analysis progress: a mutex-protected map keyed by a
//! generated id, with start/update/fail/complete/get/snapshot and idle
//! eviction of terminal entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use abs_import_contracts::ids::AnalysisId;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::analyzer::{AnalysisResult, Phase};

const TERMINAL_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AnalysisProgress {
    pub status: AnalysisStatus,
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub error: Option<String>,
    pub result: Option<Arc<AnalysisResult>>,
    terminal_at: Option<Instant>,
}

impl AnalysisProgress {
    fn new() -> Self {
        Self {
            status: AnalysisStatus::Running,
            phase: Phase::Parsing,
            current: 0,
            total: 0,
            error: None,
            result: None,
            terminal_at: None,
        }
    }
}

/// An immutable view of an entry, safe to hand across an HTTP response
/// boundary without holding the tracker's lock.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub id: AnalysisId,
    pub status: AnalysisStatus,
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub error: Option<String>,
    pub result: Option<Arc<AnalysisResult>>,
}

#[derive(Default)]
pub struct ProgressTracker {
    entries: RwLock<HashMap<AnalysisId, AnalysisProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a fresh entry in `running` state and returns its id.
    pub async fn start(&self) -> AnalysisId {
        let id = AnalysisId::new();
        self.entries.write().await.insert(id, AnalysisProgress::new());
        id
    }

    pub async fn update(&self, id: AnalysisId, phase: Phase, current: usize, total: usize) {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            if entry.status == AnalysisStatus::Running {
                entry.phase = phase;
                entry.current = current;
                entry.total = total;
            }
        }
    }

    /// Non-blocking variant of [`Self::update`] for callers stuck inside a
    /// synchronous progress callback (the analyzer's `on_progress` is plain
    /// `FnMut`, not async). A contended lock just drops that one tick —
    /// acceptable since progress reporting is best-effort.
    pub fn try_update(&self, id: AnalysisId, phase: Phase, current: usize, total: usize) {
        if let Ok(mut entries) = self.entries.try_write() {
            if let Some(entry) = entries.get_mut(&id) {
                if entry.status == AnalysisStatus::Running {
                    entry.phase = phase;
                    entry.current = current;
                    entry.total = total;
                }
            }
        }
    }

    pub async fn fail(&self, id: AnalysisId, message: impl Into<String>) {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            if entry.status == AnalysisStatus::Running {
                entry.status = AnalysisStatus::Failed;
                entry.error = Some(message.into());
                entry.terminal_at = Some(Instant::now());
            }
        }
    }

    pub async fn complete(&self, id: AnalysisId, result: AnalysisResult) {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            if entry.status == AnalysisStatus::Running {
                entry.phase = Phase::Done;
                entry.status = AnalysisStatus::Completed;
                entry.result = Some(Arc::new(result));
                entry.terminal_at = Some(Instant::now());
            }
        }
    }

    /// Looks up an entry without evicting it. Returns `None` for an unknown
    /// id — callers at the HTTP boundary surface this as a 404.
    pub async fn get(&self, id: AnalysisId) -> Option<ProgressSnapshot> {
        self.entries.read().await.get(&id).map(|e| snapshot(id, e))
    }

    pub async fn snapshot_all(&self) -> Vec<ProgressSnapshot> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, e)| snapshot(*id, e))
            .collect()
    }

    /// Drops terminal entries whose terminal transition is older than the
    /// retention window. Intended to be called periodically, not on every
    /// access, so a caller mid-poll never loses its own result.
    pub async fn evict_stale(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| match e.terminal_at {
            Some(t) => t.elapsed() < TERMINAL_RETENTION,
            None => true,
        });
    }
}

fn snapshot(id: AnalysisId, entry: &AnalysisProgress) -> ProgressSnapshot {
    ProgressSnapshot {
        id,
        status: entry.status,
        phase: entry.phase,
        current: entry.current,
        total: entry.total,
        error: entry.error.clone(),
        result: entry.result.clone(),
    }
}
