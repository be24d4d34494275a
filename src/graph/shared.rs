//! Shared handle to the graph store
//!
//! Readers share a `tokio::sync::RwLock`. Assignment writers additionally
//! take a lock scoped to the candidate being written, so two requests
//! staffing the same person cannot both read the same headroom and
//! over-commit, while writers for different candidates never wait on each
//! other's load checks.

use super::staffing::{AssignmentSpec, ALLOCATION_EPSILON};
use super::store::{GraphError, GraphResult, GraphStore};
use super::types::{EdgeId, NodeId};
use super::view::GraphView;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, RwLockReadGuard, RwLockWriteGuard, RwLock};
use tracing::{debug, warn};

/// Outcome of a clamped assignment write
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub edge: EdgeId,
    pub candidate: NodeId,
    pub requested: f64,
    pub granted: f64,
    pub previous_load: f64,
    pub new_load: f64,
}

impl Grant {
    pub fn was_clamped(&self) -> bool {
        self.granted + ALLOCATION_EPSILON < self.requested
    }
}

#[derive(Debug, Clone)]
pub struct SharedGraph {
    store: Arc<RwLock<GraphStore>>,
    candidate_locks: Arc<Mutex<HashMap<NodeId, Arc<AsyncMutex<()>>>>>,
    closed: Arc<AtomicBool>,
}

impl SharedGraph {
    pub fn new(store: GraphStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            candidate_locks: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Acquire a read guard; many readers may hold one at once
    pub async fn read(&self) -> GraphResult<RwLockReadGuard<'_, GraphStore>> {
        self.ensure_open()?;
        Ok(self.store.read().await)
    }

    /// Acquire the write guard
    pub async fn write(&self) -> GraphResult<RwLockWriteGuard<'_, GraphStore>> {
        self.ensure_open()?;
        Ok(self.store.write().await)
    }

    /// Refuse all further access; callers get [`GraphError::Unavailable`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> GraphResult<()> {
        if self.is_closed() {
            return Err(GraphError::Unavailable("store handle closed".to_string()));
        }
        Ok(())
    }

    fn candidate_lock(&self, candidate: NodeId) -> GraphResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .candidate_locks
            .lock()
            .map_err(|_| GraphError::Unavailable("candidate lock table poisoned".to_string()))?;
        Ok(locks.entry(candidate).or_default().clone())
    }

    /// Write an assignment sized down to the candidate's remaining headroom.
    ///
    /// Returns `None` when the candidate has no headroom left; nothing is
    /// written in that case.
    pub async fn assign_clamped(
        &self,
        candidate: NodeId,
        project: NodeId,
        spec: AssignmentSpec,
        today: NaiveDate,
    ) -> GraphResult<Option<Grant>> {
        let lock = self.candidate_lock(candidate)?;
        let _held = lock.lock().await;

        let previous_load = self.read().await?.active_load(candidate, today);
        let headroom = 1.0 - previous_load;
        if headroom <= ALLOCATION_EPSILON {
            debug!(%candidate, previous_load, "no headroom left, skipping write");
            return Ok(None);
        }

        let requested = spec.allocation;
        let granted = requested.min(headroom);
        if granted + ALLOCATION_EPSILON < requested {
            warn!(%candidate, requested, granted, "allocation clamped to remaining headroom");
        }

        let edge = self.write().await?.insert_assignment(
            candidate,
            project,
            AssignmentSpec {
                allocation: granted,
                ..spec
            },
            today,
        )?;

        Ok(Some(Grant {
            edge,
            candidate,
            requested,
            granted,
            previous_load,
            new_load: previous_load + granted,
        }))
    }

    /// Write an assignment or fail with [`GraphError::AllocationExceeded`]
    pub async fn assign_strict(
        &self,
        candidate: NodeId,
        project: NodeId,
        spec: AssignmentSpec,
        today: NaiveDate,
    ) -> GraphResult<EdgeId> {
        let lock = self.candidate_lock(candidate)?;
        let _held = lock.lock().await;
        self.write().await?.insert_assignment(candidate, project, spec, today)
    }
}

impl Default for SharedGraph {
    fn default() -> Self {
        Self::new(GraphStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::staffing::{CandidateSpec, ProjectSpec, ProjectStatus};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    async fn seed(graph: &SharedGraph, projects: usize) -> (NodeId, Vec<NodeId>) {
        let mut store = graph.write().await.unwrap();
        let c = store
            .upsert_candidate(&CandidateSpec {
                id: "c-1".to_string(),
                name: "Ada".to_string(),
                ..Default::default()
            })
            .unwrap();
        let ps = (0..projects)
            .map(|i| {
                store
                    .upsert_project(&ProjectSpec {
                        id: format!("p-{}", i),
                        name: format!("Project {}", i),
                        required_skills: vec![],
                        start_date: None,
                        end_date: None,
                        budget: None,
                        status: ProjectStatus::Active,
                    })
                    .unwrap()
            })
            .collect();
        (c, ps)
    }

    #[tokio::test]
    async fn test_clamp_to_headroom() {
        let graph = SharedGraph::default();
        let (c, ps) = seed(&graph, 3).await;

        let first = graph.assign_clamped(c, ps[0], AssignmentSpec::new(0.6), today()).await.unwrap().unwrap();
        assert!(!first.was_clamped());

        let second = graph.assign_clamped(c, ps[1], AssignmentSpec::new(1.0), today()).await.unwrap().unwrap();
        assert!(second.was_clamped());
        assert!((second.granted - 0.4).abs() < 1e-9);
        assert!((second.new_load - 1.0).abs() < 1e-9);

        let third = graph.assign_clamped(c, ps[2], AssignmentSpec::new(0.5), today()).await.unwrap();
        assert!(third.is_none());
    }

    #[tokio::test]
    async fn test_strict_write_rejects() {
        let graph = SharedGraph::default();
        let (c, ps) = seed(&graph, 2).await;
        graph.assign_strict(c, ps[0], AssignmentSpec::new(0.8), today()).await.unwrap();
        let err = graph.assign_strict(c, ps[1], AssignmentSpec::new(0.5), today()).await.unwrap_err();
        assert!(matches!(err, GraphError::AllocationExceeded { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_never_overcommit() {
        let graph = SharedGraph::default();
        let (c, ps) = seed(&graph, 8).await;

        let mut handles = Vec::new();
        for p in ps {
            let graph = graph.clone();
            handles.push(tokio::spawn(async move {
                graph.assign_clamped(c, p, AssignmentSpec::new(0.3), today()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let load = graph.read().await.unwrap().active_load(c, today());
        assert!(load <= 1.0 + 1e-9, "load {} exceeds capacity", load);
        assert!((load - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_closed_handle_is_unavailable() {
        let graph = SharedGraph::default();
        graph.close();
        assert!(matches!(graph.read().await, Err(GraphError::Unavailable(_))));
    }
}
