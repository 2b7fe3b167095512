//! The worker-pool scheduler (spec.md §4.6).

use crate::config::SchedulerConfig;
use crate::critical_path;
use crate::event::{EventSink, SchedulerEvent};
use crate::materialize::materialize;
use crate::ready_queue::ReadyQueue;
use crate::report::SchedulerReport;
use crate::semaphore::Semaphore;
use crate::state::NodeState;
use crucible_cache::{ActionCache, ActionEntry};
use crucible_cas::LocalCas;
use crucible_graph::BuildGraph;
use crucible_hash::fingerprint_action;
use crucible_types::{
    retry_with_backoff, Action, ArtifactDigest, Digest, HandlerError, HandlerOutcome, LanguageHandler,
    RetryOutcome,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use petgraph::stable_graph::NodeIndex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Drives a [`BuildGraph`] to completion in parallel (spec.md §4.6).
///
/// Owns no state across runs: a fresh `Scheduler` is built per build and
/// discarded once `run` returns, matching the BuildGraph's own lifecycle
/// (spec.md §3, "Lifecycles").
pub struct Scheduler<'a> {
    graph: &'a BuildGraph,
    actions: &'a HashMap<NodeIndex, Action>,
    handlers: &'a HashMap<String, Arc<dyn LanguageHandler>>,
    cache: Arc<ActionCache>,
    cas: Arc<LocalCas>,
    workspace_root: PathBuf,
    work_root: PathBuf,
    config: SchedulerConfig,
    sink: Arc<dyn EventSink>,
}

struct SharedState {
    node_state: DashMap<NodeIndex, NodeState>,
    in_degree: DashMap<NodeIndex, AtomicUsize>,
    in_flight: AtomicUsize,
    cancelled: AtomicBool,
    failures: Mutex<Vec<(crucible_types::Label, String)>>,
    built: AtomicUsize,
    cached: AtomicUsize,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: &'a BuildGraph,
        actions: &'a HashMap<NodeIndex, Action>,
        handlers: &'a HashMap<String, Arc<dyn LanguageHandler>>,
        cache: Arc<ActionCache>,
        cas: Arc<LocalCas>,
        workspace_root: PathBuf,
        cache_root: &Path,
        config: SchedulerConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            graph,
            actions,
            handlers,
            cache,
            cas,
            workspace_root,
            work_root: cache_root.join("work"),
            config,
            sink,
        }
    }

    #[instrument(skip(self), fields(nodes = self.graph.len()))]
    pub fn run(&self) -> SchedulerReport {
        let lengths = critical_path::compute(self.graph, |_| critical_path::DEFAULT_ACTION_DURATION);
        let ready_queue = ReadyQueue::new();

        let state = Arc::new(SharedState {
            node_state: DashMap::new(),
            in_degree: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
            built: AtomicUsize::new(0),
            cached: AtomicUsize::new(0),
        });

        for node in self.graph.node_indices() {
            state.node_state.insert(node, NodeState::Pending);
            let degree = self.graph.predecessors(node).len();
            state.in_degree.insert(node, AtomicUsize::new(degree));
        }

        for leaf in self.graph.leaves() {
            self.mark_ready(&state, &ready_queue, &lengths, leaf);
        }

        let subprocess_sem = Semaphore::new(self.config.max_concurrent_subprocesses.max(1));
        let workers = self.config.parallelism.max(1);

        let ready_queue_ref = &ready_queue;
        let lengths_ref = &lengths;
        let subprocess_sem_ref = &subprocess_sem;
        rayon::scope(|scope| {
            for _ in 0..workers {
                let state = state.clone();
                scope.spawn(move |_| {
                    self.worker_loop(&state, ready_queue_ref, lengths_ref, subprocess_sem_ref);
                });
            }
        });

        self.finalize(&state)
    }

    fn worker_loop(
        &self,
        state: &Arc<SharedState>,
        ready_queue: &ReadyQueue,
        lengths: &HashMap<NodeIndex, u64>,
        subprocess_sem: &Semaphore,
    ) {
        loop {
            let still_waiting = || state.in_flight.load(Ordering::SeqCst) > 0;
            let node = match ready_queue.pop(still_waiting) {
                Some(n) => n,
                None => return,
            };

            state.in_flight.fetch_add(1, Ordering::SeqCst);
            self.run_node(state, ready_queue, lengths, subprocess_sem, node);
            state.in_flight.fetch_sub(1, Ordering::SeqCst);
            ready_queue.wake_all();
        }
    }

    fn mark_ready(
        &self,
        state: &SharedState,
        ready_queue: &ReadyQueue,
        lengths: &HashMap<NodeIndex, u64>,
        node: NodeIndex,
    ) {
        state.node_state.insert(node, NodeState::Ready);
        let label = self.graph.node(node).target.label.clone();
        let len = lengths.get(&node).copied().unwrap_or(1);
        ready_queue.push(node, label, len);
    }

    fn run_node(
        &self,
        state: &Arc<SharedState>,
        ready_queue: &ReadyQueue,
        lengths: &HashMap<NodeIndex, u64>,
        subprocess_sem: &Semaphore,
        node: NodeIndex,
    ) {
        let target = &self.graph.node(node).target;
        let label = target.label.clone();

        if state.cancelled.load(Ordering::SeqCst) {
            state.node_state.insert(node, NodeState::Skipped);
            self.sink.emit(SchedulerEvent::TargetSkipped(label));
            return;
        }

        state.node_state.insert(node, NodeState::Running);
        self.sink.emit(SchedulerEvent::TargetStarted(label.clone()));
        let started = Instant::now();

        let synthesized;
        let action: &Action = match self.actions.get(&node) {
            Some(a) => a,
            None => {
                // A target with no sources and no deps still expands to one
                // no-op action (spec.md §4.1); callers that omitted it here
                // get a synthesized one so trivial targets still complete.
                synthesized = Action::no_op(label.clone());
                &synthesized
            }
        };

        let fingerprint = match fingerprint_action(action, &self.workspace_root) {
            Ok(fp) => fp,
            Err(e) => {
                self.fail_node(state, node, &label, e.to_string());
                return;
            }
        };

        if let Some(entry) = self.cache.lookup(fingerprint, &self.cas) {
            if entry.success {
                if self.materialize_outputs(&entry).is_ok() {
                    state.node_state.insert(node, NodeState::Cached);
                    state.cached.fetch_add(1, Ordering::SeqCst);
                    self.sink.emit(SchedulerEvent::TargetCached(label));
                    self.enqueue_successors(state, ready_queue, lengths, node);
                    return;
                }
            } else {
                self.fail_node(state, node, &label, "cached failure from this build".to_string());
                return;
            }
        }

        let handler = match self.handlers.get(&target.language) {
            Some(h) => h.clone(),
            None => {
                self.fail_node(
                    state,
                    node,
                    &label,
                    format!("no language handler registered for {}", target.language),
                );
                return;
            }
        };

        let working_dir = self.work_root.join(uuid::Uuid::new_v4().to_string());
        if std::fs::create_dir_all(&working_dir).is_err() {
            self.fail_node(state, node, &label, "failed to create working directory".to_string());
            return;
        }

        let _permit = subprocess_sem.acquire();
        let outcome = retry_with_backoff(self.config.retry_policy, |_attempt| {
            match handler.build(target, action, &self.workspace_root, &working_dir) {
                Ok(outcome) => Ok(outcome),
                Err(HandlerError::Timeout) => Err(RetryOutcome::Retryable(HandlerError::Timeout)),
                Err(e) => Err(RetryOutcome::Fatal(e)),
            }
        });
        drop(_permit);

        match outcome {
            Ok(outcome) if outcome.success => {
                match self.publish_outputs(&working_dir, &outcome) {
                    Ok(entry) => {
                        self.cache.insert(fingerprint, entry);
                        state.node_state.insert(node, NodeState::Completed);
                        state.built.fetch_add(1, Ordering::SeqCst);
                        self.sink
                            .emit(SchedulerEvent::TargetCompleted(label, started.elapsed()));
                        self.enqueue_successors(state, ready_queue, lengths, node);
                    }
                    Err(e) => self.fail_node(state, node, &label, e.to_string()),
                }
            }
            Ok(outcome) => {
                let reason = outcome.error.unwrap_or_else(|| "handler reported failure".to_string());
                self.cache.insert(
                    fingerprint,
                    ActionEntry::failing(BTreeMap::from([("error".to_string(), reason.clone())])),
                );
                self.fail_node(state, node, &label, reason);
            }
            Err(e) => {
                self.cache.insert(
                    fingerprint,
                    ActionEntry::failing(BTreeMap::from([("error".to_string(), e.to_string())])),
                );
                self.fail_node(state, node, &label, e.to_string());
            }
        }

        let _ = std::fs::remove_dir_all(&working_dir);
    }

    fn materialize_outputs(&self, entry: &ActionEntry) -> std::io::Result<()> {
        for (path, digest) in entry.output_paths.iter().zip(entry.output_digests.iter()) {
            let dest = self.workspace_root.join(path);
            materialize(&self.cas, *digest, &dest).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;
        }
        Ok(())
    }

    fn publish_outputs(&self, working_dir: &Path, outcome: &HandlerOutcome) -> crate::error::Result<ActionEntry> {
        let mut output_paths = Vec::with_capacity(outcome.outputs.len());
        let mut output_digests = Vec::with_capacity(outcome.outputs.len());
        for rel in &outcome.outputs {
            let full = working_dir.join(rel);
            let data = std::fs::read(&full).map_err(|source| crate::error::SchedulerError::Io {
                path: full.clone(),
                source,
            })?;
            let digest = ArtifactDigest::from_digest(Digest::from_bytes(*blake3::hash(&data).as_bytes()));
            self.cas.write(digest, &data)?;
            output_paths.push(rel.to_string_lossy().to_string());
            output_digests.push(digest);
        }
        let mut metadata = BTreeMap::new();
        if let Some(hash) = outcome.output_hash {
            metadata.insert("output_hash".to_string(), hash.to_hex());
        }
        for warning in &outcome.warnings {
            metadata.insert(format!("warning:{}", warning.len()), warning.clone());
        }
        Ok(ActionEntry::new(output_paths, output_digests, true, metadata))
    }

    fn fail_node(&self, state: &Arc<SharedState>, node: NodeIndex, label: &crucible_types::Label, reason: String) {
        state.node_state.insert(node, NodeState::Failed);
        state.failures.lock().push((label.clone(), reason.clone()));
        self.sink.emit(SchedulerEvent::TargetFailed(label.clone(), reason));
        if !self.config.keep_going {
            state.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn enqueue_successors(
        &self,
        state: &Arc<SharedState>,
        ready_queue: &ReadyQueue,
        lengths: &HashMap<NodeIndex, u64>,
        node: NodeIndex,
    ) {
        for succ in self.graph.successors(node) {
            let degree_entry = state.in_degree.get(&succ).unwrap();
            let remaining = degree_entry.fetch_sub(1, Ordering::SeqCst) - 1;
            if remaining == 0 {
                self.mark_ready(state, ready_queue, lengths, succ);
            }
        }
    }

    fn finalize(&self, state: &Arc<SharedState>) -> SchedulerReport {
        let mut skipped = 0usize;
        for node in self.graph.node_indices() {
            let is_pending = matches!(
                state.node_state.get(&node).map(|s| *s),
                Some(NodeState::Pending) | Some(NodeState::Ready)
            );
            if is_pending {
                state.node_state.insert(node, NodeState::Skipped);
                let label = self.graph.node(node).target.label.clone();
                self.sink.emit(SchedulerEvent::TargetSkipped(label));
                skipped += 1;
            }
        }

        let failures = state.failures.lock().clone();
        let report = SchedulerReport {
            built: state.built.load(Ordering::SeqCst),
            cached: state.cached.load(Ordering::SeqCst),
            failed: failures,
            skipped,
        };
        info!(
            built = report.built,
            cached = report.cached,
            failed = report.failed.len(),
            skipped = report.skipped,
            "build finished"
        );
        report
    }
}
