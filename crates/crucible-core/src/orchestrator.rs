//! Sequences one build end to end (spec.md §4.7).
//!
//! 1. Transitive-close the requested targets against the full target set.
//! 2. Expand each target into an [`Action`], consulting the IncrDeps store
//!    so a handler's `analyze_imports` only re-runs for sources that
//!    changed since the last build.
//! 3. Hand the restricted graph and actions to [`Scheduler`].
//! 4. Persist IncrDeps, flush the ActionCache, GC both if they've grown
//!    past a threshold.
//! 5. Translate the [`crucible_scheduler::SchedulerReport`] into a
//!    [`BuildReport`].

use crate::config::EngineConfig;
use crate::error::{BuilderError, Result};
use crate::event::{BuildEvent, EventSink, NullEventSink, SchedulerEventBridge};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::report::{BuildReport, FailureRecord};
use crucible_cache::ActionCache;
use crucible_cas::LocalCas;
use crucible_graph::BuildGraph;
use crucible_hash::fingerprint_action;
use crucible_incrdeps::{FileDependency, IncrDepsStore};
use crucible_scheduler::{Scheduler, SchedulerConfig};
use crucible_types::{Action, ActionFingerprint, ActionKind, Label, LanguageHandler, Target};
use petgraph::stable_graph::NodeIndex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Ready-to-build entries in the action cache past which a build triggers
/// LRU eviction, keeping the cache bounded without an explicit `gc`
/// command (spec.md §4.7 step 5: "optionally run GC if thresholds
/// exceeded").
const CACHE_GC_ENTRY_THRESHOLD: usize = 10_000;
const CACHE_GC_KEEP: usize = 5_000;

pub struct Orchestrator {
    workspace_root: PathBuf,
    config: EngineConfig,
    handlers: HashMap<String, Arc<dyn LanguageHandler>>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<dyn MetricsSink>,
}

impl Orchestrator {
    pub fn new(workspace_root: PathBuf, config: EngineConfig) -> Self {
        Self {
            workspace_root,
            config,
            handlers: HashMap::new(),
            sink: Arc::new(NullEventSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn register_handler(mut self, language: impl Into<String>, handler: Arc<dyn LanguageHandler>) -> Self {
        self.handlers.insert(language.into(), handler);
        self
    }

    /// Runs one build. `all_targets` is the full, validated workspace
    /// target set (external, spec.md §4.7 step 1); `explicit_actions`
    /// lets a caller hand the orchestrator pre-built actions for targets
    /// whose handler already ran fingerprint-affecting analysis elsewhere,
    /// bypassing synthesis for just those labels. Every other target with
    /// a registered handler gets a synthesized action.
    #[instrument(skip(self, all_targets, explicit_actions), fields(requested = requested.len()))]
    pub fn build(
        &self,
        all_targets: Vec<Target>,
        explicit_actions: HashMap<Label, Action>,
        requested: &[Label],
    ) -> Result<BuildReport> {
        let started = Instant::now();
        self.sink.emit(BuildEvent::Started);

        let full_graph = BuildGraph::build(all_targets)?;
        let requested_nodes: Vec<NodeIndex> = requested
            .iter()
            .map(|label| full_graph.find(label).ok_or_else(|| BuilderError::UnknownTarget(label.clone())))
            .collect::<Result<_>>()?;
        let closure_nodes = full_graph.transitive_closure(&requested_nodes);
        let closure_targets: Vec<Target> = closure_nodes
            .iter()
            .map(|&i| full_graph.node(i).target.clone())
            .collect();
        // Labels in the closure already resolve against each other (every
        // dependency of a closure member is itself in the closure), so
        // rebuilding from just this subset is safe.
        let graph = BuildGraph::build(closure_targets)?;

        let deps_path = self.config.cache_root.join("deps").join("dependencies.bin");
        let mut incr_store = IncrDepsStore::load(&deps_path)?;

        let actions_by_node = self.expand_actions(&graph, explicit_actions, &mut incr_store)?;

        incr_store.save(&deps_path)?;

        let cache = Arc::new(ActionCache::open(&self.config.cache_root)?);
        let cas = Arc::new(LocalCas::open(&self.config.cache_root)?);

        let bridge = Arc::new(SchedulerEventBridge {
            sink: self.sink.clone(),
            metrics: self.metrics.clone(),
        });

        let scheduler_config = SchedulerConfig {
            parallelism: self.config.parallelism,
            ..SchedulerConfig::default()
        };

        let scheduler = Scheduler::new(
            &graph,
            &actions_by_node,
            &self.handlers,
            cache.clone(),
            cas.clone(),
            self.workspace_root.clone(),
            &self.config.cache_root,
            scheduler_config,
            bridge,
        );
        let scheduler_report = scheduler.run();

        cache.flush()?;
        if cache.len() > CACHE_GC_ENTRY_THRESHOLD {
            let report = cache.gc(&crucible_cache::GcPolicy::Lru { keep: CACHE_GC_KEEP });
            info!(evicted = report.evicted_entries, "action cache GC ran past threshold");
            let referenced = cache.referenced_artifacts();
            cas.gc(&crucible_cas::GcPolicy::default(), &referenced)?;
        }

        let report = BuildReport {
            built: scheduler_report.built,
            cached: scheduler_report.cached,
            failed: scheduler_report
                .failed
                .into_iter()
                .map(|(label, reason)| FailureRecord { label, reason })
                .collect(),
            skipped: scheduler_report.skipped,
            duration: started.elapsed(),
        };

        if report.is_success() {
            self.sink.emit(BuildEvent::Completed(report.clone()));
        } else {
            self.sink.emit(BuildEvent::Failed(report.clone()));
        }

        Ok(report)
    }

    /// Builds the per-node `Action` map, honoring explicit overrides and
    /// otherwise synthesizing one from the target's registered handler,
    /// processed in dependency order so `upstream_outputs` can be filled
    /// in from already-fingerprinted dependencies (spec.md §4.2).
    fn expand_actions(
        &self,
        graph: &BuildGraph,
        mut explicit_actions: HashMap<Label, Action>,
        incr_store: &mut IncrDepsStore,
    ) -> Result<HashMap<NodeIndex, Action>> {
        let mut fingerprints: HashMap<Label, ActionFingerprint> = HashMap::new();
        let mut actions_by_node: HashMap<NodeIndex, Action> = HashMap::new();

        for node in topological_order(graph, &graph.node_indices()) {
            let target = &graph.node(node).target;
            let label = target.label.clone();

            let action = if let Some(explicit) = explicit_actions.remove(&label) {
                explicit
            } else if let Some(handler) = self.handlers.get(&target.language) {
                let inputs = self.expand_inputs(incr_store, target, handler.as_ref())?;
                let upstream: Vec<ActionFingerprint> = target
                    .deps
                    .iter()
                    .filter_map(|dep| fingerprints.get(dep).copied())
                    .collect();
                let mut action = Action::new(label.clone(), ActionKind::Compile, target.language.clone())
                    .with_inputs(inputs)
                    .with_upstream(upstream);
                let outputs = handler.outputs(target, &action);
                action = action.with_outputs(outputs);
                action
            } else {
                Action::no_op(label.clone())
            };

            let fp = fingerprint_action(&action, &self.workspace_root)?;
            fingerprints.insert(label, fp);
            actions_by_node.insert(node, action);
        }

        Ok(actions_by_node)
    }

    /// Expands a target's declared sources with the files they transitively
    /// import, so the action fingerprint is sensitive to import changes
    /// too (spec.md §4.3 IncrDeps, P2/P3 hermeticity/sensitivity). Reuses
    /// a source's last-recorded import set when its content digest hasn't
    /// changed, so unchanged files don't pay for re-analysis every build.
    fn expand_inputs(
        &self,
        incr_store: &mut IncrDepsStore,
        target: &Target,
        handler: &dyn LanguageHandler,
    ) -> Result<Vec<PathBuf>> {
        let mut inputs: Vec<PathBuf> = target.sources.clone();

        for source in &target.sources {
            let digest = crucible_hash::hash_file(&self.workspace_root.join(source))?;
            let fresh = incr_store.get(source).map(|record| record.is_fresh(&digest)).unwrap_or(false);

            let resolved_imports = if fresh {
                incr_store.get(source).expect("checked fresh above").imports.clone()
            } else {
                let imports = handler
                    .analyze_imports(std::slice::from_ref(source))
                    .map_err(|e| BuilderError::Analysis {
                        path: source.clone(),
                        reason: e.to_string(),
                    })?;
                let resolved: Vec<PathBuf> = imports.into_iter().filter_map(|import| import.resolved).collect();
                let import_digests = resolved
                    .iter()
                    .map(|p| crucible_hash::hash_file(&self.workspace_root.join(p)))
                    .collect::<crucible_hash::Result<Vec<_>>>()?;
                incr_store.upsert(FileDependency::new(source.clone(), resolved.clone(), digest, import_digests));
                resolved
            };

            inputs.extend(resolved_imports);
        }

        inputs.sort();
        inputs.dedup();
        Ok(inputs)
    }
}

/// Kahn's-algorithm topological order restricted to `nodes`, so dependency
/// actions are always fingerprinted before their dependents need the
/// result for `upstream_outputs`.
fn topological_order(graph: &BuildGraph, nodes: &[NodeIndex]) -> Vec<NodeIndex> {
    let mut remaining: HashSet<NodeIndex> = nodes.iter().copied().collect();
    let mut order = Vec::with_capacity(nodes.len());

    while !remaining.is_empty() {
        let mut ready: Vec<NodeIndex> = remaining
            .iter()
            .copied()
            .filter(|&n| graph.predecessors(n).into_iter().all(|p| !remaining.contains(&p)))
            .collect();
        ready.sort_by_key(|&n| graph.node(n).target.label.clone());
        for n in &ready {
            remaining.remove(n);
        }
        order.extend(ready);
    }

    order
}
