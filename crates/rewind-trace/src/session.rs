use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rewind_config::TraceConfig;

use crate::event::{ActivationId, EventKind, ThreadRef, TraceEvent};
use crate::label::IdentityLabeler;
use crate::render::ValueRenderer;
use crate::snapshot::{guarded, SnapshotRegistry, SnapshotValue};
use crate::value::{ObjRef, ObjectId, Value};

#[derive(Default)]
struct LogState {
    events: Vec<TraceEvent>,
    lines: Vec<String>,
    /// Objects already offered to the snapshot strategies.
    seen: HashSet<ObjectId>,
    /// Index of the last invocation announced by each running activation,
    /// waiting for its `ReturnedValue`.
    pending: HashMap<(u64, ActivationId), usize>,
}

/// The in-memory trace of one program run.
///
/// Probes running on any number of lanes append through [`TraceSession::record`];
/// readers take point-in-time copies with [`TraceSession::events`].
pub struct TraceSession {
    config: TraceConfig,
    registry: SnapshotRegistry,
    labeler: Arc<IdentityLabeler>,
    next_activation: AtomicI64,
    log: Mutex<LogState>,
}

impl Default for TraceSession {
    fn default() -> Self {
        Self::new(TraceConfig::default())
    }
}

impl std::fmt::Debug for TraceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceSession")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("events", &self.len())
            .finish_non_exhaustive()
    }
}

impl TraceSession {
    pub fn new(config: TraceConfig) -> Self {
        Self::with_registry(config, SnapshotRegistry::default())
    }

    pub fn with_registry(config: TraceConfig, registry: SnapshotRegistry) -> Self {
        Self {
            config,
            registry,
            labeler: Arc::new(IdentityLabeler::new()),
            next_activation: AtomicI64::new(0),
            log: Mutex::new(LogState::default()),
        }
    }

    pub fn registry(&self) -> &SnapshotRegistry {
        &self.registry
    }

    /// The labeler naming objects in log lines. Readers rendering values
    /// outside the session share it so labels agree with the log.
    pub fn labeler(&self) -> &Arc<IdentityLabeler> {
        &self.labeler
    }

    /// A fresh activation id, strictly greater than every id handed out
    /// since the last [`TraceSession::clear`].
    pub fn next_activation_id(&self) -> ActivationId {
        self.next_activation.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record(
        &self,
        thread: &ThreadRef,
        activation: ActivationId,
        line: Option<u32>,
        kind: EventKind,
    ) {
        let mut log = self.log.lock();

        if self.config.first_sight_snapshots {
            let observed: Vec<ObjRef> = kind
                .observed_values()
                .into_iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect();
            self.snapshot_first_sightings(&mut log, thread, activation, line, observed);
        }

        let post_call = match &kind {
            EventKind::ReturnedValue { .. } => log.pending.remove(&(thread.id(), activation)),
            EventKind::CatchValue { .. }
            | EventKind::ExitWithValue { .. }
            | EventKind::ExitWithException { .. } => {
                log.pending.remove(&(thread.id(), activation));
                None
            }
            _ => None,
        };
        let is_invocation = kind.is_invocation();

        let index = self.push(&mut log, thread, activation, line, kind);
        if is_invocation {
            log.pending.insert((thread.id(), activation), index);
        }

        if let Some(invocation) = post_call {
            let invocation = log.events[invocation].kind.clone();
            for strategy in self.registry.strategies() {
                let snapshots = guarded(strategy, "to_snapshot_events", || {
                    strategy.to_snapshot_events(&invocation)
                })
                .unwrap_or_default();
                for (object, snapshot) in snapshots {
                    log.seen.insert(object.id());
                    let nested = nested_objects(&snapshot);
                    let kind = EventKind::ObjectSnapshot {
                        object,
                        strategy: strategy.name(),
                        snapshot,
                    };
                    self.push(&mut log, thread, activation, line, kind);
                    if self.config.first_sight_snapshots {
                        self.snapshot_first_sightings(&mut log, thread, activation, line, nested);
                    }
                }
            }
        }
    }

    /// Record a baseline snapshot of every object in `objects` that no
    /// strategy has seen yet, then of the objects those snapshots hold, so
    /// nested containers can be materialized at the same position.
    fn snapshot_first_sightings(
        &self,
        log: &mut LogState,
        thread: &ThreadRef,
        activation: ActivationId,
        line: Option<u32>,
        objects: Vec<ObjRef>,
    ) {
        let mut pending = objects;
        pending.reverse();
        while let Some(obj) = pending.pop() {
            if !log.seen.insert(obj.id()) {
                continue;
            }
            let Some(strategy) = self.registry.strategy_for(&obj) else {
                continue;
            };
            let Some(snapshot) =
                guarded(strategy, "to_snapshot_event", || strategy.to_snapshot_event(&obj))
            else {
                continue;
            };
            pending.extend(nested_objects(&snapshot).into_iter().rev());
            let kind = EventKind::ObjectSnapshot {
                object: obj,
                strategy: strategy.name(),
                snapshot,
            };
            self.push(log, thread, activation, line, kind);
        }
    }

    fn push(
        &self,
        log: &mut LogState,
        thread: &ThreadRef,
        activation: ActivationId,
        line: Option<u32>,
        kind: EventKind,
    ) -> usize {
        let index = log.events.len();
        if self.config.write_log {
            log.lines
                .push(ValueRenderer::new(&self.labeler).render_event(&kind));
        }
        tracing::trace!(
            target: "rewind.trace",
            sequence = index,
            thread = thread.name(),
            activation,
            kind = kind.tag(),
            "event recorded"
        );
        log.events.push(TraceEvent {
            sequence: index as u64,
            thread: thread.clone(),
            activation,
            line,
            kind,
        });
        index
    }

    /// Stable, ordered copy of every event recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.log.lock().events.clone()
    }

    /// One rendered line per event, in event order. Empty when log writing
    /// is disabled.
    pub fn log_lines(&self) -> Vec<String> {
        self.log.lock().lines.clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contents of `object` as of (and including) event `up_to`. The replay
    /// runs on a copy, so recording lanes only wait for the copy.
    pub fn object_snapshot(&self, object: &ObjRef, up_to: u64) -> Option<SnapshotValue> {
        let prefix: Vec<TraceEvent> = {
            let log = self.log.lock();
            let end = usize::try_from(up_to.saturating_add(1))
                .unwrap_or(usize::MAX)
                .min(log.events.len());
            log.events[..end].to_vec()
        };
        self.registry.materialize(object, &prefix)
    }

    /// Forget every event, label and activation id.
    pub fn clear(&self) {
        let mut log = self.log.lock();
        *log = LogState::default();
        self.labeler.clear();
        self.next_activation.store(0, Ordering::Relaxed);
        tracing::debug!(target: "rewind.trace", "trace session cleared");
    }
}

fn nested_objects(snapshot: &SnapshotValue) -> Vec<ObjRef> {
    snapshot
        .values()
        .into_iter()
        .filter_map(Value::as_object)
        .cloned()
        .collect()
}
