//! Reactive view graph.
//!
//! A [`ViewGraph`] holds named input [`Signal`]s and derived [`View`]s. A view
//! lists its dependencies once, at construction, and is recomputed lazily:
//! [`View::get`] snapshots every dependency (refreshing upstream views first)
//! and compares the snapshot with the inputs its cached outcome was computed
//! from. A dependency counts as changed only when its value differs by
//! `PartialEq`; a generation that moved back to an equal value does not
//! trigger a recompute. A recompute that yields a value equal to the cached
//! one keeps the view's generation, so its dependents stay cached.
//!
//! ```
//! use happiness_dashboard::graph::ViewGraph;
//!
//! let graph = ViewGraph::new();
//! let k = graph.signal("k", 4usize);
//! let doubled = graph.view("doubled", [k.as_source()], {
//!     let k = k.clone();
//!     move |inputs| Ok(*inputs.read(&k)? * 2)
//! });
//!
//! assert_eq!(*doubled.get().unwrap(), 8);
//! k.set(5);
//! assert_eq!(*doubled.get().unwrap(), 10);
//! assert_eq!(doubled.computations(), 2);
//!
//! k.set(6);
//! k.set(5);
//! assert_eq!(*doubled.get().unwrap(), 10);
//! assert_eq!(doubled.computations(), 2);
//! ```
//!
//! Locking: a signal is an `RwLock`; a view's cache slot is a `Mutex` that is
//! held while the closure runs, so at most one computation per view is in
//! flight and late readers wait for its result. Dependency snapshots are taken
//! before the own slot is locked, so no lock is ever held across two views.

use crate::error::{Error, ViewError};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub type NodeId = usize;

type AnyValue = Arc<dyn Any + Send + Sync>;

type ValueEq = fn(&AnyValue, &AnyValue) -> bool;

fn value_eq<T: PartialEq + 'static>(a: &AnyValue, b: &AnyValue) -> bool {
    match ((**a).downcast_ref::<T>(), (**b).downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Cache state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Never computed, or a dependency changed since the last computation.
    Stale,
    Computing,
    Cached,
    /// The last computation failed; reads return the stored error.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Signal,
    View,
}

/// A node's value at a given generation.
#[derive(Clone)]
pub struct Snapshot {
    pub id: NodeId,
    pub name: Arc<str>,
    pub generation: u64,
    pub value: Result<AnyValue, ViewError>,
    eq: ValueEq,
}

impl Snapshot {
    /// Both snapshots hold equal values. Failed outcomes never compare equal.
    pub fn same_value(&self, other: &Snapshot) -> bool {
        match (&self.value, &other.value) {
            (Ok(a), Ok(b)) => Arc::ptr_eq(a, b) || (self.eq)(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("ok", &self.value.is_ok())
            .finish()
    }
}

/// Anything a view can depend on.
pub trait Source: Send + Sync {
    fn id(&self) -> NodeId;

    fn name(&self) -> &str;

    /// Current value. Views bring themselves up to date first.
    fn snapshot(&self) -> Snapshot;

    /// Current value without computing anything, or None when the node
    /// would have to recompute to answer.
    fn peek(&self) -> Option<Snapshot>;
}

/// Typed handle to a node, used by [`Inputs::read`].
pub trait Readable {
    type Value: Send + Sync + 'static;

    fn node_id(&self) -> NodeId;
    fn node_name(&self) -> &str;
}

/// Registry entry describing one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub dependencies: Vec<NodeId>,
}

#[derive(Default)]
struct Registry {
    nodes: RwLock<Vec<NodeInfo>>,
}

/// Arena of signals and views. Cloning yields another handle to the same
/// arena.
#[derive(Clone, Default)]
pub struct ViewGraph {
    registry: Arc<Registry>,
}

impl ViewGraph {
    pub fn new() -> Self {
        ViewGraph::default()
    }

    fn register(&self, name: &str, kind: NodeKind, dependencies: Vec<NodeId>) -> NodeId {
        let mut nodes = self
            .registry
            .nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = nodes.len();
        nodes.push(NodeInfo {
            id,
            name: name.to_string(),
            kind,
            dependencies,
        });
        id
    }

    /// Creates an input node holding `initial`.
    pub fn signal<T>(&self, name: &str, initial: T) -> Signal<T>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let id = self.register(name, NodeKind::Signal, Vec::new());
        Signal {
            node: Arc::new(SignalNode {
                id,
                name: Arc::from(name),
                cell: RwLock::new(SignalCell {
                    value: Arc::new(initial),
                    generation: 0,
                }),
            }),
        }
    }

    /// Creates a derived node. `dependencies` is fixed for the lifetime of the
    /// view; `compute` may only read those.
    pub fn view<T, F>(
        &self,
        name: &str,
        dependencies: impl IntoIterator<Item = Arc<dyn Source>>,
        compute: F,
    ) -> View<T>
    where
        T: PartialEq + Send + Sync + 'static,
        F: Fn(&Inputs<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        let dependencies: Vec<Arc<dyn Source>> = dependencies.into_iter().collect();
        let id = self.register(
            name,
            NodeKind::View,
            dependencies.iter().map(|d| d.id()).collect(),
        );
        View {
            node: Arc::new(ViewNode {
                id,
                name: Arc::from(name),
                dependencies,
                compute: Box::new(compute),
                slot: Mutex::new(Slot {
                    inputs: None,
                    outcome: None,
                    generation: 0,
                }),
                computing: AtomicBool::new(false),
                computations: AtomicUsize::new(0),
            }),
        }
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.registry
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, name: &str) -> Option<NodeInfo> {
        self.registry
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|n| n.name == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.registry
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ViewGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewGraph {{ nodes: {} }}", self.len())
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

struct SignalCell<T> {
    value: Arc<T>,
    generation: u64,
}

struct SignalNode<T> {
    id: NodeId,
    name: Arc<str>,
    cell: RwLock<SignalCell<T>>,
}

impl<T: PartialEq + Send + Sync + 'static> Source for SignalNode<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> Snapshot {
        let cell = self.cell.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            id: self.id,
            name: Arc::clone(&self.name),
            generation: cell.generation,
            value: Ok(Arc::clone(&cell.value) as AnyValue),
            eq: value_eq::<T>,
        }
    }

    fn peek(&self) -> Option<Snapshot> {
        Some(self.snapshot())
    }
}

/// Input node. Writes that leave the value unchanged are ignored.
pub struct Signal<T> {
    node: Arc<SignalNode<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Signal {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T> Signal<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    pub fn get(&self) -> Arc<T> {
        Arc::clone(
            &self
                .node
                .cell
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .value,
        )
    }

    /// Stores `value` and returns true, unless it equals the current value.
    pub fn set(&self, value: T) -> bool {
        let mut cell = self.node.cell.write().unwrap_or_else(PoisonError::into_inner);
        if *cell.value == value {
            return false;
        }
        cell.value = Arc::new(value);
        cell.generation += 1;
        log::debug!(
            "signal '{}' changed (generation {})",
            self.node.name,
            cell.generation
        );
        true
    }

    pub fn generation(&self) -> u64 {
        self.node
            .cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn as_source(&self) -> Arc<dyn Source> {
        Arc::clone(&self.node) as Arc<dyn Source>
    }
}

impl<T: Send + Sync + 'static> Readable for Signal<T> {
    type Value = T;

    fn node_id(&self) -> NodeId {
        self.node.id
    }

    fn node_name(&self) -> &str {
        &self.node.name
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.node.cell.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Signal")
            .field("name", &self.node.name)
            .field("generation", &cell.generation)
            .field("value", &cell.value)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Dependency values handed to a compute closure.
pub struct Inputs<'a> {
    view: &'a str,
    snapshots: &'a [Snapshot],
}

impl Inputs<'_> {
    /// Typed value of a declared dependency. A failed upstream view surfaces
    /// as [`Error::View`].
    pub fn read<R: Readable>(&self, handle: &R) -> Result<Arc<R::Value>, Error> {
        let snapshot = self
            .snapshots
            .iter()
            .find(|s| s.id == handle.node_id())
            .ok_or_else(|| Error::UndeclaredDependency {
                view: self.view.to_string(),
                dependency: handle.node_name().to_string(),
            })?;

        let value = snapshot.value.clone().map_err(Error::View)?;
        value
            .downcast::<R::Value>()
            .map_err(|_| Error::DependencyType(snapshot.name.to_string()))
    }

    /// Generation of a declared dependency in this snapshot.
    pub fn generation_of<R: Readable>(&self, handle: &R) -> Option<u64> {
        self.snapshots
            .iter()
            .find(|s| s.id == handle.node_id())
            .map(|s| s.generation)
    }
}

type ComputeFn<T> = Box<dyn Fn(&Inputs<'_>) -> Result<T, Error> + Send + Sync>;

struct Slot<T> {
    /// Dependency snapshots the outcome was computed from.
    inputs: Option<Vec<Snapshot>>,
    outcome: Option<Result<Arc<T>, ViewError>>,
    generation: u64,
}

struct ViewNode<T> {
    id: NodeId,
    name: Arc<str>,
    dependencies: Vec<Arc<dyn Source>>,
    compute: ComputeFn<T>,
    slot: Mutex<Slot<T>>,
    computing: AtomicBool,
    computations: AtomicUsize,
}

/// Clears the computing flag even if the closure panics.
struct ComputingGuard<'a>(&'a AtomicBool);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// True when no dependency changed value since `recorded` was taken. A
/// recorded generation at or ahead of the current one belongs to the same or
/// a newer computation by another reader; generations only grow.
fn is_current(recorded: &[Snapshot], current: &[Snapshot]) -> bool {
    recorded.len() == current.len()
        && recorded
            .iter()
            .zip(current)
            .all(|(r, c)| r.generation >= c.generation || r.same_value(c))
}

impl<T: PartialEq + Send + Sync + 'static> ViewNode<T> {
    fn refresh(&self) -> (u64, Result<Arc<T>, ViewError>) {
        let snapshots: Vec<Snapshot> = self.dependencies.iter().map(|d| d.snapshot()).collect();

        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = &mut *guard;
        if let (Some(recorded), Some(outcome)) = (slot.inputs.as_mut(), slot.outcome.as_ref()) {
            if is_current(recorded, &snapshots) {
                // Equal values under a newer generation: remember the newer one.
                for (r, s) in recorded.iter_mut().zip(&snapshots) {
                    if s.generation > r.generation {
                        *r = s.clone();
                    }
                }
                return (slot.generation, outcome.clone());
            }
        }

        self.computing.store(true, Ordering::Release);
        let _guard = ComputingGuard(&self.computing);
        let run = self.computations.fetch_add(1, Ordering::Relaxed) + 1;
        let stamp: Vec<u64> = snapshots.iter().map(|s| s.generation).collect();
        log::debug!("computing view '{}' (run {}, inputs {:?})", self.name, run, stamp);

        let inputs = Inputs {
            view: &self.name,
            snapshots: &snapshots,
        };
        let fresh = (self.compute)(&inputs)
            .map(Arc::new)
            .map_err(|e| ViewError::new(self.name.as_ref(), e));
        if let Err(e) = &fresh {
            log::warn!("view '{}' failed: {}", self.name, e.root_cause());
        }

        let outcome = match (slot.outcome.take(), fresh) {
            (Some(Ok(cached)), Ok(value)) if *cached == *value => {
                log::debug!("view '{}' recomputed to an equal value", self.name);
                Ok(cached)
            }
            (_, fresh) => {
                slot.generation += 1;
                fresh
            }
        };
        slot.inputs = Some(snapshots);
        slot.outcome = Some(outcome.clone());
        (slot.generation, outcome)
    }

    fn current_inputs(&self) -> Option<Vec<Snapshot>> {
        self.dependencies.iter().map(|d| d.peek()).collect()
    }

    fn make_snapshot(&self, generation: u64, outcome: Result<Arc<T>, ViewError>) -> Snapshot {
        Snapshot {
            id: self.id,
            name: Arc::clone(&self.name),
            generation,
            value: outcome.map(|v| v as AnyValue),
            eq: value_eq::<T>,
        }
    }
}

impl<T: PartialEq + Send + Sync + 'static> Source for ViewNode<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> Snapshot {
        let (generation, outcome) = self.refresh();
        self.make_snapshot(generation, outcome)
    }

    fn peek(&self) -> Option<Snapshot> {
        if self.computing.load(Ordering::Acquire) {
            return None;
        }
        let current = self.current_inputs()?;
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match (&slot.inputs, &slot.outcome) {
            (Some(recorded), Some(outcome)) if is_current(recorded, &current) => {
                Some(self.make_snapshot(slot.generation, outcome.clone()))
            }
            _ => None,
        }
    }
}

/// Derived node with a memoized outcome.
pub struct View<T> {
    node: Arc<ViewNode<T>>,
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        View {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: PartialEq + Send + Sync + 'static> View<T> {
    /// Current value, recomputing first if any dependency changed.
    pub fn get(&self) -> Result<Arc<T>, ViewError> {
        self.node.refresh().1
    }

    pub fn state(&self) -> ViewState {
        if self.node.computing.load(Ordering::Acquire) {
            return ViewState::Computing;
        }
        let current = self.node.current_inputs();
        let slot = self.node.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match (&slot.inputs, &slot.outcome, current) {
            (Some(recorded), Some(outcome), Some(current)) if is_current(recorded, &current) => {
                if outcome.is_ok() {
                    ViewState::Cached
                } else {
                    ViewState::Error
                }
            }
            _ => ViewState::Stale,
        }
    }

    /// Number of times the compute closure has run.
    pub fn computations(&self) -> usize {
        self.node.computations.load(Ordering::Relaxed)
    }

    /// Incremented when a recomputation yields a value different from the
    /// cached one, or an error.
    pub fn generation(&self) -> u64 {
        self.node
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn as_source(&self) -> Arc<dyn Source> {
        Arc::clone(&self.node) as Arc<dyn Source>
    }
}

impl<T: Send + Sync + 'static> Readable for View<T> {
    type Value = T;

    fn node_id(&self) -> NodeId {
        self.node.id
    }

    fn node_name(&self) -> &str {
        &self.node.name
    }
}

impl<T: PartialEq + Send + Sync + 'static> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.node.name)
            .field("state", &self.state())
            .field("computations", &self.computations())
            .finish()
    }
}
