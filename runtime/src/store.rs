//! The reactive context store shared by every binding in a document.
//!
//! Three namespaces live side by side: `inputs` (text input values),
//! `triggers` (event timestamps) and `results` (execution results). Each key
//! is observable on its own; writing one key notifies only that key's
//! subscribers.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::result::ExecutionResult;

/// Frozen copy of the `inputs` namespace handed to a script.
pub type InputSnapshot = BTreeMap<String, String>;

type Callback<V> = Rc<dyn Fn(&V)>;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait Clock {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// One keyed namespace of observable values.
pub struct Namespace<V> {
    name: &'static str,
    values: RefCell<HashMap<String, V>>,
    subscribers: RefCell<HashMap<String, Vec<(u64, Callback<V>)>>>,
    next_subscriber: Cell<u64>,
}

impl<V: Clone + 'static> Namespace<V> {
    fn new(name: &'static str) -> Rc<Self> {
        Rc::new(Namespace {
            name,
            values: RefCell::new(HashMap::new()),
            subscribers: RefCell::new(HashMap::new()),
            next_subscriber: Cell::new(0),
        })
    }

    pub fn read(&self, key: &str) -> Option<V> {
        self.values.borrow().get(key).cloned()
    }

    /// Store `value` under `key`, then notify that key's subscribers.
    ///
    /// Callbacks run after every borrow is released, so they may read or
    /// write the store (including this key) and may drop subscriptions.
    pub fn write(&self, key: &str, value: V) {
        self.values.borrow_mut().insert(key.to_string(), value.clone());

        let callbacks: Vec<Callback<V>> = self
            .subscribers
            .borrow()
            .get(key)
            .map(|subs| subs.iter().map(|(_, cb)| Rc::clone(cb)).collect())
            .unwrap_or_default();

        tracing::debug!(namespace = self.name, key, subscribers = callbacks.len(), "store write");
        for callback in callbacks {
            callback(&value);
        }
    }

    /// Observe writes to `key`. The callback stays registered until the
    /// returned handle is dropped.
    pub fn subscribe(self: &Rc<Self>, key: &str, callback: impl Fn(&V) + 'static) -> Subscription {
        let id = self.next_subscriber.get();
        self.next_subscriber.set(id + 1);
        self.subscribers
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push((id, Rc::new(callback)));

        let namespace: Weak<Self> = Rc::downgrade(self);
        let key = key.to_string();
        Subscription {
            release: Some(Box::new(move || {
                if let Some(namespace) = namespace.upgrade() {
                    namespace.unsubscribe(&key, id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscribers.borrow().get(key).map_or(0, Vec::len)
    }

    pub fn snapshot(&self) -> BTreeMap<String, V> {
        self.values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn unsubscribe(&self, key: &str, id: u64) {
        let mut subscribers = self.subscribers.borrow_mut();
        if let Some(subs) = subscribers.get_mut(key) {
            subs.retain(|(sub, _)| *sub != id);
            if subs.is_empty() {
                subscribers.remove(key);
            }
        }
    }
}

/// Keeps a store callback registered. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// The `triggers` namespace. Writers only name the event; the store picks
/// the timestamp so that every write is strictly greater than the last.
pub struct Triggers {
    slots: Rc<Namespace<Timestamp>>,
    clock: Box<dyn Clock>,
    last: Cell<i64>,
}

impl Triggers {
    pub fn read(&self, event_id: &str) -> Option<Timestamp> {
        self.slots.read(event_id)
    }

    pub fn write(&self, event_id: &str) -> Timestamp {
        let stamp = Timestamp(self.clock.now_millis().max(self.last.get() + 1));
        self.last.set(stamp.0);
        tracing::debug!(event_id, timestamp = %stamp, "dispatching event");
        self.slots.write(event_id, stamp);
        stamp
    }

    pub fn subscribe(&self, event_id: &str, callback: impl Fn(&Timestamp) + 'static) -> Subscription {
        self.slots.subscribe(event_id, callback)
    }

    pub fn subscriber_count(&self, event_id: &str) -> usize {
        self.slots.subscriber_count(event_id)
    }
}

struct StoreInner {
    inputs: Rc<Namespace<String>>,
    triggers: Triggers,
    results: Rc<Namespace<ExecutionResult>>,
}

/// Shared handle to the store. Cloning is cheap; clones see the same data.
#[derive(Clone)]
pub struct ContextStore {
    inner: Rc<StoreInner>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        ContextStore {
            inner: Rc::new(StoreInner {
                inputs: Namespace::new("inputs"),
                triggers: Triggers {
                    slots: Namespace::new("triggers"),
                    clock: Box::new(clock),
                    last: Cell::new(0),
                },
                results: Namespace::new("results"),
            }),
        }
    }

    pub fn inputs(&self) -> &Rc<Namespace<String>> {
        &self.inner.inputs
    }

    pub fn triggers(&self) -> &Triggers {
        &self.inner.triggers
    }

    pub fn results(&self) -> &Rc<Namespace<ExecutionResult>> {
        &self.inner.results
    }

    pub fn inputs_snapshot(&self) -> InputSnapshot {
        self.inner.inputs.snapshot()
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("inputs", &self.inner.inputs.snapshot())
            .field("triggers", &self.inner.triggers.slots.snapshot())
            .field("results", &self.inner.results.snapshot().keys().collect::<Vec<_>>())
            .finish()
    }
}
