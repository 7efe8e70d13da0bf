use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::container::key::TypeKey;

/// Identity of one top-level resolution and every nested resolution its constructors perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(Uuid);

impl ChainId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChainId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

thread_local! {
    static CURRENT_CHAIN: RefCell<Option<ChainContext>> = const { RefCell::new(None) };
}

/// Call chain a resolution belongs to.
///
/// Constructors run on worker threads; the worker installs the chain of the
/// frame that spawned it so nested `resolve` calls join the same chain.
#[derive(Debug, Clone)]
pub(crate) struct ChainContext {
    pub id: ChainId,
    /// Keys being constructed on this chain, outermost first
    pub path: Vec<TypeKey>,
}

impl ChainContext {
    /// The chain of the constructor running on this thread, or a new root chain
    pub fn current_or_root() -> Self {
        CURRENT_CHAIN
            .with(|current| current.borrow().clone())
            .unwrap_or_else(|| Self {
                id: ChainId::new(),
                path: Vec::new(),
            })
    }

    /// The chain as seen by the constructor of `key`
    pub fn child(&self, key: TypeKey) -> Self {
        Self {
            id: self.id,
            path: self.path_with(key),
        }
    }

    pub fn path_with(&self, key: TypeKey) -> Vec<TypeKey> {
        let mut path = self.path.clone();
        path.push(key);
        path
    }

    /// Install this chain on the current thread until the guard is dropped
    pub fn enter(self) -> ChainGuard {
        let previous = CURRENT_CHAIN.with(|current| current.borrow_mut().replace(self));
        ChainGuard { previous }
    }
}

pub(crate) struct ChainGuard {
    previous: Option<ChainContext>,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_CHAIN.with(|current| *current.borrow_mut() = previous);
    }
}

/// Keys whose constructor is currently running, and on which call chains
#[derive(Debug, Default)]
pub struct InFlightTracker {
    entries: HashMap<TypeKey, HashSet<ChainId>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, key: TypeKey, chain: ChainId) {
        self.entries.entry(key).or_default().insert(chain);
    }

    pub fn unmark(&mut self, key: TypeKey, chain: ChainId) {
        if let Some(chains) = self.entries.get_mut(&key) {
            chains.remove(&chain);
            if chains.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// In flight on any call chain
    pub fn is_in_flight(&self, key: &TypeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// In flight on the given call chain
    pub fn is_in_flight_on(&self, key: &TypeKey, chain: ChainId) -> bool {
        self.entries
            .get(key)
            .map(|chains| chains.contains(&chain))
            .unwrap_or(false)
    }

    /// In-flight keys, sorted by type name
    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.entries.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
