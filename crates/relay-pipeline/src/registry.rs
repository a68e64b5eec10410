//! Listener registry.
//!
//! Holds listener sinks per [`ListenerCategory`], in registration order.
//! The client hands a snapshot to every session it opens so each session
//! can deliver its events to the right listeners.

use std::sync::Arc;

use dashmap::DashMap;
use relay_core::{GatewayEvent, ListenerCategory};
use tracing::debug;

use crate::sink::Sink;
use crate::stage::Pipeline;

/// A listener: anything that accepts gateway events.
pub type Listener = Arc<dyn Sink<GatewayEvent>>;

/// Category-keyed multimap of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<ListenerCategory, Vec<Listener>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `category`.
    pub fn register(&self, category: ListenerCategory, listener: Listener) {
        let mut bucket = self.listeners.entry(category).or_default();
        bucket.push(listener);
        debug!(%category, count = bucket.len(), "registered listener");
    }

    /// Register a pipeline root as a listener for `category`.
    pub fn register_pipeline<O: 'static>(
        &self,
        category: ListenerCategory,
        pipeline: &Pipeline<GatewayEvent, O>,
    ) {
        self.register(category, pipeline.as_sink());
    }

    /// Listeners for one category, in registration order.
    pub fn listeners_for(&self, category: ListenerCategory) -> Vec<Listener> {
        self.listeners
            .get(&category)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default()
    }

    /// Every `(category, listener)` pair, ordered by category and then by
    /// registration order within the category.
    pub fn snapshot(&self) -> Vec<(ListenerCategory, Listener)> {
        let mut pairs: Vec<(ListenerCategory, Listener)> = self
            .listeners
            .iter()
            .flat_map(|entry| {
                let category = *entry.key();
                entry
                    .value()
                    .iter()
                    .map(|listener| (category, Arc::clone(listener)))
                    .collect::<Vec<_>>()
            })
            .collect();
        // Stable sort keeps registration order inside a category.
        pairs.sort_by_key(|(category, _)| *category);
        pairs
    }

    /// Deliver an event to every listener of its category.
    ///
    /// The bucket is cloned first so listeners may register further
    /// listeners without deadlocking.
    pub fn dispatch(&self, event: &GatewayEvent) {
        for listener in self.listeners_for(event.category) {
            listener.accept(event);
        }
    }

    /// Total number of registered listeners.
    pub fn count(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.count())
            .finish()
    }
}
