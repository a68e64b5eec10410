//! Sinks and the copy-on-write sink list every stage owns.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

/// Anything that can receive elements of type `T`.
///
/// Pipeline stages implement this for their input type, which is how a
/// stage is registered as the sink of its parent.
pub trait Sink<T>: Send + Sync {
    /// Receive one element.
    fn accept(&self, item: &T);
}

/// What happens when a sink panics during delivery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// The panic unwinds to whoever called `accept`. Sinks after the
    /// failing one at the same fan-out point are skipped.
    #[default]
    FailFast,
    /// Each sink runs under `catch_unwind`. A panic is logged and delivery
    /// continues with the next sink.
    Isolate,
}

/// A registered receiver: another stage or a terminal consumer.
pub(crate) enum Downstream<T> {
    Stage(Arc<dyn Sink<T>>),
    Consumer(Arc<dyn Fn(&T) + Send + Sync>),
}

impl<T> Clone for Downstream<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Stage(stage) => Self::Stage(Arc::clone(stage)),
            Self::Consumer(consumer) => Self::Consumer(Arc::clone(consumer)),
        }
    }
}

impl<T> Downstream<T> {
    fn deliver(&self, item: &T) {
        match self {
            Self::Stage(stage) => stage.accept(item),
            Self::Consumer(consumer) => consumer(item),
        }
    }
}

/// Append-only list of downstream receivers.
///
/// Appends swap in a new vector when a delivery still holds the old one;
/// deliveries iterate a snapshot taken without holding the lock.
pub(crate) struct SinkList<T> {
    sinks: RwLock<Arc<Vec<Downstream<T>>>>,
}

impl<T> SinkList<T> {
    pub(crate) fn new() -> Self {
        Self {
            sinks: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, downstream: Downstream<T>) {
        let mut sinks = self.sinks.write();
        Arc::make_mut(&mut *sinks).push(downstream);
    }

    pub(crate) fn len(&self) -> usize {
        self.sinks.read().len()
    }

    fn snapshot(&self) -> Arc<Vec<Downstream<T>>> {
        Arc::clone(&self.sinks.read())
    }

    /// Deliver `item` to every sink in insertion order.
    pub(crate) fn emit(&self, item: &T, policy: DeliveryPolicy) {
        let sinks = self.snapshot();
        for sink in sinks.iter() {
            match policy {
                DeliveryPolicy::FailFast => sink.deliver(item),
                DeliveryPolicy::Isolate => {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sink.deliver(item))) {
                        error!(
                            reason = panic_message(panic.as_ref()),
                            "pipeline sink panicked, continuing with remaining sinks"
                        );
                    }
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
