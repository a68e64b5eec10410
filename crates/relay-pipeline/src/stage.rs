//! Pipeline stages and the fluent chaining API.

use std::fmt;
use std::sync::Arc;

use crate::sink::{DeliveryPolicy, Downstream, Sink, SinkList};

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type MapFn<I, O> = Box<dyn Fn(&I) -> O + Send + Sync>;
type FlatMapFn<I, O> = Box<dyn Fn(&I) -> Option<O> + Send + Sync>;
type Passthrough<I, O> = for<'a> fn(&'a I) -> &'a O;

fn passthrough<T>(item: &T) -> &T {
    item
}

/// Operation tag of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    /// Forwards every element unchanged.
    Identity,
    /// Forwards elements matching a predicate.
    Filter,
    /// Forwards the result of a function.
    Map,
    /// Forwards the result of a function when it is present.
    FlatMap,
}

enum Operation<I, O> {
    Identity(Passthrough<I, O>),
    Filter(Predicate<I>, Passthrough<I, O>),
    Map(MapFn<I, O>),
    FlatMap(FlatMapFn<I, O>),
}

/// Output of one stage: either the input itself or a freshly built value.
enum Forward<'a, O> {
    Borrowed(&'a O),
    Owned(O),
}

impl<O> Forward<'_, O> {
    fn get(&self) -> &O {
        match self {
            Self::Borrowed(item) => *item,
            Self::Owned(item) => item,
        }
    }
}

impl<I, O> Operation<I, O> {
    fn kind(&self) -> StageKind {
        match self {
            Self::Identity(_) => StageKind::Identity,
            Self::Filter(..) => StageKind::Filter,
            Self::Map(_) => StageKind::Map,
            Self::FlatMap(_) => StageKind::FlatMap,
        }
    }

    fn apply<'a>(&self, input: &'a I) -> Option<Forward<'a, O>> {
        match self {
            Self::Identity(pass) => Some(Forward::Borrowed(pass(input))),
            Self::Filter(predicate, pass) => {
                predicate(input).then(|| Forward::Borrowed(pass(input)))
            }
            Self::Map(function) => Some(Forward::Owned(function(input))),
            Self::FlatMap(function) => function(input).map(Forward::Owned),
        }
    }
}

struct PipelineStage<I, O> {
    operation: Operation<I, O>,
    sinks: SinkList<O>,
    policy: DeliveryPolicy,
}

impl<I, O> Sink<I> for PipelineStage<I, O> {
    fn accept(&self, item: &I) {
        if let Some(output) = self.operation.apply(item) {
            self.sinks.emit(output.get(), self.policy);
        }
    }
}

/// Handle to one stage of a pipeline taking `I` and emitting `O`.
///
/// Handles are cheap to clone and share the stage. Every chaining call
/// registers a new sink on this stage, so one stage can fan out to any
/// number of filters, maps and consumers.
pub struct Pipeline<I, O> {
    stage: Arc<PipelineStage<I, O>>,
}

impl<I, O> Clone for Pipeline<I, O> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
        }
    }
}

impl<I, O> fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.stage.operation.kind())
            .field("sinks", &self.stage.sinks.len())
            .field("policy", &self.stage.policy)
            .finish()
    }
}

impl<T: 'static> Pipeline<T, T> {
    /// A no-op root stage to start a chain with.
    #[must_use]
    pub fn start() -> Self {
        Self::start_with(DeliveryPolicy::default())
    }

    /// A root stage whose whole tree uses `policy` for sink panics.
    #[must_use]
    pub fn start_with(policy: DeliveryPolicy) -> Self {
        Self::from_operation(Operation::Identity(passthrough::<T>), policy)
    }

    /// A standalone filtering stage. Link it with [`Pipeline::attach`].
    #[must_use]
    pub fn filtering<P>(predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_operation(
            Operation::Filter(Box::new(predicate), passthrough::<T>),
            DeliveryPolicy::default(),
        )
    }
}

impl<I: 'static, O: 'static> Pipeline<I, O> {
    fn from_operation(operation: Operation<I, O>, policy: DeliveryPolicy) -> Self {
        Self {
            stage: Arc::new(PipelineStage {
                operation,
                sinks: SinkList::new(),
                policy,
            }),
        }
    }

    /// A standalone mapping stage. Link it with [`Pipeline::attach`].
    #[must_use]
    pub fn mapping<F>(function: F) -> Self
    where
        F: Fn(&I) -> O + Send + Sync + 'static,
    {
        Self::from_operation(Operation::Map(Box::new(function)), DeliveryPolicy::default())
    }

    /// A standalone flat-mapping stage. Link it with [`Pipeline::attach`].
    #[must_use]
    pub fn flat_mapping<F>(function: F) -> Self
    where
        F: Fn(&I) -> Option<O> + Send + Sync + 'static,
    {
        Self::from_operation(
            Operation::FlatMap(Box::new(function)),
            DeliveryPolicy::default(),
        )
    }

    /// The stage's operation tag.
    pub fn kind(&self) -> StageKind {
        self.stage.operation.kind()
    }

    /// Panic policy applied when this stage delivers to its sinks.
    pub fn policy(&self) -> DeliveryPolicy {
        self.stage.policy
    }

    /// Number of sinks registered on this stage.
    pub fn sink_count(&self) -> usize {
        self.stage.sinks.len()
    }

    /// Feed one element into this stage.
    ///
    /// Runs synchronously on the calling thread: the element is pushed
    /// depth-first through every reachable sink before this returns.
    /// Under [`DeliveryPolicy::FailFast`] a panicking stage or consumer
    /// unwinds through this call.
    pub fn accept(&self, item: &I) {
        self.stage.accept(item);
    }

    /// This stage as a type-erased sink of its input.
    pub fn as_sink(&self) -> Arc<dyn Sink<I>> {
        self.stage.clone()
    }

    /// Register an existing stage as a sink of this one.
    pub fn attach<U: 'static>(&self, downstream: &Pipeline<O, U>) {
        self.stage.sinks.push(Downstream::Stage(downstream.as_sink()));
    }

    /// Forward only elements for which `predicate` holds.
    pub fn filter<P>(&self, predicate: P) -> Pipeline<O, O>
    where
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        let child = Pipeline::from_operation(
            Operation::Filter(Box::new(predicate), passthrough::<O>),
            self.policy(),
        );
        self.attach(&child);
        child
    }

    /// Forward only elements for which `predicate` does not hold.
    pub fn filter_not<P>(&self, predicate: P) -> Pipeline<O, O>
    where
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        self.filter(move |item| !predicate(item))
    }

    /// Forward only elements whose attribute is present.
    pub fn filter_attribute_present<A, G>(&self, getter: G) -> Pipeline<O, O>
    where
        A: 'static,
        G: Fn(&O) -> Option<A> + Send + Sync + 'static,
    {
        self.filter(move |item| getter(item).is_some())
    }

    /// Forward only elements whose attribute satisfies `condition`.
    pub fn filter_attribute<A, G, P>(&self, getter: G, condition: P) -> Pipeline<O, O>
    where
        A: 'static,
        G: Fn(&O) -> A + Send + Sync + 'static,
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.filter(move |item| condition(&getter(item)))
    }

    /// Forward only elements whose attribute does not satisfy `condition`.
    pub fn filter_attribute_not<A, G, P>(&self, getter: G, condition: P) -> Pipeline<O, O>
    where
        A: 'static,
        G: Fn(&O) -> A + Send + Sync + 'static,
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.filter(move |item| !condition(&getter(item)))
    }

    /// Forward `function(element)` for every element.
    pub fn map<U, F>(&self, function: F) -> Pipeline<O, U>
    where
        U: 'static,
        F: Fn(&O) -> U + Send + Sync + 'static,
    {
        let child = Pipeline::from_operation(Operation::Map(Box::new(function)), self.policy());
        self.attach(&child);
        child
    }

    /// Forward the value `function` returns, skipping `None`.
    ///
    /// Same as `map(f)` followed by a presence filter and an unwrap, in one
    /// stage.
    pub fn flat_map<U, F>(&self, function: F) -> Pipeline<O, U>
    where
        U: 'static,
        F: Fn(&O) -> Option<U> + Send + Sync + 'static,
    {
        let child =
            Pipeline::from_operation(Operation::FlatMap(Box::new(function)), self.policy());
        self.attach(&child);
        child
    }

    /// Terminate this branch with a consumer.
    ///
    /// The stage stays open for further `filter`/`map`/`consume` calls.
    pub fn consume<F>(&self, consumer: F)
    where
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.stage.sinks.push(Downstream::Consumer(Arc::new(consumer)));
    }

    /// Terminate this branch with an external sink object.
    pub fn consume_into(&self, sink: Arc<dyn Sink<O>>) {
        self.stage.sinks.push(Downstream::Stage(sink));
    }
}
