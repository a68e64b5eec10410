//! # relay-pipeline
//!
//! Fluent, synchronous event pipelines.
//!
//! A pipeline is a tree of stages rooted at [`Pipeline::start`]. Each stage
//! applies one operation (identity, filter, map, flat-map) and fans the
//! result out to its sinks in registration order. Calling
//! [`Pipeline::accept`] on the root drains the element depth-first through
//! every reachable branch before returning.
//!
//! ```ignore
//! let root = Pipeline::<i32, i32>::start();
//! root.filter(|x| x % 2 == 0)
//!     .map(|x| x * 10)
//!     .consume(|x| println!("{x}"));
//! root.accept(&4);
//! ```
//!
//! Sink lists are copy-on-write: stages may be added from any thread while
//! other threads deliver. A delivery already in flight keeps the snapshot
//! it started with.
//!
//! [`ListenerRegistry`] keys listener sinks by [`ListenerCategory`] so they
//! can be attached to every session a client opens.
//!
//! [`ListenerCategory`]: relay_core::ListenerCategory

#![deny(unsafe_code)]

pub mod registry;
pub mod sink;
pub mod stage;

pub use registry::{Listener, ListenerRegistry};
pub use sink::{DeliveryPolicy, Sink};
pub use stage::{Pipeline, StageKind};
