//! Containers and scheduling primitives shared across the IOC core.
//!
//! An arena-backed ordered list with stable handles, a fixed-size node pool
//! with a bypass switch and corruption checking, a namespaced name
//! directory, a priority callback queue with delayed (cancellable)
//! requests, and a run-once registrar set.

pub mod arena;
pub mod callback;
pub mod names;
pub mod once;
pub mod pool;

pub use arena::{NodeHandle, OrderedArena};
pub use callback::{CallbackQueue, DelayedHandle, Priority};
pub use names::{NameDirectory, NamespaceId};
pub use once::OnceRegistry;
pub use pool::Pool;
