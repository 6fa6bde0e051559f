//! Buffers and synchronization primitives
//!
//! Everything that carries data between threads lives here: the blocking
//! typed buffer used across engine boundaries, the growing variant used
//! inside a data-flow engine, the stack-message FIFO, and the named
//! rendezvous that parks threads until a command arrives.

pub mod any;
pub mod dataset;
pub mod growing;
pub mod rendezvous;
pub mod stack;
pub mod typed;

pub use any::{AnyBuffer, AnyGrowingBuffer, BufferCast};
pub use dataset::{DataSet, Direction, MetadataMap, StackDataSet};
pub use growing::GrowingBuffer;
pub use rendezvous::NamedRendezvous;
pub use stack::StackBuffer;
pub use typed::TypedBuffer;
