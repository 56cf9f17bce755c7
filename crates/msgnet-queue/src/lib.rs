//! Thread-safe queue used as the hand-off point between msgnet's I/O threads
//! and application threads.
//!
//! Outbound messages are batched per connection in one, and inbound
//! messages from every connection of a client or server land in another.

pub mod queue;

pub use queue::ConcurrentQueue;
