//! Session handles for both ends of a stream.
//!
//! [`ProducerConnection`] runs the producer loop over an accepted consumer;
//! [`ConsumerConnection`] runs ingestion over a dialled producer. Both spawn
//! their work on the tokio runtime, expose `cancel()`/`join()`, and cancel
//! their tasks when dropped.

pub mod consumer;
pub mod producer;


pub use consumer::ConsumerConnection;
pub use producer::ProducerConnection;
