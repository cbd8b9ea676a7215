//! # vellum-jobs
//!
//! Background vectorization for the vellum document engine: the unit builder
//! that turns documents into embeddable text, the vectorization handler, and
//! the in-process worker queue that drives it.

pub mod queue;
pub mod units;
pub mod vectorize;

pub use queue::{QueueStatus, TaskStatus, VectorizationQueue, VectorizationTask};
pub use units::build_embeddable_units;
pub use vectorize::{TaskHandler, Vectorizer};
