//! # vellum-core
//!
//! Core types, traits, and abstractions for the vellum document engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other vellum crates depend on: the document lifecycle model, vector
//! record types, retrieval result shapes, configuration snapshots, and the
//! async trait seams between pipeline stages and their collaborators.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{ConfigHandle, QueueConfig, SearchConfig};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
