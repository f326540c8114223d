//! Storyfind - hybrid relevance engine for oral-history transcripts
//!
//! Ranks time-bounded transcript chunks by fusing BM25 and vector retrieval
//! from an external chunk store, collapsing near-duplicate timestamps and
//! filtering on a caller-tuned relevance window.

pub mod cli;
pub mod config;
pub mod error;
pub mod retrieval;
pub mod transcript;

pub use error::{Result, StoryfindError};
