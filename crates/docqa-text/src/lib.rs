//! Document processing: turning raw text into retrieval chunks.
//!
//! [`DocumentProcessor`] splits a document with one of four
//! [`ChunkingStrategy`] variants, keeps fenced code blocks whole when asked
//! to, locates every chunk in the original text, and attaches metadata.

mod code_blocks;
mod metadata;
mod offsets;
mod patterns;
mod processor;
mod splitter;
mod strategies;
mod strategy;

pub use processor::{chunk_id, ChunkStatistics, DocumentProcessor};
pub use strategy::ChunkingStrategy;
