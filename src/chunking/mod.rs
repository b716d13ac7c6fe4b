//! Length-safe chunking
//!
//! The planner turns input texts into context-sized chunks and batch windows; the
//! aggregator folds per-chunk embeddings back into one vector per input text.

pub mod aggregator;
pub mod planner;

pub use aggregator::{AggregationContext, ChunkAggregator, aggregate};
pub use planner::{BatchOffsets, ChunkPlan, ProgressObserver, TokenChunk, plan_chunks};
