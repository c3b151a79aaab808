//! Core library: intake queue, deduplication, content extraction,
//! classification, placement, and the feedback loop.

pub mod classifier;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod feedback;
pub mod keywords;
pub mod models;
pub mod placement;
pub mod pipeline;
pub mod queue;
