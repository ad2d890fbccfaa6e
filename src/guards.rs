//! Request guards
//!
//! Process-wide, best-effort state the orchestrator consults on every
//! request: admission control per client, short-lived response memoization
//! per partition, and recently served kinds per partition.
//!
//! Each guard is a small trait with an in-memory implementation; the
//! orchestrator holds them as `Arc<dyn ...>` so an external store can be
//! swapped in without touching the pipeline.

pub mod cache;
pub mod repetition;
pub mod throttle;

// Re-exports
pub use cache::{CacheEntry, MemoryCache, ResponseCache};
pub use repetition::{MemoryRepetitionGuard, RepetitionGuard};
pub use throttle::{MemoryThrottle, RequestThrottle, ThrottleUsage};
