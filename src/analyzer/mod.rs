// Analyzer module: deterministic heuristics over parsed transactions.

pub mod summary;
pub mod timeframe;

// Re-export the entry points for ease of use.
pub use summary::summarize;
pub use timeframe::{filter_by_timeframe, infer_from_query, parse_timeframe};
