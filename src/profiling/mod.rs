//! Inference profiling
pub mod latency;

pub use latency::{sample_latency, sample_latency_with, LatencyStats};
