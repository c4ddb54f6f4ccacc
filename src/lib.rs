//! A trace-driven web-object cache simulator harness: multiplexes one
//! or more time-ordered trace files into a single request sequence,
//! drives a pluggable cache policy through a lookup/admit/evict
//! protocol, and reports windowed miss-ratio statistics.

pub mod annotate;
pub mod config;
pub mod diag;
pub mod driver;
pub mod error;
pub mod filter;
pub mod log;
pub mod policy;
pub mod record;
pub mod rss;
pub mod sanity;
pub mod stats;
pub mod trace_reader;

pub use driver::{run_simulation, run_simulation_with_probe};
pub use error::{Result, SimulationError};
pub use record::Request;
pub use stats::ResultDocument;
