//! Library crate for brutescan: a bounded-concurrency TCP connect scanner for one host.
pub mod error;
pub mod feed;
pub mod limits;
pub mod resolver;
pub mod scanner;
pub mod types;
