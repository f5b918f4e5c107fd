//! feature-cache CLI — fetch, cache, merge and inspect image feature vectors from the command line.

pub mod commands;
pub mod config;

pub use commands::collect_inputs;
pub use config::FetchConfig;
