pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod report;
pub mod util;
