pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod formatter;
pub mod invocation;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod period;
pub mod process;
pub mod providers;
