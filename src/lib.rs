pub mod board;
pub mod classifier;
pub mod cli;
pub mod cli_handlers;
pub mod completion;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod drag;
pub mod error;
pub mod gamification;
pub mod logging;
pub mod orchestrator;
pub mod ordering;
pub mod sql_constants;
pub mod stats;
pub mod store;
pub mod tasks;
pub mod time_utils;

#[cfg(test)]
pub mod test_utils;
