// CLI command handlers module
//
// Every command except `serve` runs through the orchestrator, against either
// the local database or a running server.

pub mod task_commands;
pub mod utils;

pub use task_commands::handle_command;
pub use utils::{parse_due_date, print_json, status_badge};
