use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_ABOUT: &str = r#"
Daybook - funnel planning and energy-based execution for your tasks

Planning:
  Tasks move through three funnels: backlog -> weekly -> today.
  Today's tasks are split by the energy they need: high_focus or low_energy.

Execution:
  daybook list --view execution   <- what to work on now
  daybook toggle <id>             <- complete (or reopen) a task
  daybook clean-slate             <- send unfinished "today" tasks back to backlog

Rules:
  * A task with open subtasks cannot be completed directly
  * Completing the last open subtask completes its parent
  * Every completion is worth 10 XP; completing on consecutive days builds a streak

Storage:
  Local SQLite database (DAYBOOK_DB, default ~/.daybook/daybook.db), or a
  running `daybook serve` when DAYBOOK_API_URL / --api is set.
"#;

#[derive(Parser, Clone)]
#[command(name = "daybook")]
#[command(about = "Personal task planning - funnels, energy columns, subtasks and streaks")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output (-q)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json: bool,

    /// Database file (overrides DAYBOOK_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Base URL of a running daybook server (overrides DAYBOOK_API_URL)
    #[arg(long, global = true)]
    pub api: Option<String>,

    /// Owner whose tasks to work on (overrides DAYBOOK_OWNER)
    #[arg(long, global = true)]
    pub owner: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewKind {
    #[default]
    Planning,
    Execution,
    Archive,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Serve the REST API
    ///
    /// The owner of each request is taken from the X-Owner-Id header.
    Serve {
        /// Port to listen on (overrides DAYBOOK_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Quick-add a task
    ///
    /// Examples:
    ///   daybook add "Write weekly report"
    ///   daybook add "Deep work block" --funnel today --energy high_focus
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Funnel: backlog, weekly or today
        #[arg(short, long, default_value = "backlog")]
        funnel: String,

        /// Energy level: high_focus, low_energy or none
        #[arg(short, long)]
        energy: Option<String>,

        /// Context tag
        #[arg(long)]
        context: Option<String>,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show tasks
    ///
    /// Examples:
    ///   daybook list
    ///   daybook list --view execution
    ///   daybook list --view archive --range week
    List {
        #[arg(long, value_enum, default_value_t = ViewKind::Planning)]
        view: ViewKind,

        /// Archive range: today, week, month or all
        #[arg(long, default_value = "all")]
        range: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Complete a task, or reopen a completed one
    Toggle {
        id: i64,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Move a task to another funnel (appended to its end)
    Move {
        id: i64,

        /// Target funnel: backlog, weekly or today
        funnel: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Set a task's energy level
    Energy {
        id: i64,

        /// high_focus, low_energy or none
        energy: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Move an item within a bucket by index
    ///
    /// Buckets: backlog, weekly, today:high_focus, today:low_energy,
    /// today:none, subtasks:<parent-id>
    Reorder {
        bucket: String,
        from: usize,
        to: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Drag a task and drop it onto a bucket or another task
    ///
    /// Examples:
    ///   daybook drop 4 --bucket today:low_energy   # append to the column
    ///   daybook drop 4 --over 9                    # insert before task #9
    Drop {
        id: i64,

        /// Drop on the empty area of a bucket
        #[arg(long, conflicts_with = "over")]
        bucket: Option<String>,

        /// Drop on another task
        #[arg(long)]
        over: Option<i64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Add a subtask under a top-level task
    Subtask {
        parent: i64,
        title: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Edit task fields
    Edit {
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        /// Status: todo, in_progress or done
        #[arg(long)]
        status: Option<String>,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        #[arg(long)]
        clear_due: bool,

        /// Context tag
        #[arg(long)]
        context: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Delete a task (and its subtasks)
    Delete {
        id: i64,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Send every unfinished "today" task back to the backlog
    CleanSlate {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show streak and XP
    Stats {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
