use clap::{Parser, Subcommand, ValueEnum};

/// Command-line interface definition for punchclock
/// Work-session, break and correction tracking backed by SQLite
#[derive(Parser, Debug)]
#[command(
    name = "punchclock",
    version = env!("CARGO_PKG_VERSION"),
    about = "Clock in and out, track breaks and review time corrections",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Use the in-memory store; nothing outlives the process
    #[arg(global = true, long = "memory", conflicts_with = "db")]
    pub memory: bool,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    /// Acting user (defaults to $USER)
    #[arg(global = true, long = "user", short = 'u', env = "USER")]
    pub user: Option<String>,

    /// Print records as JSON
    #[arg(global = true, long = "json")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Inspect the configuration file
    Config {
        #[arg(long = "print", help = "Print the effective configuration")]
        print_config: bool,

        #[arg(long = "check", help = "Check configuration file for missing fields")]
        check: bool,
    },

    /// Start a work session
    In,

    /// Close the open work session (ends a running break first)
    Out,

    /// Start or end a break in the open session
    Break {
        #[command(subcommand)]
        action: BreakAction,
    },

    /// Show the open session with live work and break timers
    Status {
        #[arg(
            long = "watch",
            value_name = "SECONDS",
            help = "Keep printing timer ticks for this many seconds"
        )]
        watch: Option<u64>,
    },

    /// List past sessions, most recent first
    History {
        #[arg(long, short, help = "Maximum number of sessions (default from config)")]
        limit: Option<usize>,
    },

    /// List the breaks of one session
    Breaks {
        /// Session id
        session: String,
    },

    /// Submit and review correction requests
    Correction {
        #[command(subcommand)]
        action: CorrectionAction,
    },

    /// Worked-time summaries
    Stats {
        #[arg(value_enum)]
        period: StatsPeriod,

        #[arg(long, help = "Any day inside the period (YYYY-MM-DD, default today)")]
        date: Option<String>,
    },

    /// Close sessions left open for too long
    Autoclose {
        #[arg(long, help = "Age threshold in hours (default from config)")]
        hours: Option<i64>,
    },

    /// Print the internal log table
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum BreakAction {
    Start,
    End,
}

#[derive(Subcommand, Debug)]
pub enum CorrectionAction {
    /// Ask for new clock-in/clock-out times on a session
    Submit {
        /// Session id
        session: String,

        #[arg(long = "in", value_name = "INSTANT", help = "Proposed clock-in")]
        clock_in: String,

        #[arg(long = "out", value_name = "INSTANT", help = "Proposed clock-out")]
        clock_out: String,

        #[arg(long)]
        reason: String,
    },

    /// Approve a pending request and overwrite the session times
    Approve {
        id: String,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Reject a pending request
    Reject {
        id: String,

        #[arg(long)]
        comment: Option<String>,
    },

    /// List requests (own ones unless --all)
    List {
        #[arg(long, help = "pending, approved or rejected")]
        status: Option<String>,

        #[arg(long, help = "Every requester (reviewer view)")]
        all: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
}
