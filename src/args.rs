use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "slack-destalinator")]
#[command(about = "Warns about and archives stale Slack channels", version)]
pub struct Args {
    /// Config file (default: <config dir>/destalinator/config.toml).
    #[arg(short, long, env = "DESTALINATOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the destalinate job on its schedule until killed.
    Schedule {
        /// Run every ten minutes instead of daily.
        #[arg(long)]
        test_schedule: bool,
    },

    /// Run the destalinate job once, now.
    Run,

    /// Warn stale channels.
    Warn {
        /// Post the warning even where one was already posted.
        #[arg(long)]
        force: bool,
    },

    /// Archive stale channels.
    Archive,

    /// Announce newly created channels.
    Announce,

    /// Flag messages with enough reactions.
    Flag,

    /// Check the API and bot tokens.
    Auth,
}
