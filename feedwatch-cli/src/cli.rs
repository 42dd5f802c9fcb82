use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use notification_client::NotificationType;

#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    version,
    about = "Follow and manage a notification feed in real time",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overrides the configuration file
    #[arg(long, env = "FEEDWATCH_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Cookie header carrying the session, overrides the configuration file
    #[arg(long, env = "FEEDWATCH_COOKIE", global = true, hide_env_values = true)]
    pub cookie: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream live notifications until interrupted
    Watch {
        /// Do not fall back to polling when the live channel fails
        #[arg(long)]
        no_polling: bool,

        /// Skip the live channel and poll only
        #[arg(long, conflicts_with = "no_polling")]
        polling_only: bool,

        /// Seconds between polls
        #[arg(long)]
        polling_interval: Option<u64>,

        /// Live-channel failures tolerated before giving up on it
        #[arg(long)]
        max_reconnect_attempts: Option<u32>,
    },

    /// List notifications
    List {
        /// Only this notification type
        #[arg(long = "type", value_parser = parse_kind)]
        kind: Option<NotificationType>,

        /// Only unread notifications
        #[arg(long)]
        unread_only: bool,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        /// Group by day
        #[arg(long)]
        grouped: bool,

        #[arg(short, long, value_enum, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show notification statistics
    Stats {
        #[arg(short, long, value_enum, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Mark one notification as read
    Read { id: String },

    /// Mark every notification as read
    ReadAll,

    /// Delete a notification
    Delete { id: String },

    /// Create a notification
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        message: String,

        #[arg(long = "type", value_parser = parse_kind)]
        kind: NotificationType,

        /// Target a single user instead of the whole organization
        #[arg(long)]
        user_id: Option<String>,

        /// Extra metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Show or reset configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

fn parse_kind(s: &str) -> Result<NotificationType, String> {
    NotificationType::from_str(s)
        .map_err(|_| format!("unknown type {s:?}, expected one of INVITE, DOCUMENT, ALERT, REMINDER, INFO"))
}
