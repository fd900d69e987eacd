use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use keyportal_client::services::TimeRange;
use keyportal_client::BuildMode;

#[derive(Parser, Debug)]
#[command(name = "keyportal", about = "KeyPortal CLI")]
pub struct Args {
    /// Path to keyportal.toml
    #[arg(long, global = true, env = "KEYPORTAL_MANIFEST")]
    pub manifest: Option<PathBuf>,
    /// Which backend to talk to (production or development)
    #[arg(long, global = true, value_parser = parse_mode)]
    pub mode: Option<BuildMode>,
    /// Override the backend base URL entirely
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,
    #[command(subcommand)]
    pub cmd: Command,
}

fn parse_mode(value: &str) -> Result<BuildMode, String> {
    BuildMode::parse(value).ok_or_else(|| format!("unknown mode `{value}`"))
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and persist the session
    Login {
        #[arg(long, required_unless_present = "email", conflicts_with = "email")]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "KEYPORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "KEYPORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the persisted session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage API keys
    #[command(subcommand)]
    Keys(KeysCommand),
    /// Account overview
    Stats,
    /// Usage for a period
    Usage {
        #[arg(long, value_enum, default_value_t = Period::Month)]
        period: Period,
    },
    /// Check whether an API key is valid (no login needed)
    Verify { key: String },
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    List,
    Generate {
        name: String,
    },
    /// Enable or disable a key
    Toggle {
        id: String,
        #[arg(value_enum)]
        state: KeyState,
    },
    /// Key details, usage statistics and recent calls
    Show {
        id: String,
        #[arg(long, value_parser = clap::value_parser!(TimeRange), default_value = "7d")]
        range: TimeRange,
    },
    Delete {
        id: String,
    },
    /// Rotate a key's secret
    Regenerate {
        id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KeyState {
    Active,
    Disabled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}
