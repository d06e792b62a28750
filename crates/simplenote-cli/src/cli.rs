//! Command line definitions.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "simplenote", version, about = "Notes that follow you, online or not")]
pub struct Cli {
    /// Server base URL, e.g. http://localhost:8000/api/
    #[arg(long, global = true, env = "SIMPLENOTE_API_URL")]
    pub api_url: Option<String>,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and start a session
    Login(LoginArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Forget the saved session
    Logout,
    /// Show who is signed in and when the token expires
    Status,
    /// Change the account password
    Passwd,
    /// Exchange the refresh token for a new access token now
    Refresh,
    /// Work with notes
    Notes(NotesArgs),
    /// Mark onboarding as done or show it again
    Onboarding(OnboardingArgs),
    /// Keep the session fresh in the foreground until Ctrl-C
    Monitor,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Defaults to the last username used
    #[arg(short, long, env = "SIMPLENOTE_USERNAME")]
    pub username: Option<String>,
    /// Prompted for when not given
    #[arg(long, env = "SIMPLENOTE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(short, long)]
    pub username: String,
    #[arg(short, long)]
    pub email: String,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    /// Prompted for when not given
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct NotesArgs {
    #[command(subcommand)]
    pub command: NotesCommand,
}

#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    /// List cached notes, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Upload offline notes and fetch the latest from the server
    Sync,
    /// Print one note
    Show { id: i64 },
    /// Create a note
    Add {
        title: String,
        #[arg(default_value = "")]
        body: String,
    },
    /// Replace a note's title and body
    Edit {
        id: i64,
        title: String,
        #[arg(default_value = "")]
        body: String,
    },
    /// Delete a note
    Rm { id: i64 },
    /// Search titles and bodies
    Search {
        query: String,
        /// Ask the server instead of the local cache
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Debug, Args)]
pub struct OnboardingArgs {
    #[command(subcommand)]
    pub command: Option<OnboardingCommand>,
}

#[derive(Debug, Subcommand)]
pub enum OnboardingCommand {
    Done,
    Reset,
}
