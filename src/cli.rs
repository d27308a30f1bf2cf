//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Log in to the chat web service and export the session.
///
/// Logs in with credentials or a saved session, resolves a login approval
/// checkpoint if one is required, and prints the account identity and the
/// streaming endpoint region.
#[derive(Parser, Debug)]
#[command(name = "chat-session")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Account email or phone number
    #[arg(short, long, requires = "password", conflicts_with = "session")]
    pub email: Option<String>,

    /// Account password
    #[arg(short, long, env = "SESSION_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Resume from a saved session file instead of submitting credentials
    #[arg(short, long, value_name = "FILE", required_unless_present = "email")]
    pub session: Option<PathBuf>,

    /// JSON object of options (selfListen, forceLogin, pageID, ...)
    #[arg(short, long, value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// Write the logged-in session to this file
    #[arg(long, value_name = "FILE")]
    pub save_session: Option<PathBuf>,

    /// Approval code for a login checkpoint (prompted for when omitted)
    #[arg(long, value_name = "CODE")]
    pub approval_code: Option<String>,

    /// On a login checkpoint, wait for approval from a browser instead of prompting
    #[arg(long, conflicts_with = "approval_code")]
    pub wait_for_approval: bool,

    /// Service origin (for testing against another server)
    #[arg(long, value_name = "URL", env = "CHAT_SESSION_BASE_URL", hide = true)]
    pub base_url: Option<String>,
}

impl Args {
    /// Default tracing directive from the verbosity flags.
    #[must_use]
    pub fn default_log_directive(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
