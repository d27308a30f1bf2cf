//! CLI entry point for the chat session tool.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chat_session::{
    CheckpointChallenge, Credentials, LoginError, LoginFlow, LoginInput, ServiceUrls, Session,
    load_saved_session, logging, store_saved_session,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    logging::init(args.default_log_directive(), false);
    debug!(
        email = ?args.email,
        session = ?args.session,
        options = ?args.options,
        "CLI arguments parsed"
    );

    let options = match &args.options {
        Some(path) => read_options(path)?,
        None => Map::new(),
    };
    let (mut flow, update) = LoginFlow::configured(&options);
    if !update.warnings.is_empty() {
        debug!(warnings = update.warnings.len(), "some options were ignored");
    }
    if let Some(base) = &args.base_url {
        flow = flow.with_urls(ServiceUrls::new(base)?);
    }

    let session = match flow.login(login_input(&args)?).await {
        Ok(session) => session,
        Err(LoginError::CheckpointPending(challenge)) => resolve_checkpoint(*challenge, &args).await?,
        Err(error) => return Err(error).context("login failed"),
    };

    report(&session);

    if let Some(path) = &args.save_session {
        store_saved_session(path, &session.export_session())
            .with_context(|| format!("could not save session to {}", path.display()))?;
        info!(path = %path.display(), "Session saved");
    }
    Ok(())
}

fn read_options(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read options file {}", path.display()))?;
    match serde_json::from_str(&text)
        .with_context(|| format!("options file {} is not valid JSON", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("options file {} must contain a JSON object", path.display()),
    }
}

fn login_input(args: &Args) -> Result<LoginInput> {
    if let Some(path) = &args.session {
        let imported = load_saved_session(path)
            .with_context(|| format!("could not load session from {}", path.display()))?;
        for warning in &imported.warnings {
            warn!(path = %path.display(), "{warning}");
        }
        return Ok(LoginInput::Saved(imported.session));
    }
    match (&args.email, &args.password) {
        (Some(email), Some(password)) => Ok(LoginInput::Credentials(Credentials::new(
            email.as_str(),
            password.as_str(),
        ))),
        _ => bail!("either --session or both --email and --password are required"),
    }
}

async fn resolve_checkpoint(mut challenge: CheckpointChallenge, args: &Args) -> Result<Session> {
    if let Some(code) = &args.approval_code {
        return challenge
            .submit_code(code)
            .await
            .context("approval code was not accepted");
    }
    if args.wait_for_approval {
        return wait_with_spinner(&mut challenge).await;
    }

    eprintln!("Login approval required. Enter the approval code, or approve the login from a browser:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = tokio::select! {
        approved = challenge.wait_for_approval() => {
            return approved.context("login after browser approval failed");
        }
        line = lines.next_line() => line.context("could not read approval code")?,
    };

    match code.map(|code| code.trim().to_string()) {
        Some(code) if !code.is_empty() => challenge
            .submit_code(&code)
            .await
            .context("approval code was not accepted"),
        _ => wait_with_spinner(&mut challenge).await,
    }
}

async fn wait_with_spinner(challenge: &mut CheckpointChallenge) -> Result<Session> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Waiting for login approval from a browser...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = challenge.wait_for_approval().await;
    spinner.finish_and_clear();
    result.context("login after browser approval failed")
}

fn report(session: &Session) {
    println!("identity: {}", session.identity());
    match session.endpoint() {
        Some(endpoint) => println!("region: {}", endpoint.region),
        None => {
            println!("region: unknown");
            if let Some(degraded) = session.degraded() {
                warn!(page_bytes = degraded.html.len(), "{degraded}");
            }
        }
    }
}
