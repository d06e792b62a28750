//! Command handlers. Output goes to stdout, failures come back as errors.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use simplenote_core::{
    AuthResult, Config, MonitorState, Note, NoteResult, PasswordChangeResult, RegisterRequest,
    SimpleNote, TickOutcome,
};

use crate::cli::{Command, LoginArgs, NotesCommand, OnboardingCommand, RegisterArgs};

/// Width of the title column in `notes list`
const TITLE_WIDTH: usize = 40;

pub async fn run(command: Command, mut config: Config, cache_dir: &Path) -> Result<()> {
    let client = SimpleNote::open_in(&config, cache_dir)?;
    match command {
        Command::Login(args) => login(&client, &mut config, args).await,
        Command::Register(args) => register(&client, args).await,
        Command::Logout => {
            client.session().logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Status => status(&client).await,
        Command::Passwd => passwd(&client).await,
        Command::Refresh => match client.session().refresh_token().await {
            AuthResult::Success => {
                println!("Token refreshed.");
                Ok(())
            }
            AuthResult::Error(msg) => bail!(msg),
        },
        Command::Notes(args) => notes(&client, args.command).await,
        Command::Monitor => monitor(&client).await,
        Command::Onboarding(args) => onboarding(&mut config, args.command),
    }
}

async fn login(client: &SimpleNote, config: &mut Config, args: LoginArgs) -> Result<()> {
    let username = match args.username.or_else(|| config.last_username.clone()) {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    match client.session().login(&username, &password).await? {
        AuthResult::Success => {
            config.last_username = Some(username.clone());
            config.save()?;
            let name = client
                .session()
                .current_user()
                .map(|u| u.display_name())
                .unwrap_or(username);
            println!("Logged in as {}.", name);
            // The monitor dies with this process; `simplenote monitor` keeps one running
            client.session().monitor().stop();
            Ok(())
        }
        AuthResult::Error(msg) => bail!(msg),
    }
}

async fn register(client: &SimpleNote, args: RegisterArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };
    let request = RegisterRequest {
        username: args.username,
        email: args.email,
        password,
        first_name: args.first_name,
        last_name: args.last_name,
    };
    match client.session().register(&request).await {
        AuthResult::Success => {
            println!("Account created. Run `simplenote login` to sign in.");
            Ok(())
        }
        AuthResult::Error(msg) => bail!(msg),
    }
}

async fn status(client: &SimpleNote) -> Result<()> {
    let session = client.session().session();
    if !session.is_logged_in() {
        println!("Not logged in.");
        return Ok(());
    }

    let user = match client.session().current_user() {
        Some(user) => Some(user),
        None => client.session().reload_user().await,
    };
    match (user, session.username.as_deref()) {
        (Some(user), _) => println!("Logged in as {} <{}>", user.display_name(), user.email),
        (None, Some(username)) => println!("Logged in as {}", username),
        (None, None) => println!("Logged in"),
    }

    match session.minutes_until_expiry() {
        Some(minutes) if minutes > 0 => println!("Access token expires in {} min", minutes),
        Some(_) => println!("Access token expired; it will be refreshed on next use"),
        None => println!("Access token expiry unknown"),
    }
    if let Some(age) = client.notes().cache_age() {
        println!("{} notes cached, synced {}", client.notes().list_notes().len(), age);
    }
    if client.notes().cache_is_stale() {
        println!("Run `simplenote notes sync` to fetch the latest notes");
    }
    Ok(())
}

async fn passwd(client: &SimpleNote) -> Result<()> {
    if !client.session().is_logged_in() {
        bail!("Not logged in");
    }
    let old = rpassword::prompt_password("Current password: ").context("Failed to read password")?;
    let new = rpassword::prompt_password("New password: ").context("Failed to read password")?;
    match client.session().change_password(&old, &new).await {
        PasswordChangeResult::Changed(detail) => {
            println!("{}", detail);
            Ok(())
        }
        PasswordChangeResult::Error(msg) => bail!(msg),
    }
}

async fn notes(client: &SimpleNote, command: NotesCommand) -> Result<()> {
    let notes = client.notes();
    let result = match command {
        NotesCommand::List { json } => {
            let list = notes.list_notes();
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                print_table(&list);
            }
            return Ok(());
        }
        NotesCommand::Show { id } => {
            let note = notes.get_note(id).with_context(|| format!("No note with id {}", id))?;
            println!("{}\n", note.title);
            println!("{}", note.description);
            println!("\nUpdated {}", note.updated_at);
            return Ok(());
        }
        NotesCommand::Search { query, remote } => {
            let found = if remote {
                notes.search_remote(&query).await?
            } else {
                notes.search_notes(&query)
            };
            print_table(&found);
            return Ok(());
        }
        NotesCommand::Sync => notes.sync_notes().await?,
        NotesCommand::Add { title, body } => notes.create_note(&title, &body).await?,
        NotesCommand::Edit { id, title, body } => notes.update_note(id, &title, &body).await?,
        NotesCommand::Rm { id } => notes.delete_note(id).await?,
    };

    match result {
        NoteResult::Success => {
            debug!("Notes command succeeded");
            let pending = notes.list_notes().iter().filter(|n| n.is_local_only()).count();
            if pending > 0 {
                println!("Done. {} note(s) are only on this device until the next sync.", pending);
            } else {
                println!("Done.");
            }
            Ok(())
        }
        NoteResult::Error(msg) => bail!(msg),
    }
}

async fn monitor(client: &SimpleNote) -> Result<()> {
    let monitor = client.session().monitor();
    let mut outcomes = monitor.subscribe();
    if !client.session().restore() {
        bail!("Not logged in");
    }
    let mut state = monitor.watch_state();
    println!("Keeping the session fresh. Press Ctrl-C to stop.");
    info!("Foreground monitor running");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.wait_for(|s| *s == MonitorState::Stopped) => {
                changed.context("Monitor went away")?;
                println!("Session can no longer be refreshed. Run `simplenote login`.");
                break;
            }
            outcome = outcomes.recv() => match outcome {
                Ok(TickOutcome::Refreshed) => println!("Token refreshed."),
                Ok(TickOutcome::Failed(reason)) => println!("Refresh failed, will retry: {}", reason),
                Ok(TickOutcome::Rejected(reason)) => println!("Refresh rejected: {}", reason),
                Ok(TickOutcome::Idle) | Err(_) => {}
            },
        }
    }

    monitor.stop();
    Ok(())
}

fn onboarding(config: &mut Config, command: Option<OnboardingCommand>) -> Result<()> {
    match command {
        Some(OnboardingCommand::Done) => {
            config.complete_onboarding();
            config.save()?;
        }
        Some(OnboardingCommand::Reset) => {
            config.reset_onboarding();
            config.save()?;
        }
        None => {}
    }
    let state = if config.is_onboarding_completed() { "completed" } else { "not completed" };
    println!("Onboarding {}.", state);
    Ok(())
}

fn print_table(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes.");
        return;
    }
    for note in notes {
        let marker = if note.is_local_only() { "*" } else { " " };
        println!(
            "{:>6}{} {:<width$} {}",
            note.id,
            marker,
            truncate(&note.title, TITLE_WIDTH),
            note.updated_at,
            width = TITLE_WIDTH
        );
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No input given");
    }
    Ok(line)
}
