//! Command-line interface definition for chatsync
//!
//! This module defines the CLI structure using clap's derive API, plus the
//! interactive chat loop that renders engine state into a terminal.

use crate::error::{ChatsyncError, Result};
use crate::message::Sender;
use crate::session::{ChatSession, RenderState};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::time::Duration;

/// chatsync - chat-room session synchronization engine
///
/// Run a conversation against a remote chat backend with live updates, or
/// fully offline against the local session store.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/chatsync.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatsync
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Bot identifier
        #[arg(long)]
        bot: String,

        /// Category identifier
        #[arg(long, default_value = "1")]
        category: String,

        /// Episode identifier
        #[arg(long, default_value = "1")]
        episode: String,

        /// Log in as this user id (requires a configured backend)
        #[arg(short, long)]
        login: Option<String>,

        /// Override the backend base URL from config
        #[arg(long)]
        remote: Option<String>,
    },
}

impl Cli {
    /// Parses command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// How long the chat loop waits for a scheduled reply and its reveal
/// animation before giving the prompt back
const QUIESCENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the interactive chat loop over a started session
///
/// Slash commands map 1:1 to engine operations:
/// `/edit N TEXT`, `/delete N`, `/regen N`, `/copy N`, `/play N`, `/quit`.
/// Anything else is sent as a message.
pub async fn run_chat_loop(session: ChatSession) -> Result<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| ChatsyncError::Config(format!("Failed to start line editor: {}", e)))?;
    let mut states = session.render_states();
    let mut printed = 0;

    println!(
        "Chatting with {} - type a message, or /help for commands",
        session.bot().name.bold()
    );

    // The welcome message may still be revealing.
    printed = drain_until_idle(&mut states, printed).await;

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                return Err(ChatsyncError::Config(format!("Readline error: {}", e)).into());
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match dispatch(&session, line).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => report_error(e),
        }

        printed = drain_until_idle(&mut states, printed).await;
    }

    session.close().await;
    Ok(())
}

/// Executes one line of input; returns `Ok(true)` to quit
async fn dispatch(session: &ChatSession, line: &str) -> Result<bool> {
    if !line.starts_with('/') {
        session.send(line).await?;
        return Ok(false);
    }

    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let index = parts.next().map(str::parse::<usize>);

    match command {
        "/quit" | "/exit" => return Ok(true),
        "/help" => {
            println!("/edit N TEXT  replace message N and regenerate its answer");
            println!("/delete N     delete message N and everything after it");
            println!("/regen N      regenerate from message N");
            println!("/copy N       copy message N to the clipboard");
            println!("/play N       toggle read-aloud for message N");
            println!("/quit         leave the session");
        }
        "/edit" => {
            let index = parse_index(index)?;
            let text = parts
                .next()
                .ok_or_else(|| ChatsyncError::Config("Usage: /edit N TEXT".to_string()))?;
            session.edit(index, text).await?;
        }
        "/delete" => session.delete(parse_index(index)?).await?,
        "/regen" => session.regenerate(parse_index(index)?).await?,
        "/copy" => {
            session.copy(parse_index(index)?).await?;
            println!("{}", "Copied to clipboard".dimmed());
        }
        "/play" => session.toggle_playback(parse_index(index)?).await?,
        other => println!("Unknown command: {} (try /help)", other),
    }
    Ok(false)
}

fn parse_index(index: Option<std::result::Result<usize, std::num::ParseIntError>>) -> Result<usize> {
    match index {
        Some(Ok(value)) => Ok(value),
        _ => Err(ChatsyncError::Config("Expected a message index".to_string()).into()),
    }
}

/// Prints newly committed messages and reveal progress until the engine
/// goes idle (nothing generating, nothing animating) or the timeout hits
async fn drain_until_idle(
    states: &mut tokio::sync::watch::Receiver<RenderState>,
    mut printed: usize,
) -> usize {
    let deadline = tokio::time::Instant::now() + QUIESCENCE_TIMEOUT;
    loop {
        {
            let state = states.borrow();
            printed = print_new_messages(&state, printed);
            if !state.generating && state.animation.is_none() {
                return printed;
            }
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            tracing::warn!("gave up waiting for the engine to go idle");
            return printed;
        }
        let changed = tokio::time::timeout(remaining, states.changed()).await;
        match changed {
            Ok(Ok(())) => {}
            // Channel closed or timed out; print what we have and stop.
            _ => {
                let state = states.borrow();
                return print_new_messages(&state, printed);
            }
        }
    }
}

/// Prints messages past `printed`, returning the new count
fn print_new_messages(state: &RenderState, printed: usize) -> usize {
    for (index, message) in state.messages.iter().enumerate().skip(printed) {
        let tag = match message.sender {
            Sender::User => format!("[{:>2}] {}", index, "you".green()),
            Sender::Assistant => format!("[{:>2}] {}", index, "bot".cyan()),
        };
        println!("{} {}", tag, message.text);
    }
    state.messages.len()
}

fn report_error(error: anyhow::Error) {
    match error.downcast_ref::<ChatsyncError>() {
        Some(ChatsyncError::QuotaExceeded { limit }) => {
            println!(
                "{}",
                format!(
                    "Message limit reached ({}). Sign in to keep the conversation going.",
                    limit
                )
                .yellow()
            );
        }
        Some(ChatsyncError::Clipboard(reason)) => {
            println!("{}", format!("Copy failed: {}", reason).yellow());
        }
        _ => {
            tracing::error!("operation failed: {:#}", error);
            println!("{}", "Something went wrong; state unchanged".red());
        }
    }
}
