mod cli;
mod wiring;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use persona_chat::{ChatError, ChatOrchestrator};
use persona_core::config::PersonaConfig;
use persona_core::types::ConversationTurn;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = PersonaConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing. Logs go to stderr so stdout carries only replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Persona v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage and providers.
    let data_dir = wiring::resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let orchestrator = wiring::build_orchestrator(&config, &data_dir)?;

    match args.command {
        Command::Send { message } => {
            let reply = orchestrator.process(&message).await?;
            println!("{}", reply);
        }
        Command::Chat => chat_loop(&orchestrator).await?,
        Command::History { limit, json } => {
            let turns = orchestrator.history(limit).await?;
            print_history(&turns, json)?;
        }
    }

    Ok(())
}

/// Read stdin line by line until EOF, replying to each non-blank line.
async fn chat_loop(orchestrator: &ChatOrchestrator) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        match orchestrator.process(&line).await {
            Ok(reply) => {
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Err(ChatError::EmptyMessage) => continue,
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}

fn print_history(turns: &[ConversationTurn], json: bool) -> Result<(), serde_json::Error> {
    for turn in turns {
        if json {
            println!("{}", serde_json::to_string(turn)?);
        } else {
            println!("#{} [{}]", turn.id, turn.timestamp.to_rfc3339());
            println!("  User: {}", turn.user_message);
            println!("  You:  {}", turn.bot_response);
        }
    }
    Ok(())
}
