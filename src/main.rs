// src/main.rs

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use clotho::chat::{ChatClient, ChatPayload, ChatService};
use clotho::config::CONFIG;
use clotho::replay::replay_file;
use clotho::stream::{
    Message, MessageStatus, SnapshotSink, StreamController, StreamMode, StreamState, TailPolicy,
};

#[derive(Parser)]
#[command(name = "clotho")]
#[command(about = "Stream answers from the Clotho planning assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and stream the reply to stdout
    Ask {
        question: String,

        /// Analysis run to scope the question to
        #[arg(long)]
        run_id: Option<String>,

        /// Ask the agent service instead of the analysis backend
        #[arg(long, default_value_t = false)]
        agent: bool,

        /// Override the backend body format (plain | json)
        #[arg(long)]
        mode: Option<StreamMode>,
    },
    /// Push a captured response body through the assembler
    Replay {
        path: PathBuf,

        #[arg(long, default_value = "plain")]
        mode: StreamMode,

        /// Bytes per chunk; small values split multi-byte characters
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
    },
}

/// Writes only the text added since the previous snapshot
#[derive(Default)]
struct TerminalPrinter {
    printed: usize,
}

impl SnapshotSink for TerminalPrinter {
    fn publish(&mut self, message: &Message) {
        let mut stdout = std::io::stdout().lock();
        let content = &message.content;

        let written = if message.status == MessageStatus::Failed {
            if self.printed > 0 {
                let _ = writeln!(stdout);
            }
            write!(stdout, "{}", content)
        } else if content.len() > self.printed && content.is_char_boundary(self.printed) {
            write!(stdout, "{}", &content[self.printed..])
        } else {
            Ok(())
        };

        if written.is_ok() {
            self.printed = content.len();
        }
        let _ = stdout.flush();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { CONFIG.tracing_level() };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut printer = TerminalPrinter::default();

    let outcome = match cli.command {
        Command::Ask {
            question,
            run_id,
            agent,
            mode,
        } => {
            let mut config = (*CONFIG).clone();
            if let Some(mode) = mode {
                config.stream_mode = mode;
            }
            let client = ChatClient::from_config(&config)?;

            let (service, payload) = if agent {
                (ChatService::Agent, ChatPayload::agent(question))
            } else {
                (ChatService::Backend, ChatPayload::question(question, run_id))
            };

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            client
                .stream_reply(service, &payload, &mut printer, Some(cancel))
                .await
        }
        Command::Replay {
            path,
            mode,
            chunk_size,
        } => {
            let controller = StreamController::new(mode)
                .with_tail_policy(TailPolicy::from_flag(CONFIG.flush_tail))
                .with_apology(CONFIG.apology.clone());
            replay_file(controller, &path, chunk_size, &mut printer).await?
        }
    };

    println!();
    match outcome.state {
        StreamState::Completed if outcome.message.is_none() => warn!("Stream completed without any content"),
        StreamState::Failed => warn!("Stream failed"),
        state => info!("Stream finished: {:?}", state),
    }

    Ok(())
}
