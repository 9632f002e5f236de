use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use alfred::agent::ChatSession;
use alfred::api::{self, AppState};
use alfred::cli;
use alfred::config::{AssistantConfig, ServerConfig};

#[derive(Parser)]
#[command(name = "alfred")]
#[command(about = "Alfred, a conversational butler with a remote model and a local fallback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Workspace root for file tools (overrides ALFRED_WORKSPACE)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and web chat page (default)
    Serve {
        /// Port to listen on (overrides ALFRED_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat in the terminal
    Chat,
    /// Run one canned turn and exit
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = AssistantConfig::from_env().context("invalid configuration")?;
    if let Some(workspace) = cli.workspace {
        config.workspace_root = workspace;
    }

    eprintln!("🎩 Alfred v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model_name);
    if !config.has_api_key() {
        eprintln!("   GOOGLE_API_KEY not set, using the local fallback");
    }

    let (mut session, workspace) =
        ChatSession::from_config(config).context("failed to build the inference client")?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let mut server = ServerConfig::from_env();
            if let Some(port) = port {
                server.port = port;
            }
            let addr = server.bind_addr();
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            eprintln!("   Web chat: http://{addr}/");
            api::serve(listener, AppState::new(session, workspace)).await?;
        }
        Commands::Chat => cli::run_repl(&mut session).await?,
        Commands::Demo => cli::run_demo(&mut session).await?,
    }

    Ok(())
}
