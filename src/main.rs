//! Toolchat - interactive entry point

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use toolchat::chat::{repl, ChatSession, ConsoleObserver, SessionSettings};
use toolchat::config::AppConfig;
use toolchat::error::AppResult;
use toolchat::http::ReqwestAdapter;
use toolchat::llm::{OpenAiConfig, OpenAiProvider};
use toolchat::observability::init_default_logging;
use toolchat::tools::ToolRegistry;
use tokio::io::BufReader;
use tracing::{error, info};

/// Chat with a model that can call web, weather, video, scholar and flight tools
#[derive(Parser)]
#[command(name = "toolchat")]
#[command(version)]
struct Cli {
    /// Print tool output and run markers
    #[arg(short, long)]
    debug: bool,

    /// Optional TOML file with endpoints, timeouts and model settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env is optional
    dotenvy::dotenv().ok();
    init_default_logging(cli.debug);

    let mut session = match build_session(&cli) {
        Ok(session) => session,
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    if let Err(e) = repl::run(&mut session, stdin, &mut stdout, cli.debug).await {
        error!("Console error: {}", e);
        process::exit(1);
    }

    info!("Session ended");
}

fn build_session(cli: &Cli) -> AppResult<ChatSession> {
    let config = AppConfig::load(cli.config.as_deref())?;
    info!(
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        serpapi = config.services.serpapi_api_key.is_some(),
        "Configuration loaded"
    );

    let adapter = Arc::new(ReqwestAdapter::new(&config.http_settings())?);
    let registry = ToolRegistry::with_builtin_tools(&config.services, adapter)?;
    let provider = Arc::new(OpenAiProvider::new(OpenAiConfig::from(&config.llm))?);

    Ok(
        ChatSession::new(provider, registry, SessionSettings::from(&config.llm))
            .with_observer(ConsoleObserver::new(io::stdout(), cli.debug)),
    )
}
