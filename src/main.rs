//! Deckhand CLI binary entry point.

use std::sync::Arc;

use clap::Parser;
use deckhand::agent_loop::{ConversationDriver, RunContext, RunLauncher, RunStatus};
use deckhand::cli::{Cli, Commands, RunArgs};
use deckhand::config::EngineConfig;
use deckhand::provider::create_provider;
use deckhand::relay::{Broker, ControlSubscriber, EventType, InMemoryBroker};
use deckhand::store::InMemoryStore;
use deckhand::tools::Tool;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.load_config() {
        Ok(config) => match &cli.command {
            Commands::Run(args) => handle_run(config, args).await,
            Commands::Tools => {
                handle_tools();
                Ok(())
            }
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn handle_tools() {
    for tool in deckhand::tools::builtin::registry().iter() {
        println!("{}\t{}", tool.name(), tool.description());
    }
}

async fn handle_run(mut config: EngineConfig, args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    args.apply(&mut config);

    let provider = create_provider(&config)?;
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let driver = Arc::new(ConversationDriver::new(
        config.clone(),
        provider,
        Arc::new(deckhand::tools::builtin::registry()),
        Arc::clone(&broker),
        Arc::new(InMemoryStore::new()),
    ));
    let launcher = RunLauncher::new(driver);

    let run = RunContext::new(args.chat_id.clone(), "cli");
    let run_id = run.run_id;
    let mut events = broker.subscribe(&config.event_channel(run_id)).await?;

    let printer = tokio::spawn(async move {
        while let Some(line) = events.next().await {
            println!("{line}");
            let terminal = serde_json::from_str::<serde_json::Value>(&line)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
                .and_then(|t| t.parse::<EventType>().ok())
                .is_some_and(EventType::is_terminal);
            if terminal {
                break;
            }
        }
    });

    let mut handle = launcher.spawn_run(run, args.prompt.clone()).await;
    let outcome = tokio::select! {
        outcome = &mut handle => outcome?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("stopping run {run_id}...");
            launcher.request_stop(run_id).await?;
            handle.await?
        }
    };
    let _ = printer.await;

    match outcome.status {
        RunStatus::Failed => Err(outcome.error.unwrap_or_else(|| "run failed".into()).into()),
        RunStatus::Completed | RunStatus::Stopped => Ok(()),
    }
}
