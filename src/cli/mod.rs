//! Command-line interface for Deckhand.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::EngineConfig;
use crate::error::Result;

/// Deckhand: streaming tool-calling run engine
#[derive(Parser, Debug)]
#[command(name = "deckhand", version, about = "Deckhand: drive tool-calling conversations from the terminal")]
pub struct Cli {
    /// TOML config file (defaults come from the environment otherwise)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one conversation and print every envelope as a JSON line
    Run(RunArgs),
    /// List the registered tools
    Tools,
}

/// Arguments for `deckhand run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Model id sent to the endpoint
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Conversation id (history is kept per id for the life of the process)
    #[arg(long, default_value = "cli")]
    pub chat_id: String,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens per completion
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// User prompt
    pub prompt: String,
}

impl Cli {
    /// Resolve configuration: the file when given, the environment otherwise.
    pub fn load_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => {
                let mut config = EngineConfig::from_toml_file(path)?;
                if config.api_key.is_none() {
                    config.api_key = EngineConfig::from_env().api_key;
                }
                Ok(config)
            }
            None => Ok(EngineConfig::from_env()),
        }
    }
}

impl RunArgs {
    /// Apply command-line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = system.clone();
        }
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(max) = self.max_tokens {
            config.max_tokens = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_override_config() {
        let cli = Cli::parse_from([
            "deckhand",
            "run",
            "--model",
            "gpt-4o-mini",
            "--max-tokens",
            "256",
            "Create a 3-slide deck",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = EngineConfig::default();
        args.apply(&mut config);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(args.chat_id, "cli");
        assert_eq!(args.prompt, "Create a 3-slide deck");
    }
}
