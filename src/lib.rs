//! Deckhand: streaming tool-calling run engine.
//!
//! Drives a multi-turn conversation against an OpenAI-compatible streaming
//! completion endpoint, executes registered tools on the model's behalf, and
//! relays progress envelopes to observers over a pub/sub broker while the
//! conversation and tool invocations are persisted through a store.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use deckhand::prelude::*;
//! use deckhand::relay::InMemoryBroker;
//! use deckhand::store::InMemoryStore;
//!
//! # async fn example() -> deckhand::error::Result<()> {
//! let config = EngineConfig::from_env();
//! let provider = Arc::new(OpenAiProvider::from_config(&config)?);
//! let driver = ConversationDriver::new(
//!     config,
//!     provider,
//!     Arc::new(deckhand::tools::builtin::registry()),
//!     Arc::new(InMemoryBroker::new()),
//!     Arc::new(InMemoryStore::new()),
//! );
//! let run = RunContext::new("chat-1", "user-1");
//! let outcome = driver.run(&run, "Create a 3-slide deck").await;
//! println!("{:?}", outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod relay;
pub mod store;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
