//! The run engine: driver, aggregator, dispatcher and cancellation.

pub mod aggregator;
pub mod cancellation;
pub mod dispatcher;
pub mod events;
mod journal;
pub mod runner;
pub mod types;

pub use aggregator::{AssembledTurn, ChunkAggregator, ChunkUpdate, CompletedCall};
pub use cancellation::{is_stop_command, stop_command, CancellationListener, StopFlag};
pub use dispatcher::{ToolDispatcher, ToolOutcome};
pub use events::RunEventEmitter;
pub use runner::{request_stop, ConversationDriver, RunLauncher};
pub use types::*;
