pub mod commands;
pub mod config;
pub mod orchestrator;
pub mod relay;
pub mod store;
pub mod stream;
pub mod strings;

pub use orchestrator::{Orchestrator, PendingTurn, TurnOutcome};
pub use relay::RelayClient;
pub use stream::{StreamConsumer, StreamFailure, StreamHandle, StreamOutcome, StreamPhase};
