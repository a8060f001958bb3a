/// Builder for constructing orchestrator instances.
pub mod builder;
/// Run submission, dispatch and retry.
pub mod orchestrator;
/// Cooperative shutdown signal.
pub mod shutdown;

pub use builder::OrchestratorBuilder;
pub use orchestrator::{OrchestratorConfig, TestRunOrchestrator};
pub use shutdown::ShutdownToken;
