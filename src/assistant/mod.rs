//! Remote dialogue agent integration — provider client and reply gateway.

pub mod client;
pub mod gateway;

pub use client::{AgentProvider, OpenAiAssistants, RunStatus};
pub use gateway::AssistantGateway;
