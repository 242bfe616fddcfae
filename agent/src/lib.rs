//! Agent layer for the protocol foundry
//!
//! LLM backends, structured generation with validation and retries, role
//! profiles and prompts. The workflow itself lives in `foundry-orchestrator`.

pub mod capability;
pub mod config;
pub mod llm;
pub mod prompts;
pub mod roles;
pub mod testing;

pub use capability::{
    AgentCapability, AgentFailure, CallPolicy, Draft, FailureKind, LlmAgent, PromptSpec,
    ReviewVerdict, SafetyVerdict, StructuredOutput, Synthesis,
};
pub use config::FoundryFileConfig;
pub use llm::Llm;
pub use roles::{AgentRole, AgentSet, RoleProfile, RoleRegistry};
