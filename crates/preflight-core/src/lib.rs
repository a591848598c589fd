//! Domain types and collaborator traits for the preflight test orchestrator.
//!
//! This crate defines the data model shared by the store and the server
//! (test descriptors, case specs, results, jobs, conversations) and the
//! trait seams behind which user code lives: the test project plugin, the
//! agent under test, the validator, streaming chat agents, and tools. It
//! performs no I/O of its own.

pub mod agent;
pub mod case;
pub mod conversation;
pub mod descriptor;
pub mod job;
pub mod message;
pub mod plugin;
pub mod result;
pub mod tool;
pub mod validator;

// Re-export commonly used types
pub use agent::{
    AgentError, AgentEventStream, AgentStreamEvent, ChatAgentFactory, ChatAgentInfo, QueryAgent,
    StreamingChatAgent,
};
pub use case::{CaseRecorder, CaseSpec};
pub use conversation::Conversation;
pub use descriptor::TestDescriptor;
pub use job::{Job, JobStatus, TestStatus};
pub use message::{AgentResponse, Message, MessageRole, TokenUsage, ToolCallRecord};
pub use plugin::{
    DiscoverySnapshot, LoadedTests, ProjectError, ProjectLoader, StaticProject, TestProject,
    TestRegistration,
};
pub use result::{ErrorKind, TestResult};
pub use tool::{Tool, ToolError, ToolParameter, ToolSchema};
pub use validator::{Validator, ValidatorError, Verdict};

/// Current time as whole seconds since the Unix epoch.
///
/// All persisted and wire-visible timestamps in preflight use this clock.
pub fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
