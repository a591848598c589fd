//! Application state wiring the engine components together.

use std::sync::Arc;

use async_trait::async_trait;
use preflight_core::{
    AgentError, AgentResponse, ChatAgentFactory, QueryAgent, StaticProject, TestProject, Validator,
    ValidatorError, Verdict,
};
use preflight_store::{HistoryStore, StoreError};

use crate::chat::{AgentCatalog, ConversationStore};
use crate::config::Config;
use crate::discovery::Discovery;
use crate::events::JobEventBroker;
use crate::jobs::JobManager;
use crate::pipeline::ExecutionPipeline;
use crate::tooling::{ToolInvoker, ToolLoader};
use crate::validator::HttpValidator;

/// Everything the embedding project supplies to the server: its tests, the
/// agent under test, the validator, the tool set, and its chat agents.
pub struct ProjectBundle {
    pub project: Arc<dyn TestProject>,
    pub agent: Arc<dyn QueryAgent>,
    pub validator: Arc<dyn Validator>,
    pub tool_loader: ToolLoader,
    pub chat_agents: Vec<Arc<dyn ChatAgentFactory>>,
}

impl ProjectBundle {
    /// A bundle for running the server without an embedding project.
    ///
    /// Tests and tools are empty; the validator is the HTTP client when the
    /// config names an endpoint, and any test run fails cleanly otherwise.
    pub fn standalone(config: &Config) -> Self {
        let validator: Arc<dyn Validator> = match HttpValidator::from_config(config) {
            Some(validator) => Arc::new(validator),
            None => Arc::new(UnconfiguredValidator),
        };
        ProjectBundle {
            project: Arc::new(StaticProject::empty()),
            agent: Arc::new(UnconfiguredAgent),
            validator,
            tool_loader: Arc::new(Vec::new),
            chat_agents: Vec::new(),
        }
    }
}

/// Shared application state for the HTTP server.
///
/// Every component is behind an `Arc` so handler tasks clone the state
/// cheaply; the job manager's dispatcher serializes all job mutations.
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<Discovery>,
    pub history: Arc<HistoryStore>,
    pub jobs: Arc<JobManager>,
    pub tools: Arc<ToolInvoker>,
    pub conversations: Arc<ConversationStore>,
    pub agents: Arc<AgentCatalog>,
}

impl AppState {
    /// Builds the full engine from configuration and a project bundle.
    ///
    /// Spawns the job dispatcher and worker pool; must run on a tokio
    /// runtime.
    pub fn new(config: &Config, bundle: ProjectBundle) -> Result<Self, StoreError> {
        let history = Arc::new(HistoryStore::open(&config.history_dir)?);
        let discovery = Arc::new(Discovery::new(Arc::clone(&bundle.project)));
        let pipeline = Arc::new(ExecutionPipeline::new(
            bundle.project,
            bundle.agent,
            bundle.validator,
            Arc::clone(&history),
        ));
        let broker = Arc::new(JobEventBroker::new());
        let jobs = JobManager::new(
            Arc::clone(&discovery),
            pipeline,
            broker,
            config.workers,
        );

        Ok(AppState {
            discovery,
            history,
            jobs,
            tools: Arc::new(ToolInvoker::new(bundle.tool_loader)),
            conversations: Arc::new(ConversationStore::new()),
            agents: Arc::new(AgentCatalog::new(bundle.chat_agents)),
        })
    }
}

struct UnconfiguredAgent;

#[async_trait]
impl QueryAgent for UnconfiguredAgent {
    async fn query(&self, _prompt: &str) -> Result<AgentResponse, AgentError> {
        Err(AgentError::QueryFailed(
            "no agent configured for this server".to_string(),
        ))
    }
}

struct UnconfiguredValidator;

#[async_trait]
impl Validator for UnconfiguredValidator {
    async fn judge(
        &self,
        _response: &AgentResponse,
        _expectations: &[String],
    ) -> Result<Verdict, ValidatorError> {
        Err(ValidatorError::JudgeFailed(
            "no validator configured for this server".to_string(),
        ))
    }
}
