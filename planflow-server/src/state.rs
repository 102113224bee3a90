//! Shared application state for the HTTP adapter.

use std::sync::Arc;

use planflow::agent::{PlanModeAgent, PlanModeHandler};
use planflow::config::{AgentCard, EngineConfig};
use planflow::dispatch::Dispatcher;
use planflow::session::SessionRegistry;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Engine wired to `agent`, with sessions and lite mode set up from
    /// `config`.
    pub fn with_agent<A: PlanModeAgent + 'static>(config: EngineConfig, agent: A) -> Self {
        let registry = SessionRegistry::new()
            .with_agent_id(&config.agent_id)
            .with_supported_phases(config.supported_phases.clone());
        let mut dispatcher = Dispatcher::new(registry);
        dispatcher.register(PlanModeHandler::new(agent).with_lite_mode(config.lite_mode));
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn agent_card(&self) -> AgentCard {
        AgentCard::from_config(&self.config)
    }
}
