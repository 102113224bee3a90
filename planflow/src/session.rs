//! Session registry: keeps workflows alive across independent calls.
//!
//! Each session id maps to one [`Session`] behind its own async mutex. The
//! registry map is the only structure shared between calls; once a caller
//! holds a session's lock it owns that session until the call finishes.
//!
//! A secondary index maps every emitted interaction id (clarification,
//! selection, plan) to its session, so a `respond` call can find its
//! workflow even when the client's session id changed in between.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::autopilot::LITE_MODE_FLAG;
use crate::core::phases::Phase;
use crate::stream::EventStream;
use crate::workflow::WorkflowContext;

/// Scratch state kept for declarative agents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    /// Latest user query.
    pub query: String,
    /// Free-form context; clarification answers land here by default.
    pub context: Map<String, Value>,
    /// Metadata of the request that started the workflow.
    pub metadata: Map<String, Value>,
    pub discovered: Vec<Map<String, Value>>,
    pub selected: Vec<String>,
}

impl AgentState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn lite_mode_enabled(&self) -> bool {
        self.metadata
            .get(LITE_MODE_FLAG)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub workflow: WorkflowContext,
    pub agent: AgentState,
}

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<String, SharedSession>,
    /// Interaction id -> session id.
    interactions: HashMap<String, String>,
}

/// Concurrency-safe map from session id to live session.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    agent_id: String,
    supported_phases: Option<Vec<Phase>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent id stamped into every new session's workflow.
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Phases declared on every new session's workflow.
    pub fn with_supported_phases(mut self, phases: Option<Vec<Phase>>) -> Self {
        self.supported_phases = phases;
        self
    }

    fn new_session(&self, id: &str) -> Session {
        let mut workflow = WorkflowContext::new(EventStream::closed()).with_agent_id(&self.agent_id);
        if let Some(phases) = &self.supported_phases {
            workflow = workflow.with_supported_phases(phases.iter().copied());
        }
        Session {
            id: id.to_string(),
            workflow,
            agent: AgentState::default(),
        }
    }

    /// Existing session for `id`, or a fresh one registered under it.
    pub async fn get_or_create(&self, id: &str) -> SharedSession {
        if let Some(session) = self.inner.read().await.sessions.get(id) {
            return Arc::clone(session);
        }
        let mut inner = self.inner.write().await;
        // Another call may have created it between the two locks.
        let session = inner.sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session_id = %id, "creating session");
            Arc::new(Mutex::new(self.new_session(id)))
        });
        Arc::clone(session)
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.inner.read().await.sessions.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.sessions.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    /// Drop a session and every interaction id pointing at it.
    pub async fn remove(&self, id: &str) -> Option<SharedSession> {
        let mut inner = self.inner.write().await;
        inner.interactions.retain(|_, session_id| session_id != id);
        let removed = inner.sessions.remove(id);
        if removed.is_some() {
            info!(session_id = %id, "removed session");
        }
        removed
    }

    pub async fn link_interaction(&self, interaction_id: &str, session_id: &str) {
        debug!(interaction_id, session_id, "linking interaction to session");
        self.inner
            .write()
            .await
            .interactions
            .insert(interaction_id.to_string(), session_id.to_string());
    }

    /// Forget an interaction id once its response has been consumed.
    pub async fn unlink_interaction(&self, interaction_id: &str) {
        if self
            .inner
            .write()
            .await
            .interactions
            .remove(interaction_id)
            .is_some()
        {
            debug!(interaction_id, "unlinked answered interaction");
        }
    }

    pub async fn resolve_interaction(&self, interaction_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .interactions
            .get(interaction_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_or_create_reuses_instance() {
        let registry = SessionRegistry::new().with_agent_id("agent-x");
        let first = registry.get_or_create("s1").await;
        first
            .lock()
            .await
            .workflow
            .transition_to(Phase::Clarification);

        let second = registry.get_or_create("s1").await;
        assert!(Arc::ptr_eq(&first, &second));
        let session = second.lock().await;
        assert_eq!(session.workflow.phase(), Phase::Clarification);
        assert_eq!(session.workflow.agent_id(), "agent-x");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn distinct_ids_get_distinct_sessions() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("a").await;
        let b = registry.get_or_create("b").await;
        assert!(!Arc::ptr_eq(&a, &b));
        a.lock().await.agent.query = "only a".to_string();
        assert_eq!(b.lock().await.agent.query, "");
    }

    #[tokio::test]
    async fn new_sessions_use_declared_phases() {
        let registry =
            SessionRegistry::new().with_supported_phases(Some(vec![Phase::Discovery]));
        let session = registry.get_or_create("s").await;
        let session = session.lock().await;
        let declared = session.workflow.supported_phases().unwrap();
        assert!(declared.contains(&Phase::Discovery));
        assert_eq!(declared.len(), 1);
    }

    /// Concurrent first contact for the same id creates exactly one session.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_get_or_create_converges() {
        let registry = SessionRegistry::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create("shared").await })
            })
            .collect();
        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn interactions_resolve_and_are_dropped_with_session() {
        let registry = SessionRegistry::new();
        registry.get_or_create("s1").await;
        registry.link_interaction("sel-1", "s1").await;
        assert_eq!(
            registry.resolve_interaction("sel-1").await.as_deref(),
            Some("s1")
        );
        assert!(registry.resolve_interaction("nope").await.is_none());

        registry.link_interaction("plan-1", "s1").await;
        registry.unlink_interaction("plan-1").await;
        assert!(registry.resolve_interaction("plan-1").await.is_none());
        registry.unlink_interaction("plan-1").await;

        assert!(registry.remove("s1").await.is_some());
        assert!(registry.resolve_interaction("sel-1").await.is_none());
        assert!(registry.is_empty().await);
        assert!(registry.get("s1").await.is_none());
    }

    #[test]
    fn agent_state_clear_and_lite_flag() {
        let mut state = AgentState::default();
        assert!(!state.lite_mode_enabled());
        state.query = "q".to_string();
        state
            .metadata
            .insert("lite_mode_enabled".to_string(), json!(true));
        assert!(state.lite_mode_enabled());
        state.clear();
        assert_eq!(state, AgentState::default());
    }
}
