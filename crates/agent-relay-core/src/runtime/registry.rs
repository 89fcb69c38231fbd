// crates/agent-relay-core/src/runtime/registry.rs
// ============================================================================
// Module: Agent Relay Registry
// Description: Authoritative agent set with linearizable per-agent counters.
// Purpose: Provide lookup, candidate filtering, and atomic counter updates.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The registry owns the authoritative [`Agent`] records. Reads hand out
//! copies so callers cannot mutate shared state; counter updates take the
//! agent's own lock so updates for one agent are linearizable while distinct
//! agents proceed in parallel. Agents are created by administrative action and
//! never destroyed while referenced by a decision record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use crate::core::agent::Agent;
use crate::core::agent::AgentCounters;
use crate::core::agent::AgentStatus;
use crate::core::agent::AgentType;
use crate::core::agent::DEFAULT_LATENCY_REFERENCE_MS;
use crate::core::agent::ExecutionOutcome;
use crate::core::identifiers::AgentId;
use crate::interfaces::RegistryError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Registry tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryConfig {
    /// Latency normalization reference for the performance score, in ms.
    pub latency_reference_ms: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            latency_reference_ms: DEFAULT_LATENCY_REFERENCE_MS,
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Authoritative agent registry.
///
/// # Invariants
/// - Counter updates for one agent are linearizable.
/// - Reads return copies; callers cannot mutate registry state through them.
pub struct AgentRegistry {
    /// Registry configuration.
    config: RegistryConfig,
    /// Agent records, each behind its own lock.
    agents: RwLock<BTreeMap<AgentId, Arc<Mutex<Agent>>>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            agents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers or replaces an agent record.
    pub fn register(&self, agent: Agent) {
        if let Ok(mut guard) = self.agents.write() {
            guard.insert(agent.agent_id.clone(), Arc::new(Mutex::new(agent)));
        }
    }

    /// Returns a copy of one agent record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the agent does not exist.
    pub fn get(&self, agent_id: &AgentId) -> Result<Agent, RegistryError> {
        let slot = self.slot(agent_id)?;
        let guard = slot
            .lock()
            .map_err(|_| RegistryError::NotFound(agent_id.to_string()))?;
        Ok(guard.clone())
    }

    /// Returns copies of all agents, optionally filtered by status.
    #[must_use]
    pub fn list(&self, status_filter: Option<AgentStatus>) -> Vec<Agent> {
        let Ok(guard) = self.agents.read() else {
            return Vec::new();
        };
        guard
            .values()
            .filter_map(|slot| slot.lock().ok().map(|agent| agent.clone()))
            .filter(|agent| status_filter.is_none_or(|status| agent.status == status))
            .collect()
    }

    /// Returns active agents matching the type tag and optional floor.
    ///
    /// Order is unspecified; callers needing determinism sort by ID.
    #[must_use]
    pub fn candidates(&self, agent_type: &AgentType, min_performance: Option<f64>) -> Vec<Agent> {
        self.list(Some(AgentStatus::Active))
            .into_iter()
            .filter(|agent| &agent.agent_type == agent_type)
            .filter(|agent| {
                min_performance.is_none_or(|floor| agent.counters.performance_score >= floor)
            })
            .collect()
    }

    /// Sets an agent's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the agent does not exist.
    pub fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<(), RegistryError> {
        let slot = self.slot(agent_id)?;
        let mut guard = slot
            .lock()
            .map_err(|_| RegistryError::NotFound(agent_id.to_string()))?;
        guard.status = status;
        Ok(())
    }

    /// Applies one execution outcome to an agent's counters atomically.
    ///
    /// Returns the updated counters so callers can feed drift observers
    /// without a second lookup.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the agent was removed
    /// concurrently.
    pub fn update_counters(
        &self,
        agent_id: &AgentId,
        outcome: &ExecutionOutcome,
    ) -> Result<AgentCounters, RegistryError> {
        let slot = self.slot(agent_id)?;
        let mut guard = slot
            .lock()
            .map_err(|_| RegistryError::NotFound(agent_id.to_string()))?;
        guard.counters.apply(outcome, self.config.latency_reference_ms);
        Ok(guard.counters)
    }

    /// Returns the number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves the shared slot for one agent.
    fn slot(&self, agent_id: &AgentId) -> Result<Arc<Mutex<Agent>>, RegistryError> {
        let guard = self
            .agents
            .read()
            .map_err(|_| RegistryError::NotFound(agent_id.to_string()))?;
        guard
            .get(agent_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
