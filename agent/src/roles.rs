//! Role profiles and the agent set the workflow runs with
//!
//! Each role has a stable agent id (recorded in reviews), a model and a
//! system prompt. Models can be overridden per role from `[roles.<name>]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::capability::{
    AgentCapability, CallPolicy, Draft, LlmAgent, ReviewVerdict, SafetyVerdict, Synthesis,
};
use crate::config::FoundryFileConfig;
use crate::llm::{self, CannedLlm, Llm, OllamaClient};
use crate::prompts;

/// The four roles of the drafting workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Drafter,
    SafetyReviewer,
    ClinicalReviewer,
    Supervisor,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Drafter,
        AgentRole::SafetyReviewer,
        AgentRole::ClinicalReviewer,
        AgentRole::Supervisor,
    ];

    /// Key used in `[roles.<key>]` config sections
    pub fn config_key(&self) -> &'static str {
        match self {
            AgentRole::Drafter => "drafter",
            AgentRole::SafetyReviewer => "safety",
            AgentRole::ClinicalReviewer => "clinical",
            AgentRole::Supervisor => "supervisor",
        }
    }

    /// Identifier recorded in reviews and logs
    pub fn agent_id(&self) -> &'static str {
        match self {
            AgentRole::Drafter => "ClinicalDrafter",
            AgentRole::SafetyReviewer => "SafetyGuardian",
            AgentRole::ClinicalReviewer => "ClinicalCritic",
            AgentRole::Supervisor => "Supervisor",
        }
    }

    fn index(&self) -> usize {
        match self {
            AgentRole::Drafter => 0,
            AgentRole::SafetyReviewer => 1,
            AgentRole::ClinicalReviewer => 2,
            AgentRole::Supervisor => 3,
        }
    }

    fn default_prompt(&self) -> &'static str {
        match self {
            AgentRole::Drafter => prompts::DRAFTER_PROMPT,
            AgentRole::SafetyReviewer => prompts::SAFETY_PROMPT,
            AgentRole::ClinicalReviewer => prompts::CLINICAL_PROMPT,
            AgentRole::Supervisor => prompts::SUPERVISOR_PROMPT,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Configuration for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub role: AgentRole,

    /// Identifier recorded in reviews and logs
    pub agent_id: String,

    /// LLM model to use (e.g., "qwen2.5:7b-instruct", "llama3.1:70b")
    pub model: String,

    /// System prompt defining the role's behavior
    pub system_prompt: String,
}

impl RoleProfile {
    pub fn new(role: AgentRole, model: impl Into<String>) -> Self {
        Self {
            role,
            agent_id: role.agent_id().to_string(),
            model: model.into(),
            system_prompt: role.default_prompt().to_string(),
        }
    }

    /// Replace the system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

/// One profile per role
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    profiles: [RoleProfile; 4],
}

impl RoleRegistry {
    /// All roles on the same model
    pub fn with_defaults(default_model: impl Into<String>) -> Self {
        let model = default_model.into();
        Self {
            profiles: AgentRole::ALL.map(|role| RoleProfile::new(role, model.clone())),
        }
    }

    /// Defaults on `[llm].model`, then per-role overrides from `[roles.*]`
    pub fn from_config(config: &FoundryFileConfig) -> Self {
        let mut registry = Self::with_defaults(&config.llm.model);
        for role in AgentRole::ALL {
            if let Some(model) = config.role_model(role.config_key()) {
                registry.set_model(role, model);
            }
        }
        registry
    }

    pub fn get(&self, role: AgentRole) -> &RoleProfile {
        &self.profiles[role.index()]
    }

    /// Replace a role's profile
    pub fn register(&mut self, profile: RoleProfile) {
        let index = profile.role.index();
        self.profiles[index] = profile;
    }

    /// Update the model for one role
    pub fn set_model(&mut self, role: AgentRole, model: impl Into<String>) {
        self.profiles[role.index()].model = model.into();
    }

    /// Update the model for every role
    pub fn set_all_models(&mut self, model: impl Into<String>) {
        let model = model.into();
        for profile in self.profiles.iter_mut() {
            profile.model = model.clone();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleProfile> {
        self.profiles.iter()
    }
}

/// The agents one workflow run talks to
#[derive(Clone)]
pub struct AgentSet {
    pub drafter: Arc<dyn AgentCapability<Draft>>,
    pub safety: Arc<dyn AgentCapability<SafetyVerdict>>,
    pub clinical: Arc<dyn AgentCapability<ReviewVerdict>>,
    pub supervisor: Arc<dyn AgentCapability<Synthesis>>,
}

impl AgentSet {
    /// Build every role over the backend `backend_for` returns for its profile
    pub fn from_backends<F>(registry: &RoleRegistry, policy: CallPolicy, backend_for: F) -> Self
    where
        F: Fn(&RoleProfile) -> Arc<dyn Llm>,
    {
        let drafter = registry.get(AgentRole::Drafter);
        let safety = registry.get(AgentRole::SafetyReviewer);
        let clinical = registry.get(AgentRole::ClinicalReviewer);
        let supervisor = registry.get(AgentRole::Supervisor);

        Self {
            drafter: Arc::new(LlmAgent::<Draft>::new(drafter, backend_for(drafter), policy)),
            safety: Arc::new(LlmAgent::<SafetyVerdict>::new(safety, backend_for(safety), policy)),
            clinical: Arc::new(LlmAgent::<ReviewVerdict>::new(
                clinical,
                backend_for(clinical),
                policy,
            )),
            supervisor: Arc::new(LlmAgent::<Synthesis>::new(
                supervisor,
                backend_for(supervisor),
                policy,
            )),
        }
    }

    /// Every role on an Ollama server
    pub fn ollama(url: &str, registry: &RoleRegistry, policy: CallPolicy) -> Self {
        tracing::info!(url = %url, "Using Ollama backend");
        Self::from_backends(registry, policy, |profile| {
            Arc::new(OllamaClient::new(url, &profile.model)) as Arc<dyn Llm>
        })
    }

    /// Canned replies, no model needed
    pub fn offline(registry: &RoleRegistry, policy: CallPolicy) -> Self {
        tracing::info!("Using offline canned responses");
        Self::from_backends(registry, policy, |profile| {
            let reply = match profile.role {
                AgentRole::Drafter => llm::OFFLINE_DRAFT,
                AgentRole::SafetyReviewer => llm::OFFLINE_SAFETY_REVIEW,
                AgentRole::ClinicalReviewer => llm::OFFLINE_CLINICAL_REVIEW,
                AgentRole::Supervisor => llm::OFFLINE_SYNTHESIS,
            };
            Arc::new(CannedLlm::new(reply)) as Arc<dyn Llm>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PromptSpec;

    #[test]
    fn test_registry_defaults() {
        let registry = RoleRegistry::with_defaults("test-model");

        for role in AgentRole::ALL {
            let profile = registry.get(role);
            assert_eq!(profile.role, role);
            assert_eq!(profile.model, "test-model");
            assert!(!profile.system_prompt.is_empty());
        }
        assert_eq!(registry.get(AgentRole::SafetyReviewer).agent_id, "SafetyGuardian");
        assert_eq!(registry.get(AgentRole::ClinicalReviewer).agent_id, "ClinicalCritic");
    }

    #[test]
    fn test_registry_from_config_overrides() {
        let config = FoundryFileConfig::from_toml(
            r#"
            [llm]
            model = "base"

            [roles.clinical]
            model = "bigger"
            "#,
        )
        .unwrap();
        let registry = RoleRegistry::from_config(&config);

        assert_eq!(registry.get(AgentRole::Drafter).model, "base");
        assert_eq!(registry.get(AgentRole::ClinicalReviewer).model, "bigger");
    }

    #[test]
    fn test_registry_set_models() {
        let mut registry = RoleRegistry::with_defaults("old-model");
        registry.set_all_models("new-model");
        assert!(registry.iter().all(|p| p.model == "new-model"));

        registry.register(
            RoleProfile::new(AgentRole::Supervisor, "custom").with_system_prompt("Be brief."),
        );
        assert_eq!(registry.get(AgentRole::Supervisor).system_prompt, "Be brief.");
    }

    #[tokio::test]
    async fn test_offline_set_produces_valid_outputs() {
        let registry = RoleRegistry::with_defaults("unused");
        let agents = AgentSet::offline(&registry, CallPolicy::default());
        let prompt = PromptSpec::new("anything");

        let draft = agents.drafter.generate(&prompt).await.unwrap();
        assert!(draft.content.contains("**Disclaimer**"));

        let SafetyVerdict(safety) = agents.safety.generate(&prompt).await.unwrap();
        let clinical = agents.clinical.generate(&prompt).await.unwrap();
        assert_eq!((safety.score, clinical.score), (9, 8));
        assert_eq!(agents.safety.name(), "SafetyGuardian");

        let synthesis = agents.supervisor.generate(&prompt).await.unwrap();
        assert!(synthesis.feedback.starts_with('•'));
    }
}
