//! Scenarios and Agent Rosters
//!
//! A scenario is a named set of agent identities the user can talk to. The
//! roster keeps them in order; the first agent is the root, the identity that
//! receives control when the session starts.

use serde::Serialize;

pub const DEFAULT_SCENARIO_KEY: &str = "universityTutor";

/// Tools an agent may be granted.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentTool {
    /// Drives the visual board (see [`crate::board`]).
    BoardContent,
}

/// One agent identity of a scenario.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub voice: String,
    /// Instruction content; loaded by the host, empty until then.
    #[serde(skip)]
    pub instructions: String,
    pub tools: Vec<AgentTool>,
    /// Agents this one may transfer control to.
    pub handoffs: Vec<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice: voice.into(),
            instructions: String::new(),
            tools: Vec::new(),
            handoffs: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_handoff(mut self, agent: impl Into<String>) -> Self {
        self.handoffs.push(agent.into());
        self
    }

    pub fn has_tool(&self, tool: AgentTool) -> bool {
        self.tools.contains(&tool)
    }

    pub fn can_hand_off_to(&self, agent: &str) -> bool {
        self.handoffs.iter().any(|h| h == agent)
    }
}

/// The ordered agents of a scenario. The first entry is the root.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct AgentRoster {
    agents: Vec<AgentConfig>,
}

impl AgentRoster {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self { agents }
    }

    pub fn root(&self) -> Option<&AgentConfig> {
        self.agents.first()
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AgentConfig> {
        self.agents.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns a copy with `name` moved to the front, keeping the relative
    /// order of the others. Unknown names leave the order untouched.
    pub fn with_root(&self, name: &str) -> Self {
        let mut agents = self.agents.clone();
        if let Some(idx) = agents.iter().position(|a| a.name == name) {
            if idx > 0 {
                let agent = agents.remove(idx);
                agents.insert(0, agent);
            }
        }
        Self { agents }
    }
}

/// An output moderation policy attached to a session.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutputGuardrail {
    pub name: String,
    pub institution: String,
}

impl OutputGuardrail {
    pub fn moderation(institution: impl Into<String>) -> Self {
        Self {
            name: "moderation_guardrail".to_string(),
            institution: institution.into(),
        }
    }

    /// The policy clause appended to the agent instructions.
    pub fn policy(&self) -> String {
        format!(
            "Speak only on behalf of {}. Refuse offensive, harassing or off-brand content and steer back to the lesson.",
            self.institution
        )
    }
}

/// A named set of agents plus the institution they speak for.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Scenario {
    pub key: String,
    pub institution_name: String,
    pub roster: AgentRoster,
}

impl Scenario {
    pub fn guardrails(&self) -> Vec<OutputGuardrail> {
        vec![OutputGuardrail::moderation(&self.institution_name)]
    }
}

/// All scenarios available to the presentation layer.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    /// The lesson scenarios shipped with the tutor.
    pub fn builtin() -> Self {
        let institution = "Tutoría Universitaria de Finanzas";
        Self::new(vec![
            Scenario {
                key: "universityTutor".to_string(),
                institution_name: institution.to_string(),
                roster: AgentRoster::new(vec![AgentConfig::new("tutorFinanzas", "sage")]),
            },
            Scenario {
                key: "universityTutorEvaluation".to_string(),
                institution_name: institution.to_string(),
                roster: AgentRoster::new(vec![
                    AgentConfig::new("tutorEvaluador", "sage").with_tool(AgentTool::BoardContent),
                ]),
            },
        ])
    }

    /// Fills in every agent's instructions from `load`, keyed by agent name.
    pub fn with_instructions<F>(mut self, load: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for scenario in &mut self.scenarios {
            for agent in scenario.roster.iter_mut() {
                match load(&agent.name) {
                    Some(text) => agent.instructions = text,
                    None => tracing::warn!(agent = %agent.name, "No instructions found for agent"),
                }
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.key == key)
    }

    /// Resolves a scenario key from the query string; unknown or missing keys
    /// fall back to the default scenario.
    pub fn resolve(&self, key: Option<&str>) -> Option<&Scenario> {
        key.and_then(|k| self.get(k))
            .or_else(|| self.get(DEFAULT_SCENARIO_KEY))
            .or_else(|| self.scenarios.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> AgentRoster {
        AgentRoster::new(vec![
            AgentConfig::new("greeter", "alloy"),
            AgentConfig::new("tutor", "sage"),
            AgentConfig::new("grader", "sage"),
        ])
    }

    #[test]
    fn test_with_root_moves_selected_agent_first() {
        let reordered = roster().with_root("grader");
        assert_eq!(reordered.names(), vec!["grader", "greeter", "tutor"]);
        assert_eq!(reordered.root().unwrap().name, "grader");
    }

    #[test]
    fn test_with_root_keeps_order_for_root_or_unknown() {
        assert_eq!(roster().with_root("greeter").names(), vec!["greeter", "tutor", "grader"]);
        assert_eq!(roster().with_root("nobody").names(), vec!["greeter", "tutor", "grader"]);
    }

    #[test]
    fn test_builtin_catalog_resolution() {
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(catalog.resolve(None).unwrap().key, DEFAULT_SCENARIO_KEY);
        assert_eq!(catalog.resolve(Some("unknown")).unwrap().key, DEFAULT_SCENARIO_KEY);

        let evaluation = catalog.resolve(Some("universityTutorEvaluation")).unwrap();
        let root = evaluation.roster.root().unwrap();
        assert_eq!(root.name, "tutorEvaluador");
        assert!(root.has_tool(AgentTool::BoardContent));

        let tutor = catalog.get("universityTutor").unwrap().roster.root().unwrap();
        assert!(!tutor.has_tool(AgentTool::BoardContent));
    }

    #[test]
    fn test_with_instructions_fills_known_agents() {
        let catalog = ScenarioCatalog::builtin().with_instructions(|name| {
            (name == "tutorFinanzas").then(|| "Teach finance.".to_string())
        });
        let tutor = catalog.get("universityTutor").unwrap().roster.get("tutorFinanzas").unwrap();
        assert_eq!(tutor.instructions, "Teach finance.");
        let grader = catalog
            .get("universityTutorEvaluation")
            .unwrap()
            .roster
            .get("tutorEvaluador")
            .unwrap();
        assert!(grader.instructions.is_empty());
    }

    #[test]
    fn test_guardrail_policy_names_institution() {
        let scenario = ScenarioCatalog::builtin().resolve(None).unwrap().clone();
        let guardrails = scenario.guardrails();
        assert_eq!(guardrails.len(), 1);
        assert!(guardrails[0].policy().contains("Tutoría Universitaria de Finanzas"));
    }
}
