//! Simulation configuration.
//!
//! Loaded from JSON; every field has a default so partial files work.

use std::collections::BTreeMap;
use std::path::Path;

use agora_env::{FollowRequest, ReadRequest};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::action::ActionWeights;
use crate::opinion::{default_groups, OpinionGroup, OpinionGroups, OpinionModel};
use crate::prompt::PromptBook;
use crate::strategy::StrategyKind;
use crate::{CoreError, CoreResult};

/// Fraction of the population active in a slot when not configured.
pub const DEFAULT_ACTIVITY: f64 = 0.1;

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: u32,
    pub max: u32,
}

impl IntRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

/// Base for the recruitment rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecruitmentBasis {
    Total,
    #[default]
    DailyActive,
}

/// Initial social graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphSource {
    #[default]
    None,

    /// `u,v` lines over node ids `0..N-1`
    EdgeList { path: String },

    /// Watts-Strogatz ring of degree `k` with rewiring probability `p`
    SmallWorld { k: usize, p: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub name: String,
    pub days: u32,

    /// Day width
    pub slots: u32,

    pub starting_agents: usize,
    pub churn_rate: f64,
    pub recruitment_rate: f64,
    pub recruitment_basis: RecruitmentBasis,

    /// Active fraction of the population per slot
    pub hourly_activity: Vec<f64>,

    /// Action label to likelihood
    pub actions_likelihood: BTreeMap<String, f64>,

    pub seed: u64,

    /// Prefetch first-iteration oracle decisions as one concurrent batch
    pub parallel_decisions: bool,

    /// Concurrency limit of the batch executor
    pub batch_width: usize,

    pub initial_graph: GraphSource,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let actions_likelihood = [
            ("post", 0.2),
            ("comment", 0.3),
            ("read", 0.2),
            ("share", 0.05),
            ("search", 0.1),
            ("follow", 0.05),
            ("cast", 0.05),
            ("image", 0.05),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            name: "agora".to_string(),
            days: 2,
            slots: crate::clock::DEFAULT_DAY_WIDTH,
            starting_agents: 10,
            churn_rate: 0.0,
            recruitment_rate: 0.0,
            recruitment_basis: RecruitmentBasis::DailyActive,
            hourly_activity: Vec::new(),
            actions_likelihood,
            seed: 42,
            parallel_decisions: false,
            batch_width: 8,
            initial_graph: GraphSource::None,
        }
    }
}

impl SimulationSection {
    pub fn activity_for(&self, slot: u32) -> f64 {
        self.hourly_activity
            .get(slot as usize)
            .copied()
            .unwrap_or(DEFAULT_ACTIVITY)
    }
}

/// Persona generation pools and behavioral defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    pub names: Vec<String>,
    pub surnames: Vec<String>,
    pub genders: Vec<String>,
    pub nationalities: Vec<String>,
    pub languages: Vec<String>,
    pub leanings: Vec<String>,
    pub education_levels: Vec<String>,
    pub toxicity_levels: Vec<String>,
    pub interests: Vec<String>,
    pub age: IntRange,
    pub n_interests: IntRange,
    pub round_actions: IntRange,
    pub daily_activity_level: IntRange,
    pub probability_of_daily_follow: f64,
    pub probability_of_secondary_follow: f64,
    pub max_length_thread_reading: usize,
    pub attention_window: u32,
    pub emotions: Vec<String>,
    pub strategy: StrategyKind,

    /// Fraction of generated personas that are pages
    pub page_fraction: f64,

    pub follow_recommender: FollowRequest,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            names: strings(&["Alex", "Sam", "Maria", "Chen", "Amina", "Luca", "Priya", "Noah"]),
            surnames: strings(&["Rossi", "Smith", "Garcia", "Wang", "Okafor", "Novak"]),
            genders: strings(&["male", "female", "non-binary"]),
            nationalities: strings(&["Italian", "American", "Spanish", "Chinese", "Nigerian", "Czech"]),
            languages: strings(&["English"]),
            leanings: strings(&["left", "center-left", "center", "center-right", "right"]),
            education_levels: strings(&["high school", "bachelor", "master", "phd"]),
            toxicity_levels: strings(&["no", "low", "medium"]),
            interests: strings(&["politics", "sports", "technology", "music", "science", "travel", "food"]),
            age: IntRange::new(18, 70),
            n_interests: IntRange::new(1, 3),
            round_actions: IntRange::new(1, 3),
            daily_activity_level: IntRange::new(24, 24),
            probability_of_daily_follow: 0.1,
            probability_of_secondary_follow: 0.1,
            max_length_thread_reading: 5,
            attention_window: 336,
            emotions: strings(&[
                "admiration", "anger", "annoyance", "approval", "curiosity", "disappointment",
                "disgust", "excitement", "fear", "gratitude", "joy", "love", "optimism",
                "pride", "sadness", "surprise",
            ]),
            strategy: StrategyKind::Oracle,
            page_fraction: 0.0,
            follow_recommender: FollowRequest::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostsSection {
    pub visibility_rounds: u32,
    pub read_limit: usize,
    pub recommender: String,
}

impl Default for PostsSection {
    fn default() -> Self {
        let base = ReadRequest::default();
        Self {
            visibility_rounds: base.visibility_rounds,
            read_limit: base.limit,
            recommender: base.mode,
        }
    }
}

impl PostsSection {
    pub fn read_request(&self) -> ReadRequest {
        ReadRequest {
            limit: self.read_limit,
            mode: self.recommender.clone(),
            visibility_rounds: self.visibility_rounds,
            articles: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpinionDynamicsConfig {
    pub enabled: bool,
    pub model: OpinionModel,
    pub groups: Vec<OpinionGroup>,
}

impl Default for OpinionDynamicsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: OpinionModel::default(),
            groups: default_groups(),
        }
    }
}

/// Endpoints of the external services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServersSection {
    pub api: String,
    pub llm: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_temperature: Option<f32>,
    pub llm_max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ServersSection {
    fn default() -> Self {
        Self {
            api: "http://127.0.0.1:5010/".to_string(),
            llm: "http://127.0.0.1:11434/v1/chat/completions".to_string(),
            llm_model: "llama3".to_string(),
            llm_api_key: None,
            llm_temperature: Some(0.7),
            llm_max_tokens: Some(256),
            timeout_secs: 60,
        }
    }
}

/// Full configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub simulation: SimulationSection,
    pub agents: AgentsSection,
    pub posts: PostsSection,
    pub opinion_dynamics: OpinionDynamicsConfig,
    pub servers: ServersSection,
    pub prompts: PromptBook,
}

impl SimulationConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> CoreResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| CoreError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let sim = &self.simulation;
        if sim.slots == 0 {
            return Err(CoreError::config("simulation.slots must be positive"));
        }
        for (name, p) in [
            ("simulation.churn_rate", sim.churn_rate),
            ("simulation.recruitment_rate", sim.recruitment_rate),
            ("agents.probability_of_daily_follow", self.agents.probability_of_daily_follow),
            ("agents.probability_of_secondary_follow", self.agents.probability_of_secondary_follow),
            ("agents.page_fraction", self.agents.page_fraction),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::config(format!("{} must be within [0, 1], got {}", name, p)));
            }
        }
        if sim.hourly_activity.iter().any(|a| !(0.0..=1.0).contains(a)) {
            return Err(CoreError::config("simulation.hourly_activity values must be within [0, 1]"));
        }
        if self.agents.names.is_empty() || self.agents.interests.is_empty() {
            return Err(CoreError::config("agents.names and agents.interests must not be empty"));
        }
        for (name, range) in [
            ("agents.age", self.agents.age),
            ("agents.n_interests", self.agents.n_interests),
            ("agents.round_actions", self.agents.round_actions),
            ("agents.daily_activity_level", self.agents.daily_activity_level),
        ] {
            if range.min > range.max {
                return Err(CoreError::config(format!("{} has min > max", name)));
            }
        }
        self.action_weights()?;
        self.opinion_groups()?;
        self.prompts.validate()?;
        Ok(())
    }

    pub fn action_weights(&self) -> CoreResult<ActionWeights> {
        ActionWeights::from_labels(&self.simulation.actions_likelihood)
    }

    pub fn opinion_groups(&self) -> CoreResult<OpinionGroups> {
        OpinionGroups::new(self.opinion_dynamics.groups.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opinion::{BoundedConfidence, ColdStart};

    #[test]
    fn test_default_config_is_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimulationConfig::from_json(
            r#"{
                "simulation": { "days": 5, "churn_rate": 0.1, "hourly_activity": [0.5, 0.2] },
                "opinion_dynamics": {
                    "enabled": true,
                    "model": { "kind": "bounded_confidence", "theta": 0.1, "cold_start": "inherited" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.simulation.days, 5);
        assert_eq!(config.simulation.slots, 24);
        assert_eq!(config.simulation.activity_for(1), 0.2);
        assert_eq!(config.simulation.activity_for(7), DEFAULT_ACTIVITY);
        assert_eq!(
            config.opinion_dynamics.model,
            OpinionModel::BoundedConfidence(BoundedConfidence {
                theta: 0.1,
                cold_start: ColdStart::Inherited,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let err = SimulationConfig::from_json(r#"{ "simulation": { "churn_rate": 1.5 } }"#).unwrap_err();
        assert!(err.to_string().contains("churn_rate"));
    }

    #[test]
    fn test_rejects_unknown_action() {
        let err = SimulationConfig::from_json(
            r#"{ "simulation": { "actions_likelihood": { "juggle": 1.0 } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("juggle"));
    }

    #[test]
    fn test_graph_source_tagged() {
        let config = SimulationConfig::from_json(
            r#"{ "simulation": { "initial_graph": { "kind": "small_world", "k": 4, "p": 0.1 } } }"#,
        )
        .unwrap();
        assert_eq!(config.simulation.initial_graph, GraphSource::SmallWorld { k: 4, p: 0.1 });
    }

    #[test]
    fn test_int_range_sample() {
        let mut rng = rand::thread_rng();
        let range = IntRange::new(2, 4);
        for _ in 0..20 {
            assert!((2..=4).contains(&range.sample(&mut rng)));
        }
        assert_eq!(IntRange::new(3, 3).sample(&mut rng), 3);
    }
}
