//! Persona data model.
//!
//! One `AgentPersona` type covers both ordinary users and pages. Two
//! orthogonal parameters make the difference:
//!
//! - the [`Role`] gates which dispatch-table entries are legal,
//! - the [`DecisionStrategy`] decides how choices and texts are produced
//!   (oracle-backed or pseudo-random).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use agora_env::{FollowRequest, ReadRequest, Registration, TopicId, UserId};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::prompt::{PromptBook, PromptVars};
use crate::strategy::DecisionStrategy;
use crate::{CoreError, CoreResult};

/// Whether the persona is a person or an organization page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Page,
}

impl Role {
    /// Actions this role may dispatch.
    pub fn allows(&self, action: Action) -> bool {
        match self {
            Self::User => true,
            Self::Page => matches!(action, Action::Post | Action::None),
        }
    }
}

/// Big Five personality traits, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BigFive {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl BigFive {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.openness,
            self.conscientiousness,
            self.extraversion,
            self.agreeableness,
            self.neuroticism,
        ]
    }

    /// Short natural-language description for prompts.
    pub fn describe(&self) -> String {
        fn level(x: f64) -> &'static str {
            if x < 0.33 {
                "low"
            } else if x < 0.66 {
                "moderate"
            } else {
                "high"
            }
        }
        format!(
            "{} openness, {} conscientiousness, {} extraversion, {} agreeableness, {} neuroticism",
            level(self.openness),
            level(self.conscientiousness),
            level(self.extraversion),
            level(self.agreeableness),
            level(self.neuroticism),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u32,
    pub gender: String,
    pub nationality: String,
    pub language: String,
    pub education: String,
    pub leaning: String,
}

/// Behavioral parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    /// Iterations per activation
    pub round_actions: u32,

    /// Maximum activations per simulated day
    pub daily_activity_level: u32,

    pub probability_of_daily_follow: f64,

    pub probability_of_secondary_follow: f64,

    pub toxicity: String,
}

/// Recommendation parameters used when querying the gateways.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommenderHandles {
    pub content: ReadRequest,
    pub follows: FollowRequest,
}

/// A simulated account.
#[derive(Clone)]
pub struct AgentPersona {
    /// Assigned by the population-of-record at registration
    pub id: Option<UserId>,

    pub name: String,
    pub email: String,
    pub password: String,
    pub demographics: Demographics,
    pub personality: BigFive,
    pub behavior: Behavior,
    pub role: Role,

    /// Interest names seeded at registration
    pub interests: Vec<String>,

    /// Last known score per topic
    pub opinions: BTreeMap<TopicId, f64>,

    pub recommenders: RecommenderHandles,

    strategy: Arc<dyn DecisionStrategy>,
}

impl AgentPersona {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        demographics: Demographics,
        personality: BigFive,
        behavior: Behavior,
        role: Role,
        strategy: Arc<dyn DecisionStrategy>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            password: password.into(),
            demographics,
            personality,
            behavior,
            role,
            interests: Vec::new(),
            opinions: BTreeMap::new(),
            recommenders: RecommenderHandles::default(),
            strategy,
        }
    }

    pub fn with_interests(mut self, interests: Vec<String>) -> Self {
        self.interests = interests;
        self
    }

    pub fn with_recommenders(mut self, recommenders: RecommenderHandles) -> Self {
        self.recommenders = recommenders;
        self
    }

    /// External id; personas are unusable before registration.
    pub fn user_id(&self) -> CoreResult<UserId> {
        self.id.ok_or_else(|| CoreError::Unregistered(self.name.clone()))
    }

    pub fn is_page(&self) -> bool {
        self.role == Role::Page
    }

    pub fn allows(&self, action: Action) -> bool {
        self.role.allows(action)
    }

    pub fn strategy(&self) -> &Arc<dyn DecisionStrategy> {
        &self.strategy
    }

    /// Payload for the population-of-record.
    pub fn registration(&self, joined_on: u64) -> Registration {
        Registration {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            leaning: self.demographics.leaning.clone(),
            age: self.demographics.age,
            gender: self.demographics.gender.clone(),
            nationality: self.demographics.nationality.clone(),
            language: self.demographics.language.clone(),
            education: self.demographics.education.clone(),
            toxicity: self.behavior.toxicity.clone(),
            interests: self.interests.clone(),
            big_five: self.personality.as_array(),
            round_actions: self.behavior.round_actions,
            is_page: self.is_page(),
            joined_on,
        }
    }

    /// Persona fields made available to prompt templates.
    pub fn prompt_vars(&self) -> PromptVars {
        let mut vars = PromptVars::new();
        vars.set("name", &self.name)
            .set("age", self.demographics.age.to_string())
            .set("gender", &self.demographics.gender)
            .set("nationality", &self.demographics.nationality)
            .set("language", &self.demographics.language)
            .set("education", &self.demographics.education)
            .set("leaning", &self.demographics.leaning)
            .set("interests", self.interests.join(", "))
            .set("toxicity", &self.behavior.toxicity)
            .set("personality", self.personality.describe());
        vars
    }

    /// System-level description of the persona.
    pub fn describe(&self, prompts: &PromptBook) -> CoreResult<String> {
        prompts.render(&prompts.roleplay, &self.prompt_vars())
    }
}

impl fmt::Debug for AgentPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentPersona")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("strategy", &self.strategy.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::sample_persona;

    #[test]
    fn test_unregistered_persona_has_no_id() {
        let persona = sample_persona(Role::User);
        assert!(matches!(persona.user_id(), Err(CoreError::Unregistered(_))));
    }

    #[test]
    fn test_page_role_gates_actions() {
        let page = sample_persona(Role::Page);
        assert!(page.allows(Action::Post));
        assert!(!page.allows(Action::Share));
        assert!(!page.allows(Action::Comment));
        assert!(!page.allows(Action::Reply));
        assert!(!page.allows(Action::Follow));
        assert!(sample_persona(Role::User).allows(Action::Comment));
    }

    #[test]
    fn test_describe_renders_persona() {
        let persona = sample_persona(Role::User).with_interests(vec!["chess".into(), "tea".into()]);
        let text = persona.describe(&PromptBook::default()).unwrap();
        assert!(text.contains("You are Ada, a 36 year old female"));
        assert!(text.contains("chess, tea"));
        assert!(text.contains("high openness"));
    }

    #[test]
    fn test_registration_payload() {
        let mut persona = sample_persona(Role::Page);
        persona.id = Some(UserId(3));
        let reg = persona.registration(49);
        assert!(reg.is_page);
        assert_eq!(reg.joined_on, 49);
        assert_eq!(reg.big_five[0], 0.8);
    }
}
