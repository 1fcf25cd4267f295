//! Seeded persona synthesis and registration.

use std::sync::Arc;

use agora_env::{PopulationRegistry, ReadRequest};
use rand::prelude::*;
use rand_distr::Beta;
use tracing::{debug, warn};

use crate::config::AgentsSection;
use crate::persona::{AgentPersona, Behavior, BigFive, Demographics, RecommenderHandles, Role};
use crate::strategy::DecisionStrategy;
use crate::{CoreError, CoreResult, SimRng};

/// Builds new personas from the configured pools.
pub struct PersonaGenerator {
    pools: AgentsSection,
    read: ReadRequest,
    strategy: Arc<dyn DecisionStrategy>,

    /// Big Five trait distribution
    traits: Beta<f64>,
}

fn pick(pool: &[String], rng: &mut SimRng) -> String {
    pool.choose(rng).cloned().unwrap_or_else(|| "unknown".to_string())
}

impl PersonaGenerator {
    pub fn new(pools: AgentsSection, read: ReadRequest, strategy: Arc<dyn DecisionStrategy>) -> CoreResult<Self> {
        let traits = Beta::new(2.0, 2.0).map_err(|e| CoreError::config(format!("trait distribution: {}", e)))?;
        Ok(Self {
            pools,
            read,
            strategy,
            traits,
        })
    }

    /// Draws the role of the next persona.
    pub fn draw_role(&self, rng: &mut SimRng) -> Role {
        if self.pools.page_fraction > 0.0 && rng.gen_bool(self.pools.page_fraction) {
            Role::Page
        } else {
            Role::User
        }
    }

    /// Synthesizes an unregistered persona.
    pub fn generate(&self, role: Role, rng: &mut SimRng) -> AgentPersona {
        let pools = &self.pools;
        let n_interests = (pools.n_interests.sample(rng) as usize).min(pools.interests.len());
        let interests: Vec<String> = pools.interests.choose_multiple(rng, n_interests).cloned().collect();

        let first = pick(&pools.names, rng);
        let last = pick(&pools.surnames, rng);
        let name = match role {
            Role::User => format!("{} {}", first, last),
            Role::Page => {
                let topic = interests.first().cloned().unwrap_or_else(|| "world".to_string());
                format!("{} Daily", topic)
            }
        };
        let handle: String = name.chars().filter(|c| c.is_alphanumeric()).collect();
        let email = format!("{}{}@agora.sim", handle.to_lowercase(), rng.gen_range(0..10_000));
        let password = uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string();

        let demographics = Demographics {
            age: pools.age.sample(rng),
            gender: pick(&pools.genders, rng),
            nationality: pick(&pools.nationalities, rng),
            language: pick(&pools.languages, rng),
            education: pick(&pools.education_levels, rng),
            leaning: pick(&pools.leanings, rng),
        };

        let personality = BigFive {
            openness: self.traits.sample(rng),
            conscientiousness: self.traits.sample(rng),
            extraversion: self.traits.sample(rng),
            agreeableness: self.traits.sample(rng),
            neuroticism: self.traits.sample(rng),
        };

        let behavior = Behavior {
            round_actions: pools.round_actions.sample(rng),
            daily_activity_level: pools.daily_activity_level.sample(rng),
            probability_of_daily_follow: pools.probability_of_daily_follow,
            probability_of_secondary_follow: pools.probability_of_secondary_follow,
            toxicity: pick(&pools.toxicity_levels, rng),
        };

        AgentPersona::new(name, email, password, demographics, personality, behavior, role, self.strategy.clone())
            .with_interests(interests)
            .with_recommenders(RecommenderHandles {
                content: self.read.clone(),
                follows: pools.follow_recommender.clone(),
            })
    }

    /// Generates and registers one persona; `None` if registration fails.
    pub async fn create(
        &self,
        registry: &dyn PopulationRegistry,
        role: Role,
        joined_on: u64,
        rng: &mut SimRng,
    ) -> Option<AgentPersona> {
        let mut persona = self.generate(role, rng);
        match registry.register(&persona.registration(joined_on)).await {
            Ok(id) => {
                persona.id = Some(id);
                debug!(agent = %persona.name, %id, ?role, "persona registered");
                Some(persona)
            }
            Err(e) => {
                warn!(agent = %persona.name, error = %e, "registration failed, persona skipped");
                None
            }
        }
    }

    /// Creates up to `n` personas, skipping failed registrations.
    pub async fn create_many(
        &self,
        registry: &dyn PopulationRegistry,
        n: usize,
        joined_on: u64,
        rng: &mut SimRng,
    ) -> Vec<AgentPersona> {
        let mut created = Vec::with_capacity(n);
        for _ in 0..n {
            let role = self.draw_role(rng);
            if let Some(persona) = self.create(registry, role, joined_on, rng).await {
                created.push(persona);
            }
        }
        created
    }
}
