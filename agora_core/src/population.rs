//! Population lifecycle: churn, recruitment and social-graph bootstrap.

use std::collections::HashSet;

use agora_env::{FollowAction, Services, SimTime, UserId};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RecruitmentBasis;
use crate::generator::PersonaGenerator;
use crate::graph::SocialGraph;
use crate::persona::AgentPersona;
use crate::{CoreError, CoreResult, SimRng};

/// Ordered set of active personas, unique by id.
#[derive(Debug, Default, Clone)]
pub struct PopulationSet {
    agents: Vec<AgentPersona>,
}

impl PopulationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registered persona. Returns `false` for duplicates or
    /// unregistered personas.
    pub fn insert(&mut self, persona: AgentPersona) -> bool {
        let Some(id) = persona.id else {
            return false;
        };
        if self.contains(id) {
            return false;
        }
        self.agents.push(persona);
        true
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.agents.iter().any(|a| a.id == Some(id))
    }

    /// Removes personas whose id is in `ids`; returns how many were removed.
    pub fn remove_ids(&mut self, ids: &[UserId]) -> usize {
        let ids: HashSet<UserId> = ids.iter().copied().collect();
        let before = self.agents.len();
        self.agents.retain(|a| a.id.map_or(true, |id| !ids.contains(&id)));
        before - self.agents.len()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> Vec<UserId> {
        self.agents.iter().filter_map(|a| a.id).collect()
    }

    pub fn non_page_ids(&self) -> Vec<UserId> {
        self.agents.iter().filter(|a| !a.is_page()).filter_map(|a| a.id).collect()
    }

    pub fn get(&self, id: UserId) -> Option<&AgentPersona> {
        self.agents.iter().find(|a| a.id == Some(id))
    }

    pub fn get_mut(&mut self, id: UserId) -> Option<&mut AgentPersona> {
        self.agents.iter_mut().find(|a| a.id == Some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentPersona> {
        self.agents.iter()
    }
}

/// Outcome of the one-time graph bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub edges: usize,
    pub followed: usize,
    pub failed: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleSettings {
    pub churn_rate: f64,
    pub recruitment_rate: f64,
    pub recruitment_basis: RecruitmentBasis,
}

/// Applies churn, recruitment and the initial graph to a population.
pub struct PopulationManager {
    services: Services,
    generator: PersonaGenerator,
    settings: LifecycleSettings,
    bootstrapped: bool,
}

impl PopulationManager {
    pub fn new(services: Services, generator: PersonaGenerator, settings: LifecycleSettings) -> Self {
        Self {
            services,
            generator,
            settings,
            bootstrapped: false,
        }
    }

    pub fn generator(&self) -> &PersonaGenerator {
        &self.generator
    }

    /// Creates the initial population.
    pub async fn populate(&self, n: usize, now: SimTime, rng: &mut SimRng) -> PopulationSet {
        let mut population = PopulationSet::new();
        for persona in self
            .generator
            .create_many(self.services.registry.as_ref(), n, now.id, rng)
            .await
        {
            population.insert(persona);
        }
        info!(requested = n, created = population.len(), "initial population created");
        population
    }

    /// Removes `max(1, round(non_pages * churn_rate))` personas chosen by the
    /// population-of-record. Pages are never removed.
    pub async fn churn(&self, population: &mut PopulationSet, now: SimTime) -> CoreResult<Vec<UserId>> {
        if self.settings.churn_rate <= 0.0 {
            return Ok(Vec::new());
        }
        let eligible = population.non_page_ids();
        if eligible.is_empty() {
            return Ok(Vec::new());
        }
        let n = churn_count(eligible.len(), self.settings.churn_rate);

        let removed = self.services.registry.churn(n, now.id).await?;
        let eligible: HashSet<UserId> = eligible.into_iter().collect();
        let (valid, ignored): (Vec<UserId>, Vec<UserId>) =
            removed.into_iter().partition(|id| eligible.contains(id));
        if !ignored.is_empty() {
            warn!(?ignored, "churn returned ids that are not active non-page personas");
        }

        population.remove_ids(&valid);
        info!(requested = n, removed = valid.len(), day = now.day, "churn applied");
        Ok(valid)
    }

    /// Synthesizes and registers new personas; returns their ids.
    pub async fn recruit(
        &self,
        population: &mut PopulationSet,
        daily_active: usize,
        now: SimTime,
        rng: &mut SimRng,
    ) -> Vec<UserId> {
        if self.settings.recruitment_rate <= 0.0 {
            return Vec::new();
        }
        let base = match self.settings.recruitment_basis {
            RecruitmentBasis::Total => population.len(),
            RecruitmentBasis::DailyActive => daily_active,
        };
        let n = recruit_count(base, self.settings.recruitment_rate);

        let mut added = Vec::new();
        for persona in self
            .generator
            .create_many(self.services.registry.as_ref(), n, now.id, rng)
            .await
        {
            if let Some(id) = persona.id {
                if population.insert(persona) {
                    added.push(id);
                }
            }
        }
        info!(requested = n, added = added.len(), day = now.day, "recruitment applied");
        added
    }

    /// Issues one follow per graph edge between the initial personas.
    ///
    /// Node `i` maps to the `i`-th persona of `population`. Runs at most once;
    /// a failing edge is recorded and the remaining edges still run.
    pub async fn bootstrap_graph(
        &mut self,
        population: &PopulationSet,
        graph: &SocialGraph,
        now: SimTime,
    ) -> CoreResult<BootstrapReport> {
        if self.bootstrapped {
            return Err(CoreError::graph("social graph already bootstrapped"));
        }
        let ids = population.ids();
        if graph.node_count() > ids.len() {
            return Err(CoreError::graph(format!(
                "graph has {} nodes but only {} personas exist",
                graph.node_count(),
                ids.len()
            )));
        }
        self.bootstrapped = true;

        let mut report = BootstrapReport::default();
        for (a, b) in graph.edges() {
            report.edges += 1;
            match self
                .services
                .social
                .follow(ids[a], now.id, ids[b], FollowAction::Follow)
                .await
            {
                Ok(()) => report.followed += 1,
                Err(e) => {
                    warn!(from = %ids[a], to = %ids[b], error = %e, "bootstrap edge failed");
                    report.failed.push((a, b));
                }
            }
        }
        info!(edges = report.edges, followed = report.followed, "social graph bootstrapped");
        Ok(report)
    }
}

/// `max(1, round(eligible * rate))`.
pub fn churn_count(eligible: usize, rate: f64) -> usize {
    ((eligible as f64 * rate).round() as usize).max(1)
}

/// `max(1, floor(base * rate))`.
pub fn recruit_count(base: usize, rate: f64) -> usize {
    ((base as f64 * rate) as usize).max(1)
}
