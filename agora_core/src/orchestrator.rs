//! Top-level day / slot loop.
//!
//! ```text
//!  for day:
//!    for slot in 0..W:
//!      now    = clock.current()
//!      active = sample(max(1, N * activity[slot])) → shuffle
//!      for agent in active: selector.run_turn(agent)
//!      clock.advance()
//!    daily follow  (daily-active users, Bernoulli(p_daily_follow), [FOLLOW, NONE])
//!    churn         (population-of-record picks ids)
//!    recruitment
//! ```
//!
//! All randomness flows from one ChaCha8 RNG seeded from the configuration,
//! so a run against the simulated world is reproducible from its seed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use agora_env::{Services, SimTime, UserId};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionWeights};
use crate::clock::{AdvanceOutcome, SimulationClock};
use crate::config::{GraphSource, SimulationConfig};
use crate::executor::{BatchExecutor, ConcurrentExecutor, DecisionJob};
use crate::generator::PersonaGenerator;
use crate::graph::SocialGraph;
use crate::opinion::OpinionEngine;
use crate::population::{BootstrapReport, LifecycleSettings, PopulationManager, PopulationSet};
use crate::selector::{ActionOutcome, ActionSelector, PlannedDecision, SelectorSettings, TurnReport};
use crate::strategy::{DecisionStrategy, OracleStrategy, RandomStrategy, StrategyKind};
use crate::{CoreError, CoreResult, SimRng};

/// Summary of one slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub time: SimTime,
    pub active: usize,
    pub performed: BTreeMap<Action, usize>,
    pub skipped: usize,
    pub no_decision: usize,
    pub replies: usize,
    pub clock: AdvanceOutcome,
}

impl SlotReport {
    fn new(time: SimTime, active: usize) -> Self {
        Self {
            time,
            active,
            performed: BTreeMap::new(),
            skipped: 0,
            no_decision: 0,
            replies: 0,
            clock: AdvanceOutcome::Committed(time),
        }
    }

    fn tally(&mut self, turn: &TurnReport) {
        if let Some(ActionOutcome::Performed(Action::Reply)) = turn.reply {
            self.replies += 1;
        }
        for outcome in &turn.outcomes {
            match outcome {
                ActionOutcome::Performed(action) => *self.performed.entry(*action).or_default() += 1,
                ActionOutcome::Skipped { .. } => self.skipped += 1,
                ActionOutcome::NoDecision => self.no_decision += 1,
            }
        }
    }
}

/// Summary of one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub day: u32,
    pub slots: Vec<SlotReport>,
    pub daily_active: usize,
    pub daily_follows: usize,
    pub churned: Vec<UserId>,
    pub recruited: Vec<UserId>,
    pub population: usize,
}

impl DayReport {
    pub fn performed(&self, action: Action) -> usize {
        self.slots
            .iter()
            .map(|s| s.performed.get(&action).copied().unwrap_or(0))
            .sum()
    }
}

/// Summary of a full run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub name: String,
    pub seed: u64,
    pub bootstrap: Option<BootstrapReport>,
    pub days: Vec<DayReport>,
    pub final_population: usize,
    pub final_time: SimTime,
}

impl RunReport {
    pub fn performed(&self, action: Action) -> usize {
        self.days.iter().map(|d| d.performed(action)).sum()
    }

    pub fn total_churned(&self) -> usize {
        self.days.iter().map(|d| d.churned.len()).sum()
    }

    pub fn total_recruited(&self) -> usize {
        self.days.iter().map(|d| d.recruited.len()).sum()
    }

    pub fn skipped_advances(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| &d.slots)
            .filter(|s| !s.clock.is_committed())
            .count()
    }
}

/// Composes clock, population lifecycle and action selection.
pub struct SimulationOrchestrator {
    config: SimulationConfig,
    clock: SimulationClock,
    selector: ActionSelector,
    manager: PopulationManager,
    population: PopulationSet,
    weights: ActionWeights,
    executor: Option<Box<dyn BatchExecutor>>,
    graph: Option<SocialGraph>,
    initialized: bool,
    rng: SimRng,
}

impl SimulationOrchestrator {
    /// Wires every component from `config` and connects the clock.
    pub async fn build(config: SimulationConfig, services: Services) -> CoreResult<Self> {
        config.validate()?;
        let prompts = Arc::new(config.prompts.clone());
        let weights = config.action_weights()?;

        let strategy: Arc<dyn DecisionStrategy> = match config.agents.strategy {
            StrategyKind::Oracle => Arc::new(OracleStrategy::new(services.oracle.clone(), prompts.clone())),
            StrategyKind::Random => Arc::new(RandomStrategy),
        };
        let generator = PersonaGenerator::new(config.agents.clone(), config.posts.read_request(), strategy)?;
        let manager = PopulationManager::new(
            services.clone(),
            generator,
            LifecycleSettings {
                churn_rate: config.simulation.churn_rate,
                recruitment_rate: config.simulation.recruitment_rate,
                recruitment_basis: config.simulation.recruitment_basis,
            },
        );

        let mut selector = ActionSelector::new(
            services.clone(),
            SelectorSettings {
                max_thread_length: config.agents.max_length_thread_reading,
                attention_window: config.agents.attention_window,
                emotions: config.agents.emotions.clone(),
            },
        );
        if config.opinion_dynamics.enabled {
            let engine = OpinionEngine::new(
                services.social.clone(),
                config.opinion_dynamics.model,
                config.opinion_groups()?,
                prompts,
            );
            selector = selector.with_opinions(Arc::new(engine));
        }

        let clock = SimulationClock::connect(services.time.clone(), config.simulation.slots).await?;
        let executor: Option<Box<dyn BatchExecutor>> = if config.simulation.parallel_decisions {
            Some(Box::new(ConcurrentExecutor::new(config.simulation.batch_width)))
        } else {
            None
        };
        let rng = ChaCha8Rng::seed_from_u64(config.simulation.seed);

        info!(
            name = %config.simulation.name,
            seed = config.simulation.seed,
            days = config.simulation.days,
            "orchestrator ready"
        );
        Ok(Self {
            config,
            clock,
            selector,
            manager,
            population: PopulationSet::new(),
            weights,
            executor,
            graph: None,
            initialized: false,
            rng,
        })
    }

    /// Uses `graph` for the bootstrap instead of the configured source.
    pub fn with_graph(mut self, graph: SocialGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Replaces the batch executor.
    pub fn with_executor(mut self, executor: Box<dyn BatchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn population(&self) -> &PopulationSet {
        &self.population
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Creates the initial population and bootstraps the social graph.
    pub async fn initialize(&mut self) -> CoreResult<Option<BootstrapReport>> {
        let now = self.clock.current().await?;
        self.population = self
            .manager
            .populate(self.config.simulation.starting_agents, now, &mut self.rng)
            .await;
        self.initialized = true;

        let graph = match self.graph.take() {
            Some(graph) => Some(graph),
            None => self.configured_graph()?,
        };
        match graph {
            Some(graph) => Ok(Some(self.manager.bootstrap_graph(&self.population, &graph, now).await?)),
            None => Ok(None),
        }
    }

    fn configured_graph(&mut self) -> CoreResult<Option<SocialGraph>> {
        match &self.config.simulation.initial_graph {
            GraphSource::None => Ok(None),
            GraphSource::EdgeList { path } => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| CoreError::graph(format!("cannot read {}: {}", path, e)))?;
                SocialGraph::from_edge_list(&raw).map(Some)
            }
            GraphSource::SmallWorld { k, p } => Ok(Some(SocialGraph::small_world(
                self.population.len(),
                *k,
                *p,
                &mut self.rng,
            ))),
        }
    }

    /// Runs the configured number of days.
    pub async fn run(&mut self) -> CoreResult<RunReport> {
        let bootstrap = if self.initialized {
            None
        } else {
            self.initialize().await?
        };

        let mut days = Vec::with_capacity(self.config.simulation.days as usize);
        for _ in 0..self.config.simulation.days {
            days.push(self.run_day().await?);
        }

        Ok(RunReport {
            name: self.config.simulation.name.clone(),
            seed: self.config.simulation.seed,
            bootstrap,
            days,
            final_population: self.population.len(),
            final_time: self.clock.local(),
        })
    }

    /// Runs one day of `W` slots followed by the end-of-day lifecycle.
    pub async fn run_day(&mut self) -> CoreResult<DayReport> {
        let day = self.clock.local().day;
        let mut activations: HashMap<UserId, u32> = HashMap::new();
        let mut daily_active: HashSet<UserId> = HashSet::new();

        let mut slots = Vec::with_capacity(self.clock.width() as usize);
        for _ in 0..self.clock.width() {
            slots.push(self.run_slot(&mut activations, &mut daily_active).await?);
        }

        let now = self.clock.current().await?;
        let daily_follows = self.daily_follow(&daily_active, now).await;

        let churned = match self.manager.churn(&mut self.population, now).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "churn failed, population unchanged");
                Vec::new()
            }
        };
        let recruited = self
            .manager
            .recruit(&mut self.population, daily_active.len(), now, &mut self.rng)
            .await;

        info!(
            day,
            daily_active = daily_active.len(),
            churned = churned.len(),
            recruited = recruited.len(),
            population = self.population.len(),
            "day complete"
        );
        Ok(DayReport {
            day,
            slots,
            daily_active: daily_active.len(),
            daily_follows,
            churned,
            recruited,
            population: self.population.len(),
        })
    }

    /// Runs every sampled agent once, then advances the clock.
    ///
    /// Clock failures are returned to the caller.
    async fn run_slot(
        &mut self,
        activations: &mut HashMap<UserId, u32>,
        daily_active: &mut HashSet<UserId>,
    ) -> CoreResult<SlotReport> {
        let now = self.clock.current().await?;
        let active = self.sample_active(now.slot, activations);
        let mut plans = self.prefetch(&active).await;

        let mut report = SlotReport::new(now, active.len());
        for id in &active {
            *activations.entry(*id).or_default() += 1;
            let Some(persona) = self.population.get_mut(*id) else {
                continue;
            };
            if !persona.is_page() {
                daily_active.insert(*id);
            }
            let plan = plans.remove(id);
            let turn = self
                .selector
                .run_turn(persona, &self.weights, now, &mut self.rng, plan)
                .await;
            report.tally(&turn);
        }

        report.clock = self.clock.advance().await?;
        debug!(day = now.day, slot = now.slot, active = report.active, "slot complete");
        Ok(report)
    }

    /// Samples `max(1, floor(N * activity))` agents still under their daily
    /// activity level, in a fresh random order.
    fn sample_active(&mut self, slot: u32, activations: &HashMap<UserId, u32>) -> Vec<UserId> {
        let eligible: Vec<UserId> = self
            .population
            .iter()
            .filter_map(|p| p.id.map(|id| (id, p.behavior.daily_activity_level)))
            .filter(|(id, level)| activations.get(id).copied().unwrap_or(0) < *level)
            .map(|(id, _)| id)
            .collect();
        if eligible.is_empty() {
            return Vec::new();
        }

        let activity = self.config.simulation.activity_for(slot);
        let expected = ((self.population.len() as f64 * activity) as usize).max(1);
        let mut active: Vec<UserId> = eligible
            .choose_multiple(&mut self.rng, expected.min(eligible.len()))
            .copied()
            .collect();
        active.shuffle(&mut self.rng);
        active
    }

    /// Computes first-iteration decisions as one batch when an executor is set.
    async fn prefetch(&mut self, active: &[UserId]) -> HashMap<UserId, PlannedDecision> {
        let Some(executor) = &self.executor else {
            return HashMap::new();
        };

        let mut ids = Vec::new();
        let mut jobs = Vec::new();
        for id in active {
            let Some(persona) = self.population.get(*id) else {
                continue;
            };
            if persona.behavior.round_actions == 0 {
                continue;
            }
            let candidates = self
                .weights
                .sample_candidates(&mut self.rng, persona.strategy().forces_none());
            jobs.push(DecisionJob {
                persona: persona.clone(),
                candidates,
                rng: ChaCha8Rng::seed_from_u64(self.rng.gen()),
            });
            ids.push(*id);
        }

        match executor.decide(jobs).await {
            Ok(plans) => ids.into_iter().zip(plans).collect(),
            Err(e) => {
                warn!(error = %e, "batch decisions failed, deciding sequentially");
                HashMap::new()
            }
        }
    }

    /// Offers `[FOLLOW, NONE]` to daily-active users passing a
    /// Bernoulli(`probability_of_daily_follow`) draw.
    async fn daily_follow(&mut self, daily_active: &HashSet<UserId>, now: SimTime) -> usize {
        let mut ids: Vec<UserId> = daily_active.iter().copied().collect();
        ids.sort();

        let mut evaluated = 0;
        for id in ids {
            let Some(persona) = self.population.get_mut(id) else {
                continue;
            };
            if persona.is_page() || self.rng.gen::<f64>() >= persona.behavior.probability_of_daily_follow {
                continue;
            }
            evaluated += 1;
            self.selector
                .select_action(persona, &[Action::Follow, Action::None], now, &mut self.rng)
                .await;
        }
        evaluated
    }
}
