//! Scenario runner - builds a world, runs the orchestrator and checks the
//! scenario's assertions.

use crate::oracle::SimOracle;
use crate::scenarios::ScenarioId;
use crate::world::{ContentKind, SimWorld, WorldConfig, WorldStats};

use agora_core::clock::next_slot;
use agora_core::config::{GraphSource, IntRange};
use agora_core::opinion::{EvaluationScope, OracleEvaluation};
use agora_core::{Action, CoreResult, OpinionModel, RunReport, SimulationConfig, SimulationOrchestrator, StrategyKind};
use agora_env::{Services, SimTime};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: &'static str,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Orchestrator reports, one per simulation process
    pub reports: Vec<RunReport>,

    /// State of the simulated service at the end of the run
    pub world: WorldStats,
}

impl ScenarioResult {
    fn new(scenario: ScenarioId, seed: u64, reports: Vec<RunReport>, world: WorldStats, failures: Vec<String>) -> Self {
        Self {
            scenario: scenario.name(),
            seed,
            passed: failures.is_empty(),
            failure_reason: if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            },
            reports,
            world,
        }
    }

    fn aborted(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario: scenario.name(),
            seed,
            passed: false,
            failure_reason: Some(reason),
            reports: Vec::new(),
            world: WorldStats::default(),
        }
    }
}

/// Runs scenarios against the simulated world.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Initial population size
    num_agents: usize,

    /// Simulated days
    days: u32,

    /// Slots per day
    slots: u32,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_agents: usize) -> Self {
        Self {
            seed,
            num_agents,
            days: 2,
            slots: 6,
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn with_slots(mut self, slots: u32) -> Self {
        self.slots = slots.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let outcome = match scenario {
            ScenarioId::Baseline => self.run_baseline().await,
            ScenarioId::ChurnStorm => self.run_churn_storm().await,
            ScenarioId::OpinionOracle => self.run_opinion_oracle().await,
            ScenarioId::Pages => self.run_pages().await,
            ScenarioId::ClockRace => self.run_clock_race().await,
        };
        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(scenario = scenario.name(), error = %e, "scenario aborted");
                ScenarioResult::aborted(scenario, self.seed, e.to_string())
            }
        }
    }

    /// Configuration shared by every scenario.
    pub fn base_config(&self, scenario: ScenarioId) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.simulation.name = scenario.name().to_string();
        config.simulation.seed = self.seed;
        config.simulation.days = self.days;
        config.simulation.slots = self.slots;
        config.simulation.starting_agents = self.num_agents;
        config.simulation.hourly_activity = vec![0.3; self.slots as usize];
        config.agents.strategy = StrategyKind::Oracle;
        config.agents.daily_activity_level = IntRange::new(1, self.slots);
        config
    }

    fn world(&self, config: WorldConfig) -> (Arc<SimWorld>, Services) {
        let world = SimWorld::shared(WorldConfig {
            seed: self.seed,
            ..config
        });
        let oracle = Arc::new(SimOracle::new(self.seed));
        let services = Services::from_backend(world.clone(), oracle);
        (world, services)
    }

    async fn run_single(&self, config: SimulationConfig, world: WorldConfig) -> CoreResult<(Arc<SimWorld>, RunReport)> {
        let (world, services) = self.world(world);
        let mut orchestrator = SimulationOrchestrator::build(config, services).await?;
        let report = orchestrator.run().await?;
        Ok((world, report))
    }

    /// Every slot is committed exactly once and the population is stable.
    async fn run_baseline(&self) -> CoreResult<ScenarioResult> {
        let config = self.base_config(ScenarioId::Baseline);
        let (world, report) = self.run_single(config, WorldConfig::default()).await?;

        let mut failures = Vec::new();
        check_clock_log(&world.time_log(), self.slots, &mut failures);
        let expected = SimTime::new(self.days, 0, 0).key();
        if report.final_time.key() != expected {
            failures.push(format!("final time {:?}, expected {:?}", report.final_time.key(), expected));
        }
        let active = world.active_users().len();
        if active != report.final_population {
            failures.push(format!(
                "world has {} active personas, orchestrator tracks {}",
                active, report.final_population
            ));
        }
        if report.performed(Action::Post) + report.performed(Action::Comment) == 0 {
            failures.push("no content was produced".to_string());
        }

        info!(
            posts = report.performed(Action::Post),
            comments = report.performed(Action::Comment),
            "baseline complete"
        );
        Ok(ScenarioResult::new(ScenarioId::Baseline, self.seed, vec![report], world.stats(), failures))
    }

    /// Churned personas leave both the population and the world; failed
    /// writes never abort the run.
    async fn run_churn_storm(&self) -> CoreResult<ScenarioResult> {
        let mut config = self.base_config(ScenarioId::ChurnStorm);
        config.simulation.churn_rate = 0.3;
        config.simulation.recruitment_rate = 0.2;
        let (world, report) = self
            .run_single(
                config,
                WorldConfig {
                    failure_rate: 0.1,
                    ..Default::default()
                },
            )
            .await?;

        let mut failures = Vec::new();
        for day in &report.days {
            if let Some(id) = day.churned.iter().find(|id| world.is_active(**id)) {
                failures.push(format!("{} churned on day {} but still active", id, day.day));
            }
        }
        if report.total_churned() == 0 {
            failures.push("no persona churned".to_string());
        }
        let active = world.active_users().len();
        if active != report.final_population {
            failures.push(format!(
                "world has {} active personas, orchestrator tracks {}",
                active, report.final_population
            ));
        }

        info!(
            churned = report.total_churned(),
            recruited = report.total_recruited(),
            injected = world.stats().injected_failures,
            "churn storm complete"
        );
        Ok(ScenarioResult::new(ScenarioId::ChurnStorm, self.seed, vec![report], world.stats(), failures))
    }

    /// Opinion updates stay in [0, 1] and are attributed to someone else.
    async fn run_opinion_oracle(&self) -> CoreResult<ScenarioResult> {
        let mut config = self.base_config(ScenarioId::OpinionOracle);
        config.opinion_dynamics.enabled = true;
        config.opinion_dynamics.model = OpinionModel::OracleEvaluation(OracleEvaluation {
            scope: EvaluationScope::PeerGroup,
            ..Default::default()
        });
        config.simulation.initial_graph = GraphSource::SmallWorld { k: 4, p: 0.1 };
        let (world, report) = self.run_single(config, WorldConfig::default()).await?;

        let mut failures = Vec::new();
        let log = world.opinion_log();
        for update in &log {
            if update.interacted_with == update.user {
                failures.push(format!("{} updated against itself", update.user));
            }
            if let Some((topic, value)) = update.opinions.iter().find(|(_, v)| !(0.0..=1.0).contains(*v)) {
                failures.push(format!("{} holds {} on {}", update.user, value, topic));
            }
        }
        match &report.bootstrap {
            Some(bootstrap) if bootstrap.followed > 0 => {}
            _ => failures.push("social graph was not bootstrapped".to_string()),
        }

        info!(updates = log.len(), "opinion oracle complete");
        Ok(ScenarioResult::new(ScenarioId::OpinionOracle, self.seed, vec![report], world.stats(), failures))
    }

    /// Pages only post and are never churned.
    async fn run_pages(&self) -> CoreResult<ScenarioResult> {
        let mut config = self.base_config(ScenarioId::Pages);
        config.agents.page_fraction = 0.5;
        config.simulation.churn_rate = 0.5;
        let (world, services) = self.world(WorldConfig::default());
        let mut orchestrator = SimulationOrchestrator::build(config, services).await?;
        orchestrator.initialize().await?;
        let pages: Vec<_> = orchestrator
            .population()
            .iter()
            .filter(|p| p.is_page())
            .filter_map(|p| p.id)
            .collect();
        let report = orchestrator.run().await?;

        let mut failures = Vec::new();
        if pages.is_empty() {
            failures.push("no pages were generated".to_string());
        }
        for page in &pages {
            let forbidden = world.authored(*page, ContentKind::Comment)
                + world.authored(*page, ContentKind::ImageComment)
                + world.authored(*page, ContentKind::Share)
                + world.reactions_by(*page);
            if forbidden > 0 {
                failures.push(format!("page {} performed {} user-only actions", page, forbidden));
            }
            if !world.is_active(*page) {
                failures.push(format!("page {} was churned", page));
            }
        }

        Ok(ScenarioResult::new(ScenarioId::Pages, self.seed, vec![report], world.stats(), failures))
    }

    /// Two orchestrators share one time source; the clock never skips or
    /// repeats a slot.
    async fn run_clock_race(&self) -> CoreResult<ScenarioResult> {
        let (world, services) = self.world(WorldConfig {
            yield_on_time: true,
            ..Default::default()
        });
        let mut first = SimulationOrchestrator::build(self.base_config(ScenarioId::ClockRace), services.clone()).await?;
        let mut second_config = self.base_config(ScenarioId::ClockRace);
        second_config.simulation.seed = self.seed.wrapping_add(1);
        let mut second = SimulationOrchestrator::build(second_config, services).await?;

        let (a, b) = tokio::join!(first.run(), second.run());
        let reports = vec![a?, b?];

        let mut failures = Vec::new();
        check_clock_log(&world.time_log(), self.slots, &mut failures);
        let advances: usize = reports
            .iter()
            .flat_map(|r| &r.days)
            .map(|d| d.slots.len())
            .sum();
        let skipped: usize = reports.iter().map(RunReport::skipped_advances).sum();
        if advances - skipped != world.time_log().len() {
            failures.push(format!(
                "{} committed advances but {} clock writes",
                advances - skipped,
                world.time_log().len()
            ));
        }

        info!(writes = world.time_log().len(), skipped, "clock race complete");
        Ok(ScenarioResult::new(ScenarioId::ClockRace, self.seed, reports, world.stats(), failures))
    }
}

/// Every write must be the slot right after the previous one.
fn check_clock_log(log: &[SimTime], width: u32, failures: &mut Vec<String>) {
    let mut previous = (0, 0);
    for written in log {
        let expected = next_slot(previous.0, previous.1, width);
        if written.key() != expected {
            failures.push(format!("clock wrote {:?} after {:?}", written.key(), previous));
            return;
        }
        previous = written.key();
    }
}
