//! Agora Core - orchestration engine for persona-driven social simulation
//!
//! Drives a population of synthetic personas through a discrete-time
//! schedule of days split into slots:
//! 1. **Clock**: the local day/slot counter and its monotone sync with the
//!    authoritative time source
//! 2. **Selection**: per-turn candidate sampling, strategy decisions and
//!    dispatch to the social service
//! 3. **Opinions**: bounded-confidence or oracle-judged updates after every
//!    opinion-bearing interaction
//! 4. **Lifecycle**: persona synthesis, daily churn and recruitment, and the
//!    one-time social-graph bootstrap
//!
//! Every external effect goes through the collaborator traits in
//! [`agora_env`], so the same engine runs against the HTTP backend or the
//! in-memory world of `agora_sim`.

pub mod action;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod generator;
pub mod graph;
pub mod opinion;
pub mod orchestrator;
pub mod persona;
pub mod population;
pub mod prompt;
pub mod selector;
pub mod strategy;
pub mod text;

#[cfg(test)]
mod testkit;

/// RNG threaded through every random draw of a run.
pub type SimRng = rand_chacha::ChaCha8Rng;

// Re-export key types for convenience
pub use action::{Action, ActionWeights};
pub use clock::{AdvanceOutcome, SimulationClock};
pub use config::SimulationConfig;
pub use error::{CoreError, CoreResult};
pub use executor::{BatchExecutor, ConcurrentExecutor, SequentialExecutor};
pub use opinion::{OpinionEngine, OpinionGroups, OpinionModel};
pub use orchestrator::{DayReport, RunReport, SimulationOrchestrator, SlotReport};
pub use persona::{AgentPersona, Role};
pub use population::{PopulationManager, PopulationSet};
pub use prompt::PromptBook;
pub use selector::{ActionOutcome, ActionSelector, SkipReason};
pub use strategy::{DecisionStrategy, OracleStrategy, RandomStrategy, StrategyKind};
