//! Agora Deterministic Simulation Harness
//!
//! Runs the Agora engine against an in-memory social network so whole
//! multi-day simulations are reproducible from a single seed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                     │
//! │   ┌──────────────────────────┐   ┌────────────────┐   │
//! │   │ SimulationOrchestrator   │──▶│   SimOracle    │   │
//! │   │ (one per sim process)    │   │ (seeded text)  │   │
//! │   └────────────┬─────────────┘   └────────────────┘   │
//! │                │ agora_env traits                     │
//! │   ┌────────────▼──────────────────────────────────┐   │
//! │   │ SimWorld                                       │   │
//! │   │ time · users · content · follows · opinions    │   │
//! │   └────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use agora_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 10).run(ScenarioId::Baseline).await;
//! assert!(result.passed);
//! ```

mod exporter;
mod oracle;
mod runner;
pub mod scenarios;
mod world;

pub use exporter::RunExport;
pub use oracle::SimOracle;
pub use runner::{ScenarioResult, ScenarioRunner};
pub use world::{ContentKind, SimWorld, WorldConfig, WorldStats, NEWSROOM};
