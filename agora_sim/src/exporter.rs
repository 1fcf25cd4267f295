//! JSON exporter for run results.

use crate::runner::ScenarioResult;
use agora_core::RunReport;
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// Complete export of one CLI invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunExport {
    /// Scenario names, or `live` for a run against external services
    pub mode: String,

    /// Base seed
    pub seed: u64,

    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Scenario results
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<ScenarioResult>,

    /// Report of a live run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<RunReport>,
}

impl RunExport {
    /// Creates an export of scenario results.
    pub fn from_scenarios(seed: u64, scenarios: Vec<ScenarioResult>) -> Self {
        let passed = scenarios.iter().filter(|r| r.passed).count();
        Self {
            mode: scenarios.iter().map(|r| r.scenario).collect::<Vec<_>>().join(","),
            seed,
            total: scenarios.len(),
            passed,
            failed: scenarios.len() - passed,
            scenarios,
            live: None,
        }
    }

    /// Creates an export of a live run.
    pub fn from_live(report: RunReport) -> Self {
        Self {
            mode: "live".to_string(),
            seed: report.seed,
            total: 1,
            passed: 1,
            failed: 0,
            scenarios: Vec::new(),
            live: Some(report),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
