//! Named simulation scenarios.

use std::fmt;
use std::str::FromStr;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Oracle-driven population on a fixed schedule
    Baseline,

    /// Heavy churn and recruitment with failing writes
    ChurnStorm,

    /// Oracle-judged opinion dynamics over a small-world graph
    OpinionOracle,

    /// Mixed users and pages
    Pages,

    /// Two simulation processes sharing one time source
    ClockRace,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::ChurnStorm,
            ScenarioId::OpinionOracle,
            ScenarioId::Pages,
            ScenarioId::ClockRace,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::ChurnStorm => "churn_storm",
            ScenarioId::OpinionOracle => "opinion_oracle",
            ScenarioId::Pages => "pages",
            ScenarioId::ClockRace => "clock_race",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Oracle personas on a fixed schedule, every slot committed once",
            ScenarioId::ChurnStorm => "30% daily churn, recruitment and 10% failing writes",
            ScenarioId::OpinionOracle => "Oracle-judged opinion updates over a small-world graph",
            ScenarioId::Pages => "Half of the population are pages restricted to POST",
            ScenarioId::ClockRace => "Two orchestrators advancing one shared clock concurrently",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioId::all()
            .into_iter()
            .find(|id| id.name() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
        }
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
