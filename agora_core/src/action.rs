//! Action vocabulary, candidate sampling and keyword parsing.

use std::collections::BTreeMap;
use std::fmt;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, SimRng};

/// Everything a persona can do in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Post,
    Comment,
    Reply,
    Share,
    Reaction,
    Follow,
    Search,
    Read,
    Cast,
    Image,
    None,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Post,
        Action::Comment,
        Action::Reply,
        Action::Share,
        Action::Reaction,
        Action::Follow,
        Action::Search,
        Action::Read,
        Action::Cast,
        Action::Image,
        Action::None,
    ];

    /// Keywords recognized in oracle output, first match wins.
    pub const PRIORITY: [Action; 9] = [
        Action::Comment,
        Action::Post,
        Action::Read,
        Action::Search,
        Action::Follow,
        Action::Share,
        Action::Cast,
        Action::Image,
        Action::None,
    ];

    /// Upper-case keyword used in prompts and oracle answers.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Comment => "COMMENT",
            Self::Reply => "REPLY",
            Self::Share => "SHARE",
            Self::Reaction => "REACTION",
            Self::Follow => "FOLLOW",
            Self::Search => "SEARCH",
            Self::Read => "READ",
            Self::Cast => "CAST",
            Self::Image => "IMAGE",
            Self::None => "NONE",
        }
    }

    /// Parses a configuration label (`"post"`, `"comment"`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|a| a.keyword() == upper)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Upper-cased words of `text` with surrounding punctuation stripped.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_uppercase())
        .filter(|w| !w.is_empty())
}

/// Reads the decided action from oracle output.
///
/// Only keywords of offered candidates count; among those, the one highest
/// in [`Action::PRIORITY`] wins. `None` means no recognizable decision.
pub fn parse_decision(text: &str, candidates: &[Action]) -> Option<Action> {
    let tokens: Vec<String> = tokenize(text).collect();
    Action::PRIORITY
        .into_iter()
        .filter(|a| candidates.contains(a))
        .find(|a| tokens.iter().any(|t| t == a.keyword()))
}

/// Normalized action likelihoods.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionWeights {
    actions: Vec<Action>,
    weights: Vec<f64>,
}

impl ActionWeights {
    /// Builds weights from `label -> likelihood`; zero entries are dropped.
    pub fn from_labels(likelihood: &BTreeMap<String, f64>) -> CoreResult<Self> {
        let mut pairs = Vec::new();
        for (label, &weight) in likelihood {
            let action = Action::from_label(label)
                .ok_or_else(|| CoreError::config(format!("unknown action '{}'", label)))?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(CoreError::config(format!("invalid likelihood {} for '{}'", weight, label)));
            }
            if weight > 0.0 {
                pairs.push((action, weight));
            }
        }
        Self::from_pairs(pairs)
    }

    pub fn from_pairs(pairs: Vec<(Action, f64)>) -> CoreResult<Self> {
        let total: f64 = pairs.iter().map(|(_, w)| w).sum();
        if pairs.is_empty() || total <= 0.0 {
            return Err(CoreError::config("no action has a positive likelihood"));
        }
        let (actions, weights) = pairs.into_iter().map(|(a, w)| (a, w / total)).unzip();
        Ok(Self { actions, weights })
    }

    pub fn probability(&self, action: Action) -> f64 {
        self.actions
            .iter()
            .position(|a| *a == action)
            .map(|i| self.weights[i])
            .unwrap_or(0.0)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Draws two actions with replacement, then appends `NONE` when asked.
    pub fn sample_candidates(&self, rng: &mut SimRng, force_none: bool) -> Vec<Action> {
        let mut candidates = Vec::with_capacity(3);
        // Weights were validated positive at construction.
        if let Ok(dist) = WeightedIndex::new(&self.weights) {
            for _ in 0..2 {
                candidates.push(self.actions[dist.sample(rng)]);
            }
        }
        if force_none {
            candidates.push(Action::None);
        }
        candidates
    }
}
