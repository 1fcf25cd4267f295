//! SimOracle - seeded stand-in for the language model.
//!
//! Instructions name their answer vocabulary in upper case ("Answer YES or
//! NO", "among the options: POST, READ, NONE"). The oracle collects those
//! keywords and picks one; instructions without keywords get free text built
//! from the topics and phrases it finds in the request.

use agora_env::{DecisionOracle, EnvError, ImageAnnotator};
use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;

/// Words the oracle recognizes as answer options.
const VOCABULARY: &[&str] = &[
    "POST", "COMMENT", "REPLY", "SHARE", "REACTION", "FOLLOW", "SEARCH", "READ", "CAST", "IMAGE", "NONE",
    "YES", "NO", "RIGHT", "LEFT", "AGREE", "DISAGREE", "NEUTRAL",
];

const OPENERS: &[&str] = &[
    "Honestly I think",
    "Interesting take on",
    "Can't stop thinking about",
    "Hot take about",
    "Quick thoughts on",
];

const CLOSERS: &[&str] = &[
    "what do you all think?",
    "this changes everything.",
    "not convinced yet.",
    "love to see it.",
    "feeling some optimism today.",
];

/// Deterministic decision oracle and image annotator.
pub struct SimOracle {
    rng: Mutex<ChaCha8Rng>,

    /// Probability of answering YES to a yes/no question
    yes_probability: f64,

    /// Probability that a call fails
    failure_rate: f64,
}

impl SimOracle {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x517cc1b727220a95))),
            yes_probability: 0.5,
            failure_rate: 0.0,
        }
    }

    pub fn with_yes_probability(mut self, p: f64) -> Self {
        self.yes_probability = p;
        self
    }

    pub fn with_failure_rate(mut self, p: f64) -> Self {
        self.failure_rate = p;
        self
    }

    fn roll(&self) -> std::sync::MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn answer(&self, instruction: &str) -> Result<String, EnvError> {
        let mut rng = self.roll();
        if self.failure_rate > 0.0 && rng.gen::<f64>() < self.failure_rate {
            return Err(EnvError::unavailable("oracle overloaded"));
        }

        let options = offered_keywords(instruction);
        if options.contains(&"YES") && options.contains(&"NO") {
            let yes = rng.gen::<f64>() < self.yes_probability;
            return Ok(if yes { "YES" } else { "NO" }.to_string());
        }
        if let Some(choice) = options.choose(&mut *rng) {
            return Ok(format!("I choose {}.", choice));
        }

        let subject = quoted_subject(instruction).unwrap_or("today");
        let opener = OPENERS.choose(&mut *rng).copied().unwrap_or("About");
        let closer = CLOSERS.choose(&mut *rng).copied().unwrap_or("");
        let tag = subject
            .split(|c: char| !c.is_alphanumeric())
            .find(|w| w.len() > 2)
            .map(|w| format!(" #{}", w.to_lowercase()))
            .unwrap_or_default();
        Ok(format!("{} {}, {}{}", opener, subject, closer, tag))
    }
}

/// Upper-case vocabulary words present in `instruction`, in order of first
/// appearance.
fn offered_keywords(instruction: &str) -> Vec<&'static str> {
    let mut found = Vec::new();
    for word in instruction.split(|c: char| !c.is_alphanumeric()) {
        if let Some(keyword) = VOCABULARY.iter().find(|k| **k == word) {
            if !found.contains(keyword) {
                found.push(*keyword);
            }
        }
    }
    found
}

/// The most specific subject in a composition request.
fn quoted_subject(instruction: &str) -> Option<&str> {
    if let Some(start) = instruction.find('\'') {
        let rest = &instruction[start + 1..];
        if let Some(end) = rest.find('\'') {
            return Some(&rest[..end]);
        }
    }
    let about = instruction.find("about ")?;
    let rest = &instruction[about + 6..];
    Some(rest.split('.').next().unwrap_or(rest).trim())
}

#[async_trait]
impl DecisionOracle for SimOracle {
    async fn generate(&self, _persona: &str, instruction: &str) -> Result<String, EnvError> {
        self.answer(instruction)
    }
}

#[async_trait]
impl ImageAnnotator for SimOracle {
    async fn describe(&self, image_url: &str) -> Result<String, EnvError> {
        let name = image_url.rsplit('/').next().unwrap_or(image_url);
        Ok(format!("a photo named {}", name))
    }
}
