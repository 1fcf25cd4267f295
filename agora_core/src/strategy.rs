//! Decision strategies.
//!
//! A strategy turns a persona and a situation into a choice or a text.
//! [`OracleStrategy`] asks the decision oracle; [`RandomStrategy`] draws
//! from the seeded RNG and writes placeholder texts, which keeps
//! low-cost personas off the oracle entirely.

use std::sync::Arc;

use agora_env::{DecisionOracle, FollowAction, ReactionKind, Vote};
use async_trait::async_trait;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::action::{parse_decision, tokenize, Action};
use crate::opinion::Judgment;
use crate::persona::AgentPersona;
use crate::prompt::PromptBook;
use crate::{CoreResult, SimRng};

/// Which strategy implementation a persona uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Oracle,
    Random,
}

/// What a persona is asked to write.
#[derive(Debug, Clone, Copy)]
pub enum Composition<'a> {
    Post { topics: &'a [String] },
    Comment { thread: &'a [String] },
    Share { article: &'a str },
    ImageComment { description: &'a str },
}

/// Capability that makes every decision of a persona.
#[async_trait]
pub trait DecisionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether candidate sets offered to this strategy carry an explicit `NONE`.
    fn forces_none(&self) -> bool;

    /// Picks one of `candidates`; `None` when no decision is recognizable.
    async fn choose_action(
        &self,
        persona: &AgentPersona,
        candidates: &[Action],
        rng: &mut SimRng,
    ) -> CoreResult<Option<Action>>;

    async fn compose(
        &self,
        persona: &AgentPersona,
        composition: Composition<'_>,
        rng: &mut SimRng,
    ) -> CoreResult<String>;

    /// Like or dislike `text`; `None` when undecided.
    async fn react(&self, persona: &AgentPersona, text: &str, rng: &mut SimRng) -> CoreResult<Option<ReactionKind>>;

    /// Whether to apply `action` to the author of `text`.
    async fn evaluate_follow(
        &self,
        persona: &AgentPersona,
        text: &str,
        action: FollowAction,
        rng: &mut SimRng,
    ) -> CoreResult<bool>;

    async fn vote(&self, persona: &AgentPersona, text: &str, rng: &mut SimRng) -> CoreResult<Option<Vote>>;

    /// Stance of the persona toward a partner's opinion.
    async fn judge(&self, persona: &AgentPersona, instruction: &str, rng: &mut SimRng) -> CoreResult<Option<Judgment>>;
}

fn yes_no(text: &str) -> Option<bool> {
    tokenize(text).find_map(|t| match t.as_str() {
        "YES" => Some(true),
        "NO" => Some(false),
        _ => None,
    })
}

// ===== Oracle-backed =====

/// Strategy asking the decision oracle.
pub struct OracleStrategy {
    oracle: Arc<dyn DecisionOracle>,
    prompts: Arc<PromptBook>,
}

impl OracleStrategy {
    pub fn new(oracle: Arc<dyn DecisionOracle>, prompts: Arc<PromptBook>) -> Self {
        Self { oracle, prompts }
    }

    async fn ask(&self, persona: &AgentPersona, template: &str, extra: &[(&'static str, &str)]) -> CoreResult<String> {
        let system = persona.describe(&self.prompts)?;
        let mut vars = persona.prompt_vars();
        for (field, value) in extra {
            vars.set(*field, *value);
        }
        let instruction = self.prompts.render(template, &vars)?;
        Ok(self.oracle.generate(&system, &instruction).await?)
    }
}

#[async_trait]
impl DecisionStrategy for OracleStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Oracle
    }

    fn forces_none(&self) -> bool {
        true
    }

    async fn choose_action(
        &self,
        persona: &AgentPersona,
        candidates: &[Action],
        rng: &mut SimRng,
    ) -> CoreResult<Option<Action>> {
        let mut offered = candidates.to_vec();
        offered.shuffle(rng);
        let actions = offered
            .iter()
            .map(Action::keyword)
            .collect::<Vec<_>>()
            .join(", ");

        let answer = self
            .ask(persona, &self.prompts.handler_action, &[("actions", actions.as_str())])
            .await?;
        Ok(parse_decision(&answer, candidates))
    }

    async fn compose(
        &self,
        persona: &AgentPersona,
        composition: Composition<'_>,
        _rng: &mut SimRng,
    ) -> CoreResult<String> {
        match composition {
            Composition::Post { topics } => {
                let topics = topics.join(", ");
                self.ask(persona, &self.prompts.handler_post, &[("topics", topics.as_str())]).await
            }
            Composition::Comment { thread } => {
                let thread = thread.join("\n");
                self.ask(persona, &self.prompts.handler_comment, &[("thread", thread.as_str())]).await
            }
            Composition::Share { article } => {
                self.ask(persona, &self.prompts.handler_share, &[("article", article)]).await
            }
            Composition::ImageComment { description } => {
                self.ask(persona, &self.prompts.handler_image, &[("description", description)])
                    .await
            }
        }
    }

    async fn react(&self, persona: &AgentPersona, text: &str, _rng: &mut SimRng) -> CoreResult<Option<ReactionKind>> {
        let answer = self.ask(persona, &self.prompts.handler_reaction, &[("text", text)]).await?;
        Ok(yes_no(&answer).map(|yes| if yes { ReactionKind::Like } else { ReactionKind::Dislike }))
    }

    async fn evaluate_follow(
        &self,
        persona: &AgentPersona,
        text: &str,
        action: FollowAction,
        _rng: &mut SimRng,
    ) -> CoreResult<bool> {
        let answer = self
            .ask(
                persona,
                &self.prompts.handler_follow,
                &[("text", text), ("follow_action", action.as_str())],
            )
            .await?;
        Ok(yes_no(&answer).unwrap_or(false))
    }

    async fn vote(&self, persona: &AgentPersona, text: &str, _rng: &mut SimRng) -> CoreResult<Option<Vote>> {
        let answer = self.ask(persona, &self.prompts.handler_cast, &[("text", text)]).await?;
        let vote = tokenize(&answer).find_map(|t| Vote::from_keyword(&t));
        Ok(vote)
    }

    async fn judge(&self, persona: &AgentPersona, instruction: &str, _rng: &mut SimRng) -> CoreResult<Option<Judgment>> {
        let system = persona.describe(&self.prompts)?;
        let answer = self.oracle.generate(&system, instruction).await?;
        Ok(Judgment::parse(&answer))
    }
}

// ===== Pseudo-random =====

/// Strategy drawing every decision from the RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStrategy;

#[async_trait]
impl DecisionStrategy for RandomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn forces_none(&self) -> bool {
        false
    }

    async fn choose_action(
        &self,
        _persona: &AgentPersona,
        candidates: &[Action],
        rng: &mut SimRng,
    ) -> CoreResult<Option<Action>> {
        Ok(candidates.choose(rng).copied())
    }

    async fn compose(
        &self,
        _persona: &AgentPersona,
        composition: Composition<'_>,
        _rng: &mut SimRng,
    ) -> CoreResult<String> {
        let text = match composition {
            Composition::Post { topics } if !topics.is_empty() => {
                let tags: Vec<String> = topics
                    .iter()
                    .map(|t| format!("#{}", t.replace(char::is_whitespace, "")))
                    .collect();
                format!("sample post {}", tags.join(" "))
            }
            Composition::Post { .. } => "sample post".to_string(),
            Composition::Comment { .. } => "sample comment".to_string(),
            Composition::Share { .. } => "sample share".to_string(),
            Composition::ImageComment { .. } => "sample image comment".to_string(),
        };
        Ok(text)
    }

    async fn react(&self, _persona: &AgentPersona, _text: &str, rng: &mut SimRng) -> CoreResult<Option<ReactionKind>> {
        let kind = if rng.gen_bool(0.5) {
            ReactionKind::Like
        } else {
            ReactionKind::Dislike
        };
        Ok(Some(kind))
    }

    async fn evaluate_follow(
        &self,
        _persona: &AgentPersona,
        _text: &str,
        _action: FollowAction,
        rng: &mut SimRng,
    ) -> CoreResult<bool> {
        Ok(rng.gen_bool(0.5))
    }

    async fn vote(&self, _persona: &AgentPersona, _text: &str, rng: &mut SimRng) -> CoreResult<Option<Vote>> {
        Ok([Vote::Right, Vote::Left, Vote::Undecided].choose(rng).copied())
    }

    async fn judge(&self, _persona: &AgentPersona, _instruction: &str, rng: &mut SimRng) -> CoreResult<Option<Judgment>> {
        Ok(Judgment::ALL.choose(rng).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Role;
    use crate::testkit::{sample_persona, ScriptedOracle};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_yes_no() {
        assert_eq!(yes_no("Yes, absolutely"), Some(true));
        assert_eq!(yes_no("no."), Some(false));
        assert_eq!(yes_no("NOT sure"), None);
    }

    #[tokio::test]
    async fn test_oracle_choose_action_parses_answer() {
        let oracle = ScriptedOracle::new(["I think I'll COMMENT here"]);
        let strategy = OracleStrategy::new(oracle.clone(), Arc::new(PromptBook::default()));
        let persona = sample_persona(Role::User);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let chosen = strategy
            .choose_action(&persona, &[Action::Post, Action::Comment, Action::None], &mut rng)
            .await
            .unwrap();
        assert_eq!(chosen, Some(Action::Comment));

        let (system, instruction) = oracle.last_call().unwrap();
        assert!(system.contains("You are Ada"));
        assert!(instruction.contains("NONE"));
    }

    #[tokio::test]
    async fn test_oracle_unrecognized_answer_is_no_decision() {
        let oracle = ScriptedOracle::new(["let me think"]);
        let strategy = OracleStrategy::new(oracle, Arc::new(PromptBook::default()));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let chosen = strategy
            .choose_action(&sample_persona(Role::User), &[Action::Post, Action::None], &mut rng)
            .await
            .unwrap();
        assert_eq!(chosen, None);
    }

    #[tokio::test]
    async fn test_oracle_vote_and_reaction() {
        let oracle = ScriptedOracle::new(["LEFT", "YES"]);
        let strategy = OracleStrategy::new(oracle, Arc::new(PromptBook::default()));
        let persona = sample_persona(Role::User);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert_eq!(strategy.vote(&persona, "text", &mut rng).await.unwrap(), Some(Vote::Left));
        assert_eq!(
            strategy.react(&persona, "text", &mut rng).await.unwrap(),
            Some(ReactionKind::Like)
        );
    }

    #[tokio::test]
    async fn test_random_strategy_picks_offered_action() {
        let persona = sample_persona(Role::User);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let offered = [Action::Read, Action::Cast];
        for _ in 0..20 {
            let chosen = RandomStrategy.choose_action(&persona, &offered, &mut rng).await.unwrap();
            assert!(offered.contains(&chosen.unwrap()));
        }
        assert_eq!(
            RandomStrategy
                .compose(&persona, Composition::Comment { thread: &[] }, &mut rng)
                .await
                .unwrap(),
            "sample comment"
        );
    }
}
