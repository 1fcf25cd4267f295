//! Per-agent action selection and dispatch.
//!
//! ```text
//!            ┌──────────── reply to mentions (users only)
//!            ▼
//!  IDLE ──candidates──▶ strategy decides ──▶ dispatch ──▶ IDLE
//!            (2 weighted + NONE)     │
//!                                    ├─ POST     generate, publish, record interests
//!                                    ├─ COMMENT  read → comment → react → follow eval
//!                                    ├─ READ     read → react
//!                                    ├─ SHARE    read articles → commentary → share
//!                                    ├─ SEARCH   search → comment → react
//!                                    ├─ FOLLOW   suggestions → weighted draw → follow
//!                                    ├─ CAST     read → classify stance → vote
//!                                    ├─ IMAGE    annotate if needed → comment image
//!                                    └─ NONE
//! ```
//!
//! Every action is fail-soft: a missing prerequisite or a collaborator error
//! ends that action only, reported as [`ActionOutcome::Skipped`].

use std::sync::Arc;
use std::time::Instant;

use agora_env::{ContentId, Fetched, FollowAction, ReactionKind, ReadRequest, Services, SimTime, TopicId, UserId};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::action::{Action, ActionWeights};
use crate::opinion::OpinionEngine;
use crate::persona::AgentPersona;
use crate::strategy::Composition;
use crate::text::build_publication;
use crate::{CoreResult, SimRng};

/// Why an action ended without side effects (or partially).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The persona's role does not permit the action
    NotAllowed,

    /// The gateway returned nothing to act on
    NoCandidates,

    /// Daily follow probability is zero
    FollowDisabled,

    /// The strategy gave no usable answer
    Undecided,

    /// Generated text too short to publish
    TooShort,

    /// A collaborator failed
    Failed(String),
}

/// Result of one decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActionOutcome {
    Performed(Action),
    Skipped { action: Action, reason: SkipReason },
    NoDecision,
}

impl ActionOutcome {
    fn skipped(action: Action, reason: SkipReason) -> Self {
        Self::Skipped { action, reason }
    }

    pub fn performed(&self) -> Option<Action> {
        match self {
            Self::Performed(a) => Some(*a),
            _ => None,
        }
    }
}

/// A decision computed ahead of the turn (batch prefetch).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDecision {
    pub candidates: Vec<Action>,
    pub choice: Option<Action>,
}

/// Outcomes of one agent's activation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnReport {
    pub reply: Option<ActionOutcome>,
    pub outcomes: Vec<ActionOutcome>,
}

#[derive(Debug, Clone)]
pub struct SelectorSettings {
    /// Messages of a thread shown when commenting
    pub max_thread_length: usize,

    /// Slots of history used to pick post topics
    pub attention_window: u32,

    /// Emotion vocabulary extracted from generated texts
    pub emotions: Vec<String>,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            max_thread_length: 5,
            attention_window: 336,
            emotions: Vec::new(),
        }
    }
}

/// Dispatches decided actions against the external services.
pub struct ActionSelector {
    services: Services,
    settings: SelectorSettings,
    opinions: Option<Arc<OpinionEngine>>,
}

impl ActionSelector {
    pub fn new(services: Services, settings: SelectorSettings) -> Self {
        Self {
            services,
            settings,
            opinions: None,
        }
    }

    /// Enables opinion updates after comments.
    pub fn with_opinions(mut self, engine: Arc<OpinionEngine>) -> Self {
        self.opinions = Some(engine);
        self
    }

    /// Runs one activation: mention replies, then `round_actions` iterations.
    ///
    /// `planned` replaces the first iteration's decision when present.
    pub async fn run_turn(
        &self,
        persona: &mut AgentPersona,
        weights: &ActionWeights,
        now: SimTime,
        rng: &mut SimRng,
        mut planned: Option<PlannedDecision>,
    ) -> TurnReport {
        let mut report = TurnReport::default();
        if persona.allows(Action::Reply) {
            report.reply = Some(self.reply(persona, now, rng).await);
        }

        for _ in 0..persona.behavior.round_actions {
            let outcome = match planned.take() {
                Some(plan) => match plan.choice {
                    Some(action) => self.dispatch(persona, action, now, rng).await,
                    None => ActionOutcome::NoDecision,
                },
                None => {
                    let candidates = weights.sample_candidates(rng, persona.strategy().forces_none());
                    self.select_action(persona, &candidates, now, rng).await
                }
            };
            report.outcomes.push(outcome);
        }
        report
    }

    /// Lets the strategy pick among `candidates`, then dispatches.
    pub async fn select_action(
        &self,
        persona: &mut AgentPersona,
        candidates: &[Action],
        now: SimTime,
        rng: &mut SimRng,
    ) -> ActionOutcome {
        if candidates.is_empty() {
            return ActionOutcome::NoDecision;
        }
        let strategy = persona.strategy().clone();
        match strategy.choose_action(persona, candidates, rng).await {
            Ok(Some(action)) => self.dispatch(persona, action, now, rng).await,
            Ok(None) => ActionOutcome::NoDecision,
            Err(e) => {
                warn!(agent = %persona.name, error = %e, "action decision failed");
                ActionOutcome::NoDecision
            }
        }
    }

    /// Executes `action`; failures become [`SkipReason::Failed`].
    pub async fn dispatch(
        &self,
        persona: &mut AgentPersona,
        action: Action,
        now: SimTime,
        rng: &mut SimRng,
    ) -> ActionOutcome {
        if !persona.allows(action) {
            return ActionOutcome::skipped(action, SkipReason::NotAllowed);
        }

        let started = Instant::now();
        let outcome = match self.try_dispatch(persona, action, now, rng).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(agent = %persona.name, %action, error = %e, "action failed, skipped");
                ActionOutcome::skipped(action, SkipReason::Failed(e.to_string()))
            }
        };
        debug!(
            agent = %persona.name,
            %action,
            day = now.day,
            slot = now.slot,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?outcome,
            "action dispatched"
        );
        outcome
    }

    async fn try_dispatch(
        &self,
        persona: &mut AgentPersona,
        action: Action,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<ActionOutcome> {
        match action {
            Action::Post => self.post(persona, now, rng).await,
            Action::Comment => {
                let read = persona.recommenders.content.clone();
                let candidates = self.services.content.read(persona.user_id()?, &read).await;
                match pick(candidates, rng) {
                    Ok(target) => self.comment_on(persona, action, target, now, rng).await,
                    Err(reason) => Ok(ActionOutcome::skipped(action, reason)),
                }
            }
            Action::Read => {
                let read = persona.recommenders.content.clone();
                let candidates = self.services.content.read(persona.user_id()?, &read).await;
                match pick(candidates, rng) {
                    Ok(target) => {
                        self.reaction(persona, target, true, now, rng).await?;
                        Ok(ActionOutcome::Performed(action))
                    }
                    Err(reason) => Ok(ActionOutcome::skipped(action, reason)),
                }
            }
            Action::Search => {
                let candidates = self.services.content.search(persona.user_id()?).await;
                match pick(candidates, rng) {
                    Ok(target) => self.comment_on(persona, action, target, now, rng).await,
                    Err(reason) => Ok(ActionOutcome::skipped(action, reason)),
                }
            }
            Action::Reply => self.try_reply(persona, now, rng).await,
            Action::Reaction => {
                let read = persona.recommenders.content.clone();
                let candidates = self.services.content.read(persona.user_id()?, &read).await;
                match pick(candidates, rng) {
                    Ok(target) => self.reaction(persona, target, false, now, rng).await,
                    Err(reason) => Ok(ActionOutcome::skipped(action, reason)),
                }
            }
            Action::Share => self.share(persona, now, rng).await,
            Action::Follow => self.follow(persona, now, rng).await,
            Action::Cast => self.cast(persona, now, rng).await,
            Action::Image => self.image(persona, now, rng).await,
            Action::None => Ok(ActionOutcome::Performed(Action::None)),
        }
    }

    // ===== Sub-behaviors =====

    async fn post(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> CoreResult<ActionOutcome> {
        let user = persona.user_id()?;
        let recent = self
            .services
            .social
            .interests(user, self.settings.attention_window)
            .await?;

        let (names, topics): (Vec<String>, Vec<TopicId>) = if recent.is_empty() {
            let n = rng.gen_range(1..=2).min(persona.interests.len());
            let names = persona.interests.choose_multiple(rng, n).cloned().collect();
            (names, Vec::new())
        } else {
            let n = rng.gen_range(1..=2).min(recent.len());
            recent
                .choose_multiple(rng, n)
                .map(|i| (i.name.clone(), i.id))
                .unzip()
        };

        let strategy = persona.strategy().clone();
        let raw = strategy
            .compose(persona, Composition::Post { topics: &names }, rng)
            .await?;
        let Some(publication) = build_publication(&raw, &persona.name, topics.clone(), &self.settings.emotions)
        else {
            return Ok(ActionOutcome::skipped(Action::Post, SkipReason::TooShort));
        };

        self.services.social.post(user, now.id, &publication).await?;
        if !topics.is_empty() {
            self.services.social.record_interests(user, now.id, &topics).await?;
        }
        Ok(ActionOutcome::Performed(Action::Post))
    }

    /// Answers one pending mention, if any.
    pub async fn reply(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> ActionOutcome {
        if !persona.allows(Action::Reply) {
            return ActionOutcome::skipped(Action::Reply, SkipReason::NotAllowed);
        }
        match self.try_reply(persona, now, rng).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(agent = %persona.name, error = %e, "reply failed, skipped");
                ActionOutcome::skipped(Action::Reply, SkipReason::Failed(e.to_string()))
            }
        }
    }

    async fn try_reply(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> CoreResult<ActionOutcome> {
        let mentions = self.services.content.read_mentions(persona.user_id()?).await;
        let target = match pick(mentions, rng) {
            Ok(target) => target,
            Err(reason) => return Ok(ActionOutcome::skipped(Action::Reply, reason)),
        };
        if self.publish_comment(persona, target, now, rng).await?.is_none() {
            return Ok(ActionOutcome::skipped(Action::Reply, SkipReason::TooShort));
        }
        self.secondary_follow(persona, target, now, rng).await?;
        Ok(ActionOutcome::Performed(Action::Reply))
    }

    /// Comment, then react without follow check, then secondary follow evaluation.
    async fn comment_on(
        &self,
        persona: &mut AgentPersona,
        action: Action,
        target: ContentId,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<ActionOutcome> {
        if self.publish_comment(persona, target, now, rng).await?.is_none() {
            return Ok(ActionOutcome::skipped(action, SkipReason::TooShort));
        }
        self.reaction(persona, target, false, now, rng).await?;
        self.secondary_follow(persona, target, now, rng).await?;
        Ok(ActionOutcome::Performed(action))
    }

    /// Writes a comment on `target`; `None` when the text was too short.
    async fn publish_comment(
        &self,
        persona: &mut AgentPersona,
        target: ContentId,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<Option<ContentId>> {
        let user = persona.user_id()?;
        let thread = self
            .services
            .social
            .thread(target, self.settings.max_thread_length)
            .await?;

        let strategy = persona.strategy().clone();
        let raw = strategy
            .compose(persona, Composition::Comment { thread: &thread }, rng)
            .await?;

        let topics: Vec<TopicId> = self
            .services
            .social
            .content_topics(target)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        let Some(publication) = build_publication(&raw, &persona.name, topics.clone(), &self.settings.emotions)
        else {
            return Ok(None);
        };

        let id = self.services.social.comment(user, now.id, target, &publication).await?;
        if !topics.is_empty() {
            self.services.social.record_interests(user, now.id, &topics).await?;
        }

        if let Some(engine) = &self.opinions {
            engine.apply_interaction(persona, target, now, rng).await?;
        }
        Ok(Some(id))
    }

    /// Likes or dislikes `target`.
    ///
    /// A like runs follow evaluation when `check_follow` is set; a dislike
    /// always runs unfollow evaluation.
    async fn reaction(
        &self,
        persona: &mut AgentPersona,
        target: ContentId,
        check_follow: bool,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<ActionOutcome> {
        let user = persona.user_id()?;
        let text = self.services.social.content_text(target).await?;
        let strategy = persona.strategy().clone();
        let Some(kind) = strategy.react(persona, &text, rng).await? else {
            return Ok(ActionOutcome::skipped(Action::Reaction, SkipReason::Undecided));
        };

        self.services.social.react(user, now.id, target, kind).await?;
        match kind {
            ReactionKind::Like if check_follow => {
                self.evaluate_follow(persona, target, FollowAction::Follow, now, rng).await?;
            }
            ReactionKind::Dislike => {
                self.evaluate_follow(persona, target, FollowAction::Unfollow, now, rng).await?;
            }
            ReactionKind::Like => {}
        }

        let topics: Vec<TopicId> = self
            .services
            .social
            .content_topics(target)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        if !topics.is_empty() {
            self.services.social.record_interests(user, now.id, &topics).await?;
        }
        Ok(ActionOutcome::Performed(Action::Reaction))
    }

    /// Tries to follow the author of `target`; on no action, tries to unfollow.
    async fn secondary_follow(
        &self,
        persona: &AgentPersona,
        target: ContentId,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<Option<FollowAction>> {
        match self.evaluate_follow(persona, target, FollowAction::Follow, now, rng).await? {
            Some(done) => Ok(Some(done)),
            None => self.evaluate_follow(persona, target, FollowAction::Unfollow, now, rng).await,
        }
    }

    /// Secondary follow evaluation.
    ///
    /// Gated by `probability_of_secondary_follow`: nothing happens when it is
    /// zero or when a Bernoulli draw at that probability fails. Otherwise the
    /// strategy decides and, on yes, `action` is applied to the author of
    /// `target`. Returns the action taken, if any.
    pub async fn evaluate_follow(
        &self,
        persona: &AgentPersona,
        target: ContentId,
        action: FollowAction,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<Option<FollowAction>> {
        let p = persona.behavior.probability_of_secondary_follow;
        if p <= 0.0 || rng.gen::<f64>() > p {
            return Ok(None);
        }

        let user = persona.user_id()?;
        let text = self.services.social.content_text(target).await?;
        if !persona.strategy().evaluate_follow(persona, &text, action, rng).await? {
            return Ok(None);
        }

        let author = self.services.social.author(target).await?;
        if author == user {
            return Ok(None);
        }
        self.services.social.follow(user, now.id, author, action).await?;
        Ok(Some(action))
    }

    async fn share(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> CoreResult<ActionOutcome> {
        let user = persona.user_id()?;
        let request = ReadRequest {
            articles: true,
            ..persona.recommenders.content.clone()
        };
        let target = match pick(self.services.content.read(user, &request).await, rng) {
            Ok(target) => target,
            Err(reason) => return Ok(ActionOutcome::skipped(Action::Share, reason)),
        };

        let article = match self.services.social.article(target).await? {
            Some(article) => format!("{} - {}", article.title, article.summary),
            None => self.services.social.content_text(target).await?,
        };
        let strategy = persona.strategy().clone();
        let raw = strategy
            .compose(persona, Composition::Share { article: &article }, rng)
            .await?;
        let Some(publication) = build_publication(&raw, &persona.name, Vec::new(), &self.settings.emotions) else {
            return Ok(ActionOutcome::skipped(Action::Share, SkipReason::TooShort));
        };

        self.services.social.share(user, now.id, target, &publication).await?;
        Ok(ActionOutcome::Performed(Action::Share))
    }

    async fn follow(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> CoreResult<ActionOutcome> {
        if persona.behavior.probability_of_daily_follow <= 0.0 {
            return Ok(ActionOutcome::skipped(Action::Follow, SkipReason::FollowDisabled));
        }
        let user = persona.user_id()?;
        let suggestions = match self
            .services
            .follows
            .follow_suggestions(user, &persona.recommenders.follows)
            .await
        {
            Fetched::Found(map) => map,
            Fetched::Empty => return Ok(ActionOutcome::skipped(Action::Follow, SkipReason::NoCandidates)),
            Fetched::Failed(e) => return Err(e.into()),
        };

        let Some(target) = sample_weighted(suggestions.into_iter().collect(), user, rng) else {
            return Ok(ActionOutcome::skipped(Action::Follow, SkipReason::NoCandidates));
        };
        self.services
            .social
            .follow(user, now.id, target, FollowAction::Follow)
            .await?;
        Ok(ActionOutcome::Performed(Action::Follow))
    }

    async fn cast(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> CoreResult<ActionOutcome> {
        let user = persona.user_id()?;
        let read = persona.recommenders.content.clone();
        let target = match pick(self.services.content.read(user, &read).await, rng) {
            Ok(target) => target,
            Err(reason) => return Ok(ActionOutcome::skipped(Action::Cast, reason)),
        };

        let text = self.services.social.content_text(target).await?;
        let Some(vote) = persona.strategy().vote(persona, &text, rng).await? else {
            return Ok(ActionOutcome::skipped(Action::Cast, SkipReason::Undecided));
        };
        self.services.social.cast_vote(user, now.id, target, vote).await?;
        Ok(ActionOutcome::Performed(Action::Cast))
    }

    async fn image(&self, persona: &mut AgentPersona, now: SimTime, rng: &mut SimRng) -> CoreResult<ActionOutcome> {
        let user = persona.user_id()?;
        let mut image = match self.services.images.candidate_image().await {
            Fetched::Found(image) => image,
            Fetched::Empty => return Ok(ActionOutcome::skipped(Action::Image, SkipReason::NoCandidates)),
            Fetched::Failed(e) => return Err(e.into()),
        };

        if image.description.is_none() {
            match self.services.annotator.describe(&image.url).await {
                Ok(description) => {
                    self.services.images.set_description(image.id, &description).await?;
                    image.description = Some(description);
                }
                Err(e) => {
                    self.services.images.discard(image.id).await?;
                    return Err(e.into());
                }
            }
        }
        let description = image.description.clone().unwrap_or_default();

        let strategy = persona.strategy().clone();
        let raw = strategy
            .compose(persona, Composition::ImageComment { description: &description }, rng)
            .await?;
        let Some(publication) = build_publication(&raw, &persona.name, Vec::new(), &self.settings.emotions) else {
            return Ok(ActionOutcome::skipped(Action::Image, SkipReason::TooShort));
        };
        self.services.social.comment_image(user, now.id, &image, &publication).await?;
        Ok(ActionOutcome::Performed(Action::Image))
    }
}

/// Picks one id uniformly from a gateway result.
fn pick(candidates: Fetched<Vec<ContentId>>, rng: &mut SimRng) -> Result<ContentId, SkipReason> {
    match candidates {
        Fetched::Found(ids) => ids.choose(rng).copied().ok_or(SkipReason::NoCandidates),
        Fetched::Empty => Err(SkipReason::NoCandidates),
        Fetched::Failed(e) => Err(SkipReason::Failed(e.to_string())),
    }
}

/// Normalizes weights and draws one candidate, never `own`.
fn sample_weighted(mut weights: Vec<(UserId, f64)>, own: UserId, rng: &mut SimRng) -> Option<UserId> {
    weights.retain(|(id, w)| *id != own && w.is_finite() && *w > 0.0);
    weights.sort_by_key(|(id, _)| *id);
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    if weights.is_empty() || total <= 0.0 {
        return None;
    }
    let dist = WeightedIndex::new(weights.iter().map(|(_, w)| w / total)).ok()?;
    Some(weights[dist.sample(rng)].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Role;
    use crate::testkit::{registered, Recorder, ScriptedOracle};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn now() -> SimTime {
        SimTime::new(0, 3, 3)
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(11)
    }

    #[tokio::test]
    async fn test_comment_with_no_candidates_makes_no_calls() {
        let recorder = Recorder::new();
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);
        let before = persona.clone();

        let outcome = selector.dispatch(&mut persona, Action::Comment, now(), &mut rng()).await;

        assert_eq!(outcome, ActionOutcome::skipped(Action::Comment, SkipReason::NoCandidates));
        assert_eq!(recorder.social_calls(), 0);
        assert_eq!(persona.interests, before.interests);
        assert_eq!(persona.opinions, before.opinions);
    }

    #[tokio::test]
    async fn test_follow_disabled_never_calls_follow() {
        let recorder = Recorder::new();
        recorder.set_suggestions(HashMap::from([(UserId(2), 1.0), (UserId(3), 4.0)]));
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);
        persona.behavior.probability_of_daily_follow = 0.0;

        let outcome = selector.dispatch(&mut persona, Action::Follow, now(), &mut rng()).await;

        assert_eq!(outcome, ActionOutcome::skipped(Action::Follow, SkipReason::FollowDisabled));
        assert!(recorder.follows().is_empty());
        assert_eq!(recorder.gateway_calls(), 0);
    }

    #[tokio::test]
    async fn test_follow_samples_suggested_target() {
        let recorder = Recorder::new();
        recorder.set_suggestions(HashMap::from([(UserId(2), 0.0), (UserId(3), 5.0)]));
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);
        persona.behavior.probability_of_daily_follow = 0.5;

        let outcome = selector.dispatch(&mut persona, Action::Follow, now(), &mut rng()).await;

        assert_eq!(outcome, ActionOutcome::Performed(Action::Follow));
        assert_eq!(recorder.follows(), vec![(UserId(1), UserId(3), FollowAction::Follow)]);
    }

    #[tokio::test]
    async fn test_comment_reacts_without_follow_check() {
        let recorder = Recorder::new();
        recorder.set_feed(vec![ContentId(10)]);
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);
        persona.behavior.probability_of_secondary_follow = 0.0;

        let outcome = selector.dispatch(&mut persona, Action::Comment, now(), &mut rng()).await;

        assert_eq!(outcome, ActionOutcome::Performed(Action::Comment));
        assert_eq!(recorder.comments(), vec![(UserId(1), ContentId(10))]);
        assert_eq!(recorder.reactions().len(), 1);
        assert!(recorder.follows().is_empty());
    }

    #[tokio::test]
    async fn test_page_cannot_comment() {
        let recorder = Recorder::new();
        recorder.set_feed(vec![ContentId(10)]);
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut page = registered(Role::Page, 1);

        let outcome = selector.dispatch(&mut page, Action::Comment, now(), &mut rng()).await;
        assert_eq!(outcome, ActionOutcome::skipped(Action::Comment, SkipReason::NotAllowed));

        let report = selector
            .run_turn(
                &mut page,
                &ActionWeights::from_pairs(vec![(Action::Post, 1.0)]).unwrap(),
                now(),
                &mut rng(),
                None,
            )
            .await;
        assert!(report.reply.is_none());
        assert!(recorder.comments().is_empty());
    }

    #[tokio::test]
    async fn test_page_cannot_share() {
        let recorder = Recorder::new();
        recorder.set_feed(vec![ContentId(10)]);
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut page = registered(Role::Page, 1);

        let outcome = selector.dispatch(&mut page, Action::Share, now(), &mut rng()).await;
        assert_eq!(outcome, ActionOutcome::skipped(Action::Share, SkipReason::NotAllowed));
        assert_eq!(recorder.social_calls(), 0);
        assert_eq!(recorder.gateway_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_error_payload_skips() {
        let recorder = Recorder::new();
        recorder.fail_search();
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);

        let outcome = selector.dispatch(&mut persona, Action::Search, now(), &mut rng()).await;
        assert!(matches!(
            outcome,
            ActionOutcome::Skipped { action: Action::Search, reason: SkipReason::Failed(_) }
        ));
        assert_eq!(recorder.social_calls(), 0);
    }

    #[tokio::test]
    async fn test_secondary_follow_disabled_returns_none() {
        let recorder = Recorder::new();
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);
        persona.behavior.probability_of_secondary_follow = 0.0;

        let taken = selector
            .evaluate_follow(&persona, ContentId(10), FollowAction::Follow, now(), &mut rng())
            .await
            .unwrap();
        assert_eq!(taken, None);
        assert_eq!(recorder.social_calls(), 0);
    }

    #[tokio::test]
    async fn test_secondary_follow_follows_author_on_yes() {
        let recorder = Recorder::new();
        recorder.set_author(ContentId(10), UserId(7));
        let oracle = ScriptedOracle::new(["YES"]);
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = crate::testkit::registered_with_oracle(Role::User, 1, oracle);
        persona.behavior.probability_of_secondary_follow = 1.0;

        let taken = selector
            .evaluate_follow(&persona, ContentId(10), FollowAction::Follow, now(), &mut rng())
            .await
            .unwrap();
        assert_eq!(taken, Some(FollowAction::Follow));
        assert_eq!(recorder.follows(), vec![(UserId(1), UserId(7), FollowAction::Follow)]);
    }

    #[tokio::test]
    async fn test_no_recognized_keyword_is_noop() {
        let recorder = Recorder::new();
        let oracle = ScriptedOracle::new(["hmm, hard to say"]);
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = crate::testkit::registered_with_oracle(Role::User, 1, oracle);

        let outcome = selector
            .select_action(&mut persona, &[Action::Post, Action::Read, Action::None], now(), &mut rng())
            .await;
        assert_eq!(outcome, ActionOutcome::NoDecision);
        assert_eq!(recorder.social_calls(), 0);
    }

    #[tokio::test]
    async fn test_reply_comments_on_mention() {
        let recorder = Recorder::new();
        recorder.set_mentions(vec![ContentId(4)]);
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);
        persona.behavior.probability_of_secondary_follow = 0.0;

        let outcome = selector.reply(&mut persona, now(), &mut rng()).await;
        assert_eq!(outcome, ActionOutcome::Performed(Action::Reply));
        assert_eq!(recorder.comments(), vec![(UserId(1), ContentId(4))]);
    }

    #[tokio::test]
    async fn test_image_discarded_when_annotation_fails() {
        let recorder = Recorder::new();
        recorder.set_image(None);
        recorder.fail_annotation();
        let selector = ActionSelector::new(recorder.services(), SelectorSettings::default());
        let mut persona = registered(Role::User, 1);

        let outcome = selector.dispatch(&mut persona, Action::Image, now(), &mut rng()).await;
        assert!(matches!(outcome, ActionOutcome::Skipped { reason: SkipReason::Failed(_), .. }));
        assert_eq!(recorder.discarded(), vec![1]);
    }

    #[test]
    fn test_sample_weighted_skips_self_and_zero() {
        let mut rng = rng();
        let weights = vec![(UserId(1), 9.0), (UserId(2), 0.0), (UserId(5), 1.0)];
        for _ in 0..10 {
            assert_eq!(sample_weighted(weights.clone(), UserId(1), &mut rng), Some(UserId(5)));
        }
        assert_eq!(sample_weighted(vec![(UserId(2), 0.0)], UserId(1), &mut rng), None);
    }
}
