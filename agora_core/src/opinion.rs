//! Opinion dynamics.
//!
//! Each persona holds a continuous score in `[0, 1]` per topic. Scores map to
//! discrete labels through ordered half-open intervals `[lower, upper)`.
//! Two update models are available:
//!
//! - **Bounded confidence**: attraction inside the confidence bound
//!   `epsilon`, optional repulsion `theta` outside it.
//! - **Oracle evaluation**: the persona's decision strategy judges the
//!   partner's stance (AGREE / DISAGREE / NEUTRAL) and the label moves by
//!   one step along the label axis.
//!
//! Both are driven by [`OpinionEngine::apply_interaction`], which reads the
//! topics of the content just interacted with, both parties' scores, and
//! pushes the updated map back to the service of record.

use std::collections::BTreeMap;
use std::sync::Arc;

use agora_env::{ContentId, Interest, OpinionUpdate, SimTime, SocialService, TopicId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persona::AgentPersona;
use crate::prompt::{PromptBook, PromptVars};
use crate::{CoreError, CoreResult, SimRng};

/// Label returned when no interval contains the score.
pub const UNKNOWN_LABEL: &str = "unknown";

// ===== Discrete groups =====

/// One labelled interval `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionGroup {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
}

impl OpinionGroup {
    pub fn new(label: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            label: label.into(),
            lower,
            upper,
        }
    }

    pub fn contains(&self, score: f64) -> bool {
        self.lower <= score && score < self.upper
    }

    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

/// Direction of a one-step label shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftDirection {
    Toward,
    Away,
}

/// Ordered, gapless, non-overlapping label intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct OpinionGroups {
    /// Sorted by lower bound
    groups: Vec<OpinionGroup>,
}

impl OpinionGroups {
    /// Validates and orders the intervals.
    pub fn new(mut groups: Vec<OpinionGroup>) -> CoreResult<Self> {
        if groups.is_empty() {
            return Err(CoreError::config("opinion groups must not be empty"));
        }
        groups.sort_by(|a, b| a.lower.total_cmp(&b.lower));

        for group in &groups {
            if !(group.lower < group.upper) {
                return Err(CoreError::config(format!(
                    "opinion group '{}' has an empty interval",
                    group.label
                )));
            }
        }
        for pair in groups.windows(2) {
            if pair[0].upper != pair[1].lower {
                return Err(CoreError::config(format!(
                    "opinion groups '{}' and '{}' leave a gap or overlap",
                    pair[0].label, pair[1].label
                )));
            }
        }
        for (i, group) in groups.iter().enumerate() {
            if groups[..i].iter().any(|g| g.label == group.label) {
                return Err(CoreError::config(format!("duplicate opinion label '{}'", group.label)));
            }
        }
        Ok(Self { groups })
    }

    /// Returns the label whose interval holds `score`, or [`UNKNOWN_LABEL`].
    ///
    /// With intervals covering `[0, 1)`, a score of exactly `1.0` is unknown.
    pub fn classify(&self, score: f64) -> &str {
        self.groups
            .iter()
            .find(|g| g.contains(score))
            .map(|g| g.label.as_str())
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.label.as_str())
    }

    fn index_of(&self, label: &str) -> CoreResult<usize> {
        self.groups
            .iter()
            .position(|g| g.label == label)
            .ok_or_else(|| CoreError::UnknownLabel(label.to_string()))
    }

    pub fn midpoint(&self, label: &str) -> CoreResult<f64> {
        Ok(self.groups[self.index_of(label)?].midpoint())
    }

    /// Moves `from` one step toward or away from `reference`, clamped to the
    /// ends of the axis. Returns the new label and its midpoint.
    ///
    /// When `from == reference` the label is kept whatever the direction.
    pub fn shift(&self, from: &str, reference: &str, direction: ShiftDirection) -> CoreResult<(&str, f64)> {
        let a = self.index_of(from)? as i64;
        let b = self.index_of(reference)? as i64;
        if a == b {
            let g = &self.groups[a as usize];
            return Ok((g.label.as_str(), g.midpoint()));
        }

        let toward = (b - a).signum();
        let step = match direction {
            ShiftDirection::Toward => toward,
            ShiftDirection::Away => -toward,
        };
        let target = (a + step).clamp(0, self.groups.len() as i64 - 1) as usize;
        let g = &self.groups[target];
        Ok((g.label.as_str(), g.midpoint()))
    }
}

impl Default for OpinionGroups {
    fn default() -> Self {
        Self {
            groups: default_groups(),
        }
    }
}

/// Five evenly sized groups over `[0, 1)`.
pub fn default_groups() -> Vec<OpinionGroup> {
    vec![
        OpinionGroup::new("strongly against", 0.0, 0.2),
        OpinionGroup::new("against", 0.2, 0.4),
        OpinionGroup::new("neutral", 0.4, 0.6),
        OpinionGroup::new("in favor", 0.6, 0.8),
        OpinionGroup::new("strongly in favor", 0.8, 1.0),
    ]
}

// ===== Update models =====

/// Initial score for a topic the persona has no opinion on yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColdStart {
    /// Start at 0.5
    #[default]
    Neutral,

    /// Adopt the partner's score
    Inherited,
}

impl ColdStart {
    pub fn initial(&self, partner: f64) -> f64 {
        match self {
            Self::Neutral => 0.5,
            Self::Inherited => partner,
        }
    }
}

/// Bounded-confidence parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundedConfidence {
    /// Confidence bound
    pub epsilon: f64,

    /// Convergence rate
    pub mu: f64,

    /// Repulsion step outside the bound; 0 disables repulsion
    pub theta: f64,

    pub cold_start: ColdStart,

    /// Clamp the convergence branch to `[0, 1]` as well
    pub clamp_convergence: bool,
}

impl Default for BoundedConfidence {
    fn default() -> Self {
        Self {
            epsilon: 0.25,
            mu: 0.5,
            theta: 0.0,
            cold_start: ColdStart::Neutral,
            clamp_convergence: false,
        }
    }
}

impl BoundedConfidence {
    /// Updates `x` after meeting an opinion `y`.
    ///
    /// Outside `epsilon` with a non-zero `theta` the score is pushed away
    /// and clamped. Otherwise it converges by `mu * |x - y|`, unclamped
    /// unless `clamp_convergence` is set.
    pub fn update(&self, x: Option<f64>, y: f64) -> f64 {
        let Some(x) = x else {
            return self.cold_start.initial(y);
        };

        let gap = (x - y).abs();
        if gap > self.epsilon && self.theta != 0.0 {
            return if x > y {
                (x + self.theta).min(1.0)
            } else {
                (x - self.theta).max(0.0)
            };
        }
        let moved = x + self.mu * gap;
        if self.clamp_convergence {
            moved.clamp(0.0, 1.0)
        } else {
            moved
        }
    }
}

/// Whose opinions frame an oracle judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationScope {
    /// Only the interaction partner
    #[default]
    InterlocutorOnly,

    /// Partner plus the label distribution among followed accounts
    PeerGroup,
}

/// Oracle-evaluation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleEvaluation {
    pub scope: EvaluationScope,
    pub cold_start: ColdStart,

    /// Shift applied on DISAGREE
    pub disagreement: ShiftDirection,
}

impl Default for OracleEvaluation {
    fn default() -> Self {
        Self {
            scope: EvaluationScope::InterlocutorOnly,
            cold_start: ColdStart::Neutral,
            disagreement: ShiftDirection::Toward,
        }
    }
}

/// Configured opinion model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpinionModel {
    BoundedConfidence(BoundedConfidence),
    OracleEvaluation(OracleEvaluation),
}

impl Default for OpinionModel {
    fn default() -> Self {
        Self::BoundedConfidence(BoundedConfidence::default())
    }
}

/// Oracle verdict on a partner's stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Judgment {
    Agree,
    Disagree,
    Neutral,
}

impl Judgment {
    pub const ALL: [Judgment; 3] = [Judgment::Agree, Judgment::Disagree, Judgment::Neutral];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Agree => "AGREE",
            Self::Disagree => "DISAGREE",
            Self::Neutral => "NEUTRAL",
        }
    }

    /// Reads the first whole-word verdict in `text`.
    ///
    /// Matching is per token, so `DISAGREE` is never read as `AGREE`.
    pub fn parse(text: &str) -> Option<Self> {
        crate::action::tokenize(text)
            .find_map(|token| Self::ALL.into_iter().find(|j| j.keyword() == token))
    }
}

// ===== Engine =====

/// Applies the configured model after an interaction.
pub struct OpinionEngine {
    social: Arc<dyn SocialService>,
    model: OpinionModel,
    groups: OpinionGroups,
    prompts: Arc<PromptBook>,
}

impl OpinionEngine {
    pub fn new(
        social: Arc<dyn SocialService>,
        model: OpinionModel,
        groups: OpinionGroups,
        prompts: Arc<PromptBook>,
    ) -> Self {
        Self {
            social,
            model,
            groups,
            prompts,
        }
    }

    pub fn groups(&self) -> &OpinionGroups {
        &self.groups
    }

    /// Updates the persona's opinions on the topics of `content`.
    ///
    /// Topics the author holds a score on are updated; topics the persona
    /// has no score on go through the cold-start rule. The new scores are
    /// stored locally and pushed to the service, attributed to the author
    /// and to the slot of `now`.
    pub async fn apply_interaction(
        &self,
        persona: &mut AgentPersona,
        content: ContentId,
        now: SimTime,
        rng: &mut SimRng,
    ) -> CoreResult<BTreeMap<TopicId, f64>> {
        let user = persona.user_id()?;
        let topics = self.social.content_topics(content).await?;
        if topics.is_empty() {
            return Ok(BTreeMap::new());
        }

        let author = self.social.author(content).await?;
        if author == user {
            return Ok(BTreeMap::new());
        }

        let partner = self.social.opinions(author).await?;
        let own = self.social.opinions(user).await?;

        let mut updated = BTreeMap::new();
        for topic in &topics {
            let Some(&y) = partner.get(&topic.id) else {
                continue;
            };
            let x = own.get(&topic.id).copied();
            let score = match self.model {
                OpinionModel::BoundedConfidence(params) => params.update(x, y),
                OpinionModel::OracleEvaluation(params) => {
                    self.evaluate(persona, user, topic, x, y, &params, rng).await?
                }
            };
            updated.insert(topic.id, score);
        }

        if updated.is_empty() {
            return Ok(updated);
        }

        persona.opinions.extend(updated.iter().map(|(k, v)| (*k, *v)));
        self.social
            .set_opinions(&OpinionUpdate {
                user,
                opinions: updated.clone(),
                content,
                interacted_with: author,
                slot: now.id,
            })
            .await?;
        debug!(agent = %user, partner = %author, topics = updated.len(), "opinions updated");
        Ok(updated)
    }

    #[allow(clippy::too_many_arguments)]
    async fn evaluate(
        &self,
        persona: &AgentPersona,
        user: UserId,
        topic: &Interest,
        x: Option<f64>,
        y: f64,
        params: &OracleEvaluation,
        rng: &mut SimRng,
    ) -> CoreResult<f64> {
        let Some(x) = x else {
            return Ok(params.cold_start.initial(y));
        };

        let own_label = self.groups.classify(x);
        let partner_label = self.groups.classify(y);
        if own_label == UNKNOWN_LABEL || partner_label == UNKNOWN_LABEL {
            warn!(agent = %user, topic = %topic.name, x, y, "score outside opinion groups, kept");
            return Ok(x);
        }

        let peers = match params.scope {
            EvaluationScope::InterlocutorOnly => String::new(),
            EvaluationScope::PeerGroup => {
                let scores = self.social.peer_opinions(user, topic.id).await?;
                self.peer_distribution(&scores)
            }
        };

        let mut vars = PromptVars::new();
        vars.set("topic", &topic.name)
            .set("own_opinion", own_label)
            .set("author_opinion", partner_label)
            .set("peer_opinions", peers);
        let instruction = self.prompts.render(&self.prompts.opinion_judgment, &vars)?;

        let verdict = persona.strategy().judge(persona, &instruction, rng).await?;
        let direction = match verdict {
            Some(Judgment::Agree) => ShiftDirection::Toward,
            Some(Judgment::Disagree) => params.disagreement,
            Some(Judgment::Neutral) | None => return Ok(x),
        };
        let (_, midpoint) = self.groups.shift(own_label, partner_label, direction)?;
        Ok(midpoint)
    }

    /// Renders `Opinion: 'label' (count)` lines for peer scores.
    fn peer_distribution(&self, scores: &[f64]) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for score in scores {
            *counts.entry(self.groups.classify(*score)).or_default() += 1;
        }
        if counts.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = counts
            .iter()
            .map(|(label, n)| format!("Opinion: '{}' ({})", label, n))
            .collect();
        format!("Your friends hold these opinions:\n{}\n", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Role;
    use crate::testkit::{registered, registered_with_oracle, Recorder, ScriptedOracle};
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn bc(epsilon: f64, mu: f64, theta: f64, cold_start: ColdStart) -> BoundedConfidence {
        BoundedConfidence {
            epsilon,
            mu,
            theta,
            cold_start,
            clamp_convergence: false,
        }
    }

    #[test]
    fn test_classify_half_open() {
        let groups = OpinionGroups::default();
        assert_eq!(groups.classify(0.0), "strongly against");
        assert_eq!(groups.classify(0.2), "against");
        assert_eq!(groups.classify(0.5999), "neutral");
        assert_eq!(groups.classify(0.99), "strongly in favor");
        assert_eq!(groups.classify(1.0), UNKNOWN_LABEL);
        assert_eq!(groups.classify(-0.1), UNKNOWN_LABEL);
    }

    #[test]
    fn test_groups_reject_gaps() {
        let gap = vec![OpinionGroup::new("low", 0.0, 0.4), OpinionGroup::new("high", 0.5, 1.0)];
        assert!(OpinionGroups::new(gap).is_err());

        let overlap = vec![OpinionGroup::new("low", 0.0, 0.6), OpinionGroup::new("high", 0.5, 1.0)];
        assert!(OpinionGroups::new(overlap).is_err());
    }

    #[test]
    fn test_groups_sorted_by_lower_bound() {
        let groups = OpinionGroups::new(vec![
            OpinionGroup::new("high", 0.5, 1.0),
            OpinionGroup::new("low", 0.0, 0.5),
        ])
        .unwrap();
        assert_eq!(groups.labels().collect::<Vec<_>>(), vec!["low", "high"]);
    }

    #[test]
    fn test_cold_start() {
        assert_relative_eq!(bc(0.25, 0.5, 0.0, ColdStart::Neutral).update(None, 0.9), 0.5);
        assert_relative_eq!(bc(0.25, 0.5, 0.0, ColdStart::Inherited).update(None, 0.9), 0.9);
    }

    #[test]
    fn test_agreement_zero_gap() {
        assert_relative_eq!(bc(0.25, 0.5, 0.0, ColdStart::Neutral).update(Some(0.5), 0.5), 0.5);
    }

    #[test]
    fn test_agreement_moves_by_mu_gap() {
        // |0.5 - 0.6| = 0.1 within bound: x + 0.5 * 0.1
        assert_relative_eq!(
            bc(0.25, 0.5, 0.0, ColdStart::Neutral).update(Some(0.5), 0.6),
            0.55,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_disagreement_repels_and_clamps() {
        let params = bc(0.25, 0.5, 0.1, ColdStart::Neutral);
        assert_relative_eq!(params.update(Some(0.2), 0.9), 0.1, epsilon = 1e-12);
        assert_relative_eq!(params.update(Some(0.05), 0.9), 0.0);
        assert_relative_eq!(params.update(Some(0.95), 0.1), 1.0);
    }

    #[test]
    fn test_disagreement_without_theta_converges() {
        // theta == 0 turns repulsion off; |0.2 - 0.9| > epsilon still moves by mu * gap
        assert_relative_eq!(
            bc(0.2, 0.5, 0.0, ColdStart::Neutral).update(Some(0.2), 0.9),
            0.55,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_convergence_is_unclamped_by_default() {
        let mut params = bc(0.25, 1.0, 0.0, ColdStart::Neutral);
        let moved = params.update(Some(0.95), 0.8);
        assert!(moved > 1.0);

        params.clamp_convergence = true;
        assert_relative_eq!(params.update(Some(0.95), 0.8), 1.0);
    }

    #[test]
    fn test_shift_toward_and_away() {
        let groups = OpinionGroups::default();
        let (label, mid) = groups.shift("against", "in favor", ShiftDirection::Toward).unwrap();
        assert_eq!(label, "neutral");
        assert_relative_eq!(mid, 0.5);

        let (label, _) = groups.shift("against", "in favor", ShiftDirection::Away).unwrap();
        assert_eq!(label, "strongly against");
    }

    #[test]
    fn test_shift_clamps_at_axis_ends() {
        let groups = OpinionGroups::default();
        let (label, _) = groups
            .shift("strongly against", "in favor", ShiftDirection::Away)
            .unwrap();
        assert_eq!(label, "strongly against");

        let (label, _) = groups
            .shift("strongly in favor", "against", ShiftDirection::Away)
            .unwrap();
        assert_eq!(label, "strongly in favor");
    }

    #[test]
    fn test_shift_same_label_returns_own_midpoint() {
        let groups = OpinionGroups::default();
        for direction in [ShiftDirection::Toward, ShiftDirection::Away] {
            let (label, mid) = groups.shift("in favor", "in favor", direction).unwrap();
            assert_eq!(label, "in favor");
            assert_relative_eq!(mid, 0.7);
        }
    }

    #[test]
    fn test_shift_unknown_label_errors() {
        let groups = OpinionGroups::default();
        assert!(matches!(
            groups.shift(UNKNOWN_LABEL, "neutral", ShiftDirection::Toward),
            Err(CoreError::UnknownLabel(_))
        ));
    }

    #[test]
    fn test_judgment_parse_whole_words() {
        assert_eq!(Judgment::parse("I DISAGREE."), Some(Judgment::Disagree));
        assert_eq!(Judgment::parse("agree"), Some(Judgment::Agree));
        assert_eq!(Judgment::parse("neutral, mostly"), Some(Judgment::Neutral));
        assert_eq!(Judgment::parse("no idea"), None);
    }

    #[test]
    fn test_model_config_tagged() {
        let model: OpinionModel =
            serde_json::from_str(r#"{"kind": "oracle_evaluation", "disagreement": "away"}"#).unwrap();
        assert_eq!(
            model,
            OpinionModel::OracleEvaluation(OracleEvaluation {
                disagreement: ShiftDirection::Away,
                ..Default::default()
            })
        );
    }

    const HOUSING: TopicId = TopicId(1);
    const TRANSIT: TopicId = TopicId(2);

    /// Persona 1 ("against" on housing) comments on content 5 by persona 2
    /// ("in favor"), answering every judgment with `answer`.
    async fn judged_interaction(
        answer: &'static str,
        disagreement: ShiftDirection,
    ) -> (Arc<Recorder>, AgentPersona, BTreeMap<TopicId, f64>) {
        let recorder = Recorder::new();
        recorder.set_author(ContentId(5), UserId(2));
        recorder.set_topics(
            ContentId(5),
            vec![
                Interest { id: HOUSING, name: "housing".to_string() },
                Interest { id: TRANSIT, name: "transit".to_string() },
            ],
        );
        recorder.set_opinions(UserId(1), BTreeMap::from([(HOUSING, 0.3)]));
        recorder.set_opinions(UserId(2), BTreeMap::from([(HOUSING, 0.7)]));

        let engine = OpinionEngine::new(
            recorder.clone(),
            OpinionModel::OracleEvaluation(OracleEvaluation {
                disagreement,
                ..Default::default()
            }),
            OpinionGroups::default(),
            Arc::new(PromptBook::default()),
        );
        let mut persona = registered_with_oracle(Role::User, 1, ScriptedOracle::new([answer]));
        let mut rng = SimRng::seed_from_u64(3);
        let updated = engine
            .apply_interaction(&mut persona, ContentId(5), SimTime::new(0, 3, 17), &mut rng)
            .await
            .unwrap();
        (recorder, persona, updated)
    }

    #[tokio::test]
    async fn test_agree_shifts_toward_partner() {
        let (recorder, persona, updated) = judged_interaction("I AGREE", ShiftDirection::Away).await;
        assert_relative_eq!(updated[&HOUSING], 0.5);
        assert_relative_eq!(persona.opinions[&HOUSING], 0.5);

        let pushed = recorder.opinion_updates();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].user, UserId(1));
        assert_eq!(pushed[0].interacted_with, UserId(2));
        assert_eq!(pushed[0].content, ContentId(5));
        assert_eq!(pushed[0].slot, 17);
    }

    #[tokio::test]
    async fn test_disagree_follows_configured_direction() {
        let (_, _, toward) = judged_interaction("DISAGREE", ShiftDirection::Toward).await;
        assert_relative_eq!(toward[&HOUSING], 0.5);

        let (recorder, _, away) = judged_interaction("DISAGREE", ShiftDirection::Away).await;
        assert_relative_eq!(away[&HOUSING], 0.1, epsilon = 1e-12);
        assert_relative_eq!(recorder.opinion_updates()[0].opinions[&HOUSING], 0.1, epsilon = 1e-12);
    }

    #[tokio::test]
    async fn test_neutral_keeps_score() {
        let (recorder, _, updated) = judged_interaction("neutral", ShiftDirection::Toward).await;
        assert_relative_eq!(updated[&HOUSING], 0.3);
        assert_relative_eq!(recorder.opinion_updates()[0].opinions[&HOUSING], 0.3);
    }

    #[tokio::test]
    async fn test_topics_without_partner_score_are_skipped() {
        let (_, _, updated) = judged_interaction("AGREE", ShiftDirection::Toward).await;
        assert!(!updated.contains_key(&TRANSIT));
        assert_eq!(updated.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_own_score_uses_cold_start() {
        let recorder = Recorder::new();
        recorder.set_author(ContentId(5), UserId(2));
        recorder.set_topics(ContentId(5), vec![Interest { id: HOUSING, name: "housing".to_string() }]);
        recorder.set_opinions(UserId(2), BTreeMap::from([(HOUSING, 0.9)]));

        let engine = OpinionEngine::new(
            recorder.clone(),
            OpinionModel::BoundedConfidence(bc(0.25, 0.5, 0.0, ColdStart::Inherited)),
            OpinionGroups::default(),
            Arc::new(PromptBook::default()),
        );
        let mut persona = registered(Role::User, 1);
        let mut rng = SimRng::seed_from_u64(3);
        let updated = engine
            .apply_interaction(&mut persona, ContentId(5), SimTime::new(1, 0, 30), &mut rng)
            .await
            .unwrap();

        assert_relative_eq!(updated[&HOUSING], 0.9);
        assert_eq!(recorder.opinion_updates()[0].slot, 30);
    }

    proptest! {
        #[test]
        fn prop_classify_returns_containing_label(score in 0.0f64..1.0) {
            let groups = OpinionGroups::default();
            let label = groups.classify(score);
            let group = default_groups().into_iter().find(|g| g.label == label).unwrap();
            prop_assert!(group.lower <= score && score < group.upper);
        }

        #[test]
        fn prop_shift_stays_on_axis(a in 0usize..5, b in 0usize..5, away in any::<bool>()) {
            let groups = OpinionGroups::default();
            let labels: Vec<String> = groups.labels().map(str::to_string).collect();
            let direction = if away { ShiftDirection::Away } else { ShiftDirection::Toward };
            let (label, mid) = groups.shift(&labels[a], &labels[b], direction).unwrap();
            prop_assert!(labels.iter().any(|l| l == label));
            prop_assert!((0.0..1.0).contains(&mid));
        }
    }
}
