//! SimWorld - in-memory social network for deterministic runs.
//!
//! Implements every collaborator trait of `agora_env` on top of plain
//! collections guarded by one lock. All choices the service of record makes
//! (who churns, which follow suggestions come back, which image is offered)
//! are drawn from a ChaCha8 RNG derived from the world seed.
//!
//! Registered personas start with a random opinion on each declared
//! interest; the newsroom is neutral on every topic.

use agora_env::{
    Article, ContentGateway, ContentId, EnvError, Fetched, FollowAction, FollowGateway, FollowRequest,
    ImageAsset, ImageLibrary, Interest, OpinionUpdate, PopulationRegistry, Publication, ReactionKind,
    ReadRequest, Registration, SimTime, SocialService, TimeSource, TopicId, UserId, Vote,
};
use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration of the simulated service of record.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Master seed
    pub seed: u64,

    /// Topic catalogue; registrations may add more
    pub topics: Vec<String>,

    /// News articles published by the newsroom account at start
    pub articles: usize,

    /// Images available to the IMAGE action
    pub images: usize,

    /// Probability that a write fails with a transport error
    pub failure_rate: f64,

    /// Yield to the scheduler before every time read, so concurrent
    /// writers interleave between slots
    pub yield_on_time: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            topics: ["politics", "sports", "technology", "music", "science", "travel", "food"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            articles: 12,
            images: 4,
            failure_rate: 0.0,
            yield_on_time: false,
        }
    }
}

/// Counters exported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorldStats {
    pub registered: usize,
    pub active: usize,
    pub contents: usize,
    pub comments: usize,
    pub follows: usize,
    pub reactions: usize,
    pub votes: usize,
    pub opinion_updates: usize,
    pub time_writes: usize,
    pub injected_failures: usize,
}

#[derive(Debug, Clone)]
struct UserRecord {
    registration: Registration,
    handle: String,
    left_on: Option<u64>,
}

/// What kind of publication a content record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Post,
    Comment,
    Share,
    ImageComment,
}

#[derive(Debug, Clone)]
struct ContentRecord {
    kind: ContentKind,
    author: UserId,
    text: String,
    parent: Option<ContentId>,
    topics: Vec<TopicId>,
    slot: u64,
    article: Option<Article>,
    mentions: Vec<UserId>,
}

struct WorldState {
    now: SimTime,
    time_log: Vec<SimTime>,

    users: BTreeMap<UserId, UserRecord>,
    next_user: u64,
    contents: BTreeMap<ContentId, ContentRecord>,
    next_content: u64,
    topics: Vec<Interest>,

    follows: BTreeSet<(UserId, UserId)>,
    reactions: Vec<(UserId, ContentId, ReactionKind)>,
    votes: Vec<(UserId, ContentId, Vote)>,
    interests: HashMap<UserId, Vec<(u64, TopicId)>>,
    opinions: HashMap<UserId, BTreeMap<TopicId, f64>>,
    opinion_log: Vec<OpinionUpdate>,
    answered: HashSet<(UserId, ContentId)>,

    images: Vec<ImageAsset>,
    rng: ChaCha8Rng,
    injected_failures: usize,
}

/// The simulated social network.
pub struct SimWorld {
    config: WorldConfig,
    state: Mutex<WorldState>,
}

/// Account publishing the seeded news articles.
pub const NEWSROOM: UserId = UserId(1);

impl SimWorld {
    /// Creates a world with its newsroom, articles and images.
    pub fn new(config: WorldConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_mul(0x9e3779b97f4a7c15));
        let topics = config
            .topics
            .iter()
            .enumerate()
            .map(|(i, name)| Interest {
                id: TopicId(i as u64 + 1),
                name: name.clone(),
            })
            .collect();

        let mut state = WorldState {
            now: SimTime::default(),
            time_log: Vec::new(),
            users: BTreeMap::new(),
            next_user: NEWSROOM.0,
            contents: BTreeMap::new(),
            next_content: 0,
            topics,
            follows: BTreeSet::new(),
            reactions: Vec::new(),
            votes: Vec::new(),
            interests: HashMap::new(),
            opinions: HashMap::new(),
            opinion_log: Vec::new(),
            answered: HashSet::new(),
            images: Vec::new(),
            rng,
            injected_failures: 0,
        };
        state.seed_newsroom(config.articles, config.images);

        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Creates an Arc-wrapped world for sharing.
    pub fn shared(config: WorldConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every time the clock was written, in order.
    pub fn time_log(&self) -> Vec<SimTime> {
        self.state().time_log.clone()
    }

    pub fn opinion_log(&self) -> Vec<OpinionUpdate> {
        self.state().opinion_log.clone()
    }

    /// Ids of registered personas that have not churned.
    pub fn active_users(&self) -> Vec<UserId> {
        self.state()
            .users
            .iter()
            .filter(|(id, u)| **id != NEWSROOM && u.left_on.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_active(&self, user: UserId) -> bool {
        self.state().users.get(&user).map_or(false, |u| u.left_on.is_none())
    }

    /// Number of `kind` publications authored by `user`.
    pub fn authored(&self, user: UserId, kind: ContentKind) -> usize {
        self.state()
            .contents
            .values()
            .filter(|c| c.author == user && c.kind == kind)
            .count()
    }

    /// Number of reactions issued by `user`.
    pub fn reactions_by(&self, user: UserId) -> usize {
        self.state().reactions.iter().filter(|(u, _, _)| *u == user).count()
    }

    pub fn followers_of(&self, user: UserId) -> usize {
        self.state().follows.iter().filter(|(_, b)| *b == user).count()
    }

    pub fn stats(&self) -> WorldStats {
        let s = self.state();
        WorldStats {
            registered: s.users.len().saturating_sub(1),
            active: s
                .users
                .iter()
                .filter(|(id, u)| **id != NEWSROOM && u.left_on.is_none())
                .count(),
            contents: s.contents.len(),
            comments: s
                .contents
                .values()
                .filter(|c| c.kind == ContentKind::Comment)
                .count(),
            follows: s.follows.len(),
            reactions: s.reactions.len(),
            votes: s.votes.len(),
            opinion_updates: s.opinion_log.len(),
            time_writes: s.time_log.len(),
            injected_failures: s.injected_failures,
        }
    }

    /// Rolls the injected-failure die for a write.
    fn check_write(&self, s: &mut WorldState) -> Result<(), EnvError> {
        if self.config.failure_rate > 0.0 && s.rng.gen::<f64>() < self.config.failure_rate {
            s.injected_failures += 1;
            return Err(EnvError::transport("injected write failure"));
        }
        Ok(())
    }

    fn publish(
        &self,
        kind: ContentKind,
        user: UserId,
        slot: u64,
        parent: Option<ContentId>,
        publication: &Publication,
    ) -> Result<ContentId, EnvError> {
        let mut s = self.state();
        self.check_write(&mut s)?;
        s.require_active(user)?;

        let (topics, article, parent_author) = match parent {
            Some(parent) => {
                let record = s.content(parent)?;
                let topics = if publication.topics.is_empty() {
                    record.topics.clone()
                } else {
                    publication.topics.clone()
                };
                (topics, None, Some(record.author))
            }
            None => (publication.topics.clone(), None, None),
        };

        let mut mentions: Vec<UserId> = publication
            .mentions
            .iter()
            .filter_map(|m| s.user_by_handle(m.trim_start_matches('@')))
            .collect();
        // Replies notify the author of the replied-to content.
        if let Some(author) = parent_author {
            if author != user && !mentions.contains(&author) {
                mentions.push(author);
            }
        }
        if let Some(parent) = parent {
            s.answered.insert((user, parent));
        }

        let id = s.insert_content(ContentRecord {
            kind,
            author: user,
            text: publication.text.clone(),
            parent,
            topics,
            slot,
            article,
            mentions,
        });
        Ok(id)
    }
}

impl WorldState {
    fn seed_newsroom(&mut self, articles: usize, images: usize) {
        self.users.insert(
            NEWSROOM,
            UserRecord {
                registration: Registration {
                    name: "Newsroom".to_string(),
                    email: "newsroom@agora.sim".to_string(),
                    password: String::new(),
                    leaning: "center".to_string(),
                    age: 0,
                    gender: String::new(),
                    nationality: String::new(),
                    language: "English".to_string(),
                    education: String::new(),
                    toxicity: "no".to_string(),
                    interests: Vec::new(),
                    big_five: [0.5; 5],
                    round_actions: 0,
                    is_page: true,
                    joined_on: 0,
                },
                handle: "Newsroom".to_string(),
                left_on: None,
            },
        );

        let neutral = self.topics.iter().map(|t| (t.id, 0.5)).collect();
        self.opinions.insert(NEWSROOM, neutral);

        let mut article_ids = Vec::new();
        for i in 0..articles {
            let topic = self.topics[i % self.topics.len().max(1)].clone();
            let title = format!("Daily {} briefing #{}", topic.name, i + 1);
            let id = self.insert_content(ContentRecord {
                kind: ContentKind::Article,
                author: NEWSROOM,
                text: format!("{} #{}", title, topic.name),
                parent: None,
                topics: vec![topic.id],
                slot: 0,
                article: Some(Article {
                    title: title.clone(),
                    summary: format!("What happened today in {}.", topic.name),
                    source: "agora.sim".to_string(),
                }),
                mentions: Vec::new(),
            });
            article_ids.push(id);
        }

        for i in 0..images {
            self.images.push(ImageAsset {
                id: i as u64 + 1,
                url: format!("https://images.agora.sim/{}.jpg", i + 1),
                description: None,
                article: article_ids.get(i % article_ids.len().max(1)).copied(),
            });
        }
    }

    fn insert_content(&mut self, record: ContentRecord) -> ContentId {
        self.next_content += 1;
        let id = ContentId(self.next_content);
        self.contents.insert(id, record);
        id
    }

    fn content(&self, id: ContentId) -> Result<&ContentRecord, EnvError> {
        self.contents.get(&id).ok_or_else(|| EnvError::not_found(id))
    }

    fn require_user(&self, user: UserId) -> Result<&UserRecord, EnvError> {
        self.users.get(&user).ok_or_else(|| EnvError::not_found(user))
    }

    fn require_active(&self, user: UserId) -> Result<(), EnvError> {
        match self.require_user(user)?.left_on {
            None => Ok(()),
            Some(_) => Err(EnvError::not_found(format!("{} has left", user))),
        }
    }

    fn user_by_handle(&self, handle: &str) -> Option<UserId> {
        self.users
            .iter()
            .find(|(_, u)| u.handle.eq_ignore_ascii_case(handle))
            .map(|(id, _)| *id)
    }

    fn topic_named(&mut self, name: &str) -> TopicId {
        if let Some(topic) = self.topics.iter().find(|t| t.name == name) {
            return topic.id;
        }
        let id = TopicId(self.topics.len() as u64 + 1);
        self.topics.push(Interest {
            id,
            name: name.to_string(),
        });
        id
    }

    fn interest(&self, id: TopicId) -> Option<Interest> {
        self.topics.iter().find(|t| t.id == id).cloned()
    }

    fn is_visible(&self, record: &ContentRecord, window: u32) -> bool {
        record.slot + u64::from(window) >= self.now.id
    }

    fn recent_interests(&self, user: UserId, window: u32) -> Vec<TopicId> {
        let mut seen = Vec::new();
        if let Some(entries) = self.interests.get(&user) {
            for (slot, topic) in entries.iter().rev() {
                if slot + u64::from(window) >= self.now.id && !seen.contains(topic) {
                    seen.push(*topic);
                }
            }
        }
        seen
    }
}

#[async_trait]
impl TimeSource for SimWorld {
    async fn current_time(&self) -> Result<SimTime, EnvError> {
        if self.config.yield_on_time {
            tokio::task::yield_now().await;
        }
        Ok(self.state().now)
    }

    async fn update_time(&self, day: u32, slot: u32) -> Result<SimTime, EnvError> {
        let mut s = self.state();
        let stored = SimTime::new(day, slot, s.now.id + 1);
        s.now = stored;
        s.time_log.push(stored);
        Ok(stored)
    }
}

#[async_trait]
impl SocialService for SimWorld {
    async fn post(&self, user: UserId, slot: u64, post: &Publication) -> Result<ContentId, EnvError> {
        self.publish(ContentKind::Post, user, slot, None, post)
    }

    async fn comment(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        comment: &Publication,
    ) -> Result<ContentId, EnvError> {
        self.publish(ContentKind::Comment, user, slot, Some(target), comment)
    }

    async fn share(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        commentary: &Publication,
    ) -> Result<ContentId, EnvError> {
        let id = self.publish(ContentKind::Share, user, slot, Some(target), commentary)?;
        let mut s = self.state();
        let article = s.content(target)?.article.clone();
        if let Some(record) = s.contents.get_mut(&id) {
            record.article = article;
        }
        Ok(id)
    }

    async fn comment_image(
        &self,
        user: UserId,
        slot: u64,
        image: &ImageAsset,
        comment: &Publication,
    ) -> Result<ContentId, EnvError> {
        self.publish(ContentKind::ImageComment, user, slot, image.article, comment)
    }

    async fn react(&self, user: UserId, _slot: u64, target: ContentId, kind: ReactionKind) -> Result<(), EnvError> {
        let mut s = self.state();
        self.check_write(&mut s)?;
        s.require_active(user)?;
        s.content(target)?;
        s.reactions.push((user, target, kind));
        Ok(())
    }

    async fn follow(&self, user: UserId, _slot: u64, target: UserId, action: FollowAction) -> Result<(), EnvError> {
        let mut s = self.state();
        self.check_write(&mut s)?;
        s.require_active(user)?;
        s.require_user(target)?;
        match action {
            FollowAction::Follow => {
                s.follows.insert((user, target));
            }
            FollowAction::Unfollow => {
                s.follows.remove(&(user, target));
            }
        }
        Ok(())
    }

    async fn cast_vote(&self, user: UserId, _slot: u64, target: ContentId, vote: Vote) -> Result<(), EnvError> {
        let mut s = self.state();
        self.check_write(&mut s)?;
        s.content(target)?;
        s.votes.push((user, target, vote));
        Ok(())
    }

    async fn content_text(&self, content: ContentId) -> Result<String, EnvError> {
        Ok(self.state().content(content)?.text.clone())
    }

    async fn thread(&self, content: ContentId, max_len: usize) -> Result<Vec<String>, EnvError> {
        let s = self.state();
        let mut texts = Vec::new();
        let mut cursor = Some(content);
        while let Some(id) = cursor {
            let record = s.content(id)?;
            texts.push(record.text.clone());
            cursor = record.parent;
        }
        texts.truncate(max_len.max(1));
        texts.reverse();
        Ok(texts)
    }

    async fn article(&self, content: ContentId) -> Result<Option<Article>, EnvError> {
        Ok(self.state().content(content)?.article.clone())
    }

    async fn author(&self, content: ContentId) -> Result<UserId, EnvError> {
        Ok(self.state().content(content)?.author)
    }

    async fn content_topics(&self, content: ContentId) -> Result<Vec<Interest>, EnvError> {
        let s = self.state();
        let record = s.content(content)?;
        Ok(record.topics.iter().filter_map(|t| s.interest(*t)).collect())
    }

    async fn interests(&self, user: UserId, window: u32) -> Result<Vec<Interest>, EnvError> {
        let s = self.state();
        s.require_user(user)?;
        Ok(s.recent_interests(user, window)
            .into_iter()
            .filter_map(|t| s.interest(t))
            .collect())
    }

    async fn record_interests(&self, user: UserId, slot: u64, topics: &[TopicId]) -> Result<(), EnvError> {
        let mut s = self.state();
        s.require_user(user)?;
        let entries = s.interests.entry(user).or_default();
        entries.extend(topics.iter().map(|t| (slot, *t)));
        Ok(())
    }

    async fn opinions(&self, user: UserId) -> Result<BTreeMap<TopicId, f64>, EnvError> {
        Ok(self.state().opinions.get(&user).cloned().unwrap_or_default())
    }

    async fn set_opinions(&self, update: &OpinionUpdate) -> Result<(), EnvError> {
        let mut s = self.state();
        self.check_write(&mut s)?;
        s.require_user(update.user)?;
        s.opinions
            .entry(update.user)
            .or_default()
            .extend(update.opinions.iter().map(|(k, v)| (*k, *v)));
        s.opinion_log.push(update.clone());
        Ok(())
    }

    async fn peer_opinions(&self, user: UserId, topic: TopicId) -> Result<Vec<f64>, EnvError> {
        let s = self.state();
        Ok(s.follows
            .iter()
            .filter(|(a, _)| *a == user)
            .filter_map(|(_, b)| s.opinions.get(b).and_then(|o| o.get(&topic)).copied())
            .collect())
    }
}

#[async_trait]
impl ContentGateway for SimWorld {
    async fn read(&self, user: UserId, request: &ReadRequest) -> Fetched<Vec<ContentId>> {
        let s = self.state();
        if let Err(e) = s.require_active(user) {
            return Fetched::Failed(e);
        }
        let followed: HashSet<UserId> = s.follows.iter().filter(|(a, _)| *a == user).map(|(_, b)| *b).collect();

        let items: Vec<ContentId> = s
            .contents
            .iter()
            .rev()
            .filter(|(_, c)| c.author != user && s.is_visible(c, request.visibility_rounds))
            .filter(|(_, c)| !request.articles || c.article.is_some())
            .filter(|(_, c)| request.mode != "rchrono_followers" || followed.contains(&c.author))
            .map(|(id, _)| *id)
            .take(request.limit)
            .collect();
        Fetched::from_list(items)
    }

    async fn search(&self, user: UserId) -> Fetched<Vec<ContentId>> {
        let s = self.state();
        if let Err(e) = s.require_active(user) {
            return Fetched::Failed(e);
        }
        let wanted: HashSet<TopicId> = s.recent_interests(user, u32::MAX).into_iter().collect();
        let items: Vec<ContentId> = s
            .contents
            .iter()
            .rev()
            .filter(|(_, c)| c.author != user && c.topics.iter().any(|t| wanted.contains(t)))
            .map(|(id, _)| *id)
            .take(10)
            .collect();
        Fetched::from_list(items)
    }

    async fn read_mentions(&self, user: UserId) -> Fetched<Vec<ContentId>> {
        let s = self.state();
        let items: Vec<ContentId> = s
            .contents
            .iter()
            .filter(|(id, c)| c.mentions.contains(&user) && !s.answered.contains(&(user, **id)))
            .map(|(id, _)| *id)
            .collect();
        Fetched::from_list(items)
    }
}

#[async_trait]
impl FollowGateway for SimWorld {
    async fn follow_suggestions(&self, user: UserId, request: &FollowRequest) -> Fetched<HashMap<UserId, f64>> {
        let mut s = self.state();
        let leaning = match s.require_active(user).and_then(|_| s.require_user(user)) {
            Ok(record) => record.registration.leaning.clone(),
            Err(e) => return Fetched::Failed(e),
        };

        let candidates: Vec<(UserId, bool)> = s
            .users
            .iter()
            .filter(|(id, u)| **id != user && **id != NEWSROOM && u.left_on.is_none())
            .filter(|(id, _)| !s.follows.contains(&(user, **id)))
            .map(|(id, u)| (*id, u.registration.leaning == leaning))
            .collect();
        let followers: HashMap<UserId, usize> = s.follows.iter().fold(HashMap::new(), |mut acc, (_, b)| {
            *acc.entry(*b).or_default() += 1;
            acc
        });

        let chosen: Vec<(UserId, bool)> = candidates
            .choose_multiple(&mut s.rng, request.n_neighbors)
            .copied()
            .collect();
        let suggestions = chosen
            .into_iter()
            .map(|(id, same_leaning)| {
                let mut weight = match request.mode.as_str() {
                    "preferential_attachment" => followers.get(&id).copied().unwrap_or(0) as f64 + 1.0,
                    _ => 1.0,
                };
                if request.leaning_biased && same_leaning {
                    weight *= 2.0;
                }
                (id, weight)
            })
            .collect();
        Fetched::from_map(suggestions)
    }
}

#[async_trait]
impl PopulationRegistry for SimWorld {
    async fn register(&self, registration: &Registration) -> Result<UserId, EnvError> {
        let mut s = self.state();
        if s.users.values().any(|u| u.registration.email == registration.email) {
            return Err(EnvError::unavailable(format!("{} already registered", registration.email)));
        }
        s.next_user += 1;
        let id = UserId(s.next_user);
        let topics: Vec<TopicId> = registration.interests.iter().map(|name| s.topic_named(name)).collect();
        // Initial stance on every declared interest.
        let stances: BTreeMap<TopicId, f64> = topics.iter().map(|t| (*t, s.rng.gen::<f64>())).collect();
        s.opinions.insert(id, stances);
        s.interests
            .entry(id)
            .or_default()
            .extend(topics.into_iter().map(|t| (registration.joined_on, t)));
        s.users.insert(
            id,
            UserRecord {
                handle: registration.name.replace(char::is_whitespace, ""),
                registration: registration.clone(),
                left_on: None,
            },
        );
        Ok(id)
    }

    async fn churn(&self, n: usize, at_slot: u64) -> Result<Vec<UserId>, EnvError> {
        let mut s = self.state();
        let eligible: Vec<UserId> = s
            .users
            .iter()
            .filter(|(id, u)| **id != NEWSROOM && u.left_on.is_none() && !u.registration.is_page)
            .map(|(id, _)| *id)
            .collect();
        let removed: Vec<UserId> = eligible.choose_multiple(&mut s.rng, n).copied().collect();
        for id in &removed {
            if let Some(user) = s.users.get_mut(id) {
                user.left_on = Some(at_slot);
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ImageLibrary for SimWorld {
    async fn candidate_image(&self) -> Fetched<ImageAsset> {
        let mut s = self.state();
        let WorldState { images, rng, .. } = &mut *s;
        match images.choose(rng) {
            Some(image) => Fetched::Found(image.clone()),
            None => Fetched::Empty,
        }
    }

    async fn set_description(&self, image: u64, description: &str) -> Result<(), EnvError> {
        let mut s = self.state();
        let asset = s
            .images
            .iter_mut()
            .find(|i| i.id == image)
            .ok_or_else(|| EnvError::not_found(format!("image {}", image)))?;
        asset.description = Some(description.to_string());
        Ok(())
    }

    async fn discard(&self, image: u64) -> Result<(), EnvError> {
        self.state().images.retain(|i| i.id != image);
        Ok(())
    }
}
