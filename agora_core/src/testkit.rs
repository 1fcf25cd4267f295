//! Recording test doubles for the engine's collaborators.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use agora_env::{
    Article, ContentGateway, ContentId, DecisionOracle, EnvError, FollowAction, FollowGateway,
    FollowRequest, Fetched, ImageAnnotator, ImageAsset, ImageLibrary, Interest, OpinionUpdate,
    PopulationRegistry, Publication, ReactionKind, ReadRequest, Registration, Services, SimTime,
    SocialService, TimeSource, TopicId, UserId, Vote,
};
use async_trait::async_trait;

use crate::persona::{AgentPersona, BigFive, Behavior, Demographics, Role};
use crate::prompt::PromptBook;
use crate::strategy::{OracleStrategy, RandomStrategy};

pub fn sample_persona(role: Role) -> AgentPersona {
    AgentPersona::new(
        "Ada",
        "ada@example.org",
        "secret",
        Demographics {
            age: 36,
            gender: "female".to_string(),
            nationality: "British".to_string(),
            language: "English".to_string(),
            education: "master".to_string(),
            leaning: "centrist".to_string(),
        },
        BigFive {
            openness: 0.8,
            conscientiousness: 0.5,
            extraversion: 0.2,
            agreeableness: 0.6,
            neuroticism: 0.1,
        },
        Behavior {
            round_actions: 2,
            daily_activity_level: 24,
            probability_of_daily_follow: 0.1,
            probability_of_secondary_follow: 0.1,
            toxicity: "no".to_string(),
        },
        role,
        Arc::new(RandomStrategy),
    )
}

/// A registered persona with the pseudo-random strategy.
pub fn registered(role: Role, id: u64) -> AgentPersona {
    let mut persona = sample_persona(role);
    persona.id = Some(UserId(id));
    persona.name = format!("agent{}", id);
    persona
}

/// A registered persona asking `oracle`.
pub fn registered_with_oracle(role: Role, id: u64, oracle: Arc<ScriptedOracle>) -> AgentPersona {
    let base = registered(role, id);
    let strategy = Arc::new(OracleStrategy::new(oracle, Arc::new(PromptBook::default())));
    let mut persona = AgentPersona::new(
        base.name,
        base.email,
        base.password,
        base.demographics,
        base.personality,
        base.behavior,
        base.role,
        strategy,
    );
    persona.id = Some(UserId(id));
    persona
}

// ===== Scripted oracle =====

/// Oracle replaying canned answers; the last answer repeats.
pub struct ScriptedOracle {
    answers: Mutex<VecDeque<String>>,
    last_answer: Mutex<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedOracle {
    pub fn new<const N: usize>(answers: [&str; N]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            last_answer: Mutex::new(String::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn last_call(&self) -> Option<(String, String)> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn generate(&self, persona: &str, instruction: &str) -> Result<String, EnvError> {
        self.calls
            .lock()
            .unwrap()
            .push((persona.to_string(), instruction.to_string()));
        let mut last = self.last_answer.lock().unwrap();
        if let Some(next) = self.answers.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

// ===== Recorder =====

#[derive(Default)]
struct State {
    now: SimTime,
    feed: Vec<ContentId>,
    mentions: Vec<ContentId>,
    search_fails: bool,
    suggestions: HashMap<UserId, f64>,
    authors: HashMap<ContentId, UserId>,
    topics: HashMap<ContentId, Vec<Interest>>,
    opinions: HashMap<UserId, BTreeMap<TopicId, f64>>,
    image: Option<ImageAsset>,
    annotation_fails: bool,
    churn_response: Vec<UserId>,
    register_fails_for: Vec<String>,
    follow_fails_for: Vec<UserId>,
    next_id: u64,

    social_calls: usize,
    gateway_calls: usize,
    time_writes: usize,
    comments: Vec<(UserId, ContentId)>,
    posts: Vec<(UserId, Publication)>,
    reactions: Vec<(UserId, ContentId, ReactionKind)>,
    follows: Vec<(UserId, UserId, FollowAction)>,
    opinion_updates: Vec<OpinionUpdate>,
    registrations: Vec<Registration>,
    churn_requests: Vec<usize>,
    discarded: Vec<u64>,
}

/// Records every call made against the collaborators.
pub struct Recorder {
    state: Mutex<State>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_id: 100,
                ..Default::default()
            }),
        })
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services::from_backend(self.clone(), self.clone())
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    fn social<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        self.with(|s| {
            s.social_calls += 1;
            f(s)
        })
    }

    // Setup
    pub fn set_feed(&self, feed: Vec<ContentId>) {
        self.with(|s| s.feed = feed);
    }
    pub fn set_mentions(&self, mentions: Vec<ContentId>) {
        self.with(|s| s.mentions = mentions);
    }
    pub fn fail_search(&self) {
        self.with(|s| s.search_fails = true);
    }
    pub fn set_suggestions(&self, suggestions: HashMap<UserId, f64>) {
        self.with(|s| s.suggestions = suggestions);
    }
    pub fn set_author(&self, content: ContentId, author: UserId) {
        self.with(|s| s.authors.insert(content, author));
    }
    pub fn set_topics(&self, content: ContentId, topics: Vec<Interest>) {
        self.with(|s| s.topics.insert(content, topics));
    }
    pub fn set_opinions(&self, user: UserId, opinions: BTreeMap<TopicId, f64>) {
        self.with(|s| s.opinions.insert(user, opinions));
    }
    pub fn set_image(&self, description: Option<&str>) {
        self.with(|s| {
            s.image = Some(ImageAsset {
                id: 1,
                url: "http://images/1.png".to_string(),
                description: description.map(str::to_string),
                article: None,
            })
        });
    }
    pub fn fail_annotation(&self) {
        self.with(|s| s.annotation_fails = true);
    }
    pub fn set_churn_response(&self, removed: Vec<UserId>) {
        self.with(|s| s.churn_response = removed);
    }
    pub fn fail_registration_of(&self, name: &str) {
        self.with(|s| s.register_fails_for.push(name.to_string()));
    }
    pub fn fail_follows_to(&self, target: UserId) {
        self.with(|s| s.follow_fails_for.push(target));
    }
    pub fn set_time(&self, now: SimTime) {
        self.with(|s| s.now = now);
    }

    // Inspection
    pub fn social_calls(&self) -> usize {
        self.with(|s| s.social_calls)
    }
    pub fn gateway_calls(&self) -> usize {
        self.with(|s| s.gateway_calls)
    }
    pub fn time_writes(&self) -> usize {
        self.with(|s| s.time_writes)
    }
    pub fn comments(&self) -> Vec<(UserId, ContentId)> {
        self.with(|s| s.comments.clone())
    }
    pub fn posts(&self) -> Vec<(UserId, Publication)> {
        self.with(|s| s.posts.clone())
    }
    pub fn reactions(&self) -> Vec<(UserId, ContentId, ReactionKind)> {
        self.with(|s| s.reactions.clone())
    }
    pub fn follows(&self) -> Vec<(UserId, UserId, FollowAction)> {
        self.with(|s| s.follows.clone())
    }
    pub fn opinion_updates(&self) -> Vec<OpinionUpdate> {
        self.with(|s| s.opinion_updates.clone())
    }
    pub fn registrations(&self) -> Vec<Registration> {
        self.with(|s| s.registrations.clone())
    }
    pub fn churn_requests(&self) -> Vec<usize> {
        self.with(|s| s.churn_requests.clone())
    }
    pub fn discarded(&self) -> Vec<u64> {
        self.with(|s| s.discarded.clone())
    }
}

#[async_trait]
impl TimeSource for Recorder {
    async fn current_time(&self) -> Result<SimTime, EnvError> {
        Ok(self.with(|s| s.now))
    }

    async fn update_time(&self, day: u32, slot: u32) -> Result<SimTime, EnvError> {
        Ok(self.with(|s| {
            s.time_writes += 1;
            s.now = SimTime::new(day, slot, s.now.id + 1);
            s.now
        }))
    }
}

#[async_trait]
impl SocialService for Recorder {
    async fn post(&self, user: UserId, _slot: u64, post: &Publication) -> Result<ContentId, EnvError> {
        Ok(self.social(|s| {
            s.posts.push((user, post.clone()));
            s.next_id += 1;
            ContentId(s.next_id)
        }))
    }

    async fn comment(
        &self,
        user: UserId,
        _slot: u64,
        target: ContentId,
        _comment: &Publication,
    ) -> Result<ContentId, EnvError> {
        Ok(self.social(|s| {
            s.comments.push((user, target));
            s.next_id += 1;
            ContentId(s.next_id)
        }))
    }

    async fn share(&self, _: UserId, _: u64, _: ContentId, _: &Publication) -> Result<ContentId, EnvError> {
        Ok(self.social(|s| {
            s.next_id += 1;
            ContentId(s.next_id)
        }))
    }

    async fn comment_image(&self, _: UserId, _: u64, _: &ImageAsset, _: &Publication) -> Result<ContentId, EnvError> {
        Ok(self.social(|s| {
            s.next_id += 1;
            ContentId(s.next_id)
        }))
    }

    async fn react(&self, user: UserId, _slot: u64, target: ContentId, kind: ReactionKind) -> Result<(), EnvError> {
        self.social(|s| s.reactions.push((user, target, kind)));
        Ok(())
    }

    async fn follow(&self, user: UserId, _slot: u64, target: UserId, action: FollowAction) -> Result<(), EnvError> {
        self.social(|s| {
            if s.follow_fails_for.contains(&target) {
                return Err(EnvError::transport("follow rejected"));
            }
            s.follows.push((user, target, action));
            Ok(())
        })
    }

    async fn cast_vote(&self, _: UserId, _: u64, _: ContentId, _: Vote) -> Result<(), EnvError> {
        self.social(|_| ());
        Ok(())
    }

    async fn content_text(&self, content: ContentId) -> Result<String, EnvError> {
        Ok(self.social(|_| format!("text of {}", content)))
    }

    async fn thread(&self, content: ContentId, _max_len: usize) -> Result<Vec<String>, EnvError> {
        Ok(self.social(|_| vec![format!("text of {}", content)]))
    }

    async fn article(&self, _: ContentId) -> Result<Option<Article>, EnvError> {
        Ok(self.social(|_| None))
    }

    async fn author(&self, content: ContentId) -> Result<UserId, EnvError> {
        Ok(self.social(|s| s.authors.get(&content).copied().unwrap_or(UserId(99))))
    }

    async fn content_topics(&self, content: ContentId) -> Result<Vec<Interest>, EnvError> {
        Ok(self.social(|s| s.topics.get(&content).cloned().unwrap_or_default()))
    }

    async fn interests(&self, _: UserId, _: u32) -> Result<Vec<Interest>, EnvError> {
        Ok(self.social(|_| Vec::new()))
    }

    async fn record_interests(&self, _: UserId, _: u64, _: &[TopicId]) -> Result<(), EnvError> {
        self.social(|_| ());
        Ok(())
    }

    async fn opinions(&self, user: UserId) -> Result<BTreeMap<TopicId, f64>, EnvError> {
        Ok(self.social(|s| s.opinions.get(&user).cloned().unwrap_or_default()))
    }

    async fn set_opinions(&self, update: &OpinionUpdate) -> Result<(), EnvError> {
        self.social(|s| {
            s.opinions
                .entry(update.user)
                .or_default()
                .extend(update.opinions.iter().map(|(k, v)| (*k, *v)));
            s.opinion_updates.push(update.clone());
        });
        Ok(())
    }

    async fn peer_opinions(&self, user: UserId, topic: TopicId) -> Result<Vec<f64>, EnvError> {
        Ok(self.social(|s| {
            s.opinions
                .iter()
                .filter(|(id, _)| **id != user)
                .filter_map(|(_, ops)| ops.get(&topic).copied())
                .collect()
        }))
    }
}

#[async_trait]
impl ContentGateway for Recorder {
    async fn read(&self, _: UserId, _: &ReadRequest) -> Fetched<Vec<ContentId>> {
        Fetched::from_list(self.with(|s| {
            s.gateway_calls += 1;
            s.feed.clone()
        }))
    }

    async fn search(&self, _: UserId) -> Fetched<Vec<ContentId>> {
        self.with(|s| {
            s.gateway_calls += 1;
            if s.search_fails {
                Fetched::Failed(EnvError::unavailable("404"))
            } else {
                Fetched::from_list(s.feed.clone())
            }
        })
    }

    async fn read_mentions(&self, _: UserId) -> Fetched<Vec<ContentId>> {
        Fetched::from_list(self.with(|s| {
            s.gateway_calls += 1;
            s.mentions.clone()
        }))
    }
}

#[async_trait]
impl FollowGateway for Recorder {
    async fn follow_suggestions(&self, _: UserId, _: &FollowRequest) -> Fetched<HashMap<UserId, f64>> {
        Fetched::from_map(self.with(|s| {
            s.gateway_calls += 1;
            s.suggestions.clone()
        }))
    }
}

#[async_trait]
impl PopulationRegistry for Recorder {
    async fn register(&self, registration: &Registration) -> Result<UserId, EnvError> {
        self.with(|s| {
            if s.register_fails_for.contains(&registration.name) {
                return Err(EnvError::unavailable("registration refused"));
            }
            s.registrations.push(registration.clone());
            s.next_id += 1;
            Ok(UserId(s.next_id))
        })
    }

    async fn churn(&self, n: usize, _at_slot: u64) -> Result<Vec<UserId>, EnvError> {
        Ok(self.with(|s| {
            s.churn_requests.push(n);
            s.churn_response.clone()
        }))
    }
}

#[async_trait]
impl ImageLibrary for Recorder {
    async fn candidate_image(&self) -> Fetched<ImageAsset> {
        match self.social(|s| s.image.clone()) {
            Some(image) => Fetched::Found(image),
            None => Fetched::Empty,
        }
    }

    async fn set_description(&self, _: u64, description: &str) -> Result<(), EnvError> {
        self.social(|s| {
            if let Some(image) = &mut s.image {
                image.description = Some(description.to_string());
            }
        });
        Ok(())
    }

    async fn discard(&self, image: u64) -> Result<(), EnvError> {
        self.social(|s| {
            s.discarded.push(image);
            s.image = None;
        });
        Ok(())
    }
}

#[async_trait]
impl DecisionOracle for Recorder {
    async fn generate(&self, _persona: &str, _instruction: &str) -> Result<String, EnvError> {
        Ok("NONE".to_string())
    }
}

#[async_trait]
impl ImageAnnotator for Recorder {
    async fn describe(&self, _image_url: &str) -> Result<String, EnvError> {
        if self.with(|s| s.annotation_fails) {
            Err(EnvError::transport("annotation backend down"))
        } else {
            Ok("a cat on a sofa".to_string())
        }
    }
}

#[async_trait]
impl ImageAnnotator for ScriptedOracle {
    async fn describe(&self, _image_url: &str) -> Result<String, EnvError> {
        Ok("an image".to_string())
    }
}
