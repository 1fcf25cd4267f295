//! Shared wire types for the Agora environment layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Identity assigned to a persona by the population-of-record.
    UserId,
    "user#"
);
id_type!(
    /// Identity of a post, comment, share or article on the social service.
    ContentId,
    "content#"
);
id_type!(
    /// Identity of an interest / opinion topic.
    TopicId,
    "topic#"
);

/// Authoritative simulated time as served by the time source.
///
/// On the wire the slot is called `round`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimTime {
    /// Simulated day (0-based)
    pub day: u32,

    /// Slot within the day, bounded by the day width
    #[serde(rename = "round")]
    pub slot: u32,

    /// Global slot identifier, strictly increasing across writes
    pub id: u64,
}

impl SimTime {
    pub fn new(day: u32, slot: u32, id: u64) -> Self {
        Self { day, slot, id }
    }

    /// Lexicographic `(day, slot)` key, ignoring `id`.
    pub fn key(&self) -> (u32, u32) {
        (self.day, self.slot)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} slot {} (id {})", self.day, self.slot, self.id)
    }
}

/// Reaction kinds recorded against content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

/// Direction of a follow-graph edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

impl FollowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Follow => Self::Unfollow,
            Self::Unfollow => Self::Follow,
        }
    }
}

/// Political stance vote cast on a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "D")]
    Left,
    #[serde(rename = "U")]
    Undecided,
}

impl Vote {
    /// Single-letter code stored by the service of record.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Right => "R",
            Self::Left => "D",
            Self::Undecided => "U",
        }
    }

    /// Maps an oracle keyword (`RIGHT`, `LEFT`, `NONE`) to a vote.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "RIGHT" => Some(Self::Right),
            "LEFT" => Some(Self::Left),
            "NONE" => Some(Self::Undecided),
            _ => None,
        }
    }
}

/// Registration payload for a new persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub leaning: String,
    pub age: u32,
    pub gender: String,
    pub nationality: String,
    pub language: String,
    pub education: String,
    pub toxicity: String,
    pub interests: Vec<String>,

    /// Big Five traits in `oe, co, ex, ag, ne` order
    pub big_five: [f64; 5],

    pub round_actions: u32,
    pub is_page: bool,

    /// Global slot id at which the persona joined
    pub joined_on: u64,
}

/// Text plus extracted metadata, ready to be published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub text: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub emotions: Vec<String>,
    pub topics: Vec<TopicId>,
}

/// A news article attached to shared content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub summary: String,
    pub source: String,
}

/// An image that can be annotated and commented on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: u64,
    pub url: String,
    pub description: Option<String>,
    pub article: Option<ContentId>,
}

/// Interest topic with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interest {
    pub id: TopicId,
    pub name: String,
}

/// Opinion state pushed back after an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionUpdate {
    pub user: UserId,
    pub opinions: BTreeMap<TopicId, f64>,

    /// Content the interaction happened on
    pub content: ContentId,

    /// Partner the update is attributed to
    pub interacted_with: UserId,

    /// Global slot id of the interaction
    pub slot: u64,
}

/// Parameters for the content recommendation gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub limit: usize,
    pub mode: String,
    pub visibility_rounds: u32,
    pub articles: bool,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            limit: 10,
            mode: "rchrono".to_string(),
            visibility_rounds: 36,
            articles: false,
        }
    }
}

/// Parameters for the follow recommendation gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub mode: String,
    pub n_neighbors: usize,
    pub leaning_biased: bool,
}

impl Default for FollowRequest {
    fn default() -> Self {
        Self {
            mode: "random".to_string(),
            n_neighbors: 10,
            leaning_biased: false,
        }
    }
}
