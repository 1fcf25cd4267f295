//! The social-network service of record.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::{
    Article, ContentId, EnvError, FollowAction, Fetched, ImageAsset, Interest, OpinionUpdate,
    Publication, ReactionKind, Registration, TopicId, UserId, Vote,
};

/// Writes and point reads against the remote social network.
///
/// `slot` arguments are global slot ids (see [`crate::SimTime::id`]).
#[async_trait]
pub trait SocialService: Send + Sync + 'static {
    // ===== Publishing =====

    async fn post(&self, user: UserId, slot: u64, post: &Publication) -> Result<ContentId, EnvError>;

    async fn comment(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        comment: &Publication,
    ) -> Result<ContentId, EnvError>;

    async fn share(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        commentary: &Publication,
    ) -> Result<ContentId, EnvError>;

    async fn comment_image(
        &self,
        user: UserId,
        slot: u64,
        image: &ImageAsset,
        comment: &Publication,
    ) -> Result<ContentId, EnvError>;

    // ===== Interactions =====

    async fn react(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        kind: ReactionKind,
    ) -> Result<(), EnvError>;

    async fn follow(
        &self,
        user: UserId,
        slot: u64,
        target: UserId,
        action: FollowAction,
    ) -> Result<(), EnvError>;

    async fn cast_vote(
        &self,
        user: UserId,
        slot: u64,
        target: ContentId,
        vote: Vote,
    ) -> Result<(), EnvError>;

    // ===== Content reads =====

    /// Text of a single piece of content.
    async fn content_text(&self, content: ContentId) -> Result<String, EnvError>;

    /// The conversation leading to `content`, oldest first, at most `max_len` entries.
    async fn thread(&self, content: ContentId, max_len: usize) -> Result<Vec<String>, EnvError>;

    async fn article(&self, content: ContentId) -> Result<Option<Article>, EnvError>;

    async fn author(&self, content: ContentId) -> Result<UserId, EnvError>;

    async fn content_topics(&self, content: ContentId) -> Result<Vec<Interest>, EnvError>;

    // ===== Persona state =====

    /// Interests the persona engaged with during the last `window` slots.
    async fn interests(&self, user: UserId, window: u32) -> Result<Vec<Interest>, EnvError>;

    async fn record_interests(
        &self,
        user: UserId,
        slot: u64,
        topics: &[TopicId],
    ) -> Result<(), EnvError>;

    async fn opinions(&self, user: UserId) -> Result<BTreeMap<TopicId, f64>, EnvError>;

    async fn set_opinions(&self, update: &OpinionUpdate) -> Result<(), EnvError>;

    /// Opinion scores on `topic` held by the accounts `user` follows.
    async fn peer_opinions(&self, user: UserId, topic: TopicId) -> Result<Vec<f64>, EnvError>;
}

/// Population-of-record: who exists on the network.
#[async_trait]
pub trait PopulationRegistry: Send + Sync + 'static {
    /// Registers a persona and returns its externally assigned id.
    async fn register(&self, registration: &Registration) -> Result<UserId, EnvError>;

    /// Removes `n` members chosen by the service and returns their ids.
    async fn churn(&self, n: usize, at_slot: u64) -> Result<Vec<UserId>, EnvError>;
}

/// Image catalogue used by the IMAGE action.
#[async_trait]
pub trait ImageLibrary: Send + Sync + 'static {
    /// An eligible image, described or not.
    async fn candidate_image(&self) -> Fetched<ImageAsset>;

    async fn set_description(&self, image: u64, description: &str) -> Result<(), EnvError>;

    /// Removes an image that could not be annotated.
    async fn discard(&self, image: u64) -> Result<(), EnvError>;
}
