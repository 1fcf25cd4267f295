//! Recommendation gateways.
//!
//! Both gateways are computed by the remote service; the engine only
//! consumes ranked candidates. Every call returns a [`Fetched`] so callers
//! branch on found / empty / failed instead of trapping errors.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{ContentId, Fetched, FollowRequest, ReadRequest, UserId};

/// Candidate content for a persona.
#[async_trait]
pub trait ContentGateway: Send + Sync + 'static {
    /// Ranked content (or articles when `request.articles` is set).
    async fn read(&self, user: UserId, request: &ReadRequest) -> Fetched<Vec<ContentId>>;

    /// Content matching the persona's interests.
    async fn search(&self, user: UserId) -> Fetched<Vec<ContentId>>;

    /// Content that mentions the persona and has not been answered yet.
    async fn read_mentions(&self, user: UserId) -> Fetched<Vec<ContentId>>;
}

/// Candidate follow targets for a persona.
#[async_trait]
pub trait FollowGateway: Send + Sync + 'static {
    /// Candidate id to non-negative weight. Weights need not sum to 1.
    async fn follow_suggestions(
        &self,
        user: UserId,
        request: &FollowRequest,
    ) -> Fetched<HashMap<UserId, f64>>;
}
