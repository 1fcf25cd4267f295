//! Explicit bundle of every external collaborator.
//!
//! The engine never reaches for global handles: it is given a `Services`
//! value at construction and passes it down. A backend that implements all
//! collaborator traits (the HTTP backend, the simulated world) can be
//! turned into a bundle with [`Services::from_backend`].

use std::sync::Arc;

use crate::{
    ContentGateway, DecisionOracle, FollowGateway, ImageAnnotator, ImageLibrary,
    PopulationRegistry, SocialService, TimeSource,
};

/// Handles to the external collaborators.
#[derive(Clone)]
pub struct Services {
    pub time: Arc<dyn TimeSource>,
    pub social: Arc<dyn SocialService>,
    pub content: Arc<dyn ContentGateway>,
    pub follows: Arc<dyn FollowGateway>,
    pub registry: Arc<dyn PopulationRegistry>,
    pub images: Arc<dyn ImageLibrary>,
    pub oracle: Arc<dyn DecisionOracle>,
    pub annotator: Arc<dyn ImageAnnotator>,
}

impl Services {
    /// Builds a bundle from one backend serving every service trait and an oracle.
    pub fn from_backend<B, O>(backend: Arc<B>, oracle: Arc<O>) -> Self
    where
        B: TimeSource + SocialService + ContentGateway + FollowGateway + PopulationRegistry + ImageLibrary,
        O: DecisionOracle + ImageAnnotator,
    {
        Self {
            time: backend.clone(),
            social: backend.clone(),
            content: backend.clone(),
            follows: backend.clone(),
            registry: backend.clone(),
            images: backend,
            oracle: oracle.clone(),
            annotator: oracle,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
