//! Text-generation capabilities consulted by personas.

use async_trait::async_trait;

use crate::EnvError;

/// Free-text decision oracle (an LLM in production).
///
/// `persona` is the system-level description of who is speaking,
/// `instruction` the concrete request. The caller extracts keywords from
/// the returned text; the oracle makes no promise about its shape.
#[async_trait]
pub trait DecisionOracle: Send + Sync + 'static {
    async fn generate(&self, persona: &str, instruction: &str) -> Result<String, EnvError>;
}

/// Produces a textual description of an image.
#[async_trait]
pub trait ImageAnnotator: Send + Sync + 'static {
    async fn describe(&self, image_url: &str) -> Result<String, EnvError>;
}
