//! Batch execution of independent decision calls.
//!
//! The orchestrator can hand the first decision of every active persona to
//! an executor as one batch. Results come back in input order. A failed
//! batch is reported as an error and the caller falls back to deciding
//! each persona sequentially during its turn.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::action::Action;
use crate::persona::AgentPersona;
use crate::selector::PlannedDecision;
use crate::{CoreResult, SimRng};

/// One independent decision: a persona snapshot, its candidates and its own RNG.
pub struct DecisionJob {
    pub persona: AgentPersona,
    pub candidates: Vec<Action>,
    pub rng: SimRng,
}

impl DecisionJob {
    async fn run(mut self) -> CoreResult<PlannedDecision> {
        let choice = self
            .persona
            .strategy()
            .choose_action(&self.persona, &self.candidates, &mut self.rng)
            .await?;
        Ok(PlannedDecision {
            candidates: self.candidates,
            choice,
        })
    }
}

/// Runs a batch of decisions, preserving input order.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn decide(&self, jobs: Vec<DecisionJob>) -> CoreResult<Vec<PlannedDecision>>;
}

/// Runs jobs one after another.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialExecutor;

#[async_trait]
impl BatchExecutor for SequentialExecutor {
    async fn decide(&self, jobs: Vec<DecisionJob>) -> CoreResult<Vec<PlannedDecision>> {
        let mut out = Vec::with_capacity(jobs.len());
        for job in jobs {
            out.push(job.run().await?);
        }
        Ok(out)
    }
}

/// Runs up to `width` jobs concurrently.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentExecutor {
    width: usize,
}

impl ConcurrentExecutor {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }
}

#[async_trait]
impl BatchExecutor for ConcurrentExecutor {
    async fn decide(&self, jobs: Vec<DecisionJob>) -> CoreResult<Vec<PlannedDecision>> {
        let results: Vec<CoreResult<PlannedDecision>> = stream::iter(jobs.into_iter().map(DecisionJob::run))
            .buffered(self.width)
            .collect()
            .await;
        results.into_iter().collect()
    }
}
