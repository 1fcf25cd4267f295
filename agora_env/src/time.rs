//! Authoritative time source shared by every simulation process.

use async_trait::async_trait;

use crate::{EnvError, SimTime};

/// The service of record for simulated time.
///
/// Several simulation processes may write to the same source. Writers are
/// expected to read before writing and never write a `(day, slot)` that
/// does not strictly follow the value they just read.
#[async_trait]
pub trait TimeSource: Send + Sync + 'static {
    /// Reads the authoritative `(day, slot, id)` triple.
    async fn current_time(&self) -> Result<SimTime, EnvError>;

    /// Writes a new `(day, slot)` and returns the stored triple with its
    /// freshly assigned global id.
    async fn update_time(&self, day: u32, slot: u32) -> Result<SimTime, EnvError>;
}
