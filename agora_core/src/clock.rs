//! Distributed simulation clock.
//!
//! Several simulation processes can share one authoritative time source.
//! Each process keeps a local `(day, slot, id)` copy and advances it with an
//! optimistic compare-then-write:
//!
//! ```text
//!   local (d, s) ──next_slot──▶ candidate (d', s')
//!                                    │
//!   time source ──current()───▶ (d_c, s_c)
//!                                    │
//!          d' > d_c  ||  (d' == d_c && s' > s_c) ?
//!               │ yes                       │ no
//!               ▼                           ▼
//!        update_time(d', s')         no write, re-sync
//! ```
//!
//! A read-modify-write window remains between the read and the write; the
//! check only stops *this* writer from moving the shared clock backwards.

use std::sync::Arc;

use agora_env::{SimTime, TimeSource};
use serde::Serialize;
use tracing::{debug, info};

use crate::{CoreError, CoreResult};

/// Slots per simulated day used by the reference deployment.
pub const DEFAULT_DAY_WIDTH: u32 = 24;

/// Result of one `advance()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdvanceOutcome {
    /// The candidate was written; carries the stored time.
    Committed(SimTime),

    /// Another writer is at or ahead of the candidate; no write issued.
    Skipped {
        candidate: (u32, u32),
        authoritative: SimTime,
    },
}

impl AdvanceOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Computes the slot following `(day, slot)` for a day of `width` slots.
pub fn next_slot(day: u32, slot: u32, width: u32) -> (u32, u32) {
    if slot + 1 < width {
        (day, slot + 1)
    } else {
        (day + 1, 0)
    }
}

/// The compare-then-write condition: write iff the candidate is strictly
/// later than the authoritative time.
pub fn should_commit(day: u32, day_c: u32, slot: u32, slot_c: u32) -> bool {
    day > day_c || (day == day_c && slot > slot_c)
}

/// Process-local handle on the shared simulation clock.
pub struct SimulationClock {
    source: Arc<dyn TimeSource>,

    /// Last observed time
    local: SimTime,

    /// Slots per day
    width: u32,

    /// Highest `(day, slot)` ever observed, for the monotonicity guard
    high_water: (u32, u32),
}

impl SimulationClock {
    /// Creates a clock and synchronizes it with the time source.
    pub async fn connect(source: Arc<dyn TimeSource>, width: u32) -> CoreResult<Self> {
        if width == 0 {
            return Err(CoreError::config("day width must be positive"));
        }
        let local = source.current_time().await.map_err(CoreError::Clock)?;
        info!(%local, width, "clock connected");
        Ok(Self {
            source,
            local,
            width,
            high_water: local.key(),
        })
    }

    /// Last observed time, without contacting the source.
    pub fn local(&self) -> SimTime {
        self.local
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Re-reads the authoritative time. Never served from cache.
    pub async fn current(&mut self) -> CoreResult<SimTime> {
        let now = self.source.current_time().await.map_err(CoreError::Clock)?;
        self.observe(now);
        Ok(now)
    }

    /// Advances by one slot if no other writer already moved past the candidate.
    ///
    /// Time-source failures are returned as [`CoreError::Clock`] and leave the
    /// local state untouched; no retry is attempted.
    pub async fn advance(&mut self) -> CoreResult<AdvanceOutcome> {
        let (day, slot) = next_slot(self.local.day, self.local.slot, self.width);

        let authoritative = self.source.current_time().await.map_err(CoreError::Clock)?;

        if !should_commit(day, authoritative.day, slot, authoritative.slot) {
            debug!(
                candidate_day = day,
                candidate_slot = slot,
                %authoritative,
                "clock advance skipped"
            );
            self.observe(authoritative);
            return Ok(AdvanceOutcome::Skipped {
                candidate: (day, slot),
                authoritative,
            });
        }

        let stored = self
            .source
            .update_time(day, slot)
            .await
            .map_err(CoreError::Clock)?;
        debug!(%stored, "clock advanced");
        self.observe(stored);
        Ok(AdvanceOutcome::Committed(stored))
    }

    /// Adopts `seen` unless it would move the local copy backwards.
    fn observe(&mut self, seen: SimTime) {
        if seen.key() >= self.high_water {
            self.high_water = seen.key();
            self.local = seen;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_env::EnvError;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory time source counting writes.
    struct FakeTime {
        now: Mutex<SimTime>,
        writes: Mutex<u32>,
        reads_down: AtomicBool,
        writes_down: AtomicBool,
    }

    impl FakeTime {
        fn at(day: u32, slot: u32) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(SimTime::new(day, slot, (day * 24 + slot) as u64)),
                writes: Mutex::new(0),
                reads_down: AtomicBool::new(false),
                writes_down: AtomicBool::new(false),
            })
        }

        fn set(&self, day: u32, slot: u32) {
            *self.now.lock().unwrap() = SimTime::new(day, slot, (day * 24 + slot) as u64);
        }

        fn writes(&self) -> u32 {
            *self.writes.lock().unwrap()
        }

        fn fail_reads(&self, down: bool) {
            self.reads_down.store(down, Ordering::SeqCst);
        }

        fn fail_writes(&self, down: bool) {
            self.writes_down.store(down, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TimeSource for FakeTime {
        async fn current_time(&self) -> Result<SimTime, EnvError> {
            if self.reads_down.load(Ordering::SeqCst) {
                return Err(EnvError::unavailable("time source down"));
            }
            Ok(*self.now.lock().unwrap())
        }

        async fn update_time(&self, day: u32, slot: u32) -> Result<SimTime, EnvError> {
            if self.writes_down.load(Ordering::SeqCst) {
                return Err(EnvError::transport("write rejected"));
            }
            *self.writes.lock().unwrap() += 1;
            let mut now = self.now.lock().unwrap();
            *now = SimTime::new(day, slot, now.id + 1);
            Ok(*now)
        }
    }

    #[test]
    fn test_commit_condition_cases() {
        assert!(should_commit(5, 5, 10, 5));
        assert!(!should_commit(5, 5, 3, 10));
        assert!(!should_commit(5, 5, 10, 10));
        assert!(should_commit(6, 5, 0, 23));
        assert!(!should_commit(4, 5, 20, 5));
    }

    #[test]
    fn test_next_slot_wraps_day() {
        assert_eq!(next_slot(0, 0, 24), (0, 1));
        assert_eq!(next_slot(0, 22, 24), (0, 23));
        assert_eq!(next_slot(0, 23, 24), (1, 0));
        assert_eq!(next_slot(3, 0, 1), (4, 0));
    }

    #[tokio::test]
    async fn test_advance_commits_when_ahead() {
        let source = FakeTime::at(5, 9);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();

        let outcome = clock.advance().await.unwrap();
        assert!(outcome.is_committed());
        assert_eq!(clock.local().key(), (5, 10));
        assert_eq!(source.writes(), 1);
    }

    #[tokio::test]
    async fn test_advance_commits_across_day_boundary() {
        let source = FakeTime::at(5, 23);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();

        clock.advance().await.unwrap();
        assert_eq!(clock.local().key(), (6, 0));
    }

    #[tokio::test]
    async fn test_advance_skips_when_other_writer_ahead() {
        let source = FakeTime::at(5, 2);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();

        // Another process moved the shared clock to slot 10.
        source.set(5, 10);
        let outcome = clock.advance().await.unwrap();

        assert!(matches!(outcome, AdvanceOutcome::Skipped { candidate: (5, 3), .. }));
        assert_eq!(source.writes(), 0);
        // Re-synced to the authoritative value.
        assert_eq!(clock.local().key(), (5, 10));
    }

    #[tokio::test]
    async fn test_advance_skips_on_tie() {
        let source = FakeTime::at(5, 9);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();

        source.set(5, 10);
        let outcome = clock.advance().await.unwrap();
        assert!(!outcome.is_committed());
        assert_eq!(source.writes(), 0);
    }

    #[tokio::test]
    async fn test_connect_fails_when_source_down() {
        let source = FakeTime::at(0, 0);
        source.fail_reads(true);
        assert!(matches!(
            SimulationClock::connect(source, 24).await,
            Err(CoreError::Clock(_))
        ));
    }

    #[tokio::test]
    async fn test_advance_propagates_read_failure() {
        let source = FakeTime::at(5, 9);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();

        source.fail_reads(true);
        assert!(matches!(clock.advance().await, Err(CoreError::Clock(_))));
        assert_eq!(source.writes(), 0);
        assert_eq!(clock.local().key(), (5, 9));

        source.fail_reads(false);
        assert_eq!(clock.current().await.unwrap().key(), (5, 9));
    }

    #[tokio::test]
    async fn test_advance_propagates_write_failure() {
        let source = FakeTime::at(5, 9);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();

        source.fail_writes(true);
        assert!(matches!(clock.advance().await, Err(CoreError::Clock(_))));
        assert_eq!(clock.local().key(), (5, 9));
        assert_eq!(clock.current().await.unwrap().key(), (5, 9));

        source.fail_writes(false);
        assert!(clock.advance().await.unwrap().is_committed());
        assert_eq!(clock.local().key(), (5, 10));
    }

    #[tokio::test]
    async fn test_current_always_refetches() {
        let source = FakeTime::at(1, 1);
        let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();
        source.set(1, 7);
        assert_eq!(clock.current().await.unwrap().key(), (1, 7));
    }

    proptest! {
        #[test]
        fn prop_commit_iff_strictly_later(day in 0u32..50, day_c in 0u32..50, slot in 0u32..24, slot_c in 0u32..24) {
            prop_assert_eq!(should_commit(day, day_c, slot, slot_c), (day, slot) > (day_c, slot_c));
        }

        #[test]
        fn prop_advance_never_regresses(jumps in proptest::collection::vec((0u32..3, 0u32..24), 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let source = FakeTime::at(0, 0);
                let mut clock = SimulationClock::connect(source.clone(), 24).await.unwrap();
                let mut last = clock.local().key();
                for (extra_days, slot) in jumps {
                    // Concurrent writers may move the shared clock anywhere.
                    let day = source.current_time().await.unwrap().day;
                    source.set(day + extra_days, slot);
                    clock.advance().await.unwrap();
                    let now = clock.local().key();
                    assert!(now >= last);
                    last = now;
                }
            });
        }
    }
}
