//! Monotonic 64-bit Snowflake-style ID generator.
//!
//! Bit layout, high to low: 41-bit millisecond timestamp since [`EPOCH_MS`],
//! 5-bit datacenter id, 5-bit worker id, 12-bit per-millisecond sequence.

use std::sync::Mutex;

use thiserror::Error;

/// A fixed epoch so the 41-bit timestamp field doesn't roll over for decades.
/// 2024-01-01T00:00:00Z in milliseconds since the Unix epoch.
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const TIMESTAMP_BITS: u32 = 41;
const DATACENTER_BITS: u32 = 5;
const WORKER_BITS: u32 = 5;
const SEQUENCE_BITS: u32 = 12;

const MAX_DATACENTER_ID: u64 = (1 << DATACENTER_BITS) - 1;
const MAX_WORKER_ID: u64 = (1 << WORKER_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS + DATACENTER_BITS;

#[derive(Debug, Error)]
pub enum IdGeneratorError {
    #[error("clock moved backwards: last issued timestamp {last_ms}ms, now {now_ms}ms")]
    ClockMovedBackwards { last_ms: u64, now_ms: u64 },
    #[error("datacenter id {0} exceeds {MAX_DATACENTER_ID}")]
    InvalidDatacenterId(u64),
    #[error("worker id {0} exceeds {MAX_WORKER_ID}")]
    InvalidWorkerId(u64),
}

/// A source of wall-clock time, abstracted so tests can simulate clock
/// regression without sleeping on the real clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The real wall clock, backed by [`std::time::SystemTime`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

struct State {
    last_ms: u64,
    sequence: u64,
}

/// Monotonic 64-bit ID generator.
///
/// `next_id` spin-waits to the next millisecond when the per-ms sequence
/// overflows, and fails with [`IdGeneratorError::ClockMovedBackwards`] if the
/// wall clock regresses versus the last issued timestamp.
pub struct IdGenerator {
    datacenter_id: u64,
    worker_id: u64,
    clock: Box<dyn Clock>,
    state: Mutex<State>,
}

impl IdGenerator {
    pub fn new(datacenter_id: u64, worker_id: u64) -> Result<Self, IdGeneratorError> {
        Self::with_clock(datacenter_id, worker_id, Box::new(SystemClock))
    }

    pub fn with_clock(
        datacenter_id: u64,
        worker_id: u64,
        clock: Box<dyn Clock>,
    ) -> Result<Self, IdGeneratorError> {
        if datacenter_id > MAX_DATACENTER_ID {
            return Err(IdGeneratorError::InvalidDatacenterId(datacenter_id));
        }
        if worker_id > MAX_WORKER_ID {
            return Err(IdGeneratorError::InvalidWorkerId(worker_id));
        }
        Ok(Self {
            datacenter_id,
            worker_id,
            clock,
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    /// Generate the next monotonic id.
    pub fn next_id(&self) -> Result<u64, IdGeneratorError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut now_ms = self.clock.now_ms().saturating_sub(EPOCH_MS);

        if now_ms < state.last_ms {
            return Err(IdGeneratorError::ClockMovedBackwards {
                last_ms: state.last_ms,
                now_ms,
            });
        }

        if now_ms == state.last_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond; spin to the next one.
                while now_ms <= state.last_ms {
                    now_ms = self.clock.now_ms().saturating_sub(EPOCH_MS);
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now_ms;

        let id = (now_ms << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_SHIFT)
            | (self.worker_id << WORKER_SHIFT)
            | state.sequence;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;

    #[derive(Clone)]
    struct FakeClock(Arc<AtomicU64>);

    impl FakeClock {
        fn at(ms: u64) -> Self {
            Self(Arc::new(AtomicU64::new(ms)))
        }

        fn set(&self, ms: u64) {
            self.0.store(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn ids_are_monotonically_increasing() {
        let gen = IdGenerator::new(1, 2).unwrap();
        let mut prev = gen.next_id().unwrap();
        for _ in 0..1000 {
            let next = gen.next_id().unwrap();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn rejects_out_of_range_datacenter() {
        assert!(matches!(
            IdGenerator::new(32, 0),
            Err(IdGeneratorError::InvalidDatacenterId(32))
        ));
    }

    #[test]
    fn clock_regression_fails_the_call() {
        let clock = FakeClock::at(EPOCH_MS + 1000);
        let gen = IdGenerator::with_clock(0, 0, Box::new(clock.clone())).unwrap();
        gen.next_id().unwrap();

        clock.set(EPOCH_MS + 500);
        assert!(matches!(
            gen.next_id(),
            Err(IdGeneratorError::ClockMovedBackwards { .. })
        ));
    }

    #[test]
    fn same_millisecond_bumps_sequence() {
        let clock = FakeClock::at(EPOCH_MS + 5000);
        let gen = IdGenerator::with_clock(1, 1, Box::new(clock)).unwrap();
        let a = gen.next_id().unwrap();
        let b = gen.next_id().unwrap();
        assert_eq!(b - a, 1);
    }
}
