//! Lock-free connection state.
//!
//! The state and a session generation share one `AtomicU64`
//! (`generation << 8 | state`), so every transition is a single
//! compare-and-swap and a stale stop request can never act on a newer session.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl ConnectionState {
    fn from_bits(bits: u64) -> Self {
        match bits & STATE_MASK {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Starting,
            2 => ConnectionState::Running,
            _ => ConnectionState::Stopping,
        }
    }
}

const STATE_MASK: u64 = 0xff;

fn pack(generation: u64, state: ConnectionState) -> u64 {
    (generation << 8) | state as u64
}

fn generation_of(bits: u64) -> u64 {
    bits >> 8
}

pub(crate) struct StateCell {
    bits: AtomicU64,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            bits: AtomicU64::new(pack(0, ConnectionState::Idle)),
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// `Idle -> Starting`, opening a new generation. `None` if not idle.
    pub(crate) fn begin_start(&self) -> Option<u64> {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if ConnectionState::from_bits(current) != ConnectionState::Idle {
                return None;
            }
            let generation = generation_of(current) + 1;
            match self.bits.compare_exchange(
                current,
                pack(generation, ConnectionState::Starting),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(generation),
                Err(actual) => current = actual,
            }
        }
    }

    /// `Starting -> Running` for `generation`.
    pub(crate) fn mark_running(&self, generation: u64) -> bool {
        self.bits
            .compare_exchange(
                pack(generation, ConnectionState::Starting),
                pack(generation, ConnectionState::Running),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Running -> Stopping`. Returns the generation that was stopped.
    pub(crate) fn begin_stop(&self) -> Option<u64> {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if ConnectionState::from_bits(current) != ConnectionState::Running {
                return None;
            }
            let generation = generation_of(current);
            match self.bits.compare_exchange(
                current,
                pack(generation, ConnectionState::Stopping),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(generation),
                Err(actual) => current = actual,
            }
        }
    }

    /// Back to `Idle` once the worker of `generation` has finished.
    pub(crate) fn finish(&self, generation: u64) {
        self.bits
            .store(pack(generation, ConnectionState::Idle), Ordering::Release);
    }
}
