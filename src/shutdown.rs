//! Graceful shutdown coordination.
//!
//! The gate drains rather than interrupts: once draining begins no new
//! requests are admitted, workers finish the dispatch they hold, and the
//! in-flight count reports what is still executing if the drain times out.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of a shutdown operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    /// Drain timed out with this many dispatches still executing.
    Timeout { remaining: u32 },
}

/// Tracks admission state and in-flight dispatches across the worker pool.
pub struct ShutdownCoordinator {
    state: RwLock<ShutdownState>,
    in_flight: Arc<AtomicU32>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ShutdownState::Running),
            in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.read()
    }

    /// Whether new requests may be admitted.
    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Stop admitting new requests; in-flight work continues.
    pub fn begin_drain(&self) {
        *self.state.write() = ShutdownState::Draining;
    }

    pub fn mark_stopped(&self) {
        *self.state.write() = ShutdownState::Stopped;
    }

    /// Track one in-flight dispatch. The count drops when the guard does.
    pub fn guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            counter: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for in-flight dispatch tracking.
pub struct InFlightGuard {
    counter: Arc<AtomicU32>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_in_flight_count() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.in_flight_count(), 0);

        let g1 = coordinator.guard();
        let g2 = coordinator.guard();
        assert_eq!(coordinator.in_flight_count(), 2);

        drop(g1);
        assert_eq!(coordinator.in_flight_count(), 1);
        drop(g2);
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[test]
    fn drain_stops_admission() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.is_accepting());

        coordinator.begin_drain();
        assert!(!coordinator.is_accepting());
        assert_eq!(coordinator.state(), ShutdownState::Draining);

        coordinator.mark_stopped();
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }
}
