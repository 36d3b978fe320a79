//! Per-key in-flight registry used to coalesce concurrent cache misses.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of keys currently being computed.
#[derive(Debug, Default)]
pub struct SingleFlight {
    flights: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SingleFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other caller holds `key`, then holds it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let flight = {
            let mut flights = self.flights.lock();
            prune_abandoned(&mut flights);
            Arc::clone(
                flights
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = flight.lock_owned().await;
        FlightGuard {
            registry: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a computation in progress or queued.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let mut flights = self.flights.lock();
        prune_abandoned(&mut flights);
        flights.len()
    }
}

/// Drops entries only the registry still references. A waiter cancelled
/// after the holder released leaves such an entry behind.
fn prune_abandoned(flights: &mut HashMap<String, Arc<AsyncMutex<()>>>) {
    flights.retain(|_, flight| Arc::strong_count(flight) > 1);
}

/// Holds one key of a [`SingleFlight`] registry.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    registry: &'a SingleFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };

        let mut flights = self.registry.flights.lock();
        let flight = OwnedMutexGuard::mutex(&guard);
        // Only the registry and this guard still reference the lock: nobody is waiting.
        if Arc::strong_count(flight) == 2
            && flights.get(&self.key).is_some_and(|f| Arc::ptr_eq(f, flight))
        {
            flights.remove(&self.key);
        }
        drop(flights);
        drop(guard);
    }
}
