use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Completion signal of an in-flight refresh, awaitable by any number of callers.
pub type FlightHandle = Shared<BoxFuture<'static, ()>>;

pub struct Flight {
    id: u64,
    keys: BTreeSet<String>,
    done: FlightHandle,
}

impl Flight {
    pub fn covers(&self, keys: &BTreeSet<String>) -> bool {
        keys.is_subset(&self.keys)
    }

    pub fn handle(&self) -> FlightHandle {
        self.done.clone()
    }
}

/// Holds at most one refresh per cache instance.
///
/// Callers take the slot lock, inspect the current flight and either join it
/// or install a new one while still holding the lock, so two callers can
/// never start overlapping refreshes.
#[derive(Default)]
pub struct FlightSlot {
    slot: Mutex<Option<Flight>>,
    next_id: AtomicU64,
}

impl FlightSlot {
    pub fn lock(&self) -> MutexGuard<'_, Option<Flight>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds the refresh future for a fresh flight id, parks it in the slot
    /// and drives it on the runtime so it completes even if every caller
    /// goes away. The future must call [`FlightSlot::finish`] with its id.
    pub fn install<F>(
        &self,
        slot: &mut Option<Flight>,
        keys: BTreeSet<String>,
        start: F,
    ) -> FlightHandle
    where
        F: FnOnce(u64) -> BoxFuture<'static, ()>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let done = start(id).shared();
        *slot = Some(Flight {
            id,
            keys,
            done: done.clone(),
        });
        tokio::spawn(done.clone());
        done
    }

    pub fn finish(&self, id: u64) {
        let mut slot = self.lock();
        if slot.as_ref().map(|flight| flight.id) == Some(id) {
            *slot = None;
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }
}
