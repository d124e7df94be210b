use futures_util::future::FutureExt;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    clock::SharedClock,
    models::{CacheStatus, ProtocolHint, YieldBundle, YieldRow},
    services::{
        fallback_chain::{ChainOutcome, FallbackChain, Resolves},
        flight::FlightSlot,
    },
};

pub type YieldChain = FallbackChain<ProtocolHint, YieldRow>;

impl Resolves<YieldRow> for ProtocolHint {
    fn resolved_by(&self, row: &YieldRow) -> bool {
        row.protocol == self.name && row.chain == self.chain
    }
}

// Every refresh covers the full hint list, so flights share one key.
const BUNDLE_KEY: &str = "yields";

#[derive(Default)]
struct YieldState {
    bundle: Option<Arc<YieldBundle>>,
    last_fetch: Option<i64>,
}

struct YieldCacheInner {
    chain: YieldChain,
    hints: Vec<ProtocolHint>,
    ttl_secs: u64,
    clock: SharedClock,
    state: RwLock<YieldState>,
    flights: FlightSlot,
}

/// Single-snapshot cache over the yield chain. The snapshot is replaced
/// whole on success and kept as-is when every provider fails.
#[derive(Clone)]
pub struct YieldCache {
    inner: Arc<YieldCacheInner>,
}

impl YieldCache {
    pub fn new(chain: YieldChain, hints: Vec<ProtocolHint>, ttl_secs: u64, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(YieldCacheInner {
                chain,
                hints,
                ttl_secs,
                clock,
                state: RwLock::new(YieldState::default()),
                flights: FlightSlot::default(),
            }),
        }
    }

    /// Current snapshot, refreshing first when it is missing or older than
    /// the TTL. Returns an empty bundle (`updatedAt = 0`) if nothing has ever
    /// been fetched.
    pub async fn live_bundle(&self) -> Arc<YieldBundle> {
        let handle = {
            let mut slot = self.inner.flights.lock();
            if let Some(bundle) = self.inner.fresh_bundle() {
                return bundle;
            }

            match slot.as_ref() {
                Some(flight) => flight.handle(),
                None => {
                    let inner = self.inner.clone();
                    let keys = BTreeSet::from([BUNDLE_KEY.to_string()]);
                    self.inner.flights.install(&mut slot, keys, move |id| {
                        async move {
                            let outcome = inner.chain.run(&inner.hints).await;
                            inner.store(outcome);
                            inner.flights.finish(id);
                        }
                        .boxed()
                    })
                }
            }
        };

        handle.await;
        self.inner
            .read()
            .bundle
            .clone()
            .unwrap_or_else(|| Arc::new(YieldBundle::empty(0)))
    }

    pub fn status(&self) -> CacheStatus {
        let state = self.inner.read();
        CacheStatus {
            size: state.bundle.as_ref().map_or(0, |bundle| bundle.protocols.len()),
            last_fetch_timestamp: state.last_fetch,
            ttl_seconds: self.inner.ttl_secs,
        }
    }

    pub fn clear(&self) {
        *self.inner.write() = YieldState::default();
        tracing::info!("Yield cache cleared");
    }

    pub fn hint_count(&self) -> usize {
        self.inner.hints.len()
    }
}

impl YieldCacheInner {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, YieldState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, YieldState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_bundle(&self) -> Option<Arc<YieldBundle>> {
        let now = self.clock.now_ms();
        let ttl_ms = (self.ttl_secs as i64).saturating_mul(1000);
        self.read()
            .bundle
            .as_ref()
            .filter(|bundle| now - bundle.updated_at <= ttl_ms)
            .cloned()
    }

    fn store(&self, outcome: ChainOutcome<YieldRow>) {
        let Some(provider) = outcome.provider else {
            tracing::warn!(
                failures = outcome.failures.len(),
                "Yield refresh failed, keeping previous snapshot"
            );
            return;
        };

        let now = self.clock.now_ms();
        tracing::info!(provider, protocols = outcome.rows.len(), "Yield refresh completed");

        let mut state = self.write();
        state.bundle = Some(Arc::new(YieldBundle {
            updated_at: now,
            protocols: outcome.rows,
        }));
        state.last_fetch = Some(now);
    }
}
