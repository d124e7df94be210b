use futures_util::future::FutureExt;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    clock::SharedClock,
    models::{CacheStatus, PriceQuery, PriceRow, PriceSource, WalletBalance},
    services::{
        fallback_chain::{ChainOutcome, FallbackChain, Resolves},
        flight::{FlightHandle, FlightSlot},
        price_guard::position_value_usd,
    },
};

pub type PriceChain = FallbackChain<PriceQuery, PriceRow>;

impl Resolves<PriceRow> for PriceQuery {
    fn resolved_by(&self, row: &PriceRow) -> bool {
        row.key() == self.key()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionValue {
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub value_usd: f64,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletValuation {
    pub total_value_usd: f64,
    pub balances: Vec<PositionValue>,
}

#[derive(Default)]
struct PriceState {
    rows: HashMap<String, PriceRow>,
    last_fetch: Option<i64>,
}

struct PriceCacheInner {
    chain: PriceChain,
    ttl_secs: u64,
    clock: SharedClock,
    state: RwLock<PriceState>,
    flights: FlightSlot,
}

enum Pending {
    /// The in-flight refresh (ours or someone else's) covers every miss.
    Covered(FlightHandle),
    /// Another refresh is running for different keys; wait, then re-check.
    Busy(FlightHandle),
}

/// Coalescing TTL cache over the price fallback chain.
///
/// Lookups never fail: anything nothing could resolve comes back as a
/// zero-priced `mock` row.
#[derive(Clone)]
pub struct PriceCache {
    inner: Arc<PriceCacheInner>,
}

impl PriceCache {
    pub fn new(chain: PriceChain, ttl_secs: u64, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(PriceCacheInner {
                chain,
                ttl_secs,
                clock,
                state: RwLock::new(PriceState::default()),
                flights: FlightSlot::default(),
            }),
        }
    }

    pub async fn get_price(&self, symbol: &str, chain: Option<&str>) -> PriceRow {
        let query = PriceQuery::new(symbol, chain);
        let mut rows = self.get_prices(std::slice::from_ref(&query)).await;
        rows.pop()
            .unwrap_or_else(|| PriceRow::unresolved(&query, self.inner.clock.now_ms()))
    }

    /// Batch lookup. Misses are refreshed together in at most one upstream
    /// round trip; rows come back in request order.
    pub async fn get_prices(&self, queries: &[PriceQuery]) -> Vec<PriceRow> {
        loop {
            let pending = {
                let mut slot = self.inner.flights.lock();
                let misses = self.inner.misses(queries);
                if misses.is_empty() {
                    break;
                }
                let keys: BTreeSet<String> = misses.iter().map(PriceQuery::key).collect();

                match slot.as_ref() {
                    Some(flight) if flight.covers(&keys) => Pending::Covered(flight.handle()),
                    Some(flight) => Pending::Busy(flight.handle()),
                    None => {
                        let inner = self.inner.clone();
                        let handle = self.inner.flights.install(&mut slot, keys, move |id| {
                            async move {
                                let outcome = inner.chain.run(&misses).await;
                                inner.store(outcome, &misses);
                                inner.flights.finish(id);
                            }
                            .boxed()
                        });
                        Pending::Covered(handle)
                    }
                }
            };

            match pending {
                Pending::Covered(handle) => {
                    handle.await;
                    break;
                }
                Pending::Busy(handle) => handle.await,
            }
        }

        self.inner.assemble(queries)
    }

    /// Cache-only read: the fresh row for the key, if any. Never refreshes.
    pub fn get_cached_price(&self, symbol: &str, chain: Option<&str>) -> Option<PriceRow> {
        let key = PriceQuery::new(symbol, chain).key();
        let now = self.inner.clock.now_ms();
        let state = self.inner.read();
        state
            .rows
            .get(&key)
            .filter(|row| row.is_fresh(now, self.inner.ttl_ms()))
            .cloned()
    }

    pub fn cache_status(&self) -> CacheStatus {
        let state = self.inner.read();
        CacheStatus {
            size: state.rows.len(),
            last_fetch_timestamp: state.last_fetch,
            ttl_seconds: self.inner.ttl_secs,
        }
    }

    pub async fn value_wallet(&self, balances: &[WalletBalance]) -> WalletValuation {
        let queries: Vec<PriceQuery> = balances
            .iter()
            .map(|b| PriceQuery::new(&b.symbol, b.chain.as_deref()))
            .collect();
        let rows = self.get_prices(&queries).await;

        let balances: Vec<PositionValue> = balances
            .iter()
            .zip(rows)
            .map(|(balance, row)| PositionValue {
                value_usd: position_value_usd(balance.amount, row.price),
                symbol: row.symbol,
                amount: balance.amount,
                price: row.price,
                source: row.source,
            })
            .collect();

        WalletValuation {
            total_value_usd: balances.iter().map(|b| b.value_usd).sum(),
            balances,
        }
    }

    /// Sum of `amount * price`; unresolved prices count as zero.
    pub async fn wallet_value(&self, balances: &[WalletBalance]) -> f64 {
        self.value_wallet(balances).await.total_value_usd
    }

    pub fn clear(&self) {
        let mut state = self.inner.write();
        *state = PriceState::default();
        tracing::info!("Price cache cleared");
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.inner.chain.provider_names()
    }
}

impl PriceCacheInner {
    fn ttl_ms(&self) -> i64 {
        (self.ttl_secs as i64).saturating_mul(1000)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PriceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, PriceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Internal helper that collects distinct stale or missing queries.
    fn misses(&self, queries: &[PriceQuery]) -> Vec<PriceQuery> {
        let now = self.clock.now_ms();
        let ttl_ms = self.ttl_ms();
        let state = self.read();
        let mut seen = HashSet::new();

        queries
            .iter()
            .filter(|query| {
                let key = query.key();
                let fresh = state
                    .rows
                    .get(&key)
                    .is_some_and(|row| row.is_fresh(now, ttl_ms));
                !fresh && seen.insert(key)
            })
            .cloned()
            .collect()
    }

    fn store(&self, outcome: ChainOutcome<PriceRow>, requested: &[PriceQuery]) {
        let now = self.clock.now_ms();
        let keys: Vec<String> = requested.iter().map(PriceQuery::key).collect();

        match outcome.provider {
            Some(_) => tracing::info!(
                providers = ?outcome.resolved_by,
                rows = outcome.rows.len(),
                keys = ?keys,
                "Price refresh completed"
            ),
            None => tracing::warn!(keys = ?keys, "Price refresh returned nothing"),
        }

        let mut state = self.write();
        for mut row in outcome.rows {
            row.timestamp = now;
            state.rows.insert(row.key(), row);
        }
        if outcome.provider.is_some() {
            state.last_fetch = Some(now);
        }
    }

    fn assemble(&self, queries: &[PriceQuery]) -> Vec<PriceRow> {
        let now = self.clock.now_ms();
        let state = self.read();
        queries
            .iter()
            .map(|query| {
                state
                    .rows
                    .get(&query.key())
                    .cloned()
                    .unwrap_or_else(|| PriceRow::unresolved(query, now))
            })
            .collect()
    }
}
