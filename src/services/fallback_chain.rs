use std::time::Duration;

use crate::error::ProviderError;

// ==================== PROVIDER TRAIT ====================

/// One upstream data source. Implementations make a single upstream call per
/// `fetch` and never retry; unresolved requests are simply left out.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    type Request: Sync;
    type Row: Send;

    fn name(&self) -> &'static str;

    async fn fetch(&self, batch: &[Self::Request]) -> Result<Vec<Self::Row>, ProviderError>;
}

pub type BoxedProvider<Q, R> = Box<dyn Provider<Request = Q, Row = R>>;

/// Links a request to the rows that answer it, so the chain can hand the
/// leftovers to the next provider.
pub trait Resolves<R> {
    fn resolved_by(&self, row: &R) -> bool;
}

#[derive(Debug)]
pub struct ChainOutcome<R> {
    pub rows: Vec<R>,
    /// First provider that answered without error, `None` when every provider failed.
    pub provider: Option<&'static str>,
    /// Providers that contributed at least one row, in priority order.
    pub resolved_by: Vec<&'static str>,
    pub failures: Vec<ProviderError>,
}

// ==================== CHAIN ====================

/// Ordered list of providers. Each provider only sees the requests the
/// earlier ones left unresolved; the walk stops once nothing is pending.
/// Never errors.
pub struct FallbackChain<Q, R> {
    providers: Vec<BoxedProvider<Q, R>>,
    timeout: Duration,
}

impl<Q, R> FallbackChain<Q, R>
where
    Q: Resolves<R> + Clone + Sync + 'static,
    R: Send + 'static,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            timeout,
        }
    }

    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: Provider<Request = Q, Row = R> + 'static,
    {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn run(&self, batch: &[Q]) -> ChainOutcome<R> {
        let mut pending: Vec<Q> = batch.to_vec();
        let mut rows = Vec::new();
        let mut provider = None;
        let mut resolved_by = Vec::new();
        let mut failures = Vec::new();

        for source in &self.providers {
            if pending.is_empty() {
                break;
            }
            let name = source.name();
            let result = match tokio::time::timeout(self.timeout, source.fetch(&pending)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: name,
                    after_ms: self.timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(found) => {
                    provider.get_or_insert(name);
                    pending.retain(|request| !found.iter().any(|row| request.resolved_by(row)));
                    if !found.is_empty() {
                        resolved_by.push(name);
                    }
                    tracing::debug!(
                        provider = name,
                        rows = found.len(),
                        unresolved = pending.len(),
                        "Provider answered"
                    );
                    rows.extend(found);
                }
                Err(err) => {
                    tracing::warn!(provider = name, error = %err, "Provider failed, trying next");
                    failures.push(err);
                }
            }
        }

        if provider.is_none() {
            tracing::warn!(
                failed = ?failures.iter().map(ProviderError::provider).collect::<Vec<_>>(),
                "All providers failed for batch of {}",
                batch.len()
            );
        }
        ChainOutcome {
            rows,
            provider,
            resolved_by,
            failures,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeProvider;
    use super::*;
    use std::sync::atomic::Ordering;

    impl Resolves<String> for String {
        fn resolved_by(&self, row: &String) -> bool {
            row.ends_with(&format!(":{}", self))
        }
    }

    fn echo(tag: &'static str) -> FakeProvider<String, String> {
        FakeProvider::new(tag, move |batch: &[String]| {
            Ok(batch.iter().map(|q| format!("{}:{}", tag, q)).collect())
        })
    }

    fn batch() -> Vec<String> {
        vec!["ETH".to_string(), "SOL".to_string()]
    }

    #[tokio::test]
    async fn first_success_wins() {
        let secondary = echo("secondary");
        let secondary_calls = secondary.counter();
        let chain = FallbackChain::new(Duration::from_secs(1))
            .with_provider(echo("primary"))
            .with_provider(secondary);

        let outcome = chain.run(&batch()).await;

        assert_eq!(outcome.provider, Some("primary"));
        assert_eq!(outcome.rows, vec!["primary:ETH", "primary:SOL"]);
        assert!(outcome.failures.is_empty());
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_falls_through_in_order() {
        let chain = FallbackChain::new(Duration::from_secs(1))
            .with_provider(FakeProvider::<String, String>::failing("primary"))
            .with_provider(echo("secondary"));

        let outcome = chain.run(&batch()).await;

        assert_eq!(outcome.provider, Some("secondary"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider(), "primary");
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let slow = echo("slow").with_delay(Duration::from_secs(5));
        let chain = FallbackChain::new(Duration::from_millis(20))
            .with_provider(slow)
            .with_provider(echo("fast"));

        let outcome = chain.run(&batch()).await;

        assert_eq!(outcome.provider, Some("fast"));
        assert!(matches!(
            outcome.failures[0],
            ProviderError::Timeout { provider: "slow", after_ms: 20 }
        ));
    }

    #[tokio::test]
    async fn exhausted_chain_returns_empty_outcome() {
        let chain: FallbackChain<String, String> = FallbackChain::new(Duration::from_secs(1))
            .with_provider(FakeProvider::<String, String>::failing("only"));

        let outcome = chain.run(&batch()).await;

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.provider, None);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn provider_names_keep_priority_order() {
        let chain = FallbackChain::new(Duration::from_secs(1))
            .with_provider(echo("a"))
            .with_provider(echo("b"));
        assert_eq!(chain.provider_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unresolved_requests_move_to_next_provider() {
        let partial = FakeProvider::<String, String>::new("partial", |batch: &[String]| {
            Ok(batch
                .iter()
                .filter(|q| q.as_str() == "ETH")
                .map(|q| format!("partial:{}", q))
                .collect())
        });
        let backup = echo("backup");
        let backup_calls = backup.counter();
        let chain = FallbackChain::new(Duration::from_secs(1))
            .with_provider(partial)
            .with_provider(backup);

        let outcome = chain.run(&batch()).await;

        assert_eq!(outcome.rows, vec!["partial:ETH", "backup:SOL"]);
        assert_eq!(outcome.provider, Some("partial"));
        assert_eq!(outcome.resolved_by, vec!["partial", "backup"]);
        assert_eq!(backup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_answer_does_not_end_the_walk() {
        let chain = FallbackChain::new(Duration::from_secs(1))
            .with_provider(FakeProvider::<String, String>::new("empty", |_: &[String]| Ok(Vec::new())))
            .with_provider(echo("last"));

        let outcome = chain.run(&batch()).await;

        assert_eq!(outcome.rows, vec!["last:ETH", "last:SOL"]);
        assert_eq!(outcome.provider, Some("empty"));
        assert_eq!(outcome.resolved_by, vec!["last"]);
    }
}
