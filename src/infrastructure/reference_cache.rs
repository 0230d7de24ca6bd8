//! External reference quote with a time-to-live cache
//!
//! One HTTP lookup returns the latest price and daily variation of a reference
//! instrument. The cache serves the stored values while fresh, refreshes once
//! when stale and falls back to the stored values when the refresh fails.

use serde_json::Value;
use std::time::{Duration, Instant};

/// Price and daily variation (percent) of the reference instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct ReferenceQuote {
    pub price: Option<f64>,
    pub variation: Option<f64>,
}

/// Reference lookup errors
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

/// Source of reference quotes
#[allow(async_fn_in_trait)]
pub trait ReferenceSource {
    async fn fetch(&self) -> Result<ReferenceQuote, ReferenceError>;
}

/// Reference quote over HTTP
///
/// Expects a JSON array whose first object carries `ultimo` (or `last`) and
/// `variacion` (or `variation`), as numbers or numeric strings.
#[derive(Clone)]
pub struct HttpReferenceSource {
    client: reqwest::Client,
    url: String,
}

impl HttpReferenceSource {
    /// # Errors
    /// Fails if the HTTP client cannot be built (TLS backend unavailable).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReferenceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl ReferenceSource for HttpReferenceSource {
    async fn fetch(&self) -> Result<ReferenceQuote, ReferenceError> {
        let body: Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_reference_body(&body)
    }
}

/// Extract the reference quote from a decoded response body
pub fn parse_reference_body(body: &Value) -> Result<ReferenceQuote, ReferenceError> {
    let row = body
        .as_array()
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
        .ok_or_else(|| ReferenceError::Shape("expected a non-empty array of objects".into()))?;

    let field = |names: &[&str]| names.iter().find_map(|name| row.get(*name).and_then(as_number));

    let price = field(&["ultimo", "last"])
        .ok_or_else(|| ReferenceError::Shape("missing last price".into()))?;

    Ok(ReferenceQuote {
        price: Some(price),
        variation: field(&["variacion", "variation"]),
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Time-to-live cache in front of a [`ReferenceSource`]
pub struct ReferenceQuoteCache<S> {
    source: S,
    ttl: Duration,
    cached: ReferenceQuote,
    /// Time of the last successful fetch
    fetched_at: Option<Instant>,
}

impl<S: ReferenceSource> ReferenceQuoteCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: ReferenceQuote::default(),
            fetched_at: None,
        }
    }

    /// Cached quote if younger than `max_age`, otherwise one fetch attempt
    ///
    /// A failed fetch returns the previous values (unknown before the first
    /// success) and leaves the cache age unchanged.
    pub async fn get(&mut self, max_age: Duration) -> ReferenceQuote {
        if let Some(at) = self.fetched_at {
            if at.elapsed() < max_age {
                return self.cached;
            }
        }

        match self.source.fetch().await {
            Ok(quote) => {
                self.cached = quote;
                self.fetched_at = Some(Instant::now());
            }
            Err(e) => {
                tracing::warn!(target: "reference", "Reference fetch failed, serving cached: {}", e);
            }
        }
        self.cached
    }

    /// [`ReferenceQuoteCache::get`] with the configured TTL
    pub async fn current(&mut self) -> ReferenceQuote {
        self.get(self.ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<ReferenceQuote, ReferenceError>>>,
    }

    impl MockSource {
        fn new(responses: Vec<Result<ReferenceQuote, ReferenceError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            }
        }
    }

    impl ReferenceSource for MockSource {
        async fn fetch(&self) -> Result<ReferenceQuote, ReferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err(ReferenceError::Shape("exhausted".into()));
            }
            responses.remove(0)
        }
    }

    fn quote(price: f64, variation: f64) -> ReferenceQuote {
        ReferenceQuote {
            price: Some(price),
            variation: Some(variation),
        }
    }

    #[tokio::test]
    async fn test_fresh_cache_does_not_fetch() {
        let source = MockSource::new(vec![Ok(quote(1200.0, 0.5)), Ok(quote(1300.0, 1.0))]);
        let mut cache = ReferenceQuoteCache::new(source, Duration::from_secs(30));

        assert_eq!(cache.current().await, quote(1200.0, 0.5));
        assert_eq!(cache.current().await, quote(1200.0, 0.5));
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_refetches() {
        let source = MockSource::new(vec![Ok(quote(1200.0, 0.5)), Ok(quote(1300.0, 1.0))]);
        let mut cache = ReferenceQuoteCache::new(source, Duration::from_secs(30));

        cache.current().await;
        assert_eq!(cache.get(Duration::ZERO).await, quote(1300.0, 1.0));
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_serves_previous_values() {
        let source = MockSource::new(vec![
            Ok(quote(1200.0, 0.5)),
            Err(ReferenceError::Shape("boom".into())),
        ]);
        let mut cache = ReferenceQuoteCache::new(source, Duration::from_secs(30));

        cache.current().await;
        assert_eq!(cache.get(Duration::ZERO).await, quote(1200.0, 0.5));
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_before_first_success_is_unknown() {
        let source = MockSource::new(vec![Err(ReferenceError::Shape("boom".into()))]);
        let mut cache = ReferenceQuoteCache::new(source, Duration::from_secs(30));

        assert_eq!(cache.current().await, ReferenceQuote::default());
        // no success yet, so the next call tries again
        cache.current().await;
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_reference_body() {
        let body = serde_json::json!([{"ultimo": "1234.5", "variacion": -0.25}, {"ultimo": 1}]);
        assert_eq!(parse_reference_body(&body).unwrap(), quote(1234.5, -0.25));

        let body = serde_json::json!([{"last": 10, "variation": "1.5"}]);
        assert_eq!(parse_reference_body(&body).unwrap(), quote(10.0, 1.5));

        let body = serde_json::json!([{"ultimo": 10}]);
        assert_eq!(parse_reference_body(&body).unwrap().variation, None);
    }

    #[test]
    fn test_parse_reference_body_rejects_shapes() {
        for body in [
            serde_json::json!([]),
            serde_json::json!({"ultimo": 1}),
            serde_json::json!(["x"]),
            serde_json::json!([{"ultimo": "n/a"}]),
        ] {
            assert!(matches!(parse_reference_body(&body), Err(ReferenceError::Shape(_))));
        }
    }
}
