//! Rate provider trait and implementations.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use walletd_common::Currency;

use crate::error::{FxError, FxResult};

/// Trait for external rate sources.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the conversion rate from `base` to `quote`.
    async fn rate(&self, base: &Currency, quote: &Currency) -> FxResult<Decimal>;
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    data: HashMap<String, RateEntry>,
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    value: Decimal,
}

/// Rate provider backed by a currencyapi-style HTTP endpoint.
///
/// Lookups are a single GET keyed by base and target currency; a missing
/// rate in an otherwise well-formed response means the currency code is not
/// quoted, which is distinct from a transport failure.
pub struct CurrencyApiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CurrencyApiProvider {
    /// Create a provider against the given API base URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl RateProvider for CurrencyApiProvider {
    fn name(&self) -> &str {
        "currencyapi"
    }

    async fn rate(&self, base: &Currency, quote: &Currency) -> FxResult<Decimal> {
        let url = format!("{}/v3/latest", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("base_currency", base.code()),
                ("currencies", quote.code()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(quote = %quote, error = %e, "rate lookup failed");
                FxError::Provider(e.to_string())
            })?;

        let body: RateResponse = response
            .error_for_status()
            .map_err(|e| FxError::Provider(e.to_string()))?
            .json()
            .await
            .map_err(|e| FxError::Provider(e.to_string()))?;

        match body.data.get(quote.code()) {
            Some(entry) => {
                debug!(quote = %quote, rate = %entry.value, "rate fetched");
                Ok(entry.value)
            }
            None => Err(FxError::RateNotAvailable(quote.clone())),
        }
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    rates: dashmap::DashMap<String, Decimal>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
        }
    }

    /// Set the rate for a base/quote pair.
    pub fn set_rate(&self, base: &Currency, quote: &Currency, rate: Decimal) {
        self.rates
            .insert(format!("{}/{}", base.code(), quote.code()), rate);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rate(&self, base: &Currency, quote: &Currency) -> FxResult<Decimal> {
        self.rates
            .get(&format!("{}/{}", base.code(), quote.code()))
            .map(|r| *r)
            .ok_or_else(|| FxError::RateNotAvailable(quote.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockRateProvider::new("test");
        provider.set_rate(&Currency::inr(), &Currency::new("USD"), dec!(0.012));

        let rate = provider
            .rate(&Currency::inr(), &Currency::new("USD"))
            .await
            .unwrap();
        assert_eq!(rate, dec!(0.012));
    }

    #[tokio::test]
    async fn test_mock_provider_missing_rate() {
        let provider = MockRateProvider::new("test");
        let result = provider.rate(&Currency::inr(), &Currency::new("XYZ")).await;
        assert!(matches!(result, Err(FxError::RateNotAvailable(_))));
    }

    #[test]
    fn test_rate_response_shape() {
        // The currencyapi v3 body nests rates under "data".
        let body: RateResponse = serde_json::from_str(
            r#"{"data": {"USD": {"value": 0.01203}, "EUR": {"value": 0.01105}}}"#,
        )
        .unwrap();
        assert_eq!(body.data["USD"].value, dec!(0.01203));
    }
}
