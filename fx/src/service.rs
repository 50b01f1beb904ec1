//! Balance conversion service.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use walletd_common::Currency;

use crate::error::FxResult;
use crate::provider::RateProvider;

/// Converts INR minor-unit balances into other currencies for display.
pub struct FxService {
    provider: Arc<dyn RateProvider>,
}

impl FxService {
    /// Create a service over the given provider.
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self { provider }
    }

    /// Convert a balance to the target currency.
    ///
    /// Converted value = `balance * rate`, rounded to 2 decimal places.
    /// Lookup failures are terminal for the request; there is no retry.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn convert_balance(&self, balance: i64, target: &Currency) -> FxResult<Decimal> {
        let rate = self.provider.rate(&Currency::inr(), target).await?;
        Ok((Decimal::from(balance) * rate).round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::provider::MockRateProvider;

    fn service_with_rate(quote: &str, rate: Decimal) -> FxService {
        let provider = MockRateProvider::new("test");
        provider.set_rate(&Currency::inr(), &Currency::new(quote), rate);
        FxService::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_convert_rounds_to_two_places() {
        let service = service_with_rate("USD", dec!(0.01203));
        let converted = service
            .convert_balance(700, &Currency::new("USD"))
            .await
            .unwrap();
        // 700 * 0.01203 = 8.421
        assert_eq!(converted, dec!(8.42));
    }

    #[tokio::test]
    async fn test_convert_unknown_currency_fails() {
        let service = service_with_rate("USD", dec!(0.012));
        let result = service.convert_balance(700, &Currency::new("XYZ")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_balance_converts_to_zero() {
        let service = service_with_rate("USD", dec!(0.012));
        let converted = service
            .convert_balance(0, &Currency::new("USD"))
            .await
            .unwrap();
        assert_eq!(converted, dec!(0.00));
    }
}
