use std::collections::HashMap;

use anyhow::{bail, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::earnings::CurrencyLedger;
use crate::error::check_status;
use crate::utils::format_amount;

pub const BASE_CURRENCY: &str = "USD";

/// USD-based rates: `1 USD = rate` units of the keyed currency.
pub type ExchangeRateTable = HashMap<String, Decimal>;

#[derive(Deserialize, Debug)]
struct RatesResponse {
    #[serde(default)]
    result: Option<String>,
    rates: ExchangeRateTable,
}

/// Downloads a fresh rate table. Nothing is cached between runs.
pub async fn fetch_rates(client: &Client, url: &str) -> Result<ExchangeRateTable> {
    let res = client.get(url).send().await?;
    let body: RatesResponse = check_status(res).await?.json().await?;
    if let Some(result) = body.result.as_deref() {
        if result != "success" {
            bail!("Exchange rate API returned result={}", result);
        }
    }
    debug!("Fetched {} exchange rates", body.rates.len());
    Ok(body.rates)
}

/// Sums the whole ledger in USD. `None` when any currency has no usable rate
/// or the arithmetic overflows.
pub fn convert_to_usd(ledger: &CurrencyLedger, rates: &ExchangeRateTable) -> Option<Decimal> {
    let mut total = Decimal::ZERO;
    for (currency, amount) in ledger.iter() {
        let converted = if currency == BASE_CURRENCY {
            amount
        } else {
            match rates.get(currency) {
                Some(rate) if !rate.is_zero() => amount.checked_div(*rate)?,
                _ => {
                    warn!("No exchange rate for {}", currency);
                    return None;
                }
            }
        };
        total = match total.checked_add(converted) {
            Some(total) => total,
            None => {
                warn!("USD total overflowed while adding {}", currency);
                return None;
            }
        };
    }
    Some(total)
}

/// `"<total> USD"` for a fully convertible ledger.
pub fn format_usd_total(ledger: &CurrencyLedger, rates: &ExchangeRateTable) -> Option<String> {
    convert_to_usd(ledger, rates).map(|total| format!("{} {}", format_amount(total), BASE_CURRENCY))
}

/// Currency normalizer used by the store fetcher.
#[derive(Clone, Debug)]
pub struct CurrencyNormalizer {
    client: Client,
    url: String,
}

impl CurrencyNormalizer {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// `"<total> USD"`, or `None` when the ledger cannot be fully converted.
    pub async fn normalize(&self, ledger: &CurrencyLedger) -> Option<String> {
        let rates = match fetch_rates(&self.client, &self.url).await {
            Ok(rates) => rates,
            Err(err) => {
                warn!("Could not fetch exchange rates: {:#}", err);
                return None;
            }
        };
        format_usd_total(ledger, &rates)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn ledger() -> CurrencyLedger {
        [("USD", dec!(2.10)), ("EUR", dec!(5.00))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_convert_with_complete_table() {
        let rates = ExchangeRateTable::from([("EUR".to_string(), dec!(0.92))]);
        let total = convert_to_usd(&ledger(), &rates).unwrap();
        assert_eq!(format_amount(total), "7.53");
    }

    #[test]
    fn test_missing_rate_fails_whole_ledger() {
        let rates = ExchangeRateTable::from([("GBP".to_string(), dec!(0.79))]);
        assert_eq!(convert_to_usd(&ledger(), &rates), None);
    }

    #[test]
    fn test_zero_rate_is_unusable() {
        let rates = ExchangeRateTable::from([("EUR".to_string(), dec!(0))]);
        assert_eq!(convert_to_usd(&ledger(), &rates), None);
    }

    #[test]
    fn test_usd_only_needs_no_rates() {
        let ledger: CurrencyLedger = [("USD", dec!(3.333))].into_iter().collect();
        assert_eq!(
            convert_to_usd(&ledger, &ExchangeRateTable::new()),
            Some(dec!(3.333))
        );
    }

    #[test]
    fn test_rates_response_decoding() {
        let body = json!({
            "result": "success",
            "base_code": "USD",
            "rates": { "USD": 1, "EUR": 0.92, "JPY": 151.3 }
        });
        let parsed: RatesResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.rates.get("EUR"), Some(&dec!(0.92)));
        assert_eq!(parsed.rates.get("JPY"), Some(&dec!(151.3)));
    }

    #[test]
    fn test_overflow_degrades_to_none() {
        let ledger: CurrencyLedger = [("USD", Decimal::MAX), ("EUR", dec!(5))]
            .into_iter()
            .collect();
        let rates = ExchangeRateTable::from([("EUR".to_string(), dec!(0.5))]);
        assert_eq!(convert_to_usd(&ledger, &rates), None);

        let ledger: CurrencyLedger = [("EUR", Decimal::MAX)].into_iter().collect();
        assert_eq!(convert_to_usd(&ledger, &rates), None);
    }

    #[test]
    fn test_format_usd_total() {
        let rates = ExchangeRateTable::from([("EUR".to_string(), dec!(0.92))]);
        assert_eq!(
            format_usd_total(&ledger(), &rates),
            Some("7.53 USD".to_string())
        );
        assert_eq!(format_usd_total(&ledger(), &ExchangeRateTable::new()), None);
    }

    /// Serves `body` as a JSON response to a single request.
    pub(crate) async fn serve_once(body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0_u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/latest/USD", addr)
    }

    #[tokio::test]
    async fn test_normalize_formats_usd_total() {
        let body = json!({ "result": "success", "rates": { "USD": 1, "EUR": 0.92 } });
        let url = serve_once(body.to_string()).await;
        let normalizer = CurrencyNormalizer::new(Client::new(), url);
        assert_eq!(
            normalizer.normalize(&ledger()).await,
            Some("7.53 USD".to_string())
        );
    }

    #[tokio::test]
    async fn test_normalize_with_incomplete_rates_yields_none() {
        let body = json!({ "result": "success", "rates": { "USD": 1, "GBP": 0.79 } });
        let url = serve_once(body.to_string()).await;
        let normalizer = CurrencyNormalizer::new(Client::new(), url);
        assert_eq!(normalizer.normalize(&ledger()).await, None);
    }

    #[tokio::test]
    async fn test_unreachable_rate_source_yields_none() {
        let normalizer = CurrencyNormalizer::new(Client::new(), "http://127.0.0.1:9/rates");
        assert_eq!(normalizer.normalize(&ledger()).await, None);
    }
}
