use std::io::Read;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use flate2::read::GzDecoder;
use reqwest::Client;
use tracing::{debug, info};

use crate::auth::sign_app_store_token;
use crate::config::{load_private_key, required, AppStoreConfig};
use crate::earnings::{CurrencyLedger, EarningsResult, Source};
use crate::error::{check_status, SourceError};
use crate::fx::CurrencyNormalizer;
use crate::utils::{days_before, parse_proceeds};

use super::EarningsSource;

const ENDPOINT: &str = "https://api.appstoreconnect.apple.com/v1";
const PROCEEDS_COLUMN: &str = "Developer Proceeds";
const CURRENCY_COLUMN: &str = "Currency of Proceeds";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Days between today and the newest sales report reliably available.
const REPORT_LAG_DAYS: u64 = 2;

/// Day whose sales report is requested when running on `today`.
pub fn report_day(today: NaiveDate) -> NaiveDate {
    days_before(today, REPORT_LAG_DAYS)
}

/// Decompresses a sales report body. Plain bodies are passed through.
pub fn decode_report(body: &[u8]) -> Result<String, SourceError> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }
    let mut text = String::new();
    GzDecoder::new(body)
        .read_to_string(&mut text)
        .map_err(|err| SourceError::Decode(err.to_string()))?;
    Ok(text)
}

/// Builds the per-currency proceeds ledger from a tab-separated summary report.
///
/// Columns are located by header name. `None` when the report has no data rows
/// or lacks the proceeds or currency column.
pub fn parse_sales_report(text: &str) -> Option<CurrencyLedger> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();
    if lines.len() < 2 {
        return None;
    }

    let header: Vec<&str> = lines[0].split('\t').map(str::trim).collect();
    let proceeds_index = header.iter().position(|name| *name == PROCEEDS_COLUMN)?;
    let currency_index = header.iter().position(|name| *name == CURRENCY_COLUMN)?;

    let mut ledger = CurrencyLedger::new();
    for line in lines.iter().skip(1).filter(|line| !line.is_empty()) {
        let columns: Vec<&str> = line.split('\t').collect();
        let (Some(proceeds), Some(currency)) =
            (columns.get(proceeds_index), columns.get(currency_index))
        else {
            continue;
        };
        let currency = currency.trim();
        if currency.is_empty() {
            continue;
        }
        match parse_proceeds(proceeds) {
            Some(amount) if !amount.is_zero() => {
                ledger.add(currency, amount);
            }
            _ => {}
        }
    }

    Some(ledger)
}

/// App Store Connect daily sales summary fetcher.
#[derive(Clone, Debug)]
pub struct AppStore {
    client: Client,
    config: AppStoreConfig,
    normalizer: CurrencyNormalizer,
}

impl AppStore {
    pub fn new(client: Client, config: AppStoreConfig, normalizer: CurrencyNormalizer) -> Self {
        Self {
            client,
            config,
            normalizer,
        }
    }

    pub async fn get_sales_report(&self, report_date: NaiveDate) -> Result<String> {
        let issuer_id = required(&self.config.issuer_id, "APP_STORE_ISSUER_ID")?;
        let key_id = required(&self.config.key_id, "APP_STORE_KEY_ID")?;
        let private_key = required(&self.config.private_key, "APP_STORE_PRIVATE_KEY")?;
        let vendor_number = required(&self.config.vendor_number, "APP_STORE_VENDOR_NUMBER")?;

        let pem = load_private_key(private_key).await?;
        let token = sign_app_store_token(issuer_id, key_id, &pem, Utc::now())?;

        let report_date = report_date.format("%Y-%m-%d").to_string();
        let params = [
            ("filter[reportType]", "SALES"),
            ("filter[reportSubType]", "SUMMARY"),
            ("filter[frequency]", "DAILY"),
            ("filter[reportDate]", report_date.as_str()),
            ("filter[vendorNumber]", vendor_number),
            ("filter[version]", "1_0"),
        ];
        let url = format!("{ENDPOINT}/salesReports");

        info!("{} reportDate={}", url, report_date);

        let res = self
            .client
            .get(url)
            .query(&params)
            .bearer_auth(token)
            .send()
            .await?;
        let body = check_status(res).await?.bytes().await?;
        let text = decode_report(&body).context("Invalid sales report")?;

        debug!("Sales report : {} bytes, {} lines", body.len(), text.lines().count());

        Ok(text)
    }

    /// Result for a decoded report: zero when it has nothing usable, otherwise
    /// the formatted ledger with the currency already inside the amount.
    pub async fn earnings_from_report(&self, date: NaiveDate, text: &str) -> EarningsResult {
        let Some(ledger) = parse_sales_report(text) else {
            info!("Sales report for {} has no usable rows", date);
            return EarningsResult::zero(date);
        };
        let earnings = self.format_ledger(&ledger).await;
        EarningsResult::new(date, earnings, None)
    }

    /// Single USD total when every currency converts, otherwise one amount per currency.
    pub async fn format_ledger(&self, ledger: &CurrencyLedger) -> String {
        if ledger.is_empty() {
            return "0.00 USD".to_string();
        }
        match self.normalizer.normalize(ledger).await {
            Some(total) => total,
            None => ledger.to_multi_currency(),
        }
    }
}

impl EarningsSource for AppStore {
    fn source(&self) -> Source {
        Source::AppStore
    }

    async fn fetch_earnings(&self, today: NaiveDate) -> Result<EarningsResult> {
        let date = report_day(today);
        let text = self.get_sales_report(date).await?;
        Ok(self.earnings_from_report(date, &text).await)
    }
}
