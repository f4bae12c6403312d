use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::auth::refresh_access_token;
use crate::config::{required, AdMobConfig};
use crate::earnings::{EarningsResult, Source};
use crate::error::check_status;
use crate::utils::{days_before, format_amount, micros_to_units};

use super::EarningsSource;

const ENDPOINT: &str = "https://admob.googleapis.com/v1";
const EARNINGS_METRIC: &str = "ESTIMATED_EARNINGS";
const DEFAULT_CURRENCY: &str = "USD";
const REPORT_LAG_DAYS: u64 = 1;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub header: Option<ReportHeader>,
    pub row: Option<ReportRow>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeader {
    pub localization_settings: Option<LocalizationSettings>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationSettings {
    pub currency_code: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub metric_values: HashMap<String, MetricValue>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub micros_value: Option<Value>,
}

impl MetricValue {
    /// int64 micros arrive as a JSON string; anything unreadable counts as zero.
    fn micros(&self) -> i64 {
        match &self.micros_value {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Sums earnings micros across report rows and picks the reported currency.
pub fn summarize_report(items: &[ReportItem]) -> (i64, String) {
    let mut currency = DEFAULT_CURRENCY.to_string();
    let mut total_micros: i64 = 0;

    for item in items {
        if let Some(settings) = item
            .header
            .as_ref()
            .and_then(|header| header.localization_settings.as_ref())
        {
            currency = settings
                .currency_code
                .clone()
                .filter(|code| !code.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        }
        if let Some(metric) = item
            .row
            .as_ref()
            .and_then(|row| row.metric_values.get(EARNINGS_METRIC))
        {
            total_micros = total_micros.saturating_add(metric.micros());
        }
    }

    (total_micros, currency)
}

/// Day reported on when running on `today`: yesterday.
pub fn report_day(today: NaiveDate) -> NaiveDate {
    days_before(today, REPORT_LAG_DAYS)
}

/// Earnings in major units with two decimals, in the report's currency.
pub fn earnings_from_items(date: NaiveDate, items: &[ReportItem]) -> EarningsResult {
    let (micros, currency) = summarize_report(items);
    EarningsResult::new(
        date,
        format_amount(micros_to_units(micros)),
        Some(&currency),
    )
}

fn report_date(date: NaiveDate) -> Value {
    json!({ "year": date.year(), "month": date.month(), "day": date.day() })
}

/// AdMob network report fetcher, reporting yesterday's estimated earnings.
#[derive(Clone, Debug)]
pub struct AdMob {
    client: Client,
    config: AdMobConfig,
}

impl AdMob {
    pub fn new(client: Client, config: AdMobConfig) -> Self {
        Self { client, config }
    }

    pub async fn generate_network_report(&self, date: NaiveDate) -> Result<Vec<ReportItem>> {
        let account_id = required(&self.config.account_id, "AD_MOB_ACCOUNT_ID")?;
        let access_token = refresh_access_token(&self.client, &self.config).await?;

        let body = json!({
            "reportSpec": {
                "dateRange": {
                    "startDate": report_date(date),
                    "endDate": report_date(date),
                },
                "metrics": [EARNINGS_METRIC],
            }
        });
        let url = format!("{ENDPOINT}/accounts/{account_id}/networkReport:generate");

        info!("{}", url);

        let res = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let items: Vec<ReportItem> = check_status(res)
            .await?
            .json()
            .await
            .context("Invalid AdMob report")?;

        debug!("AdMob report : {:?}", items);

        Ok(items)
    }
}

impl EarningsSource for AdMob {
    fn source(&self) -> Source {
        Source::AdMob
    }

    async fn fetch_earnings(&self, today: NaiveDate) -> Result<EarningsResult> {
        let date = report_day(today);
        let items = self.generate_network_report(date).await?;
        Ok(earnings_from_items(date, &items))
    }
}
