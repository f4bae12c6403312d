//! Daily report assembly.
//!
//! Both sources are fetched concurrently and each outcome is kept on its own,
//! so one failing API never hides the other's figures. The message is always
//! rendered and sent, even when every source failed.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{error, info};

use crate::earnings::{EarningsResult, Source};
use crate::notifier::Notifier;
use crate::source::EarningsSource;

pub const REPORT_TITLE: &str = "📱 <b>Apps Daily Report</b>";
pub const FAILURE_NOTICE: &str = "❌ <b>Apps Report Error</b>\nCheck logs for details.";
const SECTION_ERROR: &str = "❌ Error fetching data";

pub fn render_section(source: Source, result: &Result<EarningsResult>) -> String {
    let title = format!("{} <b>{}</b>", source.icon(), source);
    match result {
        Ok(earnings) => format!(
            "{}\n📅 Date: <code>{}</code>\n💵 Earnings: <b>{}</b>",
            title,
            earnings.date.format("%Y-%m-%d"),
            earnings.display_amount()
        ),
        Err(_) => format!("{}\n{}", title, SECTION_ERROR),
    }
}

pub fn render_report(sections: &[(Source, Result<EarningsResult>)]) -> String {
    let mut message = REPORT_TITLE.to_string();
    for (source, result) in sections {
        message.push_str("\n\n");
        message.push_str(&render_section(*source, result));
    }
    message
}

/// Runs one report tick over two sources and delivers the outcome.
#[derive(Clone, Debug)]
pub struct Reporter<A, B, N> {
    first: A,
    second: B,
    notifier: N,
}

impl<A, B, N> Reporter<A, B, N>
where
    A: EarningsSource,
    B: EarningsSource,
    N: Notifier,
{
    pub fn new(first: A, second: B, notifier: N) -> Self {
        Self {
            first,
            second,
            notifier,
        }
    }

    /// Fetches both sources concurrently, keeping every outcome.
    pub async fn collect(&self, today: NaiveDate) -> Vec<(Source, Result<EarningsResult>)> {
        let (first, second) = tokio::join!(
            self.first.fetch_earnings(today),
            self.second.fetch_earnings(today)
        );

        let sections = vec![(self.first.source(), first), (self.second.source(), second)];
        for (source, result) in &sections {
            match result {
                Ok(earnings) => info!(
                    "{} earnings for {}: {}",
                    source,
                    earnings.date,
                    earnings.display_amount()
                ),
                Err(err) => error!("Error fetching {} earnings: {:#}", source, err),
            }
        }
        sections
    }

    pub async fn build_report(&self, today: NaiveDate) -> String {
        render_report(&self.collect(today).await)
    }

    async fn deliver(&self, today: NaiveDate) -> Result<()> {
        let message = self.build_report(today).await;
        self.notifier.send(&message).await
    }

    /// One report tick for `today`. Never fails: a delivery error is logged
    /// and replaced by a short failure notice.
    pub async fn run_for(&self, today: NaiveDate) {
        info!("Starting daily income check for {}...", today);
        if let Err(err) = self.deliver(today).await {
            error!("Task failed: {:#}", err);
            if let Err(err) = self.notifier.send(FAILURE_NOTICE).await {
                error!("Could not send failure notice: {:#}", err);
            }
        }
    }

    pub async fn run_task(&self) {
        self.run_for(Local::now().date_naive()).await;
    }
}
