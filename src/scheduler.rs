use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use tracing::{info, warn};

use crate::notifier::Notifier;
use crate::report::Reporter;
use crate::source::EarningsSource;

/// Parses a cron expression. Classic 5-field expressions fire at second 0.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let expression = expression.trim();
    let expression = match expression.split_whitespace().count() {
        5 => format!("0 {}", expression),
        _ => expression.to_string(),
    };
    Schedule::from_str(&expression)
        .with_context(|| format!("Invalid cron schedule: {}", expression))
}

pub fn next_tick<Tz: TimeZone>(schedule: &Schedule, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

/// Runs the report once.
pub async fn run_once<A, B, N>(reporter: &Reporter<A, B, N>)
where
    A: EarningsSource,
    B: EarningsSource,
    N: Notifier,
{
    info!("Running in DRY_RUN mode...");
    reporter.run_task().await;
    info!("Dry run complete. Exiting.");
}

/// Runs the report at every tick of `schedule`, in local time. Only returns
/// when the schedule has no upcoming tick.
pub async fn run_scheduled<A, B, N>(reporter: &Reporter<A, B, N>, schedule: &Schedule) -> Result<()>
where
    A: EarningsSource,
    B: EarningsSource,
    N: Notifier,
{
    loop {
        let now = Local::now();
        let next = next_tick(schedule, &now).ok_or_else(|| anyhow!("Schedule has no upcoming run"))?;
        info!("Next report at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));

        match (next - now).to_std() {
            Ok(wait) => tokio::time::sleep(wait).await,
            Err(_) => warn!("Scheduled time {} already passed", next),
        }

        reporter.run_task().await;
    }
}
