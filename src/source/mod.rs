use anyhow::Result;
use chrono::NaiveDate;

use crate::earnings::{EarningsResult, Source};

pub mod admob;
pub mod appstore;

pub use admob::AdMob;
pub use appstore::AppStore;

/// An upstream reporting API able to tell how much was earned on a past day.
pub trait EarningsSource {
    fn source(&self) -> Source;

    /// Fetches earnings for the day this source reports on, relative to `today`.
    async fn fetch_earnings(&self, today: NaiveDate) -> Result<EarningsResult>;
}
