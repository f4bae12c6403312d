pub mod auth;
pub mod config;
pub mod earnings;
pub mod error;
pub mod fx;
pub mod notifier;
pub mod report;
pub mod scheduler;
pub mod source;
pub mod utils;

pub use earnings::{CurrencyLedger, EarningsResult, Source};
pub use report::Reporter;
