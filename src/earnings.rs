use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use strum::Display;
use tracing::warn;

use crate::utils::format_amount;

/// Upstream reporting source, displayed with its human label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Source {
    #[strum(to_string = "AdMob")]
    AdMob,
    #[strum(to_string = "App Store")]
    AppStore,
}

impl Source {
    pub fn icon(&self) -> &'static str {
        match self {
            Source::AdMob => "💰",
            Source::AppStore => "🍎",
        }
    }
}

/// Earnings reported by one source for one day.
///
/// `earnings` is already formatted and may hold several currencies
/// (`"2.10 USD + 5.00 EUR"`), in which case `currency` is `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct EarningsResult {
    pub date: NaiveDate,
    pub earnings: String,
    pub currency: Option<String>,
}

impl EarningsResult {
    pub fn new(date: NaiveDate, earnings: impl Into<String>, currency: Option<&str>) -> Self {
        Self {
            date,
            earnings: earnings.into(),
            currency: currency.map(str::to_string),
        }
    }

    /// Nothing earned, or nothing readable in the report.
    pub fn zero(date: NaiveDate) -> Self {
        Self::new(date, "0.00", Some("USD"))
    }

    /// Amount with the currency appended when the source reports it apart.
    pub fn display_amount(&self) -> String {
        match &self.currency {
            Some(currency) => format!("{} {}", self.earnings, currency),
            None => self.earnings.clone(),
        }
    }
}

/// Per-currency totals accumulated while scanning report rows.
/// Iteration follows first-insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurrencyLedger {
    entries: Vec<(String, Decimal)>,
}

impl CurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the currency total. Returns `false` and leaves the
    /// total untouched when the sum would overflow.
    pub fn add(&mut self, currency: &str, amount: Decimal) -> bool {
        match self.entries.iter_mut().find(|(code, _)| code == currency) {
            Some((_, total)) => match total.checked_add(amount) {
                Some(sum) => {
                    *total = sum;
                    true
                }
                None => {
                    warn!("Ignoring {} {}: total would overflow", amount, currency);
                    false
                }
            },
            None => {
                self.entries.push((currency.to_string(), amount));
                true
            }
        }
    }

    pub fn get(&self, currency: &str) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|(code, _)| code == currency)
            .map(|(_, amount)| *amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.entries
            .iter()
            .map(|(code, amount)| (code.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `"<amt1> <cur1> + <amt2> <cur2> + ..."`
    pub fn to_multi_currency(&self) -> String {
        self.iter()
            .map(|(currency, amount)| format!("{} {}", format_amount(amount), currency))
            .join(" + ")
    }
}

impl<S: Into<String>> FromIterator<(S, Decimal)> for CurrencyLedger {
    fn from_iter<T: IntoIterator<Item = (S, Decimal)>>(iter: T) -> Self {
        let mut ledger = CurrencyLedger::new();
        for (currency, amount) in iter {
            let currency: String = currency.into();
            ledger.add(&currency, amount);
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_ledger_accumulates_per_currency() {
        let mut ledger = CurrencyLedger::new();
        ledger.add("USD", dec!(1.10));
        ledger.add("EUR", dec!(5));
        ledger.add("USD", dec!(1.00));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("USD"), Some(dec!(2.10)));
        assert_eq!(ledger.get("EUR"), Some(dec!(5)));
        assert_eq!(ledger.get("GBP"), None);
    }

    #[test]
    fn test_ledger_overflow_keeps_previous_total() {
        let mut ledger = CurrencyLedger::new();
        assert!(ledger.add("USD", Decimal::MAX));
        assert!(!ledger.add("USD", Decimal::MAX));
        assert!(ledger.add("USD", dec!(-1)));
        assert_eq!(ledger.get("USD"), Some(Decimal::MAX - dec!(1)));
    }

    #[test]
    fn test_multi_currency_keeps_insertion_order() {
        let ledger: CurrencyLedger = [("USD", dec!(2.1)), ("EUR", dec!(5))].into_iter().collect();
        assert_eq!(ledger.to_multi_currency(), "2.10 USD + 5.00 EUR");

        let ledger: CurrencyLedger = [("EUR", dec!(5)), ("USD", dec!(2.1))].into_iter().collect();
        assert_eq!(ledger.to_multi_currency(), "5.00 EUR + 2.10 USD");
    }

    #[test]
    fn test_display_amount() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            EarningsResult::new(date, "1.50", Some("USD")).display_amount(),
            "1.50 USD"
        );
        assert_eq!(
            EarningsResult::new(date, "1.50 USD + 2.00 EUR", None).display_amount(),
            "1.50 USD + 2.00 EUR"
        );
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(Source::AdMob.to_string(), "AdMob");
        assert_eq!(Source::AppStore.to_string(), "App Store");
    }
}
