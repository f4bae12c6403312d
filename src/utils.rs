use std::str::FromStr;

use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

/// Calendar day `days` before `today`.
pub fn days_before(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

/// Formats an amount with exactly two decimals, rounding half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Parses a proceeds cell, accepting either `.` or `,` as decimal separator.
pub fn parse_proceeds(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let normalized = value.replacen(',', ".", 1);
    let parsed = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok();
    if parsed.is_none() {
        debug!("Ignoring unparsable proceeds value {:?}", value);
    }
    parsed
}

/// Converts micro-units (1/1_000_000 of a currency unit) into major units.
pub fn micros_to_units(micros: i64) -> Decimal {
    Decimal::from(micros) / Decimal::from(1_000_000)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_days_before() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            days_before(today, 1),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert_eq!(
            days_before(today, 2),
            NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()
        );
        let new_year = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(
            days_before(new_year, 1),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(2.1)), "2.10");
        assert_eq!(format_amount(dec!(7.5347826)), "7.53");
        assert_eq!(format_amount(dec!(1.005)), "1.01");
        assert_eq!(format_amount(dec!(-3.456)), "-3.46");
        assert_eq!(format_amount(dec!(1234567.891)), "1234567.89");
    }

    #[test]
    fn test_parse_proceeds() {
        assert_eq!(parse_proceeds("1.50"), Some(dec!(1.50)));
        assert_eq!(parse_proceeds("1,50"), Some(dec!(1.50)));
        assert_eq!(parse_proceeds(" 0.7 "), Some(dec!(0.7)));
        assert_eq!(parse_proceeds("-2.00"), Some(dec!(-2.00)));
        assert_eq!(parse_proceeds("0"), Some(dec!(0)));
        assert_eq!(parse_proceeds(""), None);
        assert_eq!(parse_proceeds("   "), None);
        assert_eq!(parse_proceeds("abc"), None);
        assert_eq!(parse_proceeds("1,234.56"), None);
    }

    #[test]
    fn test_micros_to_units() {
        assert_eq!(micros_to_units(1_234_567), dec!(1.234567));
        assert_eq!(micros_to_units(0), dec!(0));
        assert_eq!(format_amount(micros_to_units(4_995_000)), "5.00");
    }
}
