//! FILENAME: core/report-engine/src/dynamic_date.rs
//! PURPOSE: Resolves relative date expressions used as parameter values.
//! CONTEXT: `$date:<format>:<unit>:<offset>`, e.g. `$date:day:day:-1` is
//! yesterday as YYYY-MM-DD. Month and year shifts keep the day of month and
//! let overflowing days roll into the next month (Jan 31 + 1 month = Mar 3).

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

pub const DYNAMIC_DATE_PREFIX: &str = "$date:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DynamicDateError {
    #[error("invalid dynamic date format: {0}")]
    Format(String),

    #[error("invalid offset in dynamic date: {0}")]
    Offset(String),

    #[error("unsupported unit in dynamic date: {0}")]
    Unit(String),

    #[error("dynamic date out of range: {0}")]
    OutOfRange(String),
}

pub fn is_dynamic_date(value: &str) -> bool {
    value.starts_with(DYNAMIC_DATE_PREFIX)
}

/// Evaluates `expression` relative to `base`. Values without the `$date:`
/// prefix are returned unchanged.
pub fn resolve_dynamic_date(
    expression: &str,
    base: NaiveDateTime,
) -> Result<String, DynamicDateError> {
    if !is_dynamic_date(expression) {
        return Ok(expression.to_string());
    }

    let parts: Vec<&str> = expression.split(':').collect();
    if parts.len() < 4 {
        return Err(DynamicDateError::Format(expression.to_string()));
    }
    let (format, unit) = (parts[1], parts[2]);
    let offset: i32 = parts[3]
        .parse()
        .map_err(|_| DynamicDateError::Offset(expression.to_string()))?;

    let target = match unit {
        "day" => base.checked_add_signed(Duration::days(offset.into())),
        "month" => add_months(base, offset),
        "year" => offset.checked_mul(12).and_then(|months| add_months(base, months)),
        other => return Err(DynamicDateError::Unit(other.to_string())),
    }
    .ok_or_else(|| DynamicDateError::OutOfRange(expression.to_string()))?;

    Ok(target.format(layout(format)).to_string())
}

fn layout(format: &str) -> &'static str {
    match format {
        "month" => "%Y-%m",
        "year" => "%Y",
        "datetime" => "%Y-%m-%d %H:%M:%S",
        _ => "%Y-%m-%d",
    }
}

/// Shifts by whole months, then re-applies the original day of month
/// counting from the first of the target month.
fn add_months(base: NaiveDateTime, months: i32) -> Option<NaiveDateTime> {
    let total = base.year().checked_mul(12)? + base.month0() as i32 + months;
    let first = NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)?;
    let date = first.checked_add_signed(Duration::days(base.day0().into()))?;
    Some(date.and_time(base.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} 10:00:00"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_plain_values_pass_through() {
        assert_eq!(resolve_dynamic_date("2023-01-01", at("2023-05-15")).unwrap(), "2023-01-01");
    }

    #[test]
    fn test_day_offsets() {
        let base = at("2023-05-15");
        assert_eq!(resolve_dynamic_date("$date:day:day:0", base).unwrap(), "2023-05-15");
        assert_eq!(resolve_dynamic_date("$date:day:day:-1", base).unwrap(), "2023-05-14");
        assert_eq!(resolve_dynamic_date("$date:day:day:+1", base).unwrap(), "2023-05-16");
        assert_eq!(
            resolve_dynamic_date("$date:day:day:1", at("2023-12-31")).unwrap(),
            "2024-01-01"
        );
    }

    #[test]
    fn test_month_and_year_offsets() {
        let base = at("2023-05-15");
        assert_eq!(resolve_dynamic_date("$date:day:month:1", base).unwrap(), "2023-06-15");
        assert_eq!(resolve_dynamic_date("$date:day:month:-5", base).unwrap(), "2022-12-15");
        assert_eq!(resolve_dynamic_date("$date:day:year:-1", base).unwrap(), "2022-05-15");
    }

    #[test]
    fn test_overflowing_days_roll_forward() {
        assert_eq!(
            resolve_dynamic_date("$date:day:month:1", at("2023-01-31")).unwrap(),
            "2023-03-03"
        );
        assert_eq!(
            resolve_dynamic_date("$date:day:year:1", at("2024-02-29")).unwrap(),
            "2025-03-01"
        );
        assert_eq!(
            resolve_dynamic_date("$date:day:year:-1", at("2024-02-29")).unwrap(),
            "2023-03-01"
        );
    }

    #[test]
    fn test_output_formats() {
        let base = at("2023-05-15");
        assert_eq!(resolve_dynamic_date("$date:month:day:0", base).unwrap(), "2023-05");
        assert_eq!(resolve_dynamic_date("$date:year:day:0", base).unwrap(), "2023");
        assert_eq!(
            resolve_dynamic_date("$date:datetime:day:0", base).unwrap(),
            "2023-05-15 10:00:00"
        );
        assert_eq!(resolve_dynamic_date("$date:yyyy:day:0", base).unwrap(), "2023-05-15");
    }

    #[test]
    fn test_invalid_expressions() {
        let base = at("2023-05-15");
        assert!(matches!(
            resolve_dynamic_date("$date:day:day", base),
            Err(DynamicDateError::Format(_))
        ));
        assert!(matches!(
            resolve_dynamic_date("$date:day:day:abc", base),
            Err(DynamicDateError::Offset(_))
        ));
        assert!(matches!(
            resolve_dynamic_date("$date:day:week:1", base),
            Err(DynamicDateError::Unit(u)) if u == "week"
        ));
    }
}
