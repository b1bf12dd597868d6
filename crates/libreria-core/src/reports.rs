//! # Report Periods and Arithmetic
//!
//! Everything about sales reports that does not need the database: which
//! dates a request covers, how two periods compare, and how orders become
//! training rows for the recommendation model.
//!
//! ## Date Range Normalization
//! ```text
//! ┌────────────────────┬────────────────────┬───────────────────────────────┐
//! │ fecha_inicio       │ fecha_fin          │ Result                        │
//! ├────────────────────┼────────────────────┼───────────────────────────────┤
//! │ -                  │ -                  │ unbounded                     │
//! │ -                  │ end                │ [end - 30 days, end]          │
//! │ start              │ -                  │ [start, now]                  │
//! │ start              │ end                │ [start, end]                  │
//! │ start >= end       │                    │ ValidationError::InvalidRange │
//! └────────────────────┴────────────────────┴───────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

/// Days covered when only the end of a range is given.
pub const DEFAULT_RANGE_DAYS: i64 = 30;

/// Best-seller list size: default and upper bound.
pub const BEST_SELLERS_LIMIT: (i64, i64) = (10, 100);

/// Top-customer list size: default and upper bound.
pub const TOP_CUSTOMERS_LIMIT: (i64, i64) = (10, 50);

// =============================================================================
// Date Ranges
// =============================================================================

/// A possibly open-ended reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateRange {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Range of equal length ending where this one starts.
    ///
    /// `None` unless both ends are known.
    pub fn previous(&self) -> Option<DateRange> {
        let (start, end) = (self.start?, self.end?);
        let len = end - start;
        Some(DateRange::between(start - len, start))
    }
}

/// Applies the defaulting rules in the module docs.
pub fn normalize_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateRange, ValidationError> {
    let (start, end) = match (start, end) {
        (None, None) => return Ok(DateRange::default()),
        (None, Some(end)) => (end - Duration::days(DEFAULT_RANGE_DAYS), end),
        (Some(start), None) => (start, now),
        (Some(start), Some(end)) => (start, end),
    };

    if start >= end {
        return Err(ValidationError::InvalidRange {
            start_field: "fecha_inicio".to_string(),
            end_field: "fecha_fin".to_string(),
        });
    }

    Ok(DateRange::between(start, end))
}

/// A window where both ends are required, such as either side of a period
/// comparison. `start` must be before `end`.
pub fn bounded_range(
    (start_field, start): (&str, DateTime<Utc>),
    (end_field, end): (&str, DateTime<Utc>),
) -> Result<DateRange, ValidationError> {
    if start >= end {
        return Err(ValidationError::InvalidRange {
            start_field: start_field.to_string(),
            end_field: end_field.to_string(),
        });
    }
    Ok(DateRange::between(start, end))
}

/// Parses a query-string date: RFC 3339, or `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(field: &str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        .map_err(|_| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD or an RFC 3339 timestamp".to_string(),
        })
}

/// Validates a list-size parameter against `(default, max)`.
pub fn resolve_limit(requested: Option<i64>, bounds: (i64, i64)) -> Result<i64, ValidationError> {
    let (default, max) = bounds;
    match requested {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(_) => Err(ValidationError::OutOfRange {
            field: "limite".to_string(),
            min: 1,
            max,
        }),
    }
}

// =============================================================================
// Quick Periods
// =============================================================================

/// Preset windows for the quick report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuickPeriod {
    Today,
    Yesterday,
    LastWeek,
    LastMonth,
    LastQuarter,
    LastYear,
    ThisMonth,
    ThisYear,
}

impl QuickPeriod {
    pub const ALL: [QuickPeriod; 8] = [
        QuickPeriod::Today,
        QuickPeriod::Yesterday,
        QuickPeriod::LastWeek,
        QuickPeriod::LastMonth,
        QuickPeriod::LastQuarter,
        QuickPeriod::LastYear,
        QuickPeriod::ThisMonth,
        QuickPeriod::ThisYear,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            QuickPeriod::Today => "today",
            QuickPeriod::Yesterday => "yesterday",
            QuickPeriod::LastWeek => "last_week",
            QuickPeriod::LastMonth => "last_month",
            QuickPeriod::LastQuarter => "last_quarter",
            QuickPeriod::LastYear => "last_year",
            QuickPeriod::ThisMonth => "this_month",
            QuickPeriod::ThisYear => "this_year",
        }
    }

    /// The concrete window this preset covers at `now`.
    pub fn range(&self, now: DateTime<Utc>) -> DateRange {
        let midnight = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));

        match self {
            QuickPeriod::Today => DateRange::between(midnight, now),
            QuickPeriod::Yesterday => DateRange::between(midnight - Duration::days(1), midnight),
            QuickPeriod::LastWeek => DateRange::between(now - Duration::days(7), now),
            QuickPeriod::LastMonth => DateRange::between(now - Duration::days(30), now),
            QuickPeriod::LastQuarter => DateRange::between(now - Duration::days(90), now),
            QuickPeriod::LastYear => DateRange::between(now - Duration::days(365), now),
            QuickPeriod::ThisMonth => {
                let first = midnight - Duration::days(i64::from(now.day0()));
                DateRange::between(first, now)
            }
            QuickPeriod::ThisYear => {
                let first = midnight - Duration::days(i64::from(now.ordinal0()));
                DateRange::between(first, now)
            }
        }
    }
}

impl FromStr for QuickPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let period = match s.trim().to_lowercase().as_str() {
            "today" | "hoy" => QuickPeriod::Today,
            "yesterday" | "ayer" => QuickPeriod::Yesterday,
            "last_week" | "ultima_semana" => QuickPeriod::LastWeek,
            "last_month" | "ultimo_mes" => QuickPeriod::LastMonth,
            "last_quarter" | "ultimo_trimestre" => QuickPeriod::LastQuarter,
            "last_year" | "ultimo_año" | "ultimo_ano" => QuickPeriod::LastYear,
            "this_month" | "este_mes" => QuickPeriod::ThisMonth,
            "this_year" | "este_año" | "este_ano" => QuickPeriod::ThisYear,
            _ => {
                return Err(ValidationError::NotAllowed {
                    field: "periodo".to_string(),
                    allowed: QuickPeriod::ALL.iter().map(|p| p.as_str().to_string()).collect(),
                })
            }
        };
        Ok(period)
    }
}

// =============================================================================
// Period Comparison
// =============================================================================

/// One metric measured over two consecutive windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MetricChange {
    pub previous: f64,
    pub current: f64,
    pub difference: f64,
    /// `None` when the previous value is 0 and the current is not.
    pub percent_change: Option<f64>,
}

/// Compares `current` to `previous`.
pub fn compare(previous: f64, current: f64) -> MetricChange {
    let difference = current - previous;
    let percent_change = if previous != 0.0 {
        Some((difference / previous * 10_000.0).round() / 100.0)
    } else if difference == 0.0 {
        Some(0.0)
    } else {
        None
    };

    MetricChange {
        previous,
        current,
        difference,
        percent_change,
    }
}

// =============================================================================
// Purchase Combinations
// =============================================================================

/// One training row: "customers who bought `input` also bought `target`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseCombination {
    pub order_id: String,
    pub input: Vec<String>,
    pub target: String,
}

/// Expands orders into leave-one-out combinations.
///
/// Each order contributes one row per distinct product, with that product as
/// the target and the remaining products (sorted) as input. Orders with fewer
/// than two distinct products are skipped.
pub fn purchase_combinations<'a, I>(orders: I) -> Vec<PurchaseCombination>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut rows = Vec::new();

    for (order_id, products) in orders {
        let distinct: BTreeSet<&String> = products.iter().collect();
        if distinct.len() < 2 {
            continue;
        }

        for target in &distinct {
            let input = distinct
                .iter()
                .filter(|p| *p != target)
                .map(|p| (*p).clone())
                .collect();
            rows.push(PurchaseCombination {
                order_id: order_id.to_string(),
                input,
                target: (*target).clone(),
            });
        }
    }

    rows
}

// =============================================================================
// Unit Tests
// =============================================================================
