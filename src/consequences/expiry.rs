//! Block expiry parsing
//!
//! Stored filters express block durations as relative phrases ("1 week",
//! "3 months 2 days"), infinity keywords or absolute RFC 3339 timestamps.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Inputs meaning "never expires"
const INFINITY_KEYWORDS: [&str; 4] = ["infinite", "indefinite", "infinity", "never"];

/// Parsed expiry of a block; infinite sorts after every finite expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Expiry {
    At(DateTime<Utc>),
    Infinite,
}

impl Expiry {
    /// Check if the expiry has passed
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::At(at) => *at <= now,
            Self::Infinite => false,
        }
    }
}

impl std::fmt::Display for Expiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::At(at) => write!(f, "{}", at.to_rfc3339()),
            Self::Infinite => write!(f, "infinity"),
        }
    }
}

/// Parse an expiry input relative to `now`
///
/// Returns `None` when the input is not understood.
#[must_use]
pub fn parse_expiry(input: &str, now: DateTime<Utc>) -> Option<Expiry> {
    let input = input.trim().to_ascii_lowercase();
    if input.is_empty() {
        return None;
    }
    if INFINITY_KEYWORDS.contains(&input.as_str()) {
        return Some(Expiry::Infinite);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(&input) {
        return Some(Expiry::At(at.with_timezone(&Utc)));
    }

    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return None;
    }

    let mut at = now;
    for pair in tokens.chunks(2) {
        let amount = pair[0].trim_start_matches('+').parse::<u32>().ok()?;
        at = add_unit(at, amount, pair[1])?;
    }
    Some(Expiry::At(at))
}

fn add_unit(at: DateTime<Utc>, amount: u32, unit: &str) -> Option<DateTime<Utc>> {
    let amount_i64 = i64::from(amount);
    match unit.trim_end_matches('s') {
        "sec" | "second" => at.checked_add_signed(Duration::seconds(amount_i64)),
        "min" | "minute" => at.checked_add_signed(Duration::minutes(amount_i64)),
        "hour" => at.checked_add_signed(Duration::hours(amount_i64)),
        "day" => at.checked_add_signed(Duration::days(amount_i64)),
        "week" => at.checked_add_signed(Duration::weeks(amount_i64)),
        "month" => at.checked_add_months(Months::new(amount)),
        "year" => at.checked_add_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}
