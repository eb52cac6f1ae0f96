use crate::model::{Timeframe, Transaction, TransactionSet};
use chrono::Duration;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

static DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,5})\s*-?\s*days?\b").expect("day count regex"));

impl Timeframe {
    /// Length of the window in days, `None` for everything.
    pub fn days(self) -> Option<i64> {
        match self {
            Timeframe::All => None,
            Timeframe::Week => Some(7),
            Timeframe::Month => Some(30),
            Timeframe::ThreeMonths => Some(90),
            Timeframe::Year => Some(365),
        }
    }
}

/// Reads a free-text timeframe such as `"1month"`, `"one week"`, `"3 months"`
/// or `"last 10 days"`. Blank input means all transactions; unrecognized text
/// falls back to one month.
pub fn parse_timeframe(raw: &str) -> Timeframe {
    let text = raw.trim().to_lowercase();
    if text.is_empty() || text == "all" || text.contains("all time") {
        return Timeframe::All;
    }
    match keyword_timeframe(&text) {
        Some(tf) => tf,
        None => {
            info!("Unrecognized timeframe '{}', using one month", raw);
            Timeframe::Month
        }
    }
}

/// Picks a timeframe out of a natural-language question, if it names one.
pub fn infer_from_query(query: &str) -> Option<Timeframe> {
    keyword_timeframe(&query.to_lowercase())
}

/// Smallest named window that covers `days`; longer than a year means everything.
fn covering_window(days: u32) -> Timeframe {
    match days {
        0..=7 => Timeframe::Week,
        8..=31 => Timeframe::Month,
        32..=92 => Timeframe::ThreeMonths,
        93..=366 => Timeframe::Year,
        _ => Timeframe::All,
    }
}

fn keyword_timeframe(text: &str) -> Option<Timeframe> {
    if let Some(days) = DAYS_RE.captures(text).and_then(|c| c[1].parse::<u32>().ok()) {
        return Some(covering_window(days));
    }
    if text.contains("quarter") {
        Some(Timeframe::ThreeMonths)
    } else if text.contains("month") {
        if text.contains('3') || text.contains("three") {
            Some(Timeframe::ThreeMonths)
        } else {
            Some(Timeframe::Month)
        }
    } else if text.contains("week") {
        Some(Timeframe::Week)
    } else if text.contains("year") {
        Some(Timeframe::Year)
    } else {
        None
    }
}

/// Keeps the transactions inside the window ending at the most recent
/// transaction date, newest first.
///
/// The window is anchored to the data rather than the wall clock, so the
/// same export always filters the same way.
pub fn filter_by_timeframe(set: &TransactionSet, timeframe: Timeframe) -> TransactionSet {
    let sorted = set.sorted_newest_first();
    let (Some(days), Some(latest)) = (timeframe.days(), sorted.first().map(|t| t.date)) else {
        return TransactionSet::new(sorted);
    };

    let cutoff = latest - Duration::days(days - 1);
    let kept: Vec<Transaction> = sorted.into_iter().filter(|t| t.date >= cutoff).collect();
    TransactionSet::new(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn set(dates: &[&str]) -> TransactionSet {
        TransactionSet::new(
            dates
                .iter()
                .enumerate()
                .map(|(i, d)| Transaction {
                    id: format!("tx_{i}"),
                    date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
                    amount: 1.0,
                    currency: "INR".into(),
                    recipient: "Shop".into(),
                    payment_method: "UPI".into(),
                })
                .collect(),
        )
    }

    #[test]
    fn parses_common_spellings() {
        assert_eq!(parse_timeframe("all"), Timeframe::All);
        assert_eq!(parse_timeframe(""), Timeframe::All);
        assert_eq!(parse_timeframe("1month"), Timeframe::Month);
        assert_eq!(parse_timeframe("one month"), Timeframe::Month);
        assert_eq!(parse_timeframe("3 months"), Timeframe::ThreeMonths);
        assert_eq!(parse_timeframe("Three Months"), Timeframe::ThreeMonths);
        assert_eq!(parse_timeframe("one week"), Timeframe::Week);
        assert_eq!(parse_timeframe("1year"), Timeframe::Year);
        assert_eq!(parse_timeframe("fortnight"), Timeframe::Month);
    }

    #[test]
    fn day_counts_map_to_covering_window() {
        assert_eq!(parse_timeframe("last 7 days"), Timeframe::Week);
        assert_eq!(parse_timeframe("30 days"), Timeframe::Month);
        assert_eq!(parse_timeframe("10days"), Timeframe::Month);
        assert_eq!(parse_timeframe("90-day"), Timeframe::ThreeMonths);
        assert_eq!(parse_timeframe("365 days"), Timeframe::Year);
        assert_eq!(parse_timeframe("1000 days"), Timeframe::All);
        assert_eq!(
            infer_from_query("What did I spend in the last 14 days?"),
            Some(Timeframe::Month)
        );
    }

    #[test]
    fn infers_from_question() {
        assert_eq!(infer_from_query("How much did I spend last month?"), Some(Timeframe::Month));
        assert_eq!(infer_from_query("Spending over the past week"), Some(Timeframe::Week));
        assert_eq!(infer_from_query("What are my top merchants?"), None);
    }

    #[test]
    fn window_is_anchored_to_latest_transaction() {
        let txs = set(&["2024-01-01", "2024-03-01", "2024-02-25", "2024-02-23"]);
        let week = filter_by_timeframe(&txs, Timeframe::Week);
        let ids: Vec<_> = week.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["tx_1", "tx_2"]);
    }

    #[test]
    fn all_keeps_everything_newest_first() {
        let txs = set(&["2024-01-01", "2024-03-01"]);
        let all = filter_by_timeframe(&txs, Timeframe::All);
        assert_eq!(all.len(), 2);
        assert_eq!(all.transactions[0].id, "tx_1");
    }

    #[test]
    fn empty_set_stays_empty() {
        assert!(filter_by_timeframe(&TransactionSet::default(), Timeframe::Month).is_empty());
    }
}
