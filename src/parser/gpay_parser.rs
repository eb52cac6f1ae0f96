// Google Pay "My Activity" HTML parsing
use crate::model::{ParserError, Transaction, TransactionSet};
use crate::parser::TransactionParser;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};

const DEFAULT_PAYMENT_METHOD: &str = "UPI";
const DEFAULT_CURRENCY: &str = "INR";

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(₹|Rs\.?|INR|\$|€|£)\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("amount regex")
});

static RECIPIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bto\s+(.+?)(?:\s+using\b|\s+on\b|\s+\d{1,2}\s+[A-Za-z]{3,9}\s+\d{4}|\s*$)")
        .expect("recipient regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\s+([A-Za-z]{3,9})\s+(\d{4})\b").expect("date regex")
});

static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\busing\s+(.+?)(?:\s+[Xx]{2,}\S*|\s+on\s+\d|\s+\d{1,2}\s+[A-Za-z]{3,9}\s+\d{4}|\s*$)",
    )
    .expect("payment method regex")
});

pub struct GooglePayParser;

impl GooglePayParser {
    pub fn new() -> Self {
        Self
    }

    /// Extracts one transaction from the flattened text of an activity card.
    /// Returns `None` when the amount, recipient or date is missing or unreadable.
    fn parse_card_text(&self, index: usize, text: &str) -> Option<Transaction> {
        let amount_caps = AMOUNT_RE.captures(text)?;
        let recipient_caps = RECIPIENT_RE.captures(text)?;
        let date_caps = DATE_RE.captures(text)?;

        let amount = amount_caps[2].replace(',', "").parse::<f64>().ok()?;
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }

        let recipient = recipient_caps[1].trim().to_string();
        if recipient.is_empty() {
            return None;
        }

        let date_text = format!("{} {} {}", &date_caps[1], &date_caps[2], &date_caps[3]);
        let date = match NaiveDate::parse_from_str(&date_text, "%d %b %Y") {
            Ok(d) => d,
            Err(e) => {
                debug!("Skipping card {}: bad date '{}' ({})", index, date_text, e);
                return None;
            }
        };

        let payment_method = METHOD_RE
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

        Some(Transaction {
            id: format!("tx_{}", index),
            date,
            amount,
            currency: normalize_currency(&amount_caps[1]).to_string(),
            recipient,
            payment_method,
        })
    }
}

impl Default for GooglePayParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionParser for GooglePayParser {
    fn parse(&self, html: &str) -> Result<TransactionSet, ParserError> {
        if html.trim().is_empty() {
            return Err(ParserError::EmptyDocument);
        }

        let document = Html::parse_document(html);

        let card_selector = Selector::parse("div.outer-cell").map_err(|e| ParserError::Selector(e.to_string()))?;
        let div_selector = Selector::parse("div").map_err(|e| ParserError::Selector(e.to_string()))?;

        let cards = document
            .select(&card_selector)
            .filter(|el| has_class_prefix(el, "mdl-shadow"));

        let mut transactions = Vec::new();
        let mut skipped = 0usize;

        for (index, card) in cards.enumerate() {
            let Some(body) = card
                .select(&div_selector)
                .find(|el| has_class_prefix(el, "mdl-typography--body-1"))
            else {
                skipped += 1;
                continue;
            };

            let text = flatten_text(&body);
            match self.parse_card_text(index, &text) {
                Some(tx) => transactions.push(tx),
                None => {
                    debug!("Skipping card {}: '{}'", index, text);
                    skipped += 1;
                }
            }
        }

        info!("Parsed {} transactions ({} cards skipped)", transactions.len(), skipped);

        let set = TransactionSet::new(transactions);
        if set.is_empty() {
            return Err(ParserError::NoTransactions);
        }

        Ok(set)
    }
}

fn has_class_prefix(el: &ElementRef<'_>, prefix: &str) -> bool {
    el.value().classes().any(|c| c.starts_with(prefix))
}

/// Trimmed text nodes joined with single spaces, so `<br>`-separated lines stay apart.
fn flatten_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_currency(symbol: &str) -> &'static str {
    match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        _ => DEFAULT_CURRENCY,
    }
}
