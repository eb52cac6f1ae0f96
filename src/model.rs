// Core structs: Transaction, TransactionSet, AnalysisQuery, InsightResult
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    pub recipient: String,
    pub payment_method: String,
}

/// Transactions extracted from one activity export, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionSet {
    pub transactions: Vec<Transaction>,
}

impl TransactionSet {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn total_amount(&self) -> f64 {
        self.iter().map(|t| t.amount).sum()
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let start = self.iter().map(|t| t.date).min()?;
        let end = self.iter().map(|t| t.date).max()?;
        Some(DateRange { start, end })
    }

    /// Newest first; ties keep document order.
    pub fn sorted_newest_first(&self) -> Vec<Transaction> {
        let mut sorted = self.transactions.clone();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    All,
    Week,
    Month,
    ThreeMonths,
    Year,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Timeframe::All => "all",
            Timeframe::Week => "one week",
            Timeframe::Month => "one month",
            Timeframe::ThreeMonths => "three months",
            Timeframe::Year => "one year",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisQuery {
    pub query: String,
    pub timeframe: Timeframe,
}

/// Deterministic spending summary used by quick insights and the offline engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub total_spend: f64,
    pub average_transaction: f64,
    pub transaction_count: usize,
    pub top_merchant: Option<MerchantCount>,
    pub top_merchants: Vec<MerchantCount>,
    pub monthly_trends: BTreeMap<String, f64>,
    pub payment_methods: BTreeMap<String, usize>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerchantCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResult {
    pub summary: String,
    pub analysis: String,
    pub recommendations: Vec<String>,
    pub key_insights: Vec<String>,
    pub total_transactions: usize,
    pub ai_engine: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("document is empty")]
    EmptyDocument,
    #[error("no transactions found in HTML file")]
    NoTransactions,
    #[error("invalid selector: {0}")]
    Selector(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("AI request timed out")]
    Timeout,
    #[error("AI service unreachable: {0}")]
    Unreachable(String),
    #[error("AI service rate limited the request")]
    RateLimited { retry_after: Option<Duration> },
    #[error("AI service responded {status}: {body}")]
    Http { status: u16, body: String },
    #[error("AI service blocked the prompt: {0}")]
    Blocked(String),
    #[error("AI service returned no content")]
    EmptyResponse,
    #[error("AI request failed: {0}")]
    Request(String),
}

impl InsightError {
    pub fn is_retryable(&self) -> bool {
        match self {
            InsightError::Timeout | InsightError::Unreachable(_) | InsightError::RateLimited { .. } => true,
            InsightError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
