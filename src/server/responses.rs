use crate::model::{AnalysisQuery, DateRange, InsightResult, SpendingSummary, Timeframe, TransactionSet};
use crate::utils::round_cents;
use serde::Serialize;

pub const HEURISTIC_ENGINE: &str = "heuristic";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_enabled: bool,
    pub ai_engine: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub ai_engine: String,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub total_transactions: usize,
    pub total_amount: f64,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub summary: UploadSummary,
    pub transactions: TransactionSet,
}

impl UploadResponse {
    pub fn new(transactions: TransactionSet) -> Self {
        Self {
            status: "success",
            message: format!("Parsed {} transactions", transactions.len()),
            summary: UploadSummary {
                total_transactions: transactions.len(),
                total_amount: round_cents(transactions.total_amount()),
                date_range: transactions.date_range(),
            },
            transactions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuickInsightsResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub timeframe: Timeframe,
    pub insights: SpendingSummary,
    pub ai_engine: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub query: String,
    pub timeframe: Timeframe,
    pub total_transactions_parsed: usize,
    pub ai_engine: String,
    pub insights: InsightResult,
}

impl AnalyzeResponse {
    pub fn new(query: AnalysisQuery, total_transactions_parsed: usize, insights: InsightResult) -> Self {
        Self {
            status: "success",
            query: query.query,
            timeframe: query.timeframe,
            total_transactions_parsed,
            ai_engine: insights.ai_engine.clone(),
            insights,
        }
    }
}
