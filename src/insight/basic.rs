use crate::analyzer::summarize;
use crate::insight::InsightEngine;
use crate::model::{AnalysisQuery, InsightError, InsightResult, TransactionSet};
use crate::utils::format_amount;

pub const BASIC_ENGINE_NAME: &str = "Basic Analysis (LLM not configured)";

/// Offline engine used when no AI credential is configured.
pub struct BasicEngine;

impl BasicEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BasicEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InsightEngine for BasicEngine {
    fn name(&self) -> &str {
        BASIC_ENGINE_NAME
    }

    fn is_ai(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        transactions: &TransactionSet,
        query: &AnalysisQuery,
    ) -> Result<InsightResult, InsightError> {
        let summary = summarize(&transactions.transactions);
        let top = summary
            .top_merchant
            .as_ref()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "N/A".to_string());

        Ok(InsightResult {
            summary: format!(
                "Analyzed {} transactions for {} period",
                summary.transaction_count, query.timeframe
            ),
            analysis: format!(
                "Total spending: ₹{}. Top merchant: {}",
                format_amount(summary.total_spend),
                top
            ),
            recommendations: vec![
                "Track high-value transactions".to_string(),
                "Monitor recurring payments".to_string(),
                "Consider budgeting apps".to_string(),
            ],
            key_insights: vec![
                format!(
                    "You spent ₹{} across {} transactions",
                    format_amount(summary.total_spend),
                    summary.transaction_count
                ),
                format!("Average transaction: ₹{:.2}", summary.average_transaction),
                format!("Most frequent merchant: {}", top),
            ],
            total_transactions: summary.transaction_count,
            ai_engine: BASIC_ENGINE_NAME.to_string(),
        })
    }
}
