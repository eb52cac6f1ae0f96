pub mod basic;
pub mod gemini;
pub mod prompt;

use crate::model::{AnalysisQuery, InsightError, InsightResult, TransactionSet};

pub use basic::BasicEngine;
pub use gemini::GeminiEngine;

/// Generative insight collaborator.
#[async_trait::async_trait]
pub trait InsightEngine: Send + Sync {
    /// Label reported as `ai_engine` in responses.
    fn name(&self) -> &str;

    /// `false` for engines that never leave the process.
    fn is_ai(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        transactions: &TransactionSet,
        query: &AnalysisQuery,
    ) -> Result<InsightResult, InsightError>;
}
