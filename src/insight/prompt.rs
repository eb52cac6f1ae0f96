use crate::analyzer::summarize;
use crate::model::{AnalysisQuery, TransactionSet};

/// Most recent transactions embedded verbatim in the prompt.
pub const PROMPT_TRANSACTION_LIMIT: usize = 50;

pub fn build_prompt(transactions: &TransactionSet, query: &AnalysisQuery) -> String {
    let summary = summarize(&transactions.transactions);
    let summary_json = serde_json::to_string_pretty(&summary).unwrap_or_default();

    let recent: Vec<_> = transactions
        .sorted_newest_first()
        .into_iter()
        .take(PROMPT_TRANSACTION_LIMIT)
        .collect();
    let recent_json = serde_json::to_string(&recent).unwrap_or_default();

    format!(
        "You are a personal finance analyst reviewing a user's Google Pay transaction history.\n\
         Answer the user's question using only the data below.\n\n\
         Question: \"{question}\"\n\
         Timeframe: {timeframe}\n\
         Total transactions: {count}\n\n\
         Spending summary (computed):\n{summary_json}\n\n\
         Most recent transactions (up to {limit}):\n{recent_json}\n\n\
         Respond with a JSON object with exactly these keys:\n\
         \"analysis\": a detailed answer covering spending patterns and trends,\n\
         \"recommendations\": an array of actionable budgeting recommendations,\n\
         \"key_insights\": an array of 3 to 5 short findings or alerts.",
        question = query.query,
        timeframe = query.timeframe,
        count = transactions.len(),
        limit = PROMPT_TRANSACTION_LIMIT,
    )
}
