// Facade pipeline: validate, parse, filter, ask the insight engine.
use crate::analyzer::{filter_by_timeframe, infer_from_query, parse_timeframe, summarize};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::insight::InsightEngine;
use crate::model::{AnalysisQuery, InsightError, InsightResult, SpendingSummary, Timeframe, TransactionSet};
use crate::parser::TransactionParser;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

pub const DEFAULT_QUERY: &str = "Give me an overview of my spending patterns";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Upstream call limits for the insight engine.
#[derive(Debug, Clone)]
pub struct UpstreamPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl UpstreamPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: config.ai_timeout,
            max_retries: config.ai_max_retries,
            base_backoff: Duration::from_secs(1),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        let jitter = Duration::from_millis(rand::rng().random_range(0..250));
        self.base_backoff.saturating_mul(factor).min(MAX_BACKOFF) + jitter
    }

    /// Wait before the next attempt. A server-supplied `Retry-After` wins over backoff.
    fn retry_delay(&self, attempt: u32, err: &InsightError) -> Duration {
        match err {
            InsightError::RateLimited {
                retry_after: Some(wait),
            } => (*wait).min(MAX_BACKOFF),
            _ => self.backoff(attempt),
        }
    }
}

/// Raw request content handed over by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ActivityInput {
    pub html: Option<String>,
    pub query: Option<String>,
    pub timeframe: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub transactions: TransactionSet,
}

#[derive(Debug, Clone)]
pub struct QuickInsightsOutcome {
    pub query: Option<String>,
    pub timeframe: Timeframe,
    pub summary: SpendingSummary,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub query: AnalysisQuery,
    pub total_transactions_parsed: usize,
    pub insights: InsightResult,
}

pub struct AnalysisService {
    parser: Arc<dyn TransactionParser>,
    engine: Arc<dyn InsightEngine>,
    policy: UpstreamPolicy,
}

impl AnalysisService {
    pub fn new(
        parser: Arc<dyn TransactionParser>,
        engine: Arc<dyn InsightEngine>,
        policy: UpstreamPolicy,
    ) -> Self {
        Self { parser, engine, policy }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn ai_enabled(&self) -> bool {
        self.engine.is_ai()
    }

    pub async fn upload(&self, input: ActivityInput) -> AppResult<UploadOutcome> {
        let html = require_html(input.html)?;
        let transactions = self.parse(html).await?;
        info!("Upload parsed {} transactions", transactions.len());
        Ok(UploadOutcome { transactions })
    }

    /// Heuristic summary only. The insight engine is never consulted here.
    pub async fn quick_insights(&self, input: ActivityInput) -> AppResult<QuickInsightsOutcome> {
        let html = require_html(input.html)?;
        let transactions = self.parse(html).await?;

        let timeframe = input
            .timeframe
            .as_deref()
            .map(parse_timeframe)
            .unwrap_or(Timeframe::All);
        let filtered = filter_by_timeframe(&transactions, timeframe);
        let summary = summarize(&filtered.transactions);

        Ok(QuickInsightsOutcome {
            query: input.query.filter(|q| !q.trim().is_empty()),
            timeframe,
            summary,
        })
    }

    pub async fn analyze(&self, input: ActivityInput) -> AppResult<AnalyzeOutcome> {
        let html = require_html(input.html)?;

        let query_text = input
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| DEFAULT_QUERY.to_string());

        let mut timeframe = parse_timeframe(input.timeframe.as_deref().unwrap_or("all"));
        if timeframe == Timeframe::All {
            if let Some(inferred) = infer_from_query(&query_text) {
                info!("Timeframe inferred from query: {}", inferred);
                timeframe = inferred;
            }
        }

        let transactions = self.parse(html).await?;
        let filtered = filter_by_timeframe(&transactions, timeframe);
        let query = AnalysisQuery {
            query: query_text,
            timeframe,
        };

        let insights = self.generate_insights(&filtered, &query).await?;

        Ok(AnalyzeOutcome {
            query,
            total_transactions_parsed: transactions.len(),
            insights,
        })
    }

    async fn parse(&self, html: String) -> AppResult<TransactionSet> {
        let parser = self.parser.clone();
        let parsed = tokio::task::spawn_blocking(move || parser.parse(&html))
            .await
            .map_err(|e| AppError::Internal(format!("parser task failed: {e}")))?;

        parsed.map_err(|e| {
            warn!("Parse error: {}", e);
            AppError::Parse(e)
        })
    }

    /// Calls the engine under the configured timeout, retrying only retryable failures.
    async fn generate_insights(
        &self,
        transactions: &TransactionSet,
        query: &AnalysisQuery,
    ) -> AppResult<InsightResult> {
        let mut attempt = 0;
        let mut wait = Duration::ZERO;
        loop {
            if attempt > 0 {
                warn!(attempt, wait_ms = wait.as_millis() as u64, "retrying insight request after backoff");
                sleep(wait).await;
            }

            let result = match timeout(self.policy.timeout, self.engine.generate(transactions, query)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("⏳ {} did not answer within {:?}", self.engine.name(), self.policy.timeout);
                    Err(InsightError::Timeout)
                }
            };

            match result {
                Ok(insights) => return Ok(insights),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    warn!("Insight request failed (attempt {}): {}", attempt + 1, e);
                    attempt += 1;
                    wait = self.policy.retry_delay(attempt, &e);
                }
                Err(e) => {
                    warn!("Insight request failed: {}", e);
                    return Err(AppError::Upstream(e));
                }
            }
        }
    }
}

fn require_html(html: Option<String>) -> AppResult<String> {
    match html {
        Some(h) if !h.trim().is_empty() => Ok(h),
        Some(_) => Err(AppError::validation("HTML content is empty")),
        None => Err(AppError::validation("HTML content is required")),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::insight::BasicEngine;
    use crate::model::{ParserError, Transaction};
    use crate::parser::GooglePayParser;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const SAMPLE_HTML: &str = r#"
        <div class="outer-cell mdl-shadow">
            <div class="mdl-typography--body-1">You paid ₹150.00 to Swiggy using HDFC Bank on 15 Nov 2024</div>
        </div>
        <div class="outer-cell mdl-shadow">
            <div class="mdl-typography--body-1">You paid ₹85.50 to Zomato using UPI on 14 Nov 2024</div>
        </div>
        <div class="outer-cell mdl-shadow">
            <div class="mdl-typography--body-1">You paid ₹200.00 to Amazon using Credit Card on 1 Sep 2024</div>
        </div>
    "#;

    /// Engine double that fails the test when called.
    pub(crate) struct ForbiddenEngine;

    #[async_trait::async_trait]
    impl InsightEngine for ForbiddenEngine {
        fn name(&self) -> &str {
            "forbidden"
        }

        async fn generate(&self, _: &TransactionSet, _: &AnalysisQuery) -> Result<InsightResult, InsightError> {
            panic!("insight engine must not be called");
        }
    }

    /// Engine double that never answers.
    pub(crate) struct HangingEngine;

    #[async_trait::async_trait]
    impl InsightEngine for HangingEngine {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(&self, _: &TransactionSet, _: &AnalysisQuery) -> Result<InsightResult, InsightError> {
            std::future::pending().await
        }
    }

    /// Engine double that fails a fixed number of times, then answers.
    pub(crate) struct FlakyEngine {
        pub failures: usize,
        pub error: fn() -> InsightError,
        pub calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InsightEngine for FlakyEngine {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, txs: &TransactionSet, query: &AnalysisQuery) -> Result<InsightResult, InsightError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(InsightResult {
                summary: format!("{} transactions", txs.len()),
                analysis: query.query.clone(),
                recommendations: vec![],
                key_insights: vec![],
                total_transactions: txs.len(),
                ai_engine: "flaky".into(),
            })
        }
    }

    struct FailingParser;

    impl TransactionParser for FailingParser {
        fn parse(&self, _: &str) -> Result<TransactionSet, ParserError> {
            Err(ParserError::NoTransactions)
        }
    }

    struct FixedParser(TransactionSet);

    impl TransactionParser for FixedParser {
        fn parse(&self, _: &str) -> Result<TransactionSet, ParserError> {
            Ok(self.0.clone())
        }
    }

    fn policy(timeout: Duration, max_retries: u32) -> UpstreamPolicy {
        UpstreamPolicy {
            timeout,
            max_retries,
            base_backoff: Duration::from_millis(1),
        }
    }

    fn service_with(engine: Arc<dyn InsightEngine>, policy: UpstreamPolicy) -> AnalysisService {
        AnalysisService::new(Arc::new(GooglePayParser::new()), engine, policy)
    }

    fn html_input(query: Option<&str>, timeframe: Option<&str>) -> ActivityInput {
        ActivityInput {
            html: Some(SAMPLE_HTML.to_string()),
            query: query.map(str::to_string),
            timeframe: timeframe.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn upload_returns_all_transactions() {
        let service = service_with(Arc::new(ForbiddenEngine), policy(Duration::from_secs(1), 0));
        let outcome = service.upload(html_input(None, None)).await.unwrap();
        assert_eq!(outcome.transactions.len(), 3);
    }

    #[tokio::test]
    async fn upload_without_html_is_validation_error() {
        let service = service_with(Arc::new(ForbiddenEngine), policy(Duration::from_secs(1), 0));
        let err = service.upload(ActivityInput::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn parser_failure_is_parse_error() {
        let service = AnalysisService::new(
            Arc::new(FailingParser),
            Arc::new(ForbiddenEngine),
            policy(Duration::from_secs(1), 0),
        );
        let err = service.upload(html_input(None, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(ParserError::NoTransactions)));
    }

    #[tokio::test]
    async fn quick_insights_never_calls_engine() {
        let service = service_with(Arc::new(ForbiddenEngine), policy(Duration::from_secs(1), 0));
        let outcome = service
            .quick_insights(html_input(Some("What are my spending patterns?"), Some("1month")))
            .await
            .unwrap();

        assert_eq!(outcome.timeframe, Timeframe::Month);
        assert_eq!(outcome.summary.transaction_count, 2);
        assert_eq!(outcome.summary.total_spend, 235.5);
        assert_eq!(outcome.query.as_deref(), Some("What are my spending patterns?"));
    }

    #[tokio::test]
    async fn analyze_without_html_never_reaches_engine() {
        let service = service_with(Arc::new(ForbiddenEngine), policy(Duration::from_secs(1), 0));
        for html in [None, Some("".to_string()), Some("  \n ".to_string())] {
            let input = ActivityInput {
                html,
                query: Some("anything".into()),
                timeframe: None,
            };
            let err = service.analyze(input).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn analyze_times_out_instead_of_hanging() {
        let service = service_with(Arc::new(HangingEngine), policy(Duration::from_millis(100), 0));
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            service.analyze(html_input(Some("Summarize"), None)),
        )
        .await
        .expect("analyze must finish within the bound");

        assert!(matches!(outcome, Err(AppError::Upstream(InsightError::Timeout))));
    }

    #[tokio::test]
    async fn analyze_infers_timeframe_from_query() {
        let engine = Arc::new(FlakyEngine {
            failures: 0,
            error: || InsightError::Timeout,
            calls: AtomicUsize::new(0),
        });
        let service = service_with(engine, policy(Duration::from_secs(1), 0));
        let outcome = service
            .analyze(html_input(Some("How much did I spend this month?"), Some("all")))
            .await
            .unwrap();

        assert_eq!(outcome.query.timeframe, Timeframe::Month);
        assert_eq!(outcome.total_transactions_parsed, 3);
        assert_eq!(outcome.insights.total_transactions, 2);
    }

    #[tokio::test]
    async fn analyze_uses_default_query_when_missing() {
        let service = service_with(Arc::new(BasicEngine::new()), policy(Duration::from_secs(1), 0));
        let outcome = service.analyze(html_input(None, None)).await.unwrap();
        assert_eq!(outcome.query.query, DEFAULT_QUERY);
        assert_eq!(outcome.query.timeframe, Timeframe::All);
        assert_eq!(outcome.insights.total_transactions, 3);
    }

    #[tokio::test]
    async fn retries_transient_failures_within_budget() {
        let engine = Arc::new(FlakyEngine {
            failures: 2,
            error: || InsightError::Http { status: 503, body: String::new() },
            calls: AtomicUsize::new(0),
        });
        let service = service_with(engine.clone(), policy(Duration::from_secs(1), 2));
        let outcome = service.analyze(html_input(Some("Summarize"), None)).await.unwrap();

        assert_eq!(outcome.insights.ai_engine, "flaky");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retries_by_default() {
        let engine = Arc::new(FlakyEngine {
            failures: 1,
            error: || InsightError::Unreachable("refused".into()),
            calls: AtomicUsize::new(0),
        });
        let service = service_with(engine.clone(), policy(Duration::from_secs(1), 0));
        let err = service.analyze(html_input(Some("Summarize"), None)).await.unwrap_err();

        assert!(matches!(err, AppError::Upstream(InsightError::Unreachable(_))));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_failures_are_not_retried() {
        let engine = Arc::new(FlakyEngine {
            failures: 1,
            error: || InsightError::Blocked("SAFETY".into()),
            calls: AtomicUsize::new(0),
        });
        let service = service_with(engine.clone(), policy(Duration::from_secs(1), 3));
        let err = service.analyze(html_input(Some("Summarize"), None)).await.unwrap_err();

        assert!(matches!(err, AppError::Upstream(InsightError::Blocked(_))));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let policy = policy(Duration::from_secs(1), 3);
        let limited = InsightError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(policy.retry_delay(1, &limited), Duration::from_secs(7));

        let unbounded = InsightError::RateLimited {
            retry_after: Some(Duration::from_secs(600)),
        };
        assert_eq!(policy.retry_delay(1, &unbounded), MAX_BACKOFF);

        let plain = policy.retry_delay(1, &InsightError::RateLimited { retry_after: None });
        assert!(plain <= Duration::from_millis(251));
    }

    #[tokio::test]
    async fn rate_limited_request_is_retried() {
        let engine = Arc::new(FlakyEngine {
            failures: 1,
            error: || InsightError::RateLimited {
                retry_after: Some(Duration::from_millis(10)),
            },
            calls: AtomicUsize::new(0),
        });
        let service = service_with(engine.clone(), policy(Duration::from_secs(1), 1));
        let outcome = service.analyze(html_input(Some("Summarize"), None)).await.unwrap();

        assert_eq!(outcome.insights.ai_engine, "flaky");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fixture_with_single_known_transaction() {
        let expected = Transaction {
            id: "tx_0".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount: 10.0,
            currency: "INR".into(),
            recipient: "Tea Stall".into(),
            payment_method: "UPI".into(),
        };
        let service = AnalysisService::new(
            Arc::new(FixedParser(TransactionSet::new(vec![expected.clone()]))),
            Arc::new(ForbiddenEngine),
            policy(Duration::from_secs(1), 0),
        );
        let outcome = service
            .upload(ActivityInput {
                html: Some("<html></html>".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.transactions.transactions, vec![expected]);
    }
}
