use crate::model::{DateRange, MerchantCount, SpendingSummary, Transaction};
use crate::utils::{month_key, round_cents};
use std::collections::BTreeMap;

const TOP_MERCHANTS: usize = 5;

/// Calculates the spending summary: totals, averages, top merchants,
/// monthly totals and payment-method counts.
///
/// Every map is ordered and merchant ties break alphabetically, so equal
/// input always serializes to equal output.
pub fn summarize(transactions: &[Transaction]) -> SpendingSummary {
    let count = transactions.len();
    let total: f64 = transactions.iter().map(|t| t.amount).sum();
    let average = if count == 0 { 0.0 } else { total / count as f64 };

    let mut merchants: BTreeMap<&str, usize> = BTreeMap::new();
    let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
    let mut methods: BTreeMap<String, usize> = BTreeMap::new();

    for tx in transactions {
        *merchants.entry(tx.recipient.as_str()).or_default() += 1;
        *monthly.entry(month_key(tx.date)).or_default() += tx.amount;
        *methods.entry(tx.payment_method.clone()).or_default() += 1;
    }

    let mut ranked: Vec<MerchantCount> = merchants
        .into_iter()
        .map(|(name, count)| MerchantCount {
            name: name.to_string(),
            count,
        })
        .collect();
    // BTreeMap iteration is alphabetical and the sort is stable.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_MERCHANTS);

    let date_range = match (
        transactions.iter().map(|t| t.date).min(),
        transactions.iter().map(|t| t.date).max(),
    ) {
        (Some(start), Some(end)) => Some(DateRange { start, end }),
        _ => None,
    };

    SpendingSummary {
        total_spend: round_cents(total),
        average_transaction: round_cents(average),
        transaction_count: count,
        top_merchant: ranked.first().cloned(),
        top_merchants: ranked,
        monthly_trends: monthly.into_iter().map(|(k, v)| (k, round_cents(v))).collect(),
        payment_methods: methods,
        date_range,
    }
}
