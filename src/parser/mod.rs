// Parser module: turns activity exports into transactions.

pub mod gpay_parser;

use crate::model::{ParserError, TransactionSet};

pub use gpay_parser::GooglePayParser;

/// HTML transaction parser collaborator.
pub trait TransactionParser: Send + Sync {
    fn parse(&self, html: &str) -> Result<TransactionSet, ParserError>;
}
