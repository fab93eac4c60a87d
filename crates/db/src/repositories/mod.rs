use async_trait::async_trait;
use sqlx::SqliteConnection;
use thiserror::Error;

use quotecalc_core::domain::quote::{
    AdditionalCost, DealId, InvoiceScheduleEntry, PriceQuote, PriceQuoteAggregate, PriceQuoteId,
};

pub mod memory;
pub mod quote;

pub use memory::InMemoryPriceQuoteRepository;
pub use quote::SqlPriceQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Aggregate-level persistence for price quotes. Both child collections are
/// owned exclusively by their quote and travel with it on every write.
#[async_trait]
pub trait PriceQuoteRepository: Send + Sync {
    /// Insert a freshly calculated aggregate (quote row plus children).
    async fn insert(&self, aggregate: &PriceQuoteAggregate) -> Result<(), RepositoryError>;

    /// Overwrite the quote row and replace both child collections in one
    /// atomic unit. The row is only touched when its stored version still
    /// equals `expected_version`; returns `false` when a concurrent update
    /// won the race (nothing is written in that case).
    async fn update(
        &self,
        quote: &PriceQuote,
        expected_version: i64,
        additional_costs: &[AdditionalCost],
        schedule: &[InvoiceScheduleEntry],
    ) -> Result<bool, RepositoryError>;

    async fn fetch(&self, id: &PriceQuoteId)
        -> Result<Option<PriceQuoteAggregate>, RepositoryError>;

    /// Aggregates for one deal, newest-first by creation time.
    async fn list_for_deal(
        &self,
        deal_id: &DealId,
    ) -> Result<Vec<PriceQuoteAggregate>, RepositoryError>;

    /// Returns whether a row was deleted. Children cascade.
    async fn delete(&self, id: &PriceQuoteId) -> Result<bool, RepositoryError>;
}

/// Wholesale replacement of one child table's rows for a quote. Implemented
/// per child table and only ever invoked on a connection that is already
/// inside the update transaction, so delete and insert commit or roll back
/// together.
#[async_trait]
pub trait ChildCollectionReplacer<T: Send + Sync>: Send + Sync {
    async fn replace_all(
        &self,
        conn: &mut SqliteConnection,
        quote_id: &PriceQuoteId,
        items: &[T],
    ) -> Result<(), RepositoryError>;
}
