use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use quotecalc_core::domain::quote::{
    AdditionalCost, DealId, InvoiceScheduleEntry, PriceQuote, PriceQuoteAggregate, PriceQuoteId,
};

use super::{PriceQuoteRepository, RepositoryError};

/// Map-backed repository with the same version-guard semantics as the sql
/// implementation. Used by service-level tests.
#[derive(Default)]
pub struct InMemoryPriceQuoteRepository {
    aggregates: RwLock<HashMap<String, PriceQuoteAggregate>>,
}

#[async_trait]
impl PriceQuoteRepository for InMemoryPriceQuoteRepository {
    async fn insert(&self, aggregate: &PriceQuoteAggregate) -> Result<(), RepositoryError> {
        let mut aggregates = self.aggregates.write().await;
        aggregates.insert(aggregate.quote.id.0.clone(), aggregate.clone());
        Ok(())
    }

    async fn update(
        &self,
        quote: &PriceQuote,
        expected_version: i64,
        additional_costs: &[AdditionalCost],
        schedule: &[InvoiceScheduleEntry],
    ) -> Result<bool, RepositoryError> {
        let mut aggregates = self.aggregates.write().await;
        let Some(existing) = aggregates.get_mut(&quote.id.0) else { return Ok(false) };
        if existing.quote.version_number != expected_version {
            return Ok(false);
        }

        existing.quote = quote.clone();
        existing.additional_costs = additional_costs.to_vec();
        existing.invoice_schedule = schedule.to_vec();
        Ok(true)
    }

    async fn fetch(
        &self,
        id: &PriceQuoteId,
    ) -> Result<Option<PriceQuoteAggregate>, RepositoryError> {
        let aggregates = self.aggregates.read().await;
        Ok(aggregates.get(&id.0).cloned())
    }

    async fn list_for_deal(
        &self,
        deal_id: &DealId,
    ) -> Result<Vec<PriceQuoteAggregate>, RepositoryError> {
        let aggregates = self.aggregates.read().await;
        let mut matching: Vec<PriceQuoteAggregate> = aggregates
            .values()
            .filter(|aggregate| &aggregate.quote.deal_id == deal_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.quote
                .created_at
                .cmp(&a.quote.created_at)
                .then_with(|| b.quote.id.0.cmp(&a.quote.id.0))
        });
        Ok(matching)
    }

    async fn delete(&self, id: &PriceQuoteId) -> Result<bool, RepositoryError> {
        let mut aggregates = self.aggregates.write().await;
        Ok(aggregates.remove(&id.0).is_some())
    }
}
