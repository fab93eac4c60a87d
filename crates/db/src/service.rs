use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use quotecalc_core::domain::quote::{
    validate_additional_costs, DealId, PriceQuote, PriceQuoteAggregate, PriceQuoteId,
    QuoteInputPatch, QuoteInputs, UserId,
};
use quotecalc_core::errors::DomainError;
use quotecalc_core::pricing::calculate;

use crate::repositories::{PriceQuoteRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid quote input: {0}")]
    Validation(#[from] DomainError),
    #[error("price quote `{quote_id}` was not found")]
    NotFound { quote_id: String },
    #[error("price quote `{quote_id}` was modified concurrently")]
    Conflict { quote_id: String },
    #[error("persistence failure during {operation} for `{entity_id}`: {source}")]
    Persistence { operation: &'static str, entity_id: String, source: RepositoryError },
}

// `entity_id` is the quote id for row operations and the deal id for
// deal-scoped listings.
fn persistence<'a>(
    operation: &'static str,
    entity_id: &'a str,
) -> impl FnOnce(RepositoryError) -> ServiceError + 'a {
    move |source| {
        warn!(
            event_name = "quote.persistence_failure",
            operation,
            entity_id,
            error = %source,
            "storage round-trip failed"
        );
        ServiceError::Persistence { operation, entity_id: entity_id.to_string(), source }
    }
}

/// Orchestrates the calculation pipeline and the repository. Every write
/// path recomputes the full derived snapshot from the merged raw inputs
/// before anything is stored; preview runs the identical pipeline without
/// touching storage.
pub struct PriceQuoteService<R> {
    repository: R,
    fixed_reference_date: Option<NaiveDate>,
}

impl<R: PriceQuoteRepository> PriceQuoteService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository, fixed_reference_date: None }
    }

    /// Pin the schedule generator's "today" for deterministic output.
    pub fn with_reference_date(repository: R, reference_date: NaiveDate) -> Self {
        Self { repository, fixed_reference_date: Some(reference_date) }
    }

    fn reference_date(&self) -> NaiveDate {
        self.fixed_reference_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn new_quote_id() -> PriceQuoteId {
        PriceQuoteId(format!("PQ-{}", Uuid::new_v4()))
    }

    pub async fn create(
        &self,
        deal_id: DealId,
        owner_id: UserId,
        input: QuoteInputPatch,
    ) -> Result<PriceQuoteAggregate, ServiceError> {
        let inputs = QuoteInputs::default().apply_patch(&input);
        inputs.validate()?;
        let additional_costs = input.additional_costs.unwrap_or_default();
        validate_additional_costs(&additional_costs)?;

        let snapshot = calculate(&inputs, &additional_costs, self.reference_date());
        let now = Utc::now();
        let quote = PriceQuote {
            id: Self::new_quote_id(),
            deal_id,
            owner_id,
            version_number: 1,
            inputs,
            derived: snapshot.derived,
            created_at: now,
            updated_at: now,
        };
        let aggregate = PriceQuoteAggregate {
            quote,
            additional_costs,
            invoice_schedule: snapshot.schedule,
        };

        self.repository
            .insert(&aggregate)
            .await
            .map_err(persistence("create", &aggregate.quote.id.0))?;

        info!(
            event_name = "quote.created",
            quote_id = %aggregate.quote.id.0,
            deal_id = %aggregate.quote.deal_id.0,
            escalation = aggregate.quote.derived.escalation_status.as_str(),
            "price quote created"
        );
        Ok(aggregate)
    }

    /// Merge the patch over the stored inputs, recalculate everything, and
    /// atomically replace the row plus both child collections. Additional
    /// costs are always replaced wholesale: a patch without them yields an
    /// empty set, never a merge with the stored one.
    pub async fn update(
        &self,
        quote_id: PriceQuoteId,
        owner_id: UserId,
        patch: QuoteInputPatch,
    ) -> Result<PriceQuoteAggregate, ServiceError> {
        let existing = self
            .repository
            .fetch(&quote_id)
            .await
            .map_err(persistence("update", &quote_id.0))?
            .ok_or_else(|| ServiceError::NotFound { quote_id: quote_id.0.clone() })?;

        let merged = existing.quote.inputs.apply_patch(&patch);
        merged.validate()?;
        let additional_costs = patch.additional_costs.unwrap_or_default();
        validate_additional_costs(&additional_costs)?;

        let snapshot = calculate(&merged, &additional_costs, self.reference_date());
        let expected_version = existing.quote.version_number;
        let quote = PriceQuote {
            id: quote_id.clone(),
            deal_id: existing.quote.deal_id.clone(),
            owner_id,
            version_number: expected_version + 1,
            inputs: merged,
            derived: snapshot.derived,
            created_at: existing.quote.created_at,
            updated_at: Utc::now(),
        };

        let replaced = self
            .repository
            .update(&quote, expected_version, &additional_costs, &snapshot.schedule)
            .await
            .map_err(persistence("update", &quote_id.0))?;
        if !replaced {
            warn!(
                event_name = "quote.update_conflict",
                quote_id = %quote_id.0,
                expected_version,
                "version guard rejected concurrent update"
            );
            return Err(ServiceError::Conflict { quote_id: quote_id.0 });
        }

        info!(
            event_name = "quote.updated",
            quote_id = %quote.id.0,
            version = quote.version_number,
            escalation = quote.derived.escalation_status.as_str(),
            "price quote recalculated and updated"
        );
        Ok(PriceQuoteAggregate { quote, additional_costs, invoice_schedule: snapshot.schedule })
    }

    pub async fn delete(
        &self,
        quote_id: PriceQuoteId,
        _owner_id: UserId,
    ) -> Result<bool, ServiceError> {
        let deleted =
            self.repository.delete(&quote_id).await.map_err(persistence("delete", &quote_id.0))?;
        info!(
            event_name = "quote.deleted",
            quote_id = %quote_id.0,
            deleted,
            "price quote delete processed"
        );
        Ok(deleted)
    }

    pub async fn get_by_id(
        &self,
        quote_id: PriceQuoteId,
    ) -> Result<Option<PriceQuoteAggregate>, ServiceError> {
        self.repository.fetch(&quote_id).await.map_err(persistence("get_by_id", &quote_id.0))
    }

    pub async fn list_for_deal(
        &self,
        deal_id: DealId,
    ) -> Result<Vec<PriceQuoteAggregate>, ServiceError> {
        self.repository
            .list_for_deal(&deal_id)
            .await
            .map_err(persistence("list_for_deal", &deal_id.0))
    }

    /// Same pipeline as create/update with synthetic identifiers and no
    /// storage round-trip, so a preview always matches what a commit with
    /// the same inputs would produce.
    pub fn preview(
        &self,
        deal_id: Option<DealId>,
        input: QuoteInputPatch,
    ) -> Result<PriceQuoteAggregate, ServiceError> {
        let inputs = QuoteInputs::default().apply_patch(&input);
        inputs.validate()?;
        let additional_costs = input.additional_costs.unwrap_or_default();
        validate_additional_costs(&additional_costs)?;

        let snapshot = calculate(&inputs, &additional_costs, self.reference_date());
        let now = Utc::now();
        let quote = PriceQuote {
            id: PriceQuoteId(format!("PQ-preview-{}", Uuid::new_v4())),
            deal_id: deal_id.unwrap_or_else(|| DealId("preview".to_string())),
            owner_id: UserId("preview".to_string()),
            version_number: 0,
            inputs,
            derived: snapshot.derived,
            created_at: now,
            updated_at: now,
        };

        Ok(PriceQuoteAggregate { quote, additional_costs, invoice_schedule: snapshot.schedule })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use quotecalc_core::domain::quote::{
        AdditionalCost, DealId, EscalationStatus, PriceQuoteId, QuoteInputPatch, UserId,
    };

    use super::{PriceQuoteService, ServiceError};
    use crate::repositories::{InMemoryPriceQuoteRepository, PriceQuoteRepository};

    fn reference_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
    }

    fn service() -> PriceQuoteService<InMemoryPriceQuoteRepository> {
        PriceQuoteService::with_reference_date(
            InMemoryPriceQuoteRepository::default(),
            reference_date(),
        )
    }

    fn deal() -> DealId {
        DealId("D-1".to_string())
    }

    fn owner() -> UserId {
        UserId("U-1".to_string())
    }

    fn standard_input() -> QuoteInputPatch {
        QuoteInputPatch {
            base_minimum_price: Some(Decimal::from(1000)),
            target_markup_percentage: Some(Decimal::from(20)),
            final_offer_price: Some(Decimal::from(1300)),
            upfront_payment_percentage: Some(Decimal::from(30)),
            subsequent_installments_count: Some(2),
            subsequent_installments_interval_days: Some(30),
            additional_costs: Some(vec![AdditionalCost {
                description: "freight".to_string(),
                amount: Decimal::from(50),
            }]),
            ..QuoteInputPatch::default()
        }
    }

    #[tokio::test]
    async fn create_persists_a_fully_derived_aggregate() {
        let service = service();
        let created = service.create(deal(), owner(), standard_input()).await.expect("create");

        assert_eq!(created.quote.version_number, 1);
        assert_eq!(created.quote.derived.total_direct_cost, Decimal::from(1050));
        assert_eq!(created.quote.derived.escalation_status, EscalationStatus::Ok);
        assert_eq!(created.invoice_schedule.len(), 3);

        let stored = service
            .get_by_id(created.quote.id.clone())
            .await
            .expect("get")
            .expect("should be stored");
        assert_eq!(stored, created);
    }

    #[tokio::test]
    async fn preview_matches_create_for_identical_input() {
        let service = service();

        let previewed = service.preview(Some(deal()), standard_input()).expect("preview");
        let created = service.create(deal(), owner(), standard_input()).await.expect("create");

        assert_eq!(previewed.quote.derived, created.quote.derived);
        assert_eq!(previewed.invoice_schedule, created.invoice_schedule);
        assert_eq!(previewed.additional_costs, created.additional_costs);
        assert!(previewed.quote.id.0.starts_with("PQ-preview-"));
    }

    #[tokio::test]
    async fn preview_never_touches_storage() {
        let service = service();
        let previewed = service.preview(Some(deal()), standard_input()).expect("preview");

        assert!(service
            .get_by_id(previewed.quote.id)
            .await
            .expect("get")
            .is_none());
        assert!(service.list_for_deal(deal()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_merges_patch_and_recalculates() {
        let service = service();
        let created = service.create(deal(), owner(), standard_input()).await.expect("create");

        let patch = QuoteInputPatch {
            final_offer_price: Some(Decimal::from(800)),
            ..QuoteInputPatch::default()
        };
        let updated =
            service.update(created.quote.id.clone(), owner(), patch).await.expect("update");

        assert_eq!(updated.quote.version_number, 2);
        assert_eq!(updated.quote.inputs.base_minimum_price, Decimal::from(1000));
        // Costs were not supplied by the patch, so the stored set is
        // replaced with an empty one and direct cost drops back to MP.
        assert!(updated.additional_costs.is_empty());
        assert_eq!(updated.quote.derived.total_direct_cost, Decimal::from(1000));
        assert_eq!(
            updated.quote.derived.escalation_status,
            EscalationStatus::RequiresCeoApproval
        );
    }

    #[tokio::test]
    async fn empty_patch_update_reproduces_derived_outputs() {
        let service = service();
        let mut input = standard_input();
        input.additional_costs = None;
        let created = service.create(deal(), owner(), input).await.expect("create");

        let updated = service
            .update(created.quote.id.clone(), owner(), QuoteInputPatch::default())
            .await
            .expect("update");

        assert_eq!(updated.quote.derived, created.quote.derived);
        assert_eq!(updated.invoice_schedule, created.invoice_schedule);
        assert_eq!(updated.quote.version_number, created.quote.version_number + 1);
    }

    #[tokio::test]
    async fn update_on_missing_quote_is_not_found() {
        let service = service();
        let error = service
            .update(PriceQuoteId("PQ-absent".to_string()), owner(), QuoteInputPatch::default())
            .await
            .expect_err("should fail");

        assert!(matches!(error, ServiceError::NotFound { quote_id } if quote_id == "PQ-absent"));
    }

    #[tokio::test]
    async fn update_with_negative_price_is_rejected() {
        let service = service();
        let created = service.create(deal(), owner(), standard_input()).await.expect("create");

        let patch = QuoteInputPatch {
            base_minimum_price: Some(Decimal::from(-5)),
            ..QuoteInputPatch::default()
        };
        let error =
            service.update(created.quote.id, owner(), patch).await.expect_err("should fail");
        assert!(matches!(error, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn negative_additional_cost_is_rejected_everywhere() {
        let service = service();
        let mut input = standard_input();
        input.final_offer_price = Some(Decimal::from(950));
        input.additional_costs = Some(vec![AdditionalCost {
            description: "rebate".to_string(),
            amount: Decimal::from(-200),
        }]);

        // A -200 cost would shrink the direct-cost basis to 800 and let a
        // 950 offer dodge the below-cost escalation check.
        let error =
            service.create(deal(), owner(), input.clone()).await.expect_err("create should fail");
        assert!(matches!(error, ServiceError::Validation(_)));

        let error = service.preview(Some(deal()), input.clone()).expect_err("preview should fail");
        assert!(matches!(error, ServiceError::Validation(_)));

        let created = service.create(deal(), owner(), standard_input()).await.expect("create");
        let patch = QuoteInputPatch {
            additional_costs: input.additional_costs,
            ..QuoteInputPatch::default()
        };
        let error =
            service.update(created.quote.id, owner(), patch).await.expect_err("update should fail");
        assert!(matches!(error, ServiceError::Validation(_)));
    }

    /// Repository whose version guard always loses: stands in for another
    /// writer slipping between the service's read and write.
    struct AlwaysRacedRepository {
        inner: InMemoryPriceQuoteRepository,
    }

    #[async_trait::async_trait]
    impl PriceQuoteRepository for AlwaysRacedRepository {
        async fn insert(
            &self,
            aggregate: &quotecalc_core::PriceQuoteAggregate,
        ) -> Result<(), crate::RepositoryError> {
            self.inner.insert(aggregate).await
        }

        async fn update(
            &self,
            _quote: &quotecalc_core::PriceQuote,
            _expected_version: i64,
            _additional_costs: &[AdditionalCost],
            _schedule: &[quotecalc_core::InvoiceScheduleEntry],
        ) -> Result<bool, crate::RepositoryError> {
            Ok(false)
        }

        async fn fetch(
            &self,
            id: &PriceQuoteId,
        ) -> Result<Option<quotecalc_core::PriceQuoteAggregate>, crate::RepositoryError> {
            self.inner.fetch(id).await
        }

        async fn list_for_deal(
            &self,
            deal_id: &DealId,
        ) -> Result<Vec<quotecalc_core::PriceQuoteAggregate>, crate::RepositoryError> {
            self.inner.list_for_deal(deal_id).await
        }

        async fn delete(&self, id: &PriceQuoteId) -> Result<bool, crate::RepositoryError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn concurrent_update_surfaces_conflict() {
        let repository = AlwaysRacedRepository { inner: InMemoryPriceQuoteRepository::default() };
        let service = PriceQuoteService::with_reference_date(repository, reference_date());
        let created = service.create(deal(), owner(), standard_input()).await.expect("create");

        let error = service
            .update(created.quote.id.clone(), owner(), QuoteInputPatch::default())
            .await
            .expect_err("guarded write should conflict");
        assert!(
            matches!(error, ServiceError::Conflict { quote_id } if quote_id == created.quote.id.0)
        );
    }

    /// Repository whose listing always fails, to observe the error context
    /// the service attaches.
    struct FailingListRepository;

    #[async_trait::async_trait]
    impl PriceQuoteRepository for FailingListRepository {
        async fn insert(
            &self,
            _aggregate: &quotecalc_core::PriceQuoteAggregate,
        ) -> Result<(), crate::RepositoryError> {
            Ok(())
        }

        async fn update(
            &self,
            _quote: &quotecalc_core::PriceQuote,
            _expected_version: i64,
            _additional_costs: &[AdditionalCost],
            _schedule: &[quotecalc_core::InvoiceScheduleEntry],
        ) -> Result<bool, crate::RepositoryError> {
            Ok(true)
        }

        async fn fetch(
            &self,
            _id: &PriceQuoteId,
        ) -> Result<Option<quotecalc_core::PriceQuoteAggregate>, crate::RepositoryError> {
            Ok(None)
        }

        async fn list_for_deal(
            &self,
            _deal_id: &DealId,
        ) -> Result<Vec<quotecalc_core::PriceQuoteAggregate>, crate::RepositoryError> {
            Err(crate::RepositoryError::Decode("corrupt row".to_string()))
        }

        async fn delete(&self, _id: &PriceQuoteId) -> Result<bool, crate::RepositoryError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn list_failure_carries_the_deal_id_context() {
        let service = PriceQuoteService::new(FailingListRepository);

        let error = service.list_for_deal(deal()).await.expect_err("listing should fail");
        assert!(matches!(
            error,
            ServiceError::Persistence { operation: "list_for_deal", ref entity_id, .. }
                if entity_id == "D-1"
        ));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let service = service();
        let created = service.create(deal(), owner(), standard_input()).await.expect("create");

        assert!(service.delete(created.quote.id.clone(), owner()).await.expect("delete"));
        assert!(!service.delete(created.quote.id, owner()).await.expect("second delete"));
    }

    #[tokio::test]
    async fn list_for_deal_returns_only_that_deal() {
        let service = service();
        service.create(deal(), owner(), standard_input()).await.expect("create 1");
        service.create(deal(), owner(), standard_input()).await.expect("create 2");
        service
            .create(DealId("D-2".to_string()), owner(), standard_input())
            .await
            .expect("create other");

        let listed = service.list_for_deal(deal()).await.expect("list");
        assert_eq!(listed.len(), 2);
        for aggregate in &listed {
            assert_eq!(aggregate.quote.deal_id, deal());
        }
    }

    #[tokio::test]
    async fn unset_payment_terms_produce_an_empty_schedule() {
        let service = service();
        let input = QuoteInputPatch {
            base_minimum_price: Some(Decimal::from(100)),
            final_offer_price: Some(Decimal::from(150)),
            ..QuoteInputPatch::default()
        };

        let created = service.create(deal(), owner(), input).await.expect("create");
        assert!(created.invoice_schedule.is_empty());
        assert!(created.additional_costs.is_empty());
    }
}
