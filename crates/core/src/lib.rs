pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use domain::quote::{
    validate_additional_costs, AdditionalCost, DealId, DerivedOutputs, EscalationDetails,
    EscalationStatus, InvoiceScheduleEntry, PriceQuote, PriceQuoteAggregate, PriceQuoteId,
    QuoteInputPatch, QuoteInputs, ScheduleEntryType, UserId,
};
pub use errors::DomainError;
pub use pricing::{calculate, CalculationSnapshot, PaymentTerms};
