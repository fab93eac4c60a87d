use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceQuoteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Approval classification attached to every calculated quote.
///
/// Ordering of checks lives in the calculator; this type only names the
/// outcomes. Wire strings are fixed (`ok`, `requires_committee_approval`,
/// `requires_ceo_approval`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Ok,
    RequiresCommitteeApproval,
    RequiresCeoApproval,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::RequiresCommitteeApproval => "requires_committee_approval",
            Self::RequiresCeoApproval => "requires_ceo_approval",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "requires_committee_approval" => Self::RequiresCommitteeApproval,
            "requires_ceo_approval" => Self::RequiresCeoApproval,
            _ => Self::Ok,
        }
    }
}

/// Structured reason payload for a non-`ok` escalation status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDetails {
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCost {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEntryType {
    Upfront,
    Installment(u32),
}

impl ScheduleEntryType {
    pub fn as_str(&self) -> String {
        match self {
            Self::Upfront => "upfront".to_string(),
            Self::Installment(n) => format!("installment_{n}"),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value == "upfront" {
            return Some(Self::Upfront);
        }
        value.strip_prefix("installment_")?.parse::<u32>().ok().map(Self::Installment)
    }
}

/// One discrete payment obligation derived from the discounted offer price
/// and the quote's payment terms. Generated, never hand-edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceScheduleEntry {
    pub entry_type: ScheduleEntryType,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub description: Option<String>,
}

/// Raw commercial inputs for one quote version. Percentages are whole
/// numbers (15 means 15%); the calculator divides by 100 internally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInputs {
    pub base_minimum_price: Decimal,
    pub target_markup_percentage: Decimal,
    pub final_offer_price: Decimal,
    pub overall_discount_percentage: Decimal,
    pub upfront_payment_percentage: Decimal,
    pub upfront_payment_due_days: i64,
    pub subsequent_installments_count: u32,
    pub subsequent_installments_interval_days: i64,
    pub name: Option<String>,
    pub status: String,
}

impl Default for QuoteInputs {
    fn default() -> Self {
        Self {
            base_minimum_price: Decimal::ZERO,
            target_markup_percentage: Decimal::ZERO,
            final_offer_price: Decimal::ZERO,
            overall_discount_percentage: Decimal::ZERO,
            upfront_payment_percentage: Decimal::ZERO,
            upfront_payment_due_days: 0,
            subsequent_installments_count: 0,
            subsequent_installments_interval_days: 0,
            name: None,
            status: "draft".to_string(),
        }
    }
}

impl QuoteInputs {
    /// Defensive numeric validation. Schema-level range checks belong to the
    /// caller; this rejects values no calculation can meaningfully accept.
    pub fn validate(&self) -> Result<(), DomainError> {
        ensure_non_negative("base_minimum_price", self.base_minimum_price)?;
        ensure_non_negative("target_markup_percentage", self.target_markup_percentage)?;
        ensure_non_negative("final_offer_price", self.final_offer_price)?;
        ensure_non_negative("overall_discount_percentage", self.overall_discount_percentage)?;
        ensure_non_negative("upfront_payment_percentage", self.upfront_payment_percentage)?;
        if self.upfront_payment_due_days < 0 {
            return Err(DomainError::NegativeField {
                field: "upfront_payment_due_days",
                value: Decimal::from(self.upfront_payment_due_days),
            });
        }
        if self.subsequent_installments_interval_days < 0 {
            return Err(DomainError::NegativeField {
                field: "subsequent_installments_interval_days",
                value: Decimal::from(self.subsequent_installments_interval_days),
            });
        }
        Ok(())
    }

    /// Merge a partial edit over these inputs, field by field. Fields absent
    /// from the patch keep their stored value; present fields always win,
    /// including zero (a typed patch cannot silently drop falsy values).
    pub fn apply_patch(&self, patch: &QuoteInputPatch) -> Self {
        Self {
            base_minimum_price: patch.base_minimum_price.unwrap_or(self.base_minimum_price),
            target_markup_percentage: patch
                .target_markup_percentage
                .unwrap_or(self.target_markup_percentage),
            final_offer_price: patch.final_offer_price.unwrap_or(self.final_offer_price),
            overall_discount_percentage: patch
                .overall_discount_percentage
                .unwrap_or(self.overall_discount_percentage),
            upfront_payment_percentage: patch
                .upfront_payment_percentage
                .unwrap_or(self.upfront_payment_percentage),
            upfront_payment_due_days: patch
                .upfront_payment_due_days
                .unwrap_or(self.upfront_payment_due_days),
            subsequent_installments_count: patch
                .subsequent_installments_count
                .unwrap_or(self.subsequent_installments_count),
            subsequent_installments_interval_days: patch
                .subsequent_installments_interval_days
                .unwrap_or(self.subsequent_installments_interval_days),
            name: patch.name.clone().or_else(|| self.name.clone()),
            status: patch.status.clone().unwrap_or_else(|| self.status.clone()),
        }
    }
}

fn ensure_non_negative(field: &'static str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::NegativeField { field, value });
    }
    Ok(())
}

/// Cost amounts get the same defensive check as the raw price fields; a
/// negative amount would deflate the direct-cost basis the escalation
/// checks compare against.
pub fn validate_additional_costs(costs: &[AdditionalCost]) -> Result<(), DomainError> {
    for cost in costs {
        ensure_non_negative("additional_cost.amount", cost.amount)?;
    }
    Ok(())
}

/// Typed partial edit of the raw inputs. Every field is optional so that an
/// explicit zero survives the merge. Additional costs travel with the patch
/// because the stored set is always replaced wholesale, never merged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInputPatch {
    pub base_minimum_price: Option<Decimal>,
    pub target_markup_percentage: Option<Decimal>,
    pub final_offer_price: Option<Decimal>,
    pub overall_discount_percentage: Option<Decimal>,
    pub upfront_payment_percentage: Option<Decimal>,
    pub upfront_payment_due_days: Option<i64>,
    pub subsequent_installments_count: Option<u32>,
    pub subsequent_installments_interval_days: Option<i64>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub additional_costs: Option<Vec<AdditionalCost>>,
}

/// Derived, snapshotted outputs. Never supplied by a caller; every write
/// path recomputes the full set from the raw inputs on the same row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedOutputs {
    pub total_direct_cost: Decimal,
    pub target_price: Decimal,
    pub full_target_price: Decimal,
    pub discounted_offer_price: Decimal,
    pub effective_markup_fop_over_mp: Decimal,
    pub escalation_status: EscalationStatus,
    pub escalation_details: Option<EscalationDetails>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub id: PriceQuoteId,
    pub deal_id: DealId,
    pub owner_id: UserId,
    pub version_number: i64,
    pub inputs: QuoteInputs,
    pub derived: DerivedOutputs,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A quote row with both child collections attached. Children are always
/// arrays, never null.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuoteAggregate {
    pub quote: PriceQuote,
    pub additional_costs: Vec<AdditionalCost>,
    pub invoice_schedule: Vec<InvoiceScheduleEntry>,
}
