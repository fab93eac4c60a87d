use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::quote::{InvoiceScheduleEntry, QuoteInputs, ScheduleEntryType};

/// Payment-term slice of the raw inputs, in the shape the generator needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentTerms {
    pub upfront_percentage: Decimal,
    pub upfront_due_days: i64,
    pub installments_count: u32,
    pub installment_interval_days: i64,
}

impl From<&QuoteInputs> for PaymentTerms {
    fn from(inputs: &QuoteInputs) -> Self {
        Self {
            upfront_percentage: inputs.upfront_payment_percentage,
            upfront_due_days: inputs.upfront_payment_due_days,
            installments_count: inputs.subsequent_installments_count,
            installment_interval_days: inputs.subsequent_installments_interval_days,
        }
    }
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Generate the ordered payment schedule for `final_price`.
///
/// `reference_date` stands in for "today" so the function stays pure and
/// reproducible. Installment due dates chain off the previous entry (the
/// upfront due date when one exists, otherwise `reference_date`), each one
/// interval further out; the offsets are cumulative, not anchored.
///
/// Installments split the remaining amount evenly, each rounded to cents.
/// The last installment is NOT adjusted to absorb rounding drift; callers
/// accept a total drift of up to half a cent per installment.
pub fn generate_schedule(
    final_price: Decimal,
    terms: &PaymentTerms,
    reference_date: NaiveDate,
) -> Vec<InvoiceScheduleEntry> {
    let mut entries = Vec::new();
    let mut remaining = final_price;
    let mut anchor = reference_date;

    if terms.upfront_percentage > Decimal::ZERO && final_price > Decimal::ZERO {
        let amount = round_money(final_price * terms.upfront_percentage / Decimal::ONE_HUNDRED);
        let due_date = reference_date + Duration::days(terms.upfront_due_days);
        entries.push(InvoiceScheduleEntry {
            entry_type: ScheduleEntryType::Upfront,
            due_date,
            amount_due: amount,
            description: Some("Upfront payment".to_string()),
        });
        remaining -= amount;
        anchor = due_date;
    }

    if terms.installments_count > 0
        && remaining > Decimal::ZERO
        && terms.installment_interval_days > 0
    {
        let per_installment = round_money(remaining / Decimal::from(terms.installments_count));
        let mut due_date = anchor;
        for n in 1..=terms.installments_count {
            due_date += Duration::days(terms.installment_interval_days);
            entries.push(InvoiceScheduleEntry {
                entry_type: ScheduleEntryType::Installment(n),
                due_date,
                amount_due: per_installment,
                description: Some(format!(
                    "Installment {n} of {count}",
                    count = terms.installments_count
                )),
            });
        }
    }

    entries
}
