use chrono::NaiveDate;

use crate::domain::quote::{AdditionalCost, DerivedOutputs, InvoiceScheduleEntry, QuoteInputs};

use super::calculator;
use super::schedule::{generate_schedule, PaymentTerms};

/// Everything one calculation pass produces for a given input set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalculationSnapshot {
    pub derived: DerivedOutputs,
    pub schedule: Vec<InvoiceScheduleEntry>,
}

/// Run the full derivation pipeline in its fixed order:
/// total direct cost, target price, full target price, discounted offer
/// price, effective markup, escalation, then the payment schedule.
///
/// Later stages consume earlier results, and two dependencies are
/// load-bearing: the discount applies to the raw FOP (not to FTP), and the
/// schedule is generated from the discounted offer price. Every service
/// path (create, update, preview) goes through this one function.
pub fn calculate(
    inputs: &QuoteInputs,
    additional_costs: &[AdditionalCost],
    reference_date: NaiveDate,
) -> CalculationSnapshot {
    let total_direct_cost =
        calculator::total_direct_cost(inputs.base_minimum_price, additional_costs);
    let target_price =
        calculator::target_price(inputs.base_minimum_price, inputs.target_markup_percentage);
    let full_target_price = calculator::full_target_price(target_price, additional_costs);
    let discounted_offer_price = calculator::discounted_offer_price(
        inputs.final_offer_price,
        inputs.overall_discount_percentage,
    );
    let effective_markup_fop_over_mp =
        calculator::effective_markup(inputs.final_offer_price, inputs.base_minimum_price);
    let (escalation_status, escalation_details) = calculator::escalation(
        inputs.final_offer_price,
        inputs.base_minimum_price,
        total_direct_cost,
    );

    let schedule =
        generate_schedule(discounted_offer_price, &PaymentTerms::from(inputs), reference_date);

    CalculationSnapshot {
        derived: DerivedOutputs {
            total_direct_cost,
            target_price,
            full_target_price,
            discounted_offer_price,
            effective_markup_fop_over_mp,
            escalation_status,
            escalation_details,
        },
        schedule,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::quote::{AdditionalCost, EscalationStatus, QuoteInputs};

    use super::calculate;

    fn reference_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
    }

    #[test]
    fn thin_offer_scenario_derives_committee_escalation() {
        let inputs = QuoteInputs {
            base_minimum_price: Decimal::from(1000),
            target_markup_percentage: Decimal::from(20),
            final_offer_price: Decimal::from(1000),
            ..QuoteInputs::default()
        };

        let snapshot = calculate(&inputs, &[], reference_date());
        assert_eq!(snapshot.derived.target_price, Decimal::from(1200));
        assert_eq!(snapshot.derived.effective_markup_fop_over_mp, Decimal::ZERO);
        assert_eq!(
            snapshot.derived.escalation_status,
            EscalationStatus::RequiresCommitteeApproval
        );
    }

    #[test]
    fn below_cost_offer_escalates_to_ceo() {
        let inputs = QuoteInputs {
            base_minimum_price: Decimal::from(1000),
            final_offer_price: Decimal::from(800),
            ..QuoteInputs::default()
        };

        let snapshot = calculate(&inputs, &[], reference_date());
        assert_eq!(snapshot.derived.total_direct_cost, Decimal::from(1000));
        assert_eq!(snapshot.derived.escalation_status, EscalationStatus::RequiresCeoApproval);
    }

    #[test]
    fn discount_applies_to_fop_not_ftp() {
        let inputs = QuoteInputs {
            base_minimum_price: Decimal::from(1000),
            target_markup_percentage: Decimal::from(50),
            final_offer_price: Decimal::from(1000),
            overall_discount_percentage: Decimal::from(10),
            ..QuoteInputs::default()
        };
        let costs =
            vec![AdditionalCost { description: "freight".to_string(), amount: Decimal::from(200) }];

        let snapshot = calculate(&inputs, &costs, reference_date());
        // FTP is 1500 + 200; the discount ignores it and works off FOP 1000.
        assert_eq!(snapshot.derived.full_target_price, Decimal::from(1700));
        assert_eq!(snapshot.derived.discounted_offer_price, Decimal::from(900));
    }

    #[test]
    fn schedule_is_generated_from_the_discounted_price() {
        let inputs = QuoteInputs {
            base_minimum_price: Decimal::from(500),
            final_offer_price: Decimal::from(1000),
            overall_discount_percentage: Decimal::from(20),
            upfront_payment_percentage: Decimal::from(50),
            ..QuoteInputs::default()
        };

        let snapshot = calculate(&inputs, &[], reference_date());
        assert_eq!(snapshot.derived.discounted_offer_price, Decimal::from(800));
        assert_eq!(snapshot.schedule.len(), 1);
        assert_eq!(snapshot.schedule[0].amount_due, Decimal::from(400));
    }

    #[test]
    fn additional_costs_feed_both_direct_cost_and_ftp() {
        let inputs = QuoteInputs {
            base_minimum_price: Decimal::from(1000),
            target_markup_percentage: Decimal::from(10),
            final_offer_price: Decimal::from(1050),
            ..QuoteInputs::default()
        };
        let costs =
            vec![AdditionalCost { description: "freight".to_string(), amount: Decimal::from(100) }];

        let snapshot = calculate(&inputs, &costs, reference_date());
        assert_eq!(snapshot.derived.total_direct_cost, Decimal::from(1100));
        assert_eq!(snapshot.derived.full_target_price, Decimal::from(1200));
        // 1050 < 1100 direct cost, so the first escalation check fires.
        assert_eq!(snapshot.derived.escalation_status, EscalationStatus::RequiresCeoApproval);
    }

    #[test]
    fn default_terms_produce_an_empty_schedule() {
        let inputs = QuoteInputs {
            base_minimum_price: Decimal::from(100),
            final_offer_price: Decimal::from(200),
            ..QuoteInputs::default()
        };

        let snapshot = calculate(&inputs, &[], reference_date());
        assert!(snapshot.schedule.is_empty());
    }
}
