use rust_decimal::Decimal;

use crate::domain::quote::{AdditionalCost, EscalationDetails, EscalationStatus};

/// Multiplier over MP below which a quote needs committee sign-off.
/// Policy constant: tune here, not in the decision flow.
pub fn committee_markup_floor() -> Decimal {
    // 1.10 == MP + 10%
    Decimal::new(110, 2)
}

pub fn sum_additional_costs(costs: &[AdditionalCost]) -> Decimal {
    costs.iter().map(|cost| cost.amount).sum()
}

/// MP plus every additional cost.
pub fn total_direct_cost(mp: Decimal, costs: &[AdditionalCost]) -> Decimal {
    mp + sum_additional_costs(costs)
}

/// MP grossed up by the target markup percentage (whole number, 15 == 15%).
pub fn target_price(mp: Decimal, target_markup_pct: Decimal) -> Decimal {
    mp * (Decimal::ONE + target_markup_pct / Decimal::ONE_HUNDRED)
}

pub fn full_target_price(target_price: Decimal, costs: &[AdditionalCost]) -> Decimal {
    target_price + sum_additional_costs(costs)
}

/// Discount applies to the raw FOP, never to FTP.
pub fn discounted_offer_price(fop: Decimal, discount_pct: Decimal) -> Decimal {
    fop * (Decimal::ONE - discount_pct / Decimal::ONE_HUNDRED)
}

/// Realized markup of FOP over MP, as a whole-number percentage.
/// `mp == 0` is defined behavior and yields 0, not an error.
pub fn effective_markup(fop: Decimal, mp: Decimal) -> Decimal {
    if mp.is_zero() {
        return Decimal::ZERO;
    }
    (fop - mp) / mp * Decimal::ONE_HUNDRED
}

/// Ordered, first-match-wins approval classification.
pub fn escalation(
    fop: Decimal,
    mp: Decimal,
    total_direct_cost: Decimal,
) -> (EscalationStatus, Option<EscalationDetails>) {
    if fop < total_direct_cost {
        return (
            EscalationStatus::RequiresCeoApproval,
            Some(EscalationDetails { reason: "Offer price below total direct cost".to_string() }),
        );
    }
    if fop < mp * committee_markup_floor() {
        return (
            EscalationStatus::RequiresCommitteeApproval,
            Some(EscalationDetails { reason: "Markup less than 10% over MP".to_string() }),
        );
    }
    (EscalationStatus::Ok, None)
}
