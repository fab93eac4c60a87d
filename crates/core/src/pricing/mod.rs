pub mod aggregator;
pub mod calculator;
pub mod schedule;

pub use aggregator::{calculate, CalculationSnapshot};
pub use schedule::{generate_schedule, PaymentTerms};
