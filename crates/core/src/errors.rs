use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{field}` must not be negative (got {value})")]
    NegativeField { field: &'static str, value: Decimal },
}
