use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use quotecalc_core::domain::quote::{DealId, QuoteInputPatch};
use quotecalc_db::{InMemoryPriceQuoteRepository, PriceQuoteService};

use crate::commands::CommandResult;

/// Run a what-if calculation on an input file without persisting anything.
/// The input file is TOML with the raw quote fields, e.g.:
///
/// ```toml
/// base_minimum_price = "1000"
/// target_markup_percentage = "20"
/// final_offer_price = "1300"
/// upfront_payment_percentage = "30"
/// subsequent_installments_count = 2
/// subsequent_installments_interval_days = 30
///
/// [[additional_costs]]
/// description = "freight"
/// amount = "50"
/// ```
pub fn run(input_path: &Path, deal_id: Option<String>, reference_date: Option<String>) -> CommandResult {
    let raw = match fs::read_to_string(input_path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "preview",
                "input_read",
                format!("could not read `{}`: {error}", input_path.display()),
                2,
            );
        }
    };

    let patch: QuoteInputPatch = match toml::from_str(&raw) {
        Ok(patch) => patch,
        Err(error) => {
            return CommandResult::failure(
                "preview",
                "input_parse",
                format!("could not parse `{}`: {error}", input_path.display()),
                2,
            );
        }
    };

    let reference_date = match reference_date {
        Some(value) => match NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(error) => {
                return CommandResult::failure(
                    "preview",
                    "input_parse",
                    format!("invalid --reference-date `{value}`: {error}"),
                    2,
                );
            }
        },
        None => None,
    };

    let repository = InMemoryPriceQuoteRepository::default();
    let service = match reference_date {
        Some(date) => PriceQuoteService::with_reference_date(repository, date),
        None => PriceQuoteService::new(repository),
    };

    let aggregate = match service.preview(deal_id.map(DealId), patch) {
        Ok(aggregate) => aggregate,
        Err(error) => {
            return CommandResult::failure("preview", "validation", error.to_string(), 3);
        }
    };

    match serde_json::to_string_pretty(&aggregate) {
        Ok(json) => CommandResult { exit_code: 0, output: json },
        Err(error) => CommandResult::failure("preview", "serialization", error.to_string(), 4),
    }
}
