use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use quotecalc_core::domain::quote::{
    AdditionalCost, DealId, DerivedOutputs, EscalationDetails, EscalationStatus,
    InvoiceScheduleEntry, PriceQuote, PriceQuoteAggregate, PriceQuoteId, QuoteInputs,
    ScheduleEntryType, UserId,
};

use super::{ChildCollectionReplacer, PriceQuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPriceQuoteRepository {
    pool: DbPool,
}

impl SqlPriceQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal for {field}: {error}")))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp for {field}: {error}")))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("invalid date for {field}: {error}")))
}

fn row_to_quote(row: &SqliteRow) -> Result<PriceQuote, RepositoryError> {
    let get_text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(column).map_err(decode_err)
    };
    let get_decimal = |column: &str| -> Result<Decimal, RepositoryError> {
        parse_decimal(column, &get_text(column)?)
    };

    let escalation_details_json: Option<String> =
        row.try_get("escalation_details_json").map_err(decode_err)?;
    let escalation_details: Option<EscalationDetails> = escalation_details_json
        .map(|json| serde_json::from_str(&json).map_err(decode_err))
        .transpose()?;

    Ok(PriceQuote {
        id: PriceQuoteId(get_text("id")?),
        deal_id: DealId(get_text("deal_id")?),
        owner_id: UserId(get_text("owner_id")?),
        version_number: row.try_get("version_number").map_err(decode_err)?,
        inputs: QuoteInputs {
            base_minimum_price: get_decimal("base_minimum_price")?,
            target_markup_percentage: get_decimal("target_markup_percentage")?,
            final_offer_price: get_decimal("final_offer_price")?,
            overall_discount_percentage: get_decimal("overall_discount_percentage")?,
            upfront_payment_percentage: get_decimal("upfront_payment_percentage")?,
            upfront_payment_due_days: row.try_get("upfront_payment_due_days").map_err(decode_err)?,
            subsequent_installments_count: row
                .try_get::<i64, _>("subsequent_installments_count")
                .map_err(decode_err)?
                .try_into()
                .map_err(decode_err)?,
            subsequent_installments_interval_days: row
                .try_get("subsequent_installments_interval_days")
                .map_err(decode_err)?,
            name: row.try_get("name").map_err(decode_err)?,
            status: get_text("status")?,
        },
        derived: DerivedOutputs {
            total_direct_cost: get_decimal("total_direct_cost")?,
            target_price: get_decimal("target_price")?,
            full_target_price: get_decimal("full_target_price")?,
            discounted_offer_price: get_decimal("discounted_offer_price")?,
            effective_markup_fop_over_mp: get_decimal("effective_markup_fop_over_mp")?,
            escalation_status: EscalationStatus::parse(&get_text("escalation_status")?),
            escalation_details,
        },
        created_at: parse_timestamp("created_at", &get_text("created_at")?)?,
        updated_at: parse_timestamp("updated_at", &get_text("updated_at")?)?,
    })
}

fn row_to_cost(row: &SqliteRow) -> Result<AdditionalCost, RepositoryError> {
    let amount_text: String = row.try_get("amount").map_err(decode_err)?;
    Ok(AdditionalCost {
        description: row.try_get("description").map_err(decode_err)?,
        amount: parse_decimal("amount", &amount_text)?,
    })
}

fn row_to_schedule_entry(row: &SqliteRow) -> Result<InvoiceScheduleEntry, RepositoryError> {
    let entry_type_text: String = row.try_get("entry_type").map_err(decode_err)?;
    let entry_type = ScheduleEntryType::parse(&entry_type_text).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown schedule entry type `{entry_type_text}`"))
    })?;
    let due_date_text: String = row.try_get("due_date").map_err(decode_err)?;
    let amount_text: String = row.try_get("amount_due").map_err(decode_err)?;

    Ok(InvoiceScheduleEntry {
        entry_type,
        due_date: parse_date("due_date", &due_date_text)?,
        amount_due: parse_decimal("amount_due", &amount_text)?,
        description: row.try_get("description").map_err(decode_err)?,
    })
}

/// Replacer for the `additional_cost` table.
pub struct AdditionalCostTable;

#[async_trait]
impl ChildCollectionReplacer<AdditionalCost> for AdditionalCostTable {
    async fn replace_all(
        &self,
        conn: &mut SqliteConnection,
        quote_id: &PriceQuoteId,
        items: &[AdditionalCost],
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM additional_cost WHERE quote_id = ?")
            .bind(&quote_id.0)
            .execute(&mut *conn)
            .await?;

        for cost in items {
            sqlx::query(
                "INSERT INTO additional_cost (quote_id, description, amount) VALUES (?, ?, ?)",
            )
            .bind(&quote_id.0)
            .bind(&cost.description)
            .bind(cost.amount.to_string())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

/// Replacer for the `invoice_schedule_entry` table. The position column
/// preserves generation order, which is chronological by construction.
pub struct InvoiceScheduleTable;

#[async_trait]
impl ChildCollectionReplacer<InvoiceScheduleEntry> for InvoiceScheduleTable {
    async fn replace_all(
        &self,
        conn: &mut SqliteConnection,
        quote_id: &PriceQuoteId,
        items: &[InvoiceScheduleEntry],
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM invoice_schedule_entry WHERE quote_id = ?")
            .bind(&quote_id.0)
            .execute(&mut *conn)
            .await?;

        for (position, entry) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO invoice_schedule_entry
                     (quote_id, position, entry_type, due_date, amount_due, description)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&quote_id.0)
            .bind(position as i64)
            .bind(entry.entry_type.as_str())
            .bind(entry.due_date.format("%Y-%m-%d").to_string())
            .bind(entry.amount_due.to_string())
            .bind(&entry.description)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

async fn write_quote_row(
    conn: &mut SqliteConnection,
    quote: &PriceQuote,
    expected_version: Option<i64>,
) -> Result<u64, RepositoryError> {
    let escalation_details_json = quote
        .derived
        .escalation_details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(decode_err)?;

    let result = if let Some(expected_version) = expected_version {
        sqlx::query(
            "UPDATE price_quote SET
                 version_number = ?, name = ?, status = ?,
                 base_minimum_price = ?, target_markup_percentage = ?, final_offer_price = ?,
                 overall_discount_percentage = ?, upfront_payment_percentage = ?,
                 upfront_payment_due_days = ?, subsequent_installments_count = ?,
                 subsequent_installments_interval_days = ?,
                 total_direct_cost = ?, target_price = ?, full_target_price = ?,
                 discounted_offer_price = ?, effective_markup_fop_over_mp = ?,
                 escalation_status = ?, escalation_details_json = ?, updated_at = ?
             WHERE id = ? AND version_number = ?",
        )
        .bind(quote.version_number)
        .bind(&quote.inputs.name)
        .bind(&quote.inputs.status)
        .bind(quote.inputs.base_minimum_price.to_string())
        .bind(quote.inputs.target_markup_percentage.to_string())
        .bind(quote.inputs.final_offer_price.to_string())
        .bind(quote.inputs.overall_discount_percentage.to_string())
        .bind(quote.inputs.upfront_payment_percentage.to_string())
        .bind(quote.inputs.upfront_payment_due_days)
        .bind(i64::from(quote.inputs.subsequent_installments_count))
        .bind(quote.inputs.subsequent_installments_interval_days)
        .bind(quote.derived.total_direct_cost.to_string())
        .bind(quote.derived.target_price.to_string())
        .bind(quote.derived.full_target_price.to_string())
        .bind(quote.derived.discounted_offer_price.to_string())
        .bind(quote.derived.effective_markup_fop_over_mp.to_string())
        .bind(quote.derived.escalation_status.as_str())
        .bind(&escalation_details_json)
        .bind(quote.updated_at.to_rfc3339())
        .bind(&quote.id.0)
        .bind(expected_version)
        .execute(conn)
        .await?
    } else {
        sqlx::query(
            "INSERT INTO price_quote
                 (id, deal_id, owner_id, version_number, name, status,
                  base_minimum_price, target_markup_percentage, final_offer_price,
                  overall_discount_percentage, upfront_payment_percentage,
                  upfront_payment_due_days, subsequent_installments_count,
                  subsequent_installments_interval_days,
                  total_direct_cost, target_price, full_target_price,
                  discounted_offer_price, effective_markup_fop_over_mp,
                  escalation_status, escalation_details_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quote.id.0)
        .bind(&quote.deal_id.0)
        .bind(&quote.owner_id.0)
        .bind(quote.version_number)
        .bind(&quote.inputs.name)
        .bind(&quote.inputs.status)
        .bind(quote.inputs.base_minimum_price.to_string())
        .bind(quote.inputs.target_markup_percentage.to_string())
        .bind(quote.inputs.final_offer_price.to_string())
        .bind(quote.inputs.overall_discount_percentage.to_string())
        .bind(quote.inputs.upfront_payment_percentage.to_string())
        .bind(quote.inputs.upfront_payment_due_days)
        .bind(i64::from(quote.inputs.subsequent_installments_count))
        .bind(quote.inputs.subsequent_installments_interval_days)
        .bind(quote.derived.total_direct_cost.to_string())
        .bind(quote.derived.target_price.to_string())
        .bind(quote.derived.full_target_price.to_string())
        .bind(quote.derived.discounted_offer_price.to_string())
        .bind(quote.derived.effective_markup_fop_over_mp.to_string())
        .bind(quote.derived.escalation_status.as_str())
        .bind(&escalation_details_json)
        .bind(quote.created_at.to_rfc3339())
        .bind(quote.updated_at.to_rfc3339())
        .execute(conn)
        .await?
    };

    Ok(result.rows_affected())
}

impl SqlPriceQuoteRepository {
    async fn load_children(
        &self,
        quote_id: &PriceQuoteId,
    ) -> Result<(Vec<AdditionalCost>, Vec<InvoiceScheduleEntry>), RepositoryError> {
        let cost_rows = sqlx::query(
            "SELECT description, amount FROM additional_cost WHERE quote_id = ? ORDER BY id ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;
        let additional_costs =
            cost_rows.iter().map(row_to_cost).collect::<Result<Vec<_>, _>>()?;

        let entry_rows = sqlx::query(
            "SELECT entry_type, due_date, amount_due, description
             FROM invoice_schedule_entry
             WHERE quote_id = ?
             ORDER BY position ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;
        let invoice_schedule =
            entry_rows.iter().map(row_to_schedule_entry).collect::<Result<Vec<_>, _>>()?;

        Ok((additional_costs, invoice_schedule))
    }
}

#[async_trait]
impl PriceQuoteRepository for SqlPriceQuoteRepository {
    async fn insert(&self, aggregate: &PriceQuoteAggregate) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        write_quote_row(&mut *tx, &aggregate.quote, None).await?;
        AdditionalCostTable
            .replace_all(&mut *tx, &aggregate.quote.id, &aggregate.additional_costs)
            .await?;
        InvoiceScheduleTable
            .replace_all(&mut *tx, &aggregate.quote.id, &aggregate.invoice_schedule)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update(
        &self,
        quote: &PriceQuote,
        expected_version: i64,
        additional_costs: &[AdditionalCost],
        schedule: &[InvoiceScheduleEntry],
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let affected = write_quote_row(&mut *tx, quote, Some(expected_version)).await?;
        if affected == 0 {
            // Version guard missed: a concurrent update won. Dropping the
            // transaction rolls back without touching the children.
            return Ok(false);
        }

        AdditionalCostTable.replace_all(&mut *tx, &quote.id, additional_costs).await?;
        InvoiceScheduleTable.replace_all(&mut *tx, &quote.id, schedule).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn fetch(
        &self,
        id: &PriceQuoteId,
    ) -> Result<Option<PriceQuoteAggregate>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM price_quote WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let quote = row_to_quote(&row)?;
        let (additional_costs, invoice_schedule) = self.load_children(&quote.id).await?;

        Ok(Some(PriceQuoteAggregate { quote, additional_costs, invoice_schedule }))
    }

    async fn list_for_deal(
        &self,
        deal_id: &DealId,
    ) -> Result<Vec<PriceQuoteAggregate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM price_quote WHERE deal_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(&deal_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut aggregates = Vec::with_capacity(rows.len());
        for row in &rows {
            let quote = row_to_quote(row)?;
            let (additional_costs, invoice_schedule) = self.load_children(&quote.id).await?;
            aggregates.push(PriceQuoteAggregate { quote, additional_costs, invoice_schedule });
        }

        Ok(aggregates)
    }

    async fn delete(&self, id: &PriceQuoteId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM price_quote WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
