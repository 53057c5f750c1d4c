use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::audit::{AuditEntry, AuditLog};
use crate::catalog::CatalogReader;
use crate::db::{self, quote_repo, Database};
use crate::error::QuoteError;

use super::{CreateQuoteInput, PriceQuote, PricingUnit, QuoteStatus, DEFAULT_CURRENCY};

/// Entity type recorded in the audit trail for quotes.
pub const AUDIT_ENTITY_TYPE: &str = "price_quote";

/// Validates and inserts price quotes; voids them. Nothing else mutates
/// the quote table.
pub struct QuoteWriter {
    db: Database,
    catalog: Arc<dyn CatalogReader>,
    audit: Arc<dyn AuditLog>,
}

impl QuoteWriter {
    pub fn new(db: Database, catalog: Arc<dyn CatalogReader>, audit: Arc<dyn AuditLog>) -> Self {
        Self { db, catalog, audit }
    }

    /// Validates every field, then inserts one active quote and records
    /// an audit entry. No row is written when validation fails.
    pub fn create(&self, input: &CreateQuoteInput) -> Result<PriceQuote, QuoteError> {
        let price = parse_price(&input.price)?;

        if self.catalog.get_sailing_by_id(input.sailing_id)?.is_none() {
            return Err(QuoteError::UnknownSailing(input.sailing_id));
        }
        if self.catalog.get_cabin_type_by_id(input.cabin_type_id)?.is_none() {
            return Err(QuoteError::UnknownCabinType(input.cabin_type_id));
        }
        if self.catalog.get_supplier_by_id(input.supplier_id)?.is_none() {
            return Err(QuoteError::UnknownSupplier(input.supplier_id));
        }

        let currency = normalize_currency(&input.currency)?;
        let pricing_unit = PricingUnit::from_str(input.pricing_unit.trim())?;

        let created_at = Utc::now();
        let mut quote = PriceQuote {
            id: 0,
            sailing_id: input.sailing_id,
            cabin_type_id: input.cabin_type_id,
            supplier_id: input.supplier_id,
            price,
            currency,
            pricing_unit,
            guest_count: input.guest_count.filter(|&g| g > 0),
            cabin_quantity: input.cabin_quantity.filter(|&q| q > 0).unwrap_or(1),
            valid_until: input.valid_until,
            conditions: input.conditions.clone(),
            promotion: input.promotion.clone(),
            notes: input.notes.clone(),
            source: input.source,
            source_ref: input.source_ref.clone(),
            import_job_id: input.import_job_id,
            status: QuoteStatus::Active,
            created_at,
            created_by: input.created_by,
        };

        quote.id = quote_repo::insert(
            &self.db,
            &quote_repo::QuoteRow {
                id: 0,
                sailing_id: quote.sailing_id,
                cabin_type_id: quote.cabin_type_id,
                supplier_id: quote.supplier_id,
                price: quote.price.to_string(),
                currency: quote.currency.clone(),
                pricing_unit: quote.pricing_unit.as_str().to_string(),
                guest_count: quote.guest_count,
                cabin_quantity: quote.cabin_quantity,
                valid_until: quote
                    .valid_until
                    .map(|d| d.format("%Y-%m-%d").to_string()),
                conditions: quote.conditions.clone(),
                promotion: quote.promotion.clone(),
                notes: quote.notes.clone(),
                source: quote.source.as_str().to_string(),
                source_ref: quote.source_ref.clone(),
                import_job_id: quote.import_job_id,
                status: QuoteStatus::Active.as_str().to_string(),
                created_at: db::timestamp(created_at),
                created_by: quote.created_by,
            },
        )?;

        tracing::debug!(
            quote_id = quote.id,
            sailing_id = quote.sailing_id,
            cabin_type_id = quote.cabin_type_id,
            "price quote created"
        );

        self.record_audit(&quote);
        Ok(quote)
    }

    /// `active → voided`. Exactly one of several concurrent calls for the
    /// same id succeeds; the rest fail with `NotActive`.
    pub fn void(&self, id: i64) -> Result<(), QuoteError> {
        if quote_repo::void_if_active(&self.db, id)? == 0 {
            return Err(QuoteError::NotActive(id));
        }
        tracing::info!(quote_id = id, "price quote voided");
        Ok(())
    }

    pub fn find(&self, id: i64) -> Result<Option<PriceQuote>, QuoteError> {
        quote_repo::find_by_id(&self.db, id)?
            .map(PriceQuote::try_from)
            .transpose()
    }

    fn record_audit(&self, quote: &PriceQuote) {
        let entry = AuditEntry {
            user_id: quote.created_by,
            supplier_id: Some(quote.supplier_id),
            entity_type: AUDIT_ENTITY_TYPE.to_string(),
            entity_id: quote.id,
            payload: serde_json::json!({
                "sailing_id": quote.sailing_id,
                "cabin_type_id": quote.cabin_type_id,
                "supplier_id": quote.supplier_id,
                "price": quote.price.to_string(),
                "currency": quote.currency,
                "pricing_unit": quote.pricing_unit.as_str(),
                "source": quote.source.as_str(),
                "import_job_id": quote.import_job_id,
            }),
        };

        if let Err(e) = self.audit.log_create(&entry) {
            tracing::warn!(quote_id = quote.id, error = %e, "audit write failed");
        }
    }
}

fn parse_price(raw: &str) -> Result<Decimal, QuoteError> {
    match Decimal::from_str(raw.trim()) {
        Ok(price) if price > Decimal::ZERO => Ok(price),
        _ => Err(QuoteError::InvalidPrice(raw.to_string())),
    }
}

/// Empty means the default currency; anything else must be exactly three
/// characters and is stored uppercase.
fn normalize_currency(raw: &str) -> Result<String, QuoteError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_CURRENCY.to_string());
    }
    if trimmed.chars().count() != 3 {
        return Err(QuoteError::InvalidCurrency(raw.to_string()));
    }
    Ok(trimmed.to_uppercase())
}
