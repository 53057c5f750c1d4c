//! Append-only price quotes.

pub mod writer;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::{self, quote_repo::QuoteRow};
use crate::error::QuoteError;

pub use writer::QuoteWriter;

/// Currency used when the caller leaves it empty.
pub const DEFAULT_CURRENCY: &str = "CNY";

/// How a quoted price is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingUnit {
    PerPerson,
    PerCabin,
    Total,
}

impl PricingUnit {
    pub const ALL: [PricingUnit; 3] = [
        PricingUnit::PerPerson,
        PricingUnit::PerCabin,
        PricingUnit::Total,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingUnit::PerPerson => "PER_PERSON",
            PricingUnit::PerCabin => "PER_CABIN",
            PricingUnit::Total => "TOTAL",
        }
    }
}

impl FromStr for PricingUnit {
    type Err = QuoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| QuoteError::InvalidPricingUnit(s.to_string()))
    }
}

impl fmt::Display for PricingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuoteSource {
    Manual,
    FileImport,
    TextImport,
    TemplateImport,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSource::Manual => "manual",
            QuoteSource::FileImport => "file-import",
            QuoteSource::TextImport => "text-import",
            QuoteSource::TemplateImport => "template-import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(QuoteSource::Manual),
            "file-import" => Some(QuoteSource::FileImport),
            "text-import" => Some(QuoteSource::TextImport),
            "template-import" => Some(QuoteSource::TemplateImport),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Active,
    Voided,
    Corrected,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Active => "active",
            QuoteStatus::Voided => "voided",
            QuoteStatus::Corrected => "corrected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(QuoteStatus::Active),
            "voided" => Some(QuoteStatus::Voided),
            "corrected" => Some(QuoteStatus::Corrected),
            _ => None,
        }
    }
}

/// Caller-supplied fields for a new quote. `price`, `currency` and
/// `pricing_unit` arrive as text and are validated by the writer.
#[derive(Debug, Clone)]
pub struct CreateQuoteInput {
    pub sailing_id: i64,
    pub cabin_type_id: i64,
    pub supplier_id: i64,
    pub price: String,
    pub currency: String,
    pub pricing_unit: String,
    pub guest_count: Option<u32>,
    pub cabin_quantity: Option<u32>,
    pub valid_until: Option<NaiveDate>,
    pub conditions: String,
    pub promotion: String,
    pub notes: String,
    pub source: QuoteSource,
    pub source_ref: String,
    pub import_job_id: Option<i64>,
    pub created_by: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub id: i64,
    pub sailing_id: i64,
    pub cabin_type_id: i64,
    pub supplier_id: i64,
    pub price: Decimal,
    pub currency: String,
    pub pricing_unit: PricingUnit,
    pub guest_count: Option<u32>,
    pub cabin_quantity: u32,
    pub valid_until: Option<NaiveDate>,
    pub conditions: String,
    pub promotion: String,
    pub notes: String,
    pub source: QuoteSource,
    pub source_ref: String,
    pub import_job_id: Option<i64>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
}

impl TryFrom<QuoteRow> for PriceQuote {
    type Error = QuoteError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| QuoteError::CorruptRow { id: row.id, reason };

        let price = Decimal::from_str(&row.price)
            .map_err(|e| corrupt(format!("price '{}': {}", row.price, e)))?;
        let pricing_unit = row
            .pricing_unit
            .parse::<PricingUnit>()
            .map_err(|e| corrupt(e.to_string()))?;
        let source = QuoteSource::parse(&row.source)
            .ok_or_else(|| corrupt(format!("source '{}'", row.source)))?;
        let status = QuoteStatus::parse(&row.status)
            .ok_or_else(|| corrupt(format!("status '{}'", row.status)))?;
        let created_at = db::parse_timestamp(&row.created_at)
            .ok_or_else(|| corrupt(format!("created_at '{}'", row.created_at)))?;
        let valid_until = match row.valid_until.as_deref() {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| corrupt(format!("valid_until '{}': {}", raw, e)))?,
            ),
            None => None,
        };

        Ok(PriceQuote {
            id: row.id,
            sailing_id: row.sailing_id,
            cabin_type_id: row.cabin_type_id,
            supplier_id: row.supplier_id,
            price,
            currency: row.currency,
            pricing_unit,
            guest_count: row.guest_count,
            cabin_quantity: row.cabin_quantity,
            valid_until,
            conditions: row.conditions,
            promotion: row.promotion,
            notes: row.notes,
            source,
            source_ref: row.source_ref,
            import_job_id: row.import_job_id,
            status,
            created_at,
            created_by: row.created_by,
        })
    }
}
