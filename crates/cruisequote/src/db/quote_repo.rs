//! Quote repository: append-only access to `price_quotes`.
//!
//! There is no general update function: rows are inserted once and the
//! only mutation is the conditional `active → voided` status change. A
//! trigger on the table rejects anything else.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct QuoteRow {
    pub id: i64,
    pub sailing_id: i64,
    pub cabin_type_id: i64,
    pub supplier_id: i64,
    pub price: String,
    pub currency: String,
    pub pricing_unit: String,
    pub guest_count: Option<u32>,
    pub cabin_quantity: u32,
    pub valid_until: Option<String>,
    pub conditions: String,
    pub promotion: String,
    pub notes: String,
    pub source: String,
    pub source_ref: String,
    pub import_job_id: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub created_by: i64,
}

impl QuoteRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            sailing_id: row.get("sailing_id")?,
            cabin_type_id: row.get("cabin_type_id")?,
            supplier_id: row.get("supplier_id")?,
            price: row.get("price")?,
            currency: row.get("currency")?,
            pricing_unit: row.get("pricing_unit")?,
            guest_count: row.get("guest_count")?,
            cabin_quantity: row.get("cabin_quantity")?,
            valid_until: row.get("valid_until")?,
            conditions: row.get("conditions")?,
            promotion: row.get("promotion")?,
            notes: row.get("notes")?,
            source: row.get("source")?,
            source_ref: row.get("source_ref")?,
            import_job_id: row.get("import_job_id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            created_by: row.get("created_by")?,
        })
    }
}

/// Inserts a quote row with `status = 'active'` and returns its id.
/// `row.id` and `row.status` are ignored.
pub fn insert(db: &Database, row: &QuoteRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO price_quotes (sailing_id, cabin_type_id, supplier_id, price, currency,
             pricing_unit, guest_count, cabin_quantity, valid_until, conditions, promotion,
             notes, source, source_ref, import_job_id, status, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     'active', ?16, ?17)",
            params![
                row.sailing_id,
                row.cabin_type_id,
                row.supplier_id,
                row.price,
                row.currency,
                row.pricing_unit,
                row.guest_count,
                row.cabin_quantity,
                row.valid_until,
                row.conditions,
                row.promotion,
                row.notes,
                row.source,
                row.source_ref,
                row.import_job_id,
                row.created_at,
                row.created_by,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<QuoteRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM price_quotes WHERE id = ?1",
                params![id],
                QuoteRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Quotes created by one import job, in insertion order.
pub fn list_by_job(db: &Database, import_job_id: i64) -> Result<Vec<QuoteRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM price_quotes WHERE import_job_id = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![import_job_id], QuoteRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// `active → voided`. Returns the number of rows changed (0 or 1).
pub fn void_if_active(db: &Database, id: i64) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE price_quotes SET status = 'voided' WHERE id = ?1 AND status = 'active'",
            params![id],
        )?;
        Ok(changed)
    })
}
