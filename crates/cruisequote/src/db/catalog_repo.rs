//! Catalog repository: reads for the matcher and quote writer, plus
//! plain inserts used to seed a local catalog.

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::catalog::{CabinType, Page, Sailing, Ship, ShipFilter, Supplier};

fn ship_from_row(row: &Row<'_>) -> Result<Ship, rusqlite::Error> {
    Ok(Ship {
        id: row.get("id")?,
        cruise_line_id: row.get("cruise_line_id")?,
        name: row.get("name")?,
        status: row.get("status")?,
    })
}

fn sailing_from_row(row: &Row<'_>) -> Result<Sailing, rusqlite::Error> {
    let raw_date: String = row.get("departure_date")?;
    let departure_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
    })?;

    Ok(Sailing {
        id: row.get("id")?,
        ship_id: row.get("ship_id")?,
        sailing_code: row.get("sailing_code")?,
        departure_date,
        nights: row.get("nights")?,
        route: row.get("route")?,
    })
}

fn cabin_type_from_row(row: &Row<'_>) -> Result<CabinType, rusqlite::Error> {
    Ok(CabinType {
        id: row.get("id")?,
        ship_id: row.get("ship_id")?,
        name: row.get("name")?,
        category: row.get("category")?,
    })
}

pub fn find_sailing_by_id(db: &Database, id: i64) -> Result<Option<Sailing>, DatabaseError> {
    db.with_conn(|conn| {
        let sailing = conn
            .query_row(
                "SELECT * FROM sailings WHERE id = ?1",
                params![id],
                sailing_from_row,
            )
            .optional()?;
        Ok(sailing)
    })
}

pub fn find_sailing_by_code(db: &Database, code: &str) -> Result<Option<Sailing>, DatabaseError> {
    db.with_conn(|conn| {
        let sailing = conn
            .query_row(
                "SELECT * FROM sailings WHERE sailing_code = ?1",
                params![code],
                sailing_from_row,
            )
            .optional()?;
        Ok(sailing)
    })
}

/// Sailings of a ship ordered by departure date.
pub fn list_sailings_by_ship(db: &Database, ship_id: i64) -> Result<Vec<Sailing>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM sailings WHERE ship_id = ?1 ORDER BY departure_date ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![ship_id], sailing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn find_ship_by_id(db: &Database, id: i64) -> Result<Option<Ship>, DatabaseError> {
    db.with_conn(|conn| {
        let ship = conn
            .query_row("SELECT * FROM ships WHERE id = ?1", params![id], ship_from_row)
            .optional()?;
        Ok(ship)
    })
}

/// Lists ships ordered by id, optionally filtered by line and status.
pub fn list_ships(
    db: &Database,
    page: Page,
    filter: &ShipFilter,
) -> Result<Vec<Ship>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(line_id) = filter.cruise_line_id {
            conditions.push(format!("cruise_line_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(line_id));
        }
        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        param_values.push(Box::new(i64::from(page.size)));
        param_values.push(Box::new(page.offset() as i64));
        let sql = format!(
            "SELECT * FROM ships {} ORDER BY id ASC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), ship_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Enabled cabin types of a ship with their category name joined in.
pub fn list_enabled_cabin_types(
    db: &Database,
    ship_id: i64,
) -> Result<Vec<CabinType>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT ct.id, ct.ship_id, ct.name, cc.name AS category
             FROM cabin_types ct
             LEFT JOIN cabin_categories cc ON cc.id = ct.category_id
             WHERE ct.ship_id = ?1 AND ct.enabled = 1
             ORDER BY ct.id ASC",
        )?;
        let rows = stmt
            .query_map(params![ship_id], cabin_type_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn find_cabin_type_by_id(db: &Database, id: i64) -> Result<Option<CabinType>, DatabaseError> {
    db.with_conn(|conn| {
        let cabin = conn
            .query_row(
                "SELECT ct.id, ct.ship_id, ct.name, cc.name AS category
                 FROM cabin_types ct
                 LEFT JOIN cabin_categories cc ON cc.id = ct.category_id
                 WHERE ct.id = ?1",
                params![id],
                cabin_type_from_row,
            )
            .optional()?;
        Ok(cabin)
    })
}

pub fn find_supplier_by_id(db: &Database, id: i64) -> Result<Option<Supplier>, DatabaseError> {
    db.with_conn(|conn| {
        let supplier = conn
            .query_row(
                "SELECT id, name FROM suppliers WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Supplier {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(supplier)
    })
}

pub fn insert_cruise_line(db: &Database, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("INSERT INTO cruise_lines (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn insert_ship(
    db: &Database,
    cruise_line_id: Option<i64>,
    name: &str,
    status: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO ships (cruise_line_id, name, status) VALUES (?1, ?2, ?3)",
            params![cruise_line_id, name, status],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn insert_sailing(
    db: &Database,
    ship_id: i64,
    sailing_code: &str,
    departure_date: NaiveDate,
    nights: u32,
    route: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO sailings (ship_id, sailing_code, departure_date, nights, route)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ship_id,
                sailing_code,
                departure_date.format("%Y-%m-%d").to_string(),
                nights,
                route
            ],
        )
        .map_err(DatabaseError::from_insert)?;
        Ok(conn.last_insert_rowid())
    })
}

/// Returns the id of the named category, creating it if needed.
pub fn ensure_cabin_category(db: &Database, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO cabin_categories (name) VALUES (?1)",
            params![name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM cabin_categories WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(id)
    })
}

pub fn insert_cabin_type(
    db: &Database,
    ship_id: i64,
    category_id: Option<i64>,
    name: &str,
    enabled: bool,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO cabin_types (ship_id, category_id, name, enabled) VALUES (?1, ?2, ?3, ?4)",
            params![ship_id, category_id, name, enabled],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn insert_supplier(db: &Database, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("INSERT INTO suppliers (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    })
}
