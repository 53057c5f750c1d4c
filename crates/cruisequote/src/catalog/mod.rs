//! Read-side view of the cruise catalog.
//!
//! The catalog (lines, ships, sailings, cabin types, suppliers) is owned
//! elsewhere; the import pipeline only reads it through `CatalogReader`.

use chrono::NaiveDate;

use crate::db::{catalog_repo, Database, DatabaseError};

/// Ship status value that the matcher considers.
pub const SHIP_STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ship {
    pub id: i64,
    pub cruise_line_id: Option<i64>,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sailing {
    pub id: i64,
    pub ship_id: i64,
    pub sailing_code: String,
    pub departure_date: NaiveDate,
    pub nights: u32,
    pub route: String,
}

/// An enabled cabin type with its category name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinType {
    pub id: i64,
    pub ship_id: i64,
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn first(size: u32) -> Self {
        Self { number: 1, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShipFilter {
    pub cruise_line_id: Option<i64>,
    pub status: Option<String>,
}

pub trait CatalogReader: Send + Sync {
    fn get_sailing_by_id(&self, id: i64) -> Result<Option<Sailing>, DatabaseError>;
    fn get_sailing_by_code(&self, code: &str) -> Result<Option<Sailing>, DatabaseError>;
    fn list_sailings_by_ship(&self, ship_id: i64) -> Result<Vec<Sailing>, DatabaseError>;
    fn list_ships(&self, page: Page, filter: &ShipFilter) -> Result<Vec<Ship>, DatabaseError>;
    fn get_ship_by_id(&self, id: i64) -> Result<Option<Ship>, DatabaseError>;
    /// Enabled cabin types only.
    fn list_cabin_types_by_ship(&self, ship_id: i64) -> Result<Vec<CabinType>, DatabaseError>;
    fn get_cabin_type_by_id(&self, id: i64) -> Result<Option<CabinType>, DatabaseError>;
    fn get_supplier_by_id(&self, id: i64) -> Result<Option<Supplier>, DatabaseError>;
}

/// `CatalogReader` backed by the catalog tables of the local database.
#[derive(Clone)]
pub struct SqliteCatalog {
    db: Database,
}

impl SqliteCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl CatalogReader for SqliteCatalog {
    fn get_sailing_by_id(&self, id: i64) -> Result<Option<Sailing>, DatabaseError> {
        catalog_repo::find_sailing_by_id(&self.db, id)
    }

    fn get_sailing_by_code(&self, code: &str) -> Result<Option<Sailing>, DatabaseError> {
        catalog_repo::find_sailing_by_code(&self.db, code)
    }

    fn list_sailings_by_ship(&self, ship_id: i64) -> Result<Vec<Sailing>, DatabaseError> {
        catalog_repo::list_sailings_by_ship(&self.db, ship_id)
    }

    fn list_ships(&self, page: Page, filter: &ShipFilter) -> Result<Vec<Ship>, DatabaseError> {
        catalog_repo::list_ships(&self.db, page, filter)
    }

    fn get_ship_by_id(&self, id: i64) -> Result<Option<Ship>, DatabaseError> {
        catalog_repo::find_ship_by_id(&self.db, id)
    }

    fn list_cabin_types_by_ship(&self, ship_id: i64) -> Result<Vec<CabinType>, DatabaseError> {
        catalog_repo::list_enabled_cabin_types(&self.db, ship_id)
    }

    fn get_cabin_type_by_id(&self, id: i64) -> Result<Option<CabinType>, DatabaseError> {
        catalog_repo::find_cabin_type_by_id(&self.db, id)
    }

    fn get_supplier_by_id(&self, id: i64) -> Result<Option<Supplier>, DatabaseError> {
        catalog_repo::find_supplier_by_id(&self.db, id)
    }
}
