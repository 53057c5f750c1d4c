//! Audit repository: inserts into `audit_log`.

use rusqlite::params;

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub id: i64,
    pub user_id: i64,
    pub supplier_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub payload: String,
    pub created_at: String,
}

/// Inserts an audit row. `row.id` is ignored.
pub fn insert(db: &Database, row: &AuditRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO audit_log (user_id, supplier_id, action, entity_type, entity_id,
             payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.user_id,
                row.supplier_id,
                row.action,
                row.entity_type,
                row.entity_id,
                row.payload,
                row.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Audit rows for one entity, oldest first.
pub fn list_for_entity(
    db: &Database,
    entity_type: &str,
    entity_id: i64,
) -> Result<Vec<AuditRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, supplier_id, action, entity_type, entity_id, payload, created_at
             FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![entity_type, entity_id], |row| {
                Ok(AuditRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    supplier_id: row.get(2)?,
                    action: row.get(3)?,
                    entity_type: row.get(4)?,
                    entity_id: row.get(5)?,
                    payload: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();
        let row = AuditRow {
            id: 0,
            user_id: 42,
            supplier_id: Some(3),
            action: "create".to_string(),
            entity_type: "price_quote".to_string(),
            entity_id: 9,
            payload: r#"{"price":"4200.00"}"#.to_string(),
            created_at: "2026-01-01T00:00:00.000000Z".to_string(),
        };
        let id = insert(&db, &row).unwrap();

        let rows = list_for_entity(&db, "price_quote", 9).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].supplier_id, Some(3));
        assert!(list_for_entity(&db, "price_quote", 10).unwrap().is_empty());
    }
}
