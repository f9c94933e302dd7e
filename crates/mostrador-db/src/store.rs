//! # SQLite Document Store
//!
//! [`PersistenceService`] over the `documents` table.
//!
//! ## Query Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Filter::new().eq("clientId", "c1").order_by("date", Asc).limit(10)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT body FROM documents                                            │
//! │   WHERE collection = ?1                                                │
//! │     AND json_extract(body, '$.clientId') = ?2                          │
//! │   ORDER BY json_extract(body, '$.date') ASC, id ASC                    │
//! │   LIMIT 10                                                             │
//! │                                                                         │
//! │  Field names are checked against [A-Za-z0-9_] before they reach the    │
//! │  JSON path; values are always bound.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::service::{Collection, Filter, PersistenceService};

enum Bind {
    Text(String),
    Int(i64),
    Real(f64),
}

/// Maps a JSON scalar to the SQL value `json_extract` yields for it.
/// `None` means the condition is `IS NULL`.
fn to_bind(field: &str, value: &Value) -> DbResult<Option<Bind>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(Bind::Int(i64::from(*b)))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(Bind::Int(i))),
            None => n
                .as_f64()
                .map(|f| Some(Bind::Real(f)))
                .ok_or_else(|| DbError::InvalidFilter(format!("{field}: unsupported number"))),
        },
        Value::String(s) => Ok(Some(Bind::Text(s.clone()))),
        Value::Array(_) | Value::Object(_) => Err(DbError::InvalidFilter(format!(
            "{field}: only scalar values can be compared"
        ))),
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_body(row: &sqlx::sqlite::SqliteRow) -> DbResult<Value> {
    let body: String = row.try_get("body")?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl PersistenceService for Database {
    async fn insert(&self, collection: Collection, mut record: Value) -> DbResult<String> {
        let object = record
            .as_object_mut()
            .ok_or_else(|| DbError::InvalidRecord("record must be a JSON object".to_string()))?;

        let id = match object.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            None | Some(Value::Null) => {
                let id = Uuid::new_v4().to_string();
                object.insert("id".to_string(), Value::String(id.clone()));
                id
            }
            Some(_) => {
                return Err(DbError::InvalidRecord(
                    "id must be a non-empty string".to_string(),
                ))
            }
        };

        debug!(collection = %collection, id = %id, "Inserting record");

        let now = timestamp();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(record.to_string())
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate(format!("{collection}.id"), id.clone())
            }
            other => other,
        })?;

        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, mut patch: Value) -> DbResult<()> {
        let object = patch
            .as_object_mut()
            .ok_or_else(|| DbError::InvalidRecord("patch must be a JSON object".to_string()))?;
        object.remove("id");

        debug!(collection = %collection, id = %id, fields = object.len(), "Patching record");

        let result = sqlx::query(
            r#"
            UPDATE documents
               SET body = json_patch(body, ?1), updated_at = ?2
             WHERE collection = ?3 AND id = ?4
            "#,
        )
        .bind(patch.to_string())
        .bind(timestamp())
        .bind(collection.as_str())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(collection.as_str(), id));
        }
        Ok(())
    }

    async fn select(&self, collection: Collection, filter: &Filter) -> DbResult<Vec<Value>> {
        filter.validate()?;

        let mut sql = String::from("SELECT body FROM documents WHERE collection = ?");
        let mut binds = Vec::new();
        for (field, value) in filter.conditions() {
            match to_bind(field, value)? {
                Some(bind) => {
                    sql.push_str(&format!(" AND json_extract(body, '$.{field}') = ?"));
                    binds.push(bind);
                }
                None => sql.push_str(&format!(" AND json_extract(body, '$.{field}') IS NULL")),
            }
        }
        match filter.ordering() {
            Some((field, order)) => sql.push_str(&format!(
                " ORDER BY json_extract(body, '$.{field}') {}, id ASC",
                order.as_sql()
            )),
            None => sql.push_str(" ORDER BY created_at ASC, id ASC"),
        }
        if let Some(limit) = filter.max_rows() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql).bind(collection.as_str());
        for bind in binds {
            query = match bind {
                Bind::Text(s) => query.bind(s),
                Bind::Int(i) => query.bind(i),
                Bind::Real(f) => query.bind(f),
            };
        }

        let rows = query.fetch_all(self.pool()).await?;
        debug!(collection = %collection, count = rows.len(), "Selected records");
        rows.iter().map(parse_body).collect()
    }

    async fn delete(&self, collection: Collection, id: &str) -> DbResult<()> {
        debug!(collection = %collection, id = %id, "Deleting record");

        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(collection.as_str(), id));
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> DbResult<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(parse_body).transpose()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::service::SortOrder;
    use serde_json::json;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        let id = db
            .insert(Collection::Clients, json!({"id": "c1", "name": "Luna"}))
            .await
            .unwrap();
        assert_eq!(id, "c1");

        let record = db.get(Collection::Clients, "c1").await.unwrap().unwrap();
        assert_eq!(record["name"], "Luna");

        // same id in another collection is a different record
        assert!(db.get(Collection::Products, "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_generates_id() {
        let db = db().await;
        let id = db
            .insert(Collection::CalendarEvents, json!({"title": "Inventario"}))
            .await
            .unwrap();
        let record = db.get(Collection::CalendarEvents, &id).await.unwrap().unwrap();
        assert_eq!(record["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let db = db().await;
        db.insert(Collection::Sales, json!({"id": "s1"})).await.unwrap();
        let err = db
            .insert(Collection::Sales, json!({"id": "s1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_records_rejected() {
        let db = db().await;
        assert!(matches!(
            db.insert(Collection::Sales, json!([1, 2])).await,
            Err(DbError::InvalidRecord(_))
        ));
        assert!(matches!(
            db.insert(Collection::Sales, json!({"id": 7})).await,
            Err(DbError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let db = db().await;
        db.insert(
            Collection::Sales,
            json!({"id": "s1", "remainingBalance": 3000, "closureId": "z0", "items": [1]}),
        )
        .await
        .unwrap();

        db.update(
            Collection::Sales,
            "s1",
            json!({"remainingBalance": 1000, "closureId": null, "id": "hijack"}),
        )
        .await
        .unwrap();

        let record = db.get(Collection::Sales, "s1").await.unwrap().unwrap();
        assert_eq!(record["remainingBalance"], 1000);
        assert!(record.get("closureId").is_none());
        assert_eq!(record["items"], json!([1]));
        assert_eq!(record["id"], "s1");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_record() {
        let db = db().await;
        let err = db
            .update(Collection::Sales, "nope", json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        let err = db.delete(Collection::Sales, "nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_select_with_filter_order_and_limit() {
        let db = db().await;
        for (id, client, date, credit) in [
            ("s1", "c1", "2026-01-03T10:00:00Z", true),
            ("s2", "c2", "2026-01-01T10:00:00Z", true),
            ("s3", "c1", "2026-01-01T09:00:00Z", true),
            ("s4", "c1", "2026-01-02T09:00:00Z", false),
        ] {
            db.insert(
                Collection::Sales,
                json!({"id": id, "clientId": client, "date": date, "isCredit": credit}),
            )
            .await
            .unwrap();
        }

        let filter = Filter::new()
            .eq("clientId", "c1")
            .eq("isCredit", true)
            .order_by("date", SortOrder::Asc);
        let ids: Vec<String> = db
            .select(Collection::Sales, &filter)
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["s3", "s1"]);

        let newest = Filter::new().order_by("date", SortOrder::Desc).limit(1);
        let rows = db.select(Collection::Sales, &newest).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_select_null_condition() {
        let db = db().await;
        db.insert(Collection::Sales, json!({"id": "open", "closureId": null}))
            .await
            .unwrap();
        db.insert(Collection::Sales, json!({"id": "closed", "closureId": "z1"}))
            .await
            .unwrap();

        let rows = db
            .select(Collection::Sales, &Filter::new().eq("closureId", Value::Null))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "open");
    }

    #[tokio::test]
    async fn test_select_rejects_bad_field() {
        let db = db().await;
        let filter = Filter::new().eq("x') OR 1=1 --", "y");
        let err = db.select(Collection::Sales, &filter).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = db().await;
        db.insert(Collection::ProductFitment, json!({"id": "f1", "productId": "p1"}))
            .await
            .unwrap();
        db.delete(Collection::ProductFitment, "f1").await.unwrap();
        assert!(db
            .get(Collection::ProductFitment, "f1")
            .await
            .unwrap()
            .is_none());
    }
}
