use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::repository::{opt_str, require_object, require_str, DeleteConstraint, Resource};
use crate::error::ApiError;
use crate::validation;

/// A stored JSON Schema document that protocols are validated against.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProtocolSchema {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, name, description, schema, created_at, updated_at";

const DELETE_CONSTRAINTS: &[DeleteConstraint] = &[DeleteConstraint {
    table: "protocols",
    column: "schema_id",
}];

#[async_trait]
impl Resource for ProtocolSchema {
    const NAME: &'static str = "protocolschema";
    const TABLE: &'static str = "protocol_schemas";

    fn create_validator() -> Option<&'static Value> {
        Some(&*validation::PROTOCOL_SCHEMA_CREATE)
    }

    fn update_validator() -> Option<&'static Value> {
        Some(&*validation::PROTOCOL_SCHEMA_UPDATE)
    }

    fn delete_constraints() -> &'static [DeleteConstraint] {
        DELETE_CONSTRAINTS
    }

    async fn list(pool: &PgPool) -> Result<Vec<Self>, ApiError> {
        let rows = sqlx::query_as::<_, Self>(&format!("SELECT {COLUMNS} FROM protocol_schemas"))
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, ApiError> {
        let row = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLUMNS} FROM protocol_schemas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    async fn insert(
        pool: &PgPool,
        id: Uuid,
        payload: &Map<String, Value>,
    ) -> Result<Self, ApiError> {
        let name = require_str(payload, "name")?;
        let description = require_str(payload, "description")?;
        let schema = require_object(payload, "schema")?;

        let row = sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO protocol_schemas (id, name, description, schema) \
             VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(schema)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    async fn update(
        pool: &PgPool,
        existing: &Self,
        payload: &Map<String, Value>,
    ) -> Result<Self, ApiError> {
        let name = opt_str(payload, "name")?.unwrap_or(&existing.name);
        let description = opt_str(payload, "description")?.unwrap_or(&existing.description);
        let schema = payload.get("schema").unwrap_or(&existing.schema);

        let row = sqlx::query_as::<_, Self>(&format!(
            "UPDATE protocol_schemas \
             SET name = $1, description = $2, schema = $3, updated_at = now() \
             WHERE id = $4 RETURNING {COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(schema)
        .bind(existing.id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "schema": self.schema,
        })
    }

    fn full(&self) -> Value {
        let mut doc = self.summary();
        doc["created_at"] = json!(self.created_at);
        doc["updated_at"] = json!(self.updated_at);
        doc
    }
}
