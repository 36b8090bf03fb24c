use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::models::ProtocolSchema;
use crate::database::repository::{opt_str, opt_uuid, require_object, Resource};
use crate::database::tags;
use crate::error::ApiError;
use crate::validation;

/// A JSON protocol document, validated at write time against the stored
/// schema it references, with free-text tags attached many-to-many.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Protocol {
    pub id: Uuid,
    pub description: Option<String>,
    pub protocol: Value,
    pub schema_id: Uuid,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Tag texts are aggregated into the row so reads stay a single query.
const SELECT: &str = "SELECT p.id, p.description, p.protocol, p.schema_id, \
     COALESCE(array_agg(t.text ORDER BY t.text) FILTER (WHERE t.text IS NOT NULL), '{}') AS tags, \
     p.created_at, p.updated_at \
     FROM protocols p \
     LEFT JOIN protocol_tags pt ON pt.protocol_id = p.id \
     LEFT JOIN tags t ON t.id = pt.tag_id";

#[async_trait]
impl Resource for Protocol {
    const NAME: &'static str = "protocol";
    const TABLE: &'static str = "protocols";

    fn create_validator() -> Option<&'static Value> {
        Some(&*validation::PROTOCOL_CREATE)
    }

    fn update_validator() -> Option<&'static Value> {
        Some(&*validation::PROTOCOL_UPDATE)
    }

    async fn list(pool: &PgPool) -> Result<Vec<Self>, ApiError> {
        let rows = sqlx::query_as::<_, Self>(&format!("{SELECT} GROUP BY p.id"))
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, ApiError> {
        let row = sqlx::query_as::<_, Self>(&format!("{SELECT} WHERE p.id = $1 GROUP BY p.id"))
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
        let description = opt_str(payload, "description")?;
        let document = require_object(payload, "protocol")?;
        let schema_id = opt_uuid(payload, "schema_id")?
            .ok_or_else(|| ApiError::validation("'schema_id' is required"))?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO protocols (id, description, protocol, schema_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(description)
        .bind(document)
        .bind(schema_id)
        .execute(&mut *tx)
        .await?;

        if let Some(texts) = tags::requested_tags(payload)? {
            let resolved = tags::resolve(&mut tx, &texts).await?;
            tags::replace_protocol_tags(&mut tx, id, &resolved).await?;
        }
        tx.commit().await?;

        Self::find_404(pool, id).await
    }

    async fn update(
        pool: &PgPool,
        existing: &Self,
        payload: &Map<String, Value>,
    ) -> Result<Self, ApiError> {
        let description = match opt_str(payload, "description")? {
            Some(text) => Some(text.to_owned()),
            None => existing.description.clone(),
        };
        let document = payload.get("protocol").unwrap_or(&existing.protocol);
        let schema_id = opt_uuid(payload, "schema_id")?.unwrap_or(existing.schema_id);

        let mut tx = pool.begin().await?;
        sqlx::query(
            "UPDATE protocols \
             SET description = $1, protocol = $2, schema_id = $3, updated_at = now() \
             WHERE id = $4",
        )
        .bind(description)
        .bind(document)
        .bind(schema_id)
        .bind(existing.id)
        .execute(&mut *tx)
        .await?;

        if let Some(texts) = tags::requested_tags(payload)? {
            let resolved = tags::resolve(&mut tx, &texts).await?;
            tags::replace_protocol_tags(&mut tx, existing.id, &resolved).await?;
        }
        tx.commit().await?;

        Self::find_404(pool, existing.id).await
    }

    /// Cross-schema validation: the effective protocol document must satisfy
    /// the JSON Schema stored under the effective `schema_id`. A reference to
    /// a schema that does not exist is an explicit validation failure.
    async fn validate_write(
        pool: &PgPool,
        payload: &Map<String, Value>,
        existing: Option<&Self>,
    ) -> Result<(), ApiError> {
        let schema_id = opt_uuid(payload, "schema_id")?
            .or(existing.map(|e| e.schema_id))
            .ok_or_else(|| ApiError::validation("'schema_id' is required"))?;

        let stored = ProtocolSchema::find(pool, schema_id)
            .await?
            .ok_or_else(|| ApiError::validation(format!("unknown schema reference: {schema_id}")))?;

        let document = payload
            .get("protocol")
            .or(existing.map(|e| &e.protocol))
            .ok_or_else(|| ApiError::validation("'protocol' is required"))?;

        validation::validate(document, &stored.schema)
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "description": self.description,
            "protocol": self.protocol,
            "schema_id": self.schema_id,
            "tags": self.tags,
        })
    }

    fn full(&self) -> Value {
        let mut doc = self.summary();
        doc["created_at"] = json!(self.created_at);
        doc["updated_at"] = json!(self.updated_at);
        doc
    }
}
