use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

/// A table/column pair that must not reference a record's id for the delete
/// to be allowed.
pub struct DeleteConstraint {
    pub table: &'static str,
    pub column: &'static str,
}

/// An entity exposed through the generic CRUD route set.
///
/// Implementations own their SQL; payloads reaching `insert` and `update`
/// have already passed the static contract, so the allow-listed fields are
/// the only ones present and their JSON types are right.
#[async_trait]
pub trait Resource: Sized + Send + Sync {
    /// Human-readable name used in messages and route documentation.
    const NAME: &'static str;
    const TABLE: &'static str;

    fn create_validator() -> Option<&'static Value>;
    fn update_validator() -> Option<&'static Value>;

    fn delete_constraints() -> &'static [DeleteConstraint] {
        &[]
    }

    async fn list(pool: &PgPool) -> Result<Vec<Self>, ApiError>;
    async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, ApiError>;
    async fn insert(pool: &PgPool, id: Uuid, payload: &Map<String, Value>)
        -> Result<Self, ApiError>;
    async fn update(
        pool: &PgPool,
        existing: &Self,
        payload: &Map<String, Value>,
    ) -> Result<Self, ApiError>;

    /// Association rows hanging off the record are removed by the schema's
    /// ON DELETE CASCADE rules, not here.
    async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ApiError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", Self::TABLE))
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Write-time validation that needs database context, e.g. checking the
    /// document against a stored schema. `existing` is set on update.
    async fn validate_write(
        _pool: &PgPool,
        _payload: &Map<String, Value>,
        _existing: Option<&Self>,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn find_404(pool: &PgPool, id: Uuid) -> Result<Self, ApiError> {
        Self::find(pool, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} {} not found", Self::NAME, id)))
    }

    fn summary(&self) -> Value;
    fn full(&self) -> Value;
}

/// True when any configured constraint table still references the id.
pub async fn referenced_elsewhere(
    pool: &PgPool,
    constraints: &[DeleteConstraint],
    id: Uuid,
) -> Result<bool, ApiError> {
    for constraint in constraints {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            constraint.table, constraint.column
        );
        let (exists,): (bool,) = sqlx::query_as(&sql).bind(id).fetch_one(pool).await?;
        if exists {
            return Ok(true);
        }
    }
    Ok(false)
}

// Field accessors for payloads that already passed a static contract.
// Type mismatches still surface as validation errors, never panics.

pub fn opt_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, ApiError> {
    match payload.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("'{key}' must be a string"))),
    }
}

pub fn require_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Result<&'a str, ApiError> {
    opt_str(payload, key)?.ok_or_else(|| ApiError::validation(format!("'{key}' is required")))
}

pub fn opt_uuid(payload: &Map<String, Value>, key: &str) -> Result<Option<Uuid>, ApiError> {
    match opt_str(payload, key)? {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| ApiError::validation(format!("'{key}' is not a valid uuid"))),
    }
}

pub fn require_object<'a>(
    payload: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Value, ApiError> {
    match payload.get(key) {
        Some(value) if value.is_object() => Ok(value),
        Some(_) => Err(ApiError::validation(format!("'{key}' must be an object"))),
        None => Err(ApiError::validation(format!("'{key}' is required"))),
    }
}
