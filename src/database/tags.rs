//! Tag resolution: free-text tag names on a write request become rows in the
//! `tags` table, reused when the text already exists.

use serde_json::{Map, Value};
use sqlx::{Postgres, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use crate::database::models::Tag;
use crate::error::ApiError;

/// Tag texts requested by a write payload.
///
/// `None` means leave existing associations untouched: either the `tags` key
/// is absent, or it is present but empty (an explicit no-op, not a clear).
pub fn requested_tags(payload: &Map<String, Value>) -> Result<Option<Vec<String>>, ApiError> {
    match payload.get("tags") {
        None => Ok(None),
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::validation("'tags' must be an array of strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(ApiError::validation("'tags' must be an array of strings")),
    }
}

/// Dedupe by exact text, keeping first-occurrence order.
pub fn dedupe(texts: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    texts
        .iter()
        .map(String::as_str)
        .filter(|text| seen.insert(*text))
        .collect()
}

/// Resolve each unique text to an existing tag row, inserting rows for texts
/// seen for the first time. Runs inside the caller's write transaction.
pub async fn resolve(
    tx: &mut Transaction<'_, Postgres>,
    texts: &[String],
) -> Result<Vec<Tag>, ApiError> {
    let mut tags = Vec::new();
    for text in dedupe(texts) {
        let existing = sqlx::query_as::<_, Tag>("SELECT id, text FROM tags WHERE text = $1 LIMIT 1")
            .bind(text)
            .fetch_optional(&mut **tx)
            .await?;
        let tag = match existing {
            Some(tag) => tag,
            None => {
                sqlx::query_as::<_, Tag>(
                    "INSERT INTO tags (id, text) VALUES ($1, $2) RETURNING id, text",
                )
                .bind(Uuid::new_v4())
                .bind(text)
                .fetch_one(&mut **tx)
                .await?
            }
        };
        tags.push(tag);
    }
    Ok(tags)
}

/// Replace a protocol's tag associations with the resolved set.
pub async fn replace_protocol_tags(
    tx: &mut Transaction<'_, Postgres>,
    protocol_id: Uuid,
    tags: &[Tag],
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM protocol_tags WHERE protocol_id = $1")
        .bind(protocol_id)
        .execute(&mut **tx)
        .await?;
    for tag in tags {
        sqlx::query("INSERT INTO protocol_tags (tag_id, protocol_id) VALUES ($1, $2)")
            .bind(tag.id)
            .bind(protocol_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
