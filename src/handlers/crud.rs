//! Generic CRUD handlers, instantiated per resource type.
//!
//! Every resource gets the same route set: list, create, get, update,
//! delete, full projections, and its create contract under `/validator`.
//! Reads are public; writes require a moderator or admin token.

use axum::{
    extract::Path,
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth;
use crate::database::manager::DatabaseManager;
use crate::database::repository::{opt_uuid, referenced_elsewhere, Resource};
use crate::error::ApiError;
use crate::validation;

pub fn resource_routes<R: Resource + 'static>() -> Router {
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route("/:id", get(get_one::<R>).put(update::<R>).delete(remove::<R>))
        .route("/full", get(list_full::<R>))
        .route("/full/", get(list_full::<R>))
        .route("/full/:id", get(get_full::<R>))
        .route("/validator", get(validator::<R>))
}

/// Reject non-object bodies and drop the `token` auth fallback field so it
/// never reaches contract validation or field assignment.
fn write_payload(payload: Value) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Value::Object(mut map) => {
            map.remove("token");
            Ok(map)
        }
        _ => Err(ApiError::validation("request body must be a JSON object")),
    }
}

async fn list<R: Resource>() -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = R::list(pool).await?;
    Ok(Json(Value::Array(rows.iter().map(R::summary).collect())))
}

async fn list_full<R: Resource>() -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let rows = R::list(pool).await?;
    Ok(Json(Value::Array(rows.iter().map(R::full).collect())))
}

async fn get_one<R: Resource>(Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let row = R::find_404(pool, id).await?;
    Ok(Json(row.summary()))
}

async fn get_full<R: Resource>(Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let row = R::find_404(pool, id).await?;
    Ok(Json(row.full()))
}

async fn create<R: Resource>(
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    auth::authorize(&headers, Some(&payload), auth::MUTATE_ROLES)?;

    let payload = write_payload(payload)?;
    if let Some(contract) = R::create_validator() {
        validation::validate(&Value::Object(payload.clone()), contract)?;
    }

    let pool = DatabaseManager::pool().await?;
    let id = match opt_uuid(&payload, "id")? {
        Some(id) => {
            if R::find(pool, id).await?.is_some() {
                return Err(ApiError::conflict(format!("uuid {id} already taken")));
            }
            id
        }
        None => Uuid::new_v4(),
    };

    R::validate_write(pool, &payload, None).await?;
    let created = R::insert(pool, id, &payload).await?;
    Ok(Json(created.summary()))
}

async fn update<R: Resource>(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    auth::authorize(&headers, Some(&payload), auth::MUTATE_ROLES)?;

    let payload = write_payload(payload)?;
    if let Some(contract) = R::update_validator() {
        validation::validate(&Value::Object(payload.clone()), contract)?;
    }

    let pool = DatabaseManager::pool().await?;
    let existing = R::find_404(pool, id).await?;
    R::validate_write(pool, &payload, Some(&existing)).await?;
    let updated = R::update(pool, &existing, &payload).await?;
    Ok(Json(updated.summary()))
}

async fn remove<R: Resource>(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map(|Json(value)| value);
    auth::authorize(&headers, body.as_ref(), auth::MUTATE_ROLES)?;

    let pool = DatabaseManager::pool().await?;
    R::find_404(pool, id).await?;

    if referenced_elsewhere(pool, R::delete_constraints(), id).await? {
        return Err(ApiError::conflict(format!(
            "{} {} is referenced elsewhere",
            R::NAME,
            id
        )));
    }

    R::delete(pool, id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn validator<R: Resource>() -> Result<Json<Value>, ApiError> {
    match R::create_validator() {
        Some(contract) => Ok(Json(contract.clone())),
        None => Err(ApiError::not_found(format!("no validator for {}", R::NAME))),
    }
}
