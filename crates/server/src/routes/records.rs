//! Handlers for the two collections of one schema.
//!
//! Every handler is generic over the schema, so the fleet and catalog
//! routers are the same code mounted under different paths.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use models::{Associated, Deletion, Record, RecordId, Schema};
use serde_json::{Map, Value};
use service::{file::SchemaView, RecordStore, ServiceError};

use crate::errors::JsonApiError;

type Store<S> = Arc<RecordStore<S>>;
type ApiResult<T> = Result<T, JsonApiError>;

fn primary_kind<S: Schema>() -> &'static str {
    <S::Primary as Record>::KIND
}

fn secondary_kind<S: Schema>() -> &'static str {
    <S::Secondary as Record>::KIND
}

/// Routes for one schema:
/// - `/{primary}` list, create
/// - `/{primary}/:id` get, delete
/// - `/{secondary}` list, create
/// - `/{secondary}/:id` merged view, delete
/// - `/{secondary}/:id/{primary kind}` merged view, associate, clear
pub fn schema_router<S: Schema>(store: Store<S>) -> Router {
    let primary = format!("/{}", S::PRIMARY_PATH);
    let primary_item = format!("/{}/:id", S::PRIMARY_PATH);
    let secondary = format!("/{}", S::SECONDARY_PATH);
    let secondary_item = format!("/{}/:id", S::SECONDARY_PATH);
    let association = format!("/{}/:id/{}", S::SECONDARY_PATH, primary_kind::<S>());

    Router::new()
        .route(&primary, get(list_primary::<S>).post(create_primary::<S>))
        .route(&primary_item, get(get_primary::<S>).delete(delete_primary::<S>))
        .route(&secondary, get(list_secondary::<S>).post(create_secondary::<S>))
        .route(&secondary_item, get(get_secondary::<S>).delete(delete_secondary::<S>))
        .route(
            &association,
            get(get_secondary::<S>).put(associate::<S>).delete(clear_association::<S>),
        )
        .with_state(store)
}

/// A path id that does not parse cannot name an existing record.
fn parse_id(kind: &'static str, raw: &str) -> Result<RecordId, ServiceError> {
    raw.parse().map_err(|_| ServiceError::not_found(kind, raw))
}

fn into_object(body: Value) -> Result<Map<String, Value>, ServiceError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(ServiceError::Validation(format!("expected a JSON object, got {other}"))),
    }
}

/// Remove an optional reference field from a request body. Absent, null and
/// blank values mean "no reference"; a value that is not an id cannot
/// resolve and is reported as a missing reference.
fn take_ref(
    fields: &mut Map<String, Value>,
    field: &str,
    kind: &'static str,
) -> Result<Option<RecordId>, ServiceError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => match raw.parse() {
            Ok(id) => Ok(Some(id)),
            Err(_) => Err(ServiceError::reference_not_found(kind, raw)),
        },
        Some(other) => Err(ServiceError::Validation(format!("{field} must be a string id, got {other}"))),
    }
}

fn parse_draft<D: models::Draft>(fields: Map<String, Value>) -> Result<D, ServiceError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| ServiceError::Validation(e.to_string()))
}

async fn list_primary<S: Schema>(State(store): State<Store<S>>) -> ApiResult<Json<Vec<S::Primary>>> {
    Ok(Json(store.list_primary().await?))
}

async fn create_primary<S: Schema>(
    State(store): State<Store<S>>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<S::Primary>)> {
    let mut fields = into_object(body)?;
    let assign = take_ref(&mut fields, S::ASSIGN_FIELD, secondary_kind::<S>())?;
    let draft: S::NewPrimary = parse_draft(fields)?;
    let created = store.create_primary(draft, assign).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_primary<S: Schema>(
    State(store): State<Store<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<S::Primary>> {
    let id = parse_id(primary_kind::<S>(), &id)?;
    Ok(Json(store.get_primary(id).await?))
}

async fn delete_primary<S: Schema>(
    State(store): State<Store<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deletion>> {
    let id = parse_id(primary_kind::<S>(), &id)?;
    Ok(Json(store.delete_primary(id).await?))
}

async fn list_secondary<S: Schema>(State(store): State<Store<S>>) -> ApiResult<Json<Vec<S::Secondary>>> {
    Ok(Json(store.list_secondary().await?))
}

async fn create_secondary<S: Schema>(
    State(store): State<Store<S>>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<S::Secondary>)> {
    let mut fields = into_object(body)?;
    let primary_ref = take_ref(&mut fields, <S::Secondary as Associated>::REF_FIELD, primary_kind::<S>())?;
    let draft: S::NewSecondary = parse_draft(fields)?;
    let created = store.create_secondary(draft, primary_ref).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_secondary<S: Schema>(
    State(store): State<Store<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SchemaView<S>>> {
    let id = parse_id(secondary_kind::<S>(), &id)?;
    Ok(Json(store.get_secondary_with_association(id).await?))
}

async fn delete_secondary<S: Schema>(
    State(store): State<Store<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deletion>> {
    let id = parse_id(secondary_kind::<S>(), &id)?;
    Ok(Json(store.delete_secondary(id).await?))
}

async fn associate<S: Schema>(
    State(store): State<Store<S>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SchemaView<S>>> {
    let secondary_id = parse_id(secondary_kind::<S>(), &id)?;
    let field = <S::Secondary as Associated>::REF_FIELD;
    let mut fields = into_object(body)?;
    let primary_id = take_ref(&mut fields, field, primary_kind::<S>())?
        .ok_or_else(|| ServiceError::Validation(format!("{field} is required")))?;
    Ok(Json(store.associate(secondary_id, primary_id).await?))
}

async fn clear_association<S: Schema>(
    State(store): State<Store<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SchemaView<S>>> {
    let id = parse_id(secondary_kind::<S>(), &id)?;
    Ok(Json(store.clear_association(id).await?))
}
