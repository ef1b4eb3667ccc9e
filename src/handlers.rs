use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::error::{ServiceError, StoreError};
use crate::models::*;
use crate::service::ClientService;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ServiceError::Account(_) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_operation", message)
            }
            ServiceError::Store(StoreError::NotFound(_)) => {
                json_error(StatusCode::NOT_FOUND, "not_found", message)
            }
            ServiceError::Store(StoreError::Conflict(_)) => {
                json_error(StatusCode::CONFLICT, "conflict", message)
            }
            ServiceError::Store(store_error) => {
                error!(error = %store_error, "store failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(request)| request).map_err(|rejection| {
        json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
    })
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn handler_create_personal(
    State(service): State<ClientService>,
    body: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), Response> {
    let request = parse_body(body)?;

    let client = service
        .create_personal(request.name, request.national_id, request.initial_balance)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn handler_create_corporate(
    State(service): State<ClientService>,
    body: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), Response> {
    let request = parse_body(body)?;

    let client = service
        .create_corporate(request.name, request.national_id, request.initial_balance)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn handler_list_clients(
    State(service): State<ClientService>,
) -> Result<Json<Vec<Client>>, ServiceError> {
    Ok(Json(service.list().await?))
}

pub async fn handler_get_client(
    Path(client_id): Path<Uuid>,
    State(service): State<ClientService>,
) -> Result<Json<Client>, ServiceError> {
    Ok(Json(service.get(client_id).await?))
}

pub async fn handler_delete_client(
    Path(client_id): Path<Uuid>,
    State(service): State<ClientService>,
) -> Result<Json<Client>, ServiceError> {
    Ok(Json(service.delete(client_id).await?))
}

pub async fn handler_withdraw(
    Path(client_id): Path<Uuid>,
    State(service): State<ClientService>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> Result<Json<Client>, Response> {
    let request = parse_body(body)?;

    service
        .withdraw(client_id, request.amount)
        .await
        .map(Json)
        .map_err(IntoResponse::into_response)
}

pub async fn handler_deposit(
    Path(client_id): Path<Uuid>,
    State(service): State<ClientService>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> Result<Json<Client>, Response> {
    let request = parse_body(body)?;

    service
        .deposit(client_id, request.amount)
        .await
        .map(Json)
        .map_err(IntoResponse::into_response)
}

pub async fn handler_account_statement(
    Path(client_id): Path<Uuid>,
    State(service): State<ClientService>,
) -> Result<Json<Vec<Transaction>>, ServiceError> {
    Ok(Json(service.statement(client_id).await?))
}
