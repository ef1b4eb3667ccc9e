pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod service;
pub mod store;
pub mod telemetry;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::service::ClientService;

pub fn app(service: ClientService) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/clients", get(handler_list_clients))
        .route("/api/clients/personal", post(handler_create_personal))
        .route("/api/clients/corporate", post(handler_create_corporate))
        .route(
            "/api/clients/:client_id",
            get(handler_get_client).delete(handler_delete_client),
        )
        .route("/api/clients/:client_id/withdraw", post(handler_withdraw))
        .route("/api/clients/:client_id/deposit", post(handler_deposit))
        .route(
            "/api/clients/:client_id/statement",
            get(handler_account_statement),
        )
        .with_state(service)
}
