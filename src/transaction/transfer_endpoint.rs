//! Defines the endpoint for sending money from one of the caller's accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::UserID,
    error::error_response,
    transaction::{TransferRequest, transfer},
};

/// The state needed to execute a transfer.
#[derive(Debug, Clone)]
pub struct TransferState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransferState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for transfers, responds with `{"transaction": ...}` on success.
pub async fn create_transfer_endpoint(
    State(state): State<TransferState>,
    Extension(user_id): Extension<UserID>,
    request: Result<Json<TransferRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            tracing::debug!("Rejected transfer request body: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match transfer(user_id, &request, OffsetDateTime::now_utc(), &connection) {
        Ok(record) => Json(json!({ "transaction": record })).into_response(),
        Err(error) => {
            tracing::debug!("User {user_id} transfer {request:?} rejected: {error}");
            error.into_response()
        }
    }
}
