//! Defines the endpoint for reading one account's transaction history.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error,
    account::{AccountId, get_account},
    auth::UserID,
    error::error_response,
    transaction::{DEFAULT_HISTORY_COUNT, get_transactions_for_account},
};

/// The most history records a single request may ask for.
const MAX_HISTORY_COUNT: u32 = 100;

/// The state needed to read transaction history.
#[derive(Debug, Clone)]
pub struct HistoryState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for HistoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// How many records to return, [DEFAULT_HISTORY_COUNT] if not given.
    pub count: Option<u32>,
}

/// A route handler that lists the newest transactions of an account owned by the caller.
pub async fn get_account_transactions_endpoint(
    State(state): State<HistoryState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let account = match get_account(account_id, &connection) {
        Ok(account) => account,
        Err(Error::NotFound) => {
            return error_response(StatusCode::NOT_FOUND, "Account not found.");
        }
        Err(error) => return error.into_response(),
    };

    if account.owner_id != Some(user_id) {
        return error_response(StatusCode::FORBIDDEN, "You do not own that account.");
    }

    let count = query
        .count
        .unwrap_or(DEFAULT_HISTORY_COUNT)
        .min(MAX_HISTORY_COUNT);

    match get_transactions_for_account(account_id, count, &connection) {
        Ok(transactions) => Json(json!({ "transactions": transactions })).into_response(),
        Err(error) => error.into_response(),
    }
}
