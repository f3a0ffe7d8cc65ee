//! Defines the endpoint that shows an account's ledger next to its cached balance.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error,
    account::{AccountId, get_account},
    auth::UserID,
    error::error_response,
    ledger::{get_ledger_entries, ledger_balance},
};

/// The state needed to read an account's ledger.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that lists every ledger row of an account owned by the caller.
///
/// Responds with the rows oldest first, the cached `balance` and the
/// `ledger_balance` the rows sum to. The two balances only differ if the
/// account row was changed outside the transfer engine.
pub async fn get_account_ledger_endpoint(
    State(state): State<LedgerState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<AccountId>,
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

    let entries = match get_ledger_entries(account_id, &connection) {
        Ok(entries) => entries,
        Err(error) => return error.into_response(),
    };

    match ledger_balance(account_id, &connection) {
        Ok(ledger_balance) => {
            if ledger_balance != account.balance {
                tracing::warn!(
                    "Account {account_id} has a cached balance of {} but its ledger sums to {ledger_balance}",
                    account.balance
                );
            }

            Json(json!({
                "entries": entries,
                "balance": account.balance,
                "ledger_balance": ledger_balance,
            }))
            .into_response()
        }
        Err(error) => error.into_response(),
    }
}
