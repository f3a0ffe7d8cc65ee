//! The HTTP trigger for the interest accrual job.

use std::{
    num::ParseIntError,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::{AppState, Error, account::AccountId, interest::accrue_interest};

/// The state needed to run the interest job from an HTTP request.
#[derive(Debug, Clone)]
pub struct CronState {
    /// The bearer token a scheduler must present.
    pub cron_secret: String,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CronState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cron_secret: state.cron_secret.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query string for the interest trigger.
#[derive(Debug, Default, Deserialize)]
pub struct InterestQuery {
    /// A comma separated list of account ids, e.g. `1001,1002`.
    pub account_ids: Option<String>,
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn is_authorized(headers: &HeaderMap, cron_secret: &str) -> bool {
    if cron_secret.is_empty() {
        return false;
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| digests_match(token, cron_secret))
}

/// Compare the SHA-256 digests of `a` and `b` without stopping at the first
/// differing byte.
fn digests_match(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());

    a.iter()
        .zip(b.iter())
        .fold(0u8, |difference, (x, y)| difference | (x ^ y))
        == 0
}

/// Parse `1001, 1002` into a list of ids. An empty list means every account.
fn parse_account_ids(raw: Option<&str>) -> Result<Option<Vec<AccountId>>, ParseIntError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::parse::<AccountId>)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// A route handler that pays interest to every due account.
///
/// Requires `Authorization: Bearer <CRON_SECRET>`. The optional `account_ids`
/// query parameter limits the run to the listed accounts.
pub async fn apply_interest_endpoint(
    State(state): State<CronState>,
    headers: HeaderMap,
    Query(query): Query<InterestQuery>,
) -> Response {
    if !is_authorized(&headers, &state.cron_secret) {
        tracing::warn!("Rejected interest trigger with missing or incorrect bearer token");
        return message_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let account_ids = match parse_account_ids(query.account_ids.as_deref()) {
        Ok(account_ids) => account_ids,
        Err(error) => {
            tracing::debug!("Could not parse account_ids {:?}: {error}", query.account_ids);
            return message_response(
                StatusCode::BAD_REQUEST,
                "account_ids must be a comma separated list of account ids",
            );
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match accrue_interest(account_ids.as_deref(), OffsetDateTime::now_utc(), &connection) {
        Ok(summary) => Json(json!({
            "message": "Applied interest to accounts",
            "credited": summary.credited,
            "skipped": summary.skipped,
            "failed": summary.failed,
        }))
        .into_response(),
        Err(error) => {
            tracing::error!("Interest run could not start: {error}");
            message_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to apply interest to accounts",
            )
        }
    }
}
