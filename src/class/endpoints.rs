//! Route handlers for creating and joining classes.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::UserID,
    class::{Membership, create_class, join_class},
    error::error_response,
};

/// The state needed to create or join a class.
#[derive(Debug, Clone)]
pub struct ClassState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ClassState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The body of a request to create a class.
#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    /// The name of the new class.
    pub name: String,
}

/// The body of a request to join a class.
#[derive(Debug, Deserialize)]
pub struct JoinClassRequest {
    /// The code the class admin shared, in any case.
    pub class_code: String,
}

fn membership_response(membership: &Membership) -> Response {
    Json(json!({
        "class_code": membership.class.class_code,
        "account_id": membership.enrollment.checking_account_id,
    }))
    .into_response()
}

/// A route handler for creating a class, responds with `{"class_code": ...}`.
pub async fn create_class_endpoint(
    State(state): State<ClassState>,
    Extension(user_id): Extension<UserID>,
    request: Result<Json<CreateClassRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_class(user_id, &request.name, OffsetDateTime::now_utc(), &connection) {
        Ok(membership) => membership_response(&membership),
        Err(error) => error.into_response(),
    }
}

/// A route handler for joining a class, responds with `{"class_code": ...}`.
pub async fn join_class_endpoint(
    State(state): State<ClassState>,
    Extension(user_id): Extension<UserID>,
    request: Result<Json<JoinClassRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match join_class(
        user_id,
        &request.class_code,
        OffsetDateTime::now_utc(),
        &connection,
    ) {
        Ok(membership) => membership_response(&membership),
        Err(error) => {
            tracing::debug!("User {user_id} could not join {}: {error}", request.class_code);
            error.into_response()
        }
    }
}
