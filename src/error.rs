//! Defines the app level error type and its conversion to JSON error responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::account::AccountId;

/// The message shown to clients when something failed on our side.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong, please try again.";

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid combination of email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth token cookie is missing from the cookie jar in the request.
    #[error("no auth cookie in the cookie jar")]
    CookieMissing,

    /// The auth token has expired or could not be decoded.
    #[error("the auth token is invalid or has expired")]
    InvalidToken,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address is already registered to another user.
    #[error("the email \"{0}\" is already registered")]
    DuplicateEmail(String),

    /// A value could not be represented as Ken Kash, e.g. it has fractions of a cent.
    #[error("invalid amount of money: {0}")]
    InvalidMoney(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The ledger rows for a transfer could not be written.
    #[error("could not write the ledger entries for account {0}")]
    LedgerWriteFailure(AccountId),

    /// An account balance could not be updated as part of a transfer.
    #[error("could not update the balance of account {0}")]
    BalanceUpdateFailure(AccountId),

    /// An error occurred while serializing a struct as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// A request or response body could not be read.
    #[error("could not read body: {0}")]
    BodyReadError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// Build a JSON response of the form `{"error": message}`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidCredentials => {
                error_response(StatusCode::UNAUTHORIZED, "Incorrect email or password.")
            }
            Error::CookieMissing | Error::InvalidToken => error_response(
                StatusCode::UNAUTHORIZED,
                "You must be logged in to do that.",
            ),
            Error::NotFound => error_response(
                StatusCode::NOT_FOUND,
                "The requested resource could not be found.",
            ),
            Error::InvalidMoney(reason) => error_response(StatusCode::BAD_REQUEST, &reason),
            Error::TooWeak(feedback) => error_response(
                StatusCode::BAD_REQUEST,
                &format!("Password is too weak: {feedback}"),
            ),
            Error::DuplicateEmail(email) => error_response(
                StatusCode::CONFLICT,
                &format!("The email {email} is already registered."),
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE)
            }
        }
    }
}
