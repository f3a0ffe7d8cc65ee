//! Defines the JSON endpoint listing the caller's accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{AppState, Error, account::get_accounts_for_owner, auth::UserID};

#[derive(Debug, Clone)]
pub struct AccountsState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that responds with `{"accounts": [...]}` for the caller.
pub async fn get_accounts_endpoint(
    State(state): State<AccountsState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let accounts = get_accounts_for_owner(user_id, &connection)?;

    Ok(Json(json!({ "accounts": accounts })).into_response())
}

#[cfg(test)]
mod accounts_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, routing::get};
    use axum_test::TestServer;
    use serde_json::Value;

    use crate::{
        endpoints,
        test_utils::{get_test_connection, insert_test_user, open_test_account},
    };

    use super::{AccountsState, get_accounts_endpoint};

    #[tokio::test]
    async fn lists_only_the_callers_accounts() {
        let conn = get_test_connection();
        let u1 = insert_test_user(&conn, "u1@school.nz");
        let u2 = insert_test_user(&conn, "u2@school.nz");
        let mine = open_test_account(&conn, u1, 12_345);
        open_test_account(&conn, u2, 100);
        let app = Router::new()
            .route(endpoints::ACCOUNTS_API, get(get_accounts_endpoint))
            .layer(Extension(u1))
            .with_state(AccountsState {
                db_connection: Arc::new(Mutex::new(conn)),
            });
        let server = TestServer::try_new(app).unwrap();

        let response = server.get(endpoints::ACCOUNTS_API).await;

        response.assert_status_ok();
        let body: Value = response.json();
        let accounts = body["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["id"], mine.id);
        assert_eq!(accounts[0]["owner_id"], u1.as_i64());
        assert_eq!(accounts[0]["balance"], "123.45");
        assert_eq!(accounts[0]["last_accrued_at"], Value::Null);
    }
}
