//! Route handlers for the class admin's view of a class.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    Error,
    auth::UserID,
    class::{
        ClassState, DEFAULT_CLASS_PAGE_SIZE, get_class_accounts, get_class_transactions,
    },
};

/// Which page of class transactions to return.
#[derive(Debug, Deserialize)]
pub struct ClassTransactionsQuery {
    /// Starts at 1, the first page if not given.
    pub page: Option<u32>,
    /// [DEFAULT_CLASS_PAGE_SIZE] if not given.
    pub page_size: Option<u32>,
}

/// A route handler listing every account in a class the caller administers.
pub async fn get_class_accounts_endpoint(
    State(state): State<ClassState>,
    Extension(user_id): Extension<UserID>,
    Path(class_code): Path<String>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_class_accounts(user_id, &class_code, &connection) {
        Ok(accounts) => Json(json!({ "accounts": accounts })).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for one page of the transactions in a class the caller administers.
pub async fn get_class_transactions_endpoint(
    State(state): State<ClassState>,
    Extension(user_id): Extension<UserID>,
    Path(class_code): Path<String>,
    Query(query): Query<ClassTransactionsQuery>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_class_transactions(
        user_id,
        &class_code,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_CLASS_PAGE_SIZE),
        &connection,
    ) {
        Ok(page) => Json(page).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod roster_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use serde_json::Value;
    use time::{OffsetDateTime, macros::datetime};

    use crate::{
        auth::UserID,
        class::{ClassState, create_class, join_class},
        endpoints,
        test_utils::{get_test_connection, insert_test_user},
    };

    use super::{get_class_accounts_endpoint, get_class_transactions_endpoint};

    const NOW: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);

    fn server_for(state: &ClassState, user_id: UserID) -> TestServer {
        let app = Router::new()
            .route(endpoints::CLASS_ACCOUNTS_API, get(get_class_accounts_endpoint))
            .route(
                endpoints::CLASS_TRANSACTIONS_API,
                get(get_class_transactions_endpoint),
            )
            .layer(Extension(user_id))
            .with_state(state.clone());

        TestServer::try_new(app).unwrap()
    }

    /// A class run by the first user with the second user enrolled as a student.
    fn setup() -> (ClassState, UserID, UserID, String) {
        let conn = get_test_connection();
        let teacher = insert_test_user(&conn, "teacher@school.nz");
        let student = insert_test_user(&conn, "student@school.nz");
        let class = create_class(teacher, "Room 7", NOW, &conn).unwrap();
        join_class(student, &class.class.class_code, NOW, &conn).unwrap();
        let state = ClassState {
            db_connection: Arc::new(Mutex::new(conn)),
        };

        (state, teacher, student, class.class.class_code)
    }

    fn class_path(endpoint: &str, class_code: &str) -> String {
        endpoint.replace("{class_code}", class_code)
    }

    #[tokio::test]
    async fn admin_lists_class_accounts() {
        let (state, teacher, _, code) = setup();

        let response = server_for(&state, teacher)
            .get(&class_path(endpoints::CLASS_ACCOUNTS_API, &code))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        let accounts = body["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0]["role"], "ADMIN");
        assert_eq!(accounts[1]["role"], "STUDENT");
        assert_eq!(accounts[1]["email"], "student@school.nz");
        assert_eq!(accounts[1]["balance"], "100.00");
    }

    #[tokio::test]
    async fn student_cannot_list_class_accounts() {
        let (state, _, student, code) = setup();

        let response = server_for(&state, student)
            .get(&class_path(endpoints::CLASS_ACCOUNTS_API, &code))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_reads_a_page_of_class_transactions() {
        let (state, teacher, _, code) = setup();

        let response = server_for(&state, teacher)
            .get(&class_path(endpoints::CLASS_TRANSACTIONS_API, &code))
            .add_query_param("page_size", 1)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(body["total_records"], 2);
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 1);
    }

    #[tokio::test]
    async fn student_cannot_read_class_transactions() {
        let (state, _, student, code) = setup();

        let response = server_for(&state, student)
            .get(&class_path(endpoints::CLASS_TRANSACTIONS_API, &code))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_class_is_not_found() {
        let (state, teacher, _, _) = setup();

        let response = server_for(&state, teacher)
            .get(&class_path(endpoints::CLASS_ACCOUNTS_API, "QQQQQQ"))
            .await;

        response.assert_status_not_found();
    }
}
