//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use maud::html;

use crate::{
    AppState,
    account::{get_accounts_endpoint, get_accounts_page},
    auth::{auth_guard, auth_guard_api, get_log_in_page, get_log_out, post_log_in},
    class::{
        create_class_endpoint, get_class_accounts_endpoint, get_class_transactions_endpoint,
        join_class_endpoint,
    },
    endpoints,
    html::{LINK_STYLE, base},
    interest::apply_interest_endpoint,
    ledger::get_account_ledger_endpoint,
    transaction::{create_transfer_endpoint, get_account_transactions_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::CRON_INTEREST_API, get(apply_interest_endpoint));

    let protected_pages = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::ACCOUNTS_VIEW, get(get_accounts_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let protected_api = Router::new()
        .route(endpoints::ACCOUNTS_API, get(get_accounts_endpoint))
        .route(
            endpoints::ACCOUNT_TRANSACTIONS_API,
            get(get_account_transactions_endpoint),
        )
        .route(endpoints::ACCOUNT_LEDGER_API, get(get_account_ledger_endpoint))
        .route(endpoints::TRANSFERS_API, post(create_transfer_endpoint))
        .route(endpoints::CLASSES_API, post(create_class_endpoint))
        .route(endpoints::JOIN_CLASS_API, post(join_class_endpoint))
        .route(endpoints::CLASS_ACCOUNTS_API, get(get_class_accounts_endpoint))
        .route(
            endpoints::CLASS_TRANSACTIONS_API,
            get(get_class_transactions_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard_api));

    protected_pages
        .merge(protected_api)
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the accounts page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::ACCOUNTS_VIEW)
}

async fn get_404_not_found() -> Response {
    let content = html! {
        main class="flex flex-col items-center justify-center px-6 py-8 mx-auto lg:py-0"
        {
            h1 class="text-4xl font-bold" { "404" }
            p { "Sorry, that page does not exist." }
            a href=(endpoints::ACCOUNTS_VIEW) class=(LINK_STYLE) { "Back to your accounts" }
        }
    };

    (StatusCode::NOT_FOUND, base("Not Found", &content)).into_response()
}


#[cfg(test)]
mod router_tests {
    use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::Value;

    use crate::{
        AppState,
        auth::{COOKIE_TOKEN, PasswordHash, ValidatedPassword, create_user},
        endpoints,
        test_utils::{assert_valid_html, open_test_account},
    };

    use super::build_router;

    const PASSWORD: &str = "correct horse battery staple";

    fn server_with_user() -> (TestServer, AppState) {
        let state =
            AppState::new(Connection::open_in_memory().unwrap(), "foobar", "cron-secret").unwrap();
        {
            let conn = state.db_connection.lock().unwrap();
            let hash = PasswordHash::new(ValidatedPassword::new_unchecked(PASSWORD), 4).unwrap();
            let user = create_user("student@school.nz", hash, &conn).unwrap();
            open_test_account(&conn, user.id, 10_000);
        }

        let server = TestServer::try_new(build_router(state.clone())).unwrap();

        (server, state)
    }

    #[tokio::test]
    async fn api_requires_log_in() {
        let (server, _) = server_with_user();

        let response = server.get(endpoints::ACCOUNTS_API).await;

        response.assert_status_unauthorized();
        let body: Value = response.json();
        assert_eq!(body["error"], "You must be logged in to do that.");
    }

    #[tokio::test]
    async fn class_admin_routes_require_log_in() {
        let (server, _) = server_with_user();

        let accounts = server
            .get(&endpoints::CLASS_ACCOUNTS_API.replace("{class_code}", "ABC123"))
            .await;
        let transactions = server
            .get(&endpoints::CLASS_TRANSACTIONS_API.replace("{class_code}", "ABC123"))
            .await;

        accounts.assert_status_unauthorized();
        transactions.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn pages_redirect_to_log_in() {
        let (server, _) = server_with_user();

        let response = server.get(endpoints::ACCOUNTS_VIEW).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn logged_in_user_can_list_accounts() {
        let (server, _) = server_with_user();

        let log_in = server
            .post(endpoints::LOG_IN_API)
            .form(&[("email", "student@school.nz"), ("password", PASSWORD)])
            .await;
        log_in.assert_status(StatusCode::SEE_OTHER);
        let token_cookie = log_in.cookie(COOKIE_TOKEN);

        let response = server
            .get(endpoints::ACCOUNTS_API)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["accounts"].as_array().unwrap().len(), 1);
        assert_eq!(body["accounts"][0]["balance"], "100.00");
    }

    #[tokio::test]
    async fn cron_route_is_reachable_without_log_in() {
        let (server, _) = server_with_user();

        let response = server
            .get(endpoints::CRON_INTEREST_API)
            .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer cron-secret"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], "Applied interest to accounts");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found_page() {
        let (server, _) = server_with_user();

        let response = server.get("/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
        let html = scraper::Html::parse_document(&response.text());
        assert_valid_html(&html);
    }
}
