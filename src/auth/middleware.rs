//! Authentication middleware that validates cookies, extends sessions, and rejects anonymous callers.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use time::Duration;

use crate::{
    AppState,
    auth::cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
    endpoints,
    error::error_response,
};

/// How far the session is pushed out on each authenticated request.
const SLIDING_SESSION_DURATION: Duration = Duration::minutes(5);

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Checks for a valid auth cookie, places the caller's `UserID` into the
/// request extensions and runs the request, otherwise responds with `reject`.
#[inline]
async fn auth_guard_internal(
    state: AuthState,
    request: Request,
    next: Next,
    reject: impl Fn() -> Response,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}.");
            return reject();
        }
    };
    let token = match get_token_from_cookies(&jar) {
        Ok(token) => token,
        Err(_) => return reject(),
    };

    parts.extensions.insert(token.user_id);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(
        jar.clone(),
        &token,
        SLIDING_SESSION_DURATION,
    ) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}

/// Middleware for pages: anonymous callers are redirected to the log-in page.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    auth_guard_internal(state, request, next, || {
        Redirect::to(endpoints::LOG_IN_VIEW).into_response()
    })
    .await
}

/// Middleware for the JSON API: anonymous callers get a 401 with a JSON error body.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard_api(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, || {
        error_response(
            StatusCode::UNAUTHORIZED,
            "You must be logged in to do that.",
        )
    })
    .await
}

#[cfg(test)]
mod auth_guard_tests {
    use axum::{
        Extension, Router,
        extract::{Path, State},
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key},
    };
    use axum_test::TestServer;
    use sha2::Digest;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{COOKIE_TOKEN, UserID, auth_guard, auth_guard_api, set_auth_cookie},
        endpoints,
    };

    use super::AuthState;

    async fn whoami(Extension(user_id): Extension<UserID>) -> String {
        user_id.to_string()
    }

    async fn stub_log_in_route(
        State(_state): State<AuthState>,
        Path(user_id): Path<i64>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(jar, UserID::new(user_id), Duration::seconds(5))
    }

    const TEST_LOG_IN_ROUTE_PATH: &str = "/log_in/{user_id}";
    const TEST_PROTECTED_ROUTE: &str = "/protected";
    const TEST_API_ROUTE: &str = "/api/protected";

    fn get_test_server() -> TestServer {
        let hash = sha2::Sha512::digest("nafstenoas");
        let state = AuthState {
            cookie_key: Key::from(&hash),
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .merge(
                Router::new()
                    .route(TEST_API_ROUTE, get(whoami))
                    .route_layer(middleware::from_fn_with_state(
                        state.clone(),
                        auth_guard_api,
                    )),
            )
            .route(TEST_LOG_IN_ROUTE_PATH, post(stub_log_in_route))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn valid_cookie_passes_caller_identity_to_handler() {
        let server = get_test_server();
        let response = server.post("/log_in/42").await;
        response.assert_status_ok();
        let token_cookie = response.cookie(COOKIE_TOKEN);

        let response = server.get(TEST_API_ROUTE).add_cookie(token_cookie).await;

        response.assert_status_ok();
        response.assert_text("42");
    }

    #[tokio::test]
    async fn auth_guard_extends_short_session() {
        let server = get_test_server();
        let response = server.post("/log_in/1").await;
        let jar = response.cookies();

        let response = server.get(TEST_PROTECTED_ROUTE).add_cookies(jar).await;

        let auth_cookie = response.cookie(COOKIE_TOKEN);
        let expires = auth_cookie.expires_datetime().unwrap();
        assert!(expires - OffsetDateTime::now_utc() > Duration::minutes(4));
    }

    #[tokio::test]
    async fn page_without_cookie_redirects_to_log_in() {
        let server = get_test_server();

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn api_without_cookie_is_unauthorized() {
        let server = get_test_server();

        let response = server.get(TEST_API_ROUTE).await;

        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "You must be logged in to do that.");
    }

    #[tokio::test]
    async fn api_with_garbage_cookie_is_unauthorized() {
        let server = get_test_server();

        let response = server
            .get(TEST_API_ROUTE)
            .add_cookie(Cookie::build((COOKIE_TOKEN, "FOOBAR")).build())
            .await;

        response.assert_status_unauthorized();
    }
}
