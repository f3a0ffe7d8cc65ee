//! This file defines the routes for displaying the log-in page and handling log-in requests.
//! The cookie module handles the lower level token and cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_email, invalidate_auth_cookie, set_auth_cookie},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base, log_in_register},
};

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Incorrect email or password.";
const INTERNAL_ERROR_MSG: &str = "An internal error occurred. Please try again later.";

fn log_in_form(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            method="post"
            action=(endpoints::LOG_IN_API)
            class="space-y-4 md:space-y-6"
        {
            div
            {
                label for="email" class=(FORM_LABEL_STYLE) { "Email" }

                input
                    type="email"
                    name="email"
                    id="email"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required
                    autofocus
                    value=(email);
            }

            div
            {
                label for="password" class=(FORM_LABEL_STYLE) { "Password" }

                input
                    type="password"
                    name="password"
                    id="password"
                    placeholder="••••••••"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;

                @if let Some(error_message) = error_message
                {
                    p class="text-red-500 text-base" { (error_message) }
                }
            }

            div class="flex items-center gap-x-3"
            {
                input type="checkbox" name="remember_me" id="remember_me" class="rounded-xs";

                label
                    for="remember_me"
                    class="block text-sm font-medium text-gray-900 dark:text-white"
                {
                    "Keep me logged in for one week"
                }
            }

            button type="submit" id="submit-button" class=(BUTTON_PRIMARY_STYLE)
            {
                "Log in"
            }
        }
    }
}

fn log_in_page(email: &str, error_message: Option<&str>) -> Markup {
    let form = log_in_form(email, error_message);
    let content = log_in_register("Log in to your account", &form);
    base("Log In", &content)
}

/// Display the log-in page.
pub async fn get_log_in_page() -> Response {
    log_in_page("", None).into_response()
}

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the log-in form.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password in the database, which has been verified.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,

    /// Password entered during log-in.
    pub password: String,

    /// Whether to extend the initial auth cookie duration.
    ///
    /// This value comes from a checkbox, so it either has a string value or is not set.
    /// The `Some` variant should be interpreted as `true` irregardless of the
    /// string value, and the `None` variant should be interpreted as `false`.
    pub remember_me: Option<String>,
}

fn check_credentials(state: &LoginState, user_data: &LogInData) -> Result<UserID, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = match get_user_by_email(&user_data.email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    match user.password_hash.verify(&user_data.password) {
        Ok(true) => Ok(user.id),
        Ok(false) => Err(Error::InvalidCredentials),
        Err(error) => Err(Error::HashingError(error.to_string())),
    }
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request, the auth cookie set and the client is redirected to the accounts page.
/// Otherwise, the log-in page is returned with an error message explaining the problem.
pub async fn post_log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let user_id = match check_credentials(&state, &user_data) {
        Ok(user_id) => user_id,
        Err(Error::InvalidCredentials) => {
            return (
                StatusCode::UNAUTHORIZED,
                log_in_page(&user_data.email, Some(INVALID_CREDENTIALS_ERROR_MSG)),
            )
                .into_response();
        }
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                log_in_page(&user_data.email, Some(INTERNAL_ERROR_MSG)),
            )
                .into_response();
        }
    };

    let cookie_duration = if user_data.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    match set_auth_cookie(jar.clone(), user_id, cookie_duration) {
        Ok(updated_jar) => (updated_jar, Redirect::to(endpoints::ACCOUNTS_VIEW)).into_response(),
        Err(error) => {
            tracing::error!("Error setting auth cookie: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                invalidate_auth_cookie(jar),
                log_in_page(&user_data.email, Some(INTERNAL_ERROR_MSG)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod log_in_page_tests {
    use axum::http::{StatusCode, header::CONTENT_TYPE};

    use crate::{endpoints, test_utils::parse_html_document};

    use super::get_log_in_page;

    #[tokio::test]
    async fn log_in_page_displays_form() {
        let response = get_log_in_page().await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );

        let document = parse_html_document(response).await;
        let form_selector = scraper::Selector::parse("form").unwrap();
        let forms = document.select(&form_selector).collect::<Vec<_>>();
        assert_eq!(forms.len(), 1, "want 1 form, got {}", forms.len());
        let form = forms.first().unwrap();
        assert_eq!(form.value().attr("action"), Some(endpoints::LOG_IN_API));

        for selector in ["input[type=email]", "input[type=password]", "button[type=submit]"] {
            let selector = scraper::Selector::parse(selector).unwrap();
            assert_eq!(form.select(&selector).count(), 1);
        }
    }
}
