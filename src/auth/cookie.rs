//! Defines functions for handling user authentication with cookies.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{Token, UserID},
};

pub(crate) const COOKIE_TOKEN: &str = "token";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// The token expires `duration` from now.
///
/// # Errors
///
/// Returns [Error::JSONSerializationError] if the token cannot be serialized.
pub fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = Token {
        user_id,
        expires_at: OffsetDateTime::now_utc() + duration,
    };

    set_token_cookie(jar, &token)
}

fn set_token_cookie(jar: PrivateCookieJar, token: &Token) -> Result<PrivateCookieJar, Error> {
    let token_string = serde_json::to_string(token)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .expires(token.expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    ))
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    )
}

/// Read and validate the auth token from `jar`.
///
/// # Errors
///
/// Returns [Error::CookieMissing] if there is no auth cookie, or
/// [Error::InvalidToken] if the token cannot be decoded or has expired.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;
    let token: Token =
        serde_json::from_str(cookie.value_trimmed()).map_err(|_| Error::InvalidToken)?;

    if !token.is_valid_at(OffsetDateTime::now_utc()) {
        return Err(Error::InvalidToken);
    }

    Ok(token)
}

/// Push the expiry of `token` out to now plus `duration`, unless it already
/// expires later than that.
///
/// # Errors
///
/// The cookie jar is not modified if an error is returned.
pub(crate) fn extend_auth_cookie_duration_if_needed(
    jar: PrivateCookieJar,
    token: &Token,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let new_expiry = OffsetDateTime::now_utc() + duration;

    if new_expiry <= token.expires_at {
        return Ok(jar);
    }

    set_token_cookie(
        jar,
        &Token {
            user_id: token.user_id,
            expires_at: new_expiry,
        },
    )
}
