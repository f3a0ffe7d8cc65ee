//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from account and class IDs, which are
/// also plain integers in the database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application, i.e. a teacher or a student.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The address the user logs in with.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// Emails are compared case-insensitively, so they are stored in lower case.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is taken, or
/// [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    email: &str,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    let email = email.trim().to_lowercase();

    connection
        .execute(
            "INSERT INTO user (email, password) VALUES (?1, ?2)",
            (&email, password_hash.as_ref()),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Error::DuplicateEmail(email.clone())
            }
            error => error.into(),
        })?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email,
        password_hash,
    })
}

fn map_row_to_user(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let email = row.get(1)?;
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(raw_id),
        email,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_row_to_user)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that email.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password FROM user WHERE email = :email")?
        .query_row(
            &[(":email", &email.trim().to_lowercase())],
            map_row_to_user,
        )
        .map_err(|error| error.into())
}
