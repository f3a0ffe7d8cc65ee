//! Classes, enrolments and the accounts opened when someone creates or joins
//! a class.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{
    Connection, OptionalExtension, Row, ToSql, Transaction, TransactionBehavior,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    Error,
    account::{AccountId, NewAccount, open_account},
    auth::UserID,
    error::{GENERIC_ERROR_MESSAGE, error_response},
    money::{InterestRate, Money},
};

/// The database ID of a class.
pub type ClassId = i64;

/// The number of characters in a class code.
pub const CLASS_CODE_LENGTH: usize = 6;

/// The float a class admin starts with in their checking account.
pub const ADMIN_OPENING_BALANCE: Money = Money::from_cents(100_000_000);

/// The pocket money a student starts with.
pub const STUDENT_OPENING_BALANCE: Money = Money::from_cents(10_000);

/// Students are paid interest daily.
pub const STUDENT_INTEREST_PERIOD_DAYS: i64 = 1;

/// 20% a year, paid daily.
pub fn student_interest_rate() -> InterestRate {
    InterestRate::new(Decimal::new(2, 1) / Decimal::from(365))
}

/// What a user may do in a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Runs the class and pays students from a checking account.
    Admin,
    /// Holds an interest-bearing account.
    Student,
}

impl Role {
    /// The name the role is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Student => "STUDENT",
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "ADMIN" => Ok(Role::Admin),
            "STUDENT" => Ok(Role::Student),
            other => Err(FromSqlError::Other(
                format!("invalid role {other:?}").into(),
            )),
        }
    }
}

/// A group of users sharing a class code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Class {
    /// The ID of the class.
    pub id: ClassId,
    /// The name the admin gave the class, unique among their live classes.
    pub name: String,
    /// The code students enter to join, six upper-case characters.
    pub class_code: String,
    /// When the class was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the class was deleted, `None` while it is live.
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// A user's membership of a class and the account it opened for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
    /// The ID of the enrolment.
    pub id: i64,
    /// The enrolled user.
    pub user_id: UserID,
    /// The class they are enrolled in.
    pub class_id: ClassId,
    /// What they may do in the class.
    pub role: Role,
    /// The account opened when they enrolled.
    pub checking_account_id: AccountId,
}

/// The result of creating or joining a class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Membership {
    /// The class that was created or joined.
    pub class: Class,
    /// The caller's enrolment in it.
    pub enrollment: Enrollment,
}

/// Why a class could not be created or joined.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClassError {
    /// The class name was blank.
    #[error("the class name is empty")]
    EmptyName,

    /// The class code was not six characters.
    #[error("class codes are six characters long")]
    InvalidClassCode,

    /// No live class uses the code.
    #[error("no class has the code {0}")]
    ClassNotFound(String),

    /// The user already has an enrolment in the class.
    #[error("the user is already enrolled in the class")]
    AlreadyEnrolled,

    /// The user tried an admin action in a class they do not run.
    #[error("the user is not an admin of the class")]
    NotAdmin,

    /// The database could not be read or written.
    #[error(transparent)]
    Internal(#[from] Error),
}

impl From<rusqlite::Error> for ClassError {
    fn from(error: rusqlite::Error) -> Self {
        ClassError::Internal(error.into())
    }
}

impl IntoResponse for ClassError {
    fn into_response(self) -> Response {
        match self {
            ClassError::EmptyName => {
                error_response(StatusCode::BAD_REQUEST, "Class name cannot be empty.")
            }
            ClassError::InvalidClassCode => error_response(
                StatusCode::BAD_REQUEST,
                "Class codes are 6 letters or numbers.",
            ),
            ClassError::ClassNotFound(_) => {
                error_response(StatusCode::NOT_FOUND, "No class has that code.")
            }
            ClassError::AlreadyEnrolled => {
                error_response(StatusCode::CONFLICT, "You are already in that class.")
            }
            ClassError::NotAdmin => {
                error_response(StatusCode::FORBIDDEN, "You are not an admin of this class.")
            }
            ClassError::Internal(error) => {
                tracing::error!("Class operation failed: {error}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE)
            }
        }
    }
}

/// Create the class table and the index that keeps live class codes unique.
pub fn create_class_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS class (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            class_code TEXT NOT NULL,
            created_at TEXT NOT NULL,
            deleted_at TEXT
        )",
        (),
    )?;

    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_class_live_code
         ON class(class_code) WHERE deleted_at IS NULL",
        (),
    )?;

    Ok(())
}

/// Create the enrollment table.
pub fn create_enrollment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS enrollment (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id),
            class_id INTEGER NOT NULL REFERENCES class(id),
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'STUDENT')),
            checking_account_id INTEGER NOT NULL REFERENCES account(id),
            UNIQUE(user_id, class_id)
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_class(row: &Row) -> Result<Class, rusqlite::Error> {
    Ok(Class {
        id: row.get(0)?,
        name: row.get(1)?,
        class_code: row.get(2)?,
        created_at: row.get(3)?,
        deleted_at: row.get(4)?,
    })
}

fn map_row_to_enrollment(row: &Row) -> Result<Enrollment, rusqlite::Error> {
    Ok(Enrollment {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        class_id: row.get(2)?,
        role: row.get(3)?,
        checking_account_id: row.get(4)?,
    })
}

/// Get the class that currently uses `class_code`, ignoring deleted classes.
pub fn get_live_class_by_code(
    class_code: &str,
    connection: &Connection,
) -> Result<Option<Class>, Error> {
    connection
        .prepare(
            "SELECT id, name, class_code, created_at, deleted_at FROM class
             WHERE class_code = ?1 AND deleted_at IS NULL",
        )?
        .query_row([class_code], map_row_to_class)
        .optional()
        .map_err(Error::from)
}

/// Get every enrolment for `user_id`, oldest first.
pub fn get_enrollments_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Enrollment>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, class_id, role, checking_account_id FROM enrollment
             WHERE user_id = ?1 ORDER BY id ASC",
        )?
        .query_map([user_id.as_i64()], map_row_to_enrollment)?
        .map(|maybe_enrollment| maybe_enrollment.map_err(Error::from))
        .collect()
}

fn owner_has_live_class_named(
    owner: UserID,
    name: &str,
    connection: &Connection,
) -> Result<bool, rusqlite::Error> {
    connection.query_row(
        "SELECT EXISTS (
            SELECT 1 FROM class
            INNER JOIN enrollment ON enrollment.class_id = class.id
            WHERE enrollment.user_id = ?1
              AND enrollment.role = 'ADMIN'
              AND class.name = ?2
              AND class.deleted_at IS NULL
        )",
        (owner.as_i64(), name),
        |row| row.get(0),
    )
}

/// Append " (1)" to `name` until `owner` has no live class with that name.
fn unique_class_name(
    owner: UserID,
    name: &str,
    connection: &Connection,
) -> Result<String, rusqlite::Error> {
    let mut name = name.to_owned();

    while owner_has_live_class_named(owner, &name, connection)? {
        name.push_str(" (1)");
    }

    Ok(name)
}

fn random_class_code() -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(CLASS_CODE_LENGTH);
    code.to_uppercase()
}

/// Generate a class code no live class is using.
fn unused_class_code(connection: &Connection) -> Result<String, Error> {
    loop {
        let code = random_class_code();

        if get_live_class_by_code(&code, connection)?.is_none() {
            return Ok(code);
        }

        tracing::debug!("Class code {code} is taken, generating another");
    }
}

/// Trim and upper-case `class_code`.
///
/// # Errors
/// Returns [ClassError::InvalidClassCode] if the code is not
/// [CLASS_CODE_LENGTH] characters.
pub fn normalize_class_code(class_code: &str) -> Result<String, ClassError> {
    let class_code = class_code.trim().to_uppercase();

    if class_code.chars().count() != CLASS_CODE_LENGTH {
        return Err(ClassError::InvalidClassCode);
    }

    Ok(class_code)
}

/// Get the role `user_id` has in `class_id`, if they are enrolled.
pub fn get_role_in_class(
    user_id: UserID,
    class_id: ClassId,
    connection: &Connection,
) -> Result<Option<Role>, Error> {
    connection
        .query_row(
            "SELECT role FROM enrollment WHERE user_id = ?1 AND class_id = ?2",
            (user_id.as_i64(), class_id),
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
}

fn insert_enrollment(
    user_id: UserID,
    class_id: ClassId,
    role: Role,
    checking_account_id: AccountId,
    connection: &Connection,
) -> Result<Enrollment, rusqlite::Error> {
    connection
        .prepare(
            "INSERT INTO enrollment (user_id, class_id, role, checking_account_id)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, user_id, class_id, role, checking_account_id",
        )?
        .query_row(
            (user_id.as_i64(), class_id, role, checking_account_id),
            map_row_to_enrollment,
        )
}

/// Create a class run by `owner`.
///
/// The owner is enrolled as [Role::Admin] with a checking account holding
/// [ADMIN_OPENING_BALANCE] paid out of the World Account. Everything is
/// written in one transaction.
///
/// # Errors
/// Returns [ClassError::EmptyName] for a blank name, or
/// [ClassError::Internal] if anything could not be written.
pub fn create_class(
    owner: UserID,
    name: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Membership, ClassError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ClassError::EmptyName);
    }

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let name = unique_class_name(owner, name, &transaction)?;
    let class_code = unused_class_code(&transaction)?;

    let class = transaction
        .prepare(
            "INSERT INTO class (name, class_code, created_at) VALUES (?1, ?2, ?3)
             RETURNING id, name, class_code, created_at, deleted_at",
        )?
        .query_row((&name, &class_code, now), map_row_to_class)?;

    let account = open_account(
        &NewAccount {
            owner_id: owner,
            name: format!("Checking ({name})"),
            opening_balance: ADMIN_OPENING_BALANCE,
            interest_rate: InterestRate::ZERO,
            interest_period_days: -1,
        },
        now,
        &transaction,
    )?;

    let enrollment = insert_enrollment(owner, class.id, Role::Admin, account.id, &transaction)?;

    transaction.commit()?;

    tracing::info!(
        "User {owner} created class {} ({}) with code {}",
        class.id,
        class.name,
        class.class_code
    );

    Ok(Membership { class, enrollment })
}

/// Enrol `user_id` as a student in the class with `class_code`.
///
/// Codes are matched case-insensitively. The student gets an account holding
/// [STUDENT_OPENING_BALANCE] that earns [student_interest_rate] daily.
///
/// # Errors
/// Returns [ClassError::InvalidClassCode] if the code is not
/// [CLASS_CODE_LENGTH] characters, [ClassError::ClassNotFound] if no live
/// class has the code, [ClassError::AlreadyEnrolled] if the user is already a
/// member, or [ClassError::Internal] if anything could not be written.
pub fn join_class(
    user_id: UserID,
    class_code: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Membership, ClassError> {
    let class_code = normalize_class_code(class_code)?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let class = get_live_class_by_code(&class_code, &transaction)?
        .ok_or_else(|| ClassError::ClassNotFound(class_code.clone()))?;

    let already_enrolled: bool = transaction.query_row(
        "SELECT EXISTS (SELECT 1 FROM enrollment WHERE user_id = ?1 AND class_id = ?2)",
        (user_id.as_i64(), class.id),
        |row| row.get(0),
    )?;

    if already_enrolled {
        return Err(ClassError::AlreadyEnrolled);
    }

    let account = open_account(
        &NewAccount {
            owner_id: user_id,
            name: format!("My account ({})", class.name),
            opening_balance: STUDENT_OPENING_BALANCE,
            interest_rate: student_interest_rate(),
            interest_period_days: STUDENT_INTEREST_PERIOD_DAYS,
        },
        now,
        &transaction,
    )?;

    let enrollment =
        insert_enrollment(user_id, class.id, Role::Student, account.id, &transaction)?;

    transaction.commit()?;

    tracing::info!("User {user_id} joined class {} ({})", class.id, class.name);

    Ok(Membership { class, enrollment })
}
