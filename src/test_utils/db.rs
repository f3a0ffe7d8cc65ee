use rusqlite::Connection;
use time::{OffsetDateTime, macros::datetime};

use crate::{
    account::{Account, NewAccount, open_account},
    auth::{PasswordHash, UserID, create_user},
    db::initialize,
    money::{InterestRate, Money},
};

/// An in-memory database with every table and the World Account.
pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&conn).expect("Could not initialize database");
    conn
}

pub(crate) fn insert_test_user(conn: &Connection, email: &str) -> UserID {
    create_user(email, PasswordHash::new_unchecked("hunter2"), conn)
        .expect("Could not create test user")
        .id
}

/// When test accounts are opened, before any other timestamp used in tests.
pub(crate) const TEST_OPENED_AT: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

/// Open an account that never earns interest, funded from the World Account.
pub(crate) fn open_test_account(conn: &Connection, owner: UserID, cents: i64) -> Account {
    open_account(
        &NewAccount {
            owner_id: owner,
            name: format!("Test account for user {owner}"),
            opening_balance: Money::from_cents(cents),
            interest_rate: InterestRate::ZERO,
            interest_period_days: -1,
        },
        TEST_OPENED_AT,
        conn,
    )
    .expect("Could not open test account")
}
