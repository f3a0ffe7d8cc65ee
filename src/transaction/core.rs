//! Defines the user-facing transaction history and its database queries.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, account::AccountId, auth::UserID, class::ClassId, money::Money};

/// The database ID of a history record.
pub type TransactionId = i64;

/// How many history records to return when the caller does not ask for a count.
pub const DEFAULT_HISTORY_COUNT: u32 = 10;

/// The history record of one successful transfer.
///
/// Each record is backed by exactly two ledger entries with the same amount
/// and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The account the money came from.
    pub from_account_id: AccountId,
    /// The account the money went to.
    pub to_account_id: AccountId,
    /// The amount moved, always positive.
    pub amount: Money,
    /// What the transfer was for, may be empty.
    pub note: String,
    /// When the transfer was committed.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_account_id INTEGER NOT NULL REFERENCES account(id),
                to_account_id INTEGER NOT NULL REFERENCES account(id),
                amount INTEGER NOT NULL CHECK (amount > 0),
                note TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_from ON \"transaction\"(from_account_id);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_to ON \"transaction\"(to_account_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [TransactionRecord].
pub fn map_transaction_row(row: &Row) -> Result<TransactionRecord, rusqlite::Error> {
    Ok(TransactionRecord {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: row.get(3)?,
        note: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Append a history record.
///
/// Only the transfer code should call this, inside the transaction that
/// writes the matching ledger rows.
pub(crate) fn insert_transaction(
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: Money,
    note: &str,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<TransactionRecord, rusqlite::Error> {
    connection
        .prepare_cached(
            "INSERT INTO \"transaction\" (from_account_id, to_account_id, amount, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, from_account_id, to_account_id, amount, note, created_at",
        )?
        .query_row(
            (from_account_id, to_account_id, amount, note, created_at),
            map_transaction_row,
        )
}

/// Get the most recent `count` transactions into or out of `account_id`, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transactions_for_account(
    account_id: AccountId,
    count: u32,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    connection
        .prepare(
            "SELECT id, from_account_id, to_account_id, amount, note, created_at
             FROM \"transaction\"
             WHERE from_account_id = :account_id OR to_account_id = :account_id
             ORDER BY id DESC
             LIMIT :count",
        )?
        .query_map(
            rusqlite::named_params! { ":account_id": account_id, ":count": count },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Get the most recent `count` transactions touching any account owned by `owner_id`, newest first.
pub fn get_recent_transactions_for_owner(
    owner_id: UserID,
    count: u32,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    connection
        .prepare(
            "SELECT id, from_account_id, to_account_id, amount, note, created_at
             FROM \"transaction\"
             WHERE from_account_id IN (SELECT id FROM account WHERE owner_id = :owner_id)
                OR to_account_id IN (SELECT id FROM account WHERE owner_id = :owner_id)
             ORDER BY id DESC
             LIMIT :count",
        )?
        .query_map(
            rusqlite::named_params! { ":owner_id": owner_id.as_i64(), ":count": count },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

const CLASS_ACCOUNTS: &str =
    "SELECT checking_account_id FROM enrollment WHERE class_id = :class_id";

/// Get one page of the transactions into or out of any checking account
/// enrolled in `class_id`, newest first.
pub fn get_transactions_for_class(
    class_id: ClassId,
    limit: u32,
    offset: u32,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT id, from_account_id, to_account_id, amount, note, created_at
             FROM \"transaction\"
             WHERE from_account_id IN ({CLASS_ACCOUNTS})
                OR to_account_id IN ({CLASS_ACCOUNTS})
             ORDER BY id DESC
             LIMIT :limit OFFSET :offset"
        ))?
        .query_map(
            rusqlite::named_params! { ":class_id": class_id, ":limit": limit, ":offset": offset },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Count the transactions [get_transactions_for_class] pages through.
pub fn count_transactions_for_class(
    class_id: ClassId,
    connection: &Connection,
) -> Result<u32, Error> {
    connection
        .query_row(
            &format!(
                "SELECT COUNT(id) FROM \"transaction\"
                 WHERE from_account_id IN ({CLASS_ACCOUNTS})
                    OR to_account_id IN ({CLASS_ACCOUNTS})"
            ),
            rusqlite::named_params! { ":class_id": class_id },
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Get the total number of transactions in the database.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

#[cfg(test)]
mod database_tests {
    use time::{Duration, macros::datetime};

    use crate::{
        money::Money,
        test_utils::{get_test_connection, insert_test_user, open_test_account},
    };

    use super::{
        count_transactions, get_recent_transactions_for_owner, get_transactions_for_account,
        insert_transaction,
    };

    #[test]
    fn insert_returns_record() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "a@school.nz");
        let a = open_test_account(&conn, owner, 0);
        let b = open_test_account(&conn, owner, 0);
        let now = datetime!(2025-03-01 12:00 UTC);

        let record =
            insert_transaction(a.id, b.id, Money::from_cents(3000), "lunch", now, &conn).unwrap();

        assert_eq!(record.from_account_id, a.id);
        assert_eq!(record.to_account_id, b.id);
        assert_eq!(record.amount, Money::from_cents(3000));
        assert_eq!(record.note, "lunch");
        assert_eq!(record.created_at, now);
        assert_eq!(count_transactions(&conn), Ok(1));
    }

    #[test]
    fn zero_amount_is_rejected_by_schema() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "a@school.nz");
        let a = open_test_account(&conn, owner, 0);
        let b = open_test_account(&conn, owner, 0);

        let result = insert_transaction(
            a.id,
            b.id,
            Money::ZERO,
            "",
            datetime!(2025-03-01 12:00 UTC),
            &conn,
        );

        assert!(result.is_err());
        assert_eq!(count_transactions(&conn), Ok(0));
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "a@school.nz");
        let a = open_test_account(&conn, owner, 0);
        let b = open_test_account(&conn, owner, 0);
        let start = datetime!(2025-03-01 12:00 UTC);
        for i in 0..5 {
            insert_transaction(
                a.id,
                b.id,
                Money::from_cents(100 + i),
                &format!("payment {i}"),
                start + Duration::minutes(i),
                &conn,
            )
            .unwrap();
        }

        let history = get_transactions_for_account(b.id, 3, &conn).unwrap();

        let notes: Vec<_> = history.iter().map(|record| record.note.as_str()).collect();
        assert_eq!(notes, vec!["payment 4", "payment 3", "payment 2"]);
    }

    #[test]
    fn history_follows_write_order_when_clock_steps_back() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "a@school.nz");
        let a = open_test_account(&conn, owner, 0);
        let b = open_test_account(&conn, owner, 0);
        let later = datetime!(2025-03-01 12:00 UTC);
        insert_transaction(a.id, b.id, Money::from_cents(100), "first", later, &conn).unwrap();
        insert_transaction(
            a.id,
            b.id,
            Money::from_cents(200),
            "second",
            later - Duration::hours(1),
            &conn,
        )
        .unwrap();

        let history = get_transactions_for_account(b.id, 10, &conn).unwrap();
        let owner_history = get_recent_transactions_for_owner(owner, 10, &conn).unwrap();

        let notes: Vec<_> = history.iter().map(|record| record.note.as_str()).collect();
        assert_eq!(notes, vec!["second", "first"]);
        let owner_notes: Vec<_> = owner_history
            .iter()
            .map(|record| record.note.as_str())
            .collect();
        assert_eq!(owner_notes, vec!["second", "first"]);
    }

    #[test]
    fn owner_history_excludes_other_users() {
        let conn = get_test_connection();
        let alice = insert_test_user(&conn, "alice@school.nz");
        let bob = insert_test_user(&conn, "bob@school.nz");
        let carol = insert_test_user(&conn, "carol@school.nz");
        let alice_account = open_test_account(&conn, alice, 0);
        let bob_account = open_test_account(&conn, bob, 0);
        let carol_account = open_test_account(&conn, carol, 0);
        let now = datetime!(2025-03-01 12:00 UTC);
        insert_transaction(
            alice_account.id,
            bob_account.id,
            Money::from_cents(100),
            "to bob",
            now,
            &conn,
        )
        .unwrap();
        insert_transaction(
            bob_account.id,
            carol_account.id,
            Money::from_cents(100),
            "to carol",
            now,
            &conn,
        )
        .unwrap();

        let history = get_recent_transactions_for_owner(alice, 10, &conn).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].note, "to bob");
    }
}
