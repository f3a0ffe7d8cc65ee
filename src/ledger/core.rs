//! Ledger rows and the queries that reconcile them with cached balances.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, account::AccountId, money::Money};

/// One half of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    /// The ID of the entry, in the order entries were written.
    pub id: i64,
    /// The account the entry belongs to.
    pub account_id: AccountId,
    /// Money added to the account.
    pub debit: Money,
    /// Money taken from the account.
    pub credit: Money,
    /// When the transfer was committed.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An account whose cached balance disagrees with its ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDrift {
    /// The account that drifted.
    pub account_id: AccountId,
    /// The balance stored on the account row.
    pub cached: Money,
    /// The balance implied by the ledger.
    pub ledger: Money,
}

/// Create the append-only ledger table.
pub fn create_ledger_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES account(id),
            debit INTEGER NOT NULL CHECK (debit >= 0),
            credit INTEGER NOT NULL CHECK (credit >= 0),
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_account ON ledger(account_id);",
        (),
    )?;

    Ok(())
}

/// Write the two ledger rows for moving `amount` from `from` to `to`.
///
/// Both rows share `created_at`. This must run inside the same database
/// transaction as the matching balance updates.
pub fn insert_ledger_pair(
    from: AccountId,
    to: AccountId,
    amount: Money,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    let mut statement = connection.prepare_cached(
        "INSERT INTO ledger (account_id, debit, credit, created_at) VALUES (?1, ?2, ?3, ?4)",
    )?;

    statement.execute((from, Money::ZERO, amount, created_at))?;
    statement.execute((to, amount, Money::ZERO, created_at))?;

    Ok(())
}

fn map_row_to_ledger_entry(row: &Row) -> Result<LedgerEntry, rusqlite::Error> {
    Ok(LedgerEntry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        debit: row.get(2)?,
        credit: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Get the ledger rows for `account_id` in the order they were written.
pub fn get_ledger_entries(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<LedgerEntry>, Error> {
    connection
        .prepare(
            "SELECT id, account_id, debit, credit, created_at FROM ledger
             WHERE account_id = :account_id ORDER BY id ASC",
        )?
        .query_map(&[(":account_id", &account_id)], map_row_to_ledger_entry)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// The balance of `account_id` recomputed from its ledger rows.
pub fn ledger_balance(account_id: AccountId, connection: &Connection) -> Result<Money, Error> {
    let balance = connection.query_row(
        "SELECT COALESCE(SUM(debit - credit), 0) FROM ledger WHERE account_id = ?1",
        [account_id],
        |row| row.get(0),
    )?;

    Ok(balance)
}

/// Find every account whose cached balance differs from its ledger sum.
pub fn find_balance_drift(connection: &Connection) -> Result<Vec<BalanceDrift>, Error> {
    connection
        .prepare(
            "SELECT account.id, account.balance, COALESCE(SUM(ledger.debit - ledger.credit), 0)
             FROM account LEFT JOIN ledger ON ledger.account_id = account.id
             GROUP BY account.id
             HAVING account.balance != COALESCE(SUM(ledger.debit - ledger.credit), 0)
             ORDER BY account.id ASC",
        )?
        .query_map([], |row| {
            Ok(BalanceDrift {
                account_id: row.get(0)?,
                cached: row.get(1)?,
                ledger: row.get(2)?,
            })
        })?
        .map(|maybe_drift| maybe_drift.map_err(Error::from))
        .collect()
}
