//! Accounts, the balance-holding entities that transfers move money between.

use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    money::{InterestRate, Money},
    transaction::{Overdraft, Posting, post_transfer},
};

/// The database ID of an account.
pub type AccountId = i64;

/// The reserved account that issues opening balances and interest payments.
///
/// It has no owner, is allowed to go negative and never earns interest.
pub const WORLD_ACCOUNT_ID: AccountId = 1000;

/// The display name of the [WORLD_ACCOUNT_ID] account.
pub const WORLD_ACCOUNT_NAME: &str = "World Bank";

/// The note on the transfer that funds a new account.
pub const OPENING_BALANCE_NOTE: &str = "Opening balance";

/// A Ken Kash account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user who may spend from the account, `None` for the World Account.
    pub owner_id: Option<UserID>,
    /// The name shown to the owner, e.g. "My account (Room 7)".
    pub name: String,
    /// The cached sum of the account's ledger entries.
    pub balance: Money,
    /// The fraction of the balance paid as interest each period.
    pub interest_rate: InterestRate,
    /// The length of an interest period. Zero or negative means the account never accrues.
    pub interest_period_days: i64,
    /// When interest was last credited, `None` if it never has been.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_accrued_at: Option<OffsetDateTime>,
    /// When the account was opened.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Account {
    /// Whether the World Account is the account.
    pub fn is_world_account(&self) -> bool {
        self.id == WORLD_ACCOUNT_ID
    }
}

/// The details needed to open an account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// The user who will own the account.
    pub owner_id: UserID,
    /// The display name of the account.
    pub name: String,
    /// Paid into the account from the World Account. May be zero.
    pub opening_balance: Money,
    /// See [Account::interest_rate].
    pub interest_rate: InterestRate,
    /// See [Account::interest_period_days].
    pub interest_period_days: i64,
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER REFERENCES user(id),
            name TEXT NOT NULL,
            balance INTEGER NOT NULL,
            interest_rate TEXT NOT NULL,
            interest_period_days INTEGER NOT NULL,
            last_accrued_at TEXT,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_owner ON account(owner_id);",
        (),
    )?;

    Ok(())
}

/// Insert the World Account if it does not exist yet.
pub fn create_world_account(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT OR IGNORE INTO account
            (id, owner_id, name, balance, interest_rate, interest_period_days, created_at)
         VALUES (?1, NULL, ?2, ?3, ?4, -1, ?5)",
        (
            WORLD_ACCOUNT_ID,
            WORLD_ACCOUNT_NAME,
            Money::ZERO,
            InterestRate::ZERO,
            OffsetDateTime::now_utc(),
        ),
    )?;

    Ok(())
}

const ACCOUNT_COLUMNS: &str = "id, owner_id, name, balance, interest_rate, \
    interest_period_days, last_accrued_at, created_at";

pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let owner_id: Option<i64> = row.get(1)?;

    Ok(Account {
        id: row.get(0)?,
        owner_id: owner_id.map(UserID::new),
        name: row.get(2)?,
        balance: row.get(3)?,
        interest_rate: row.get(4)?,
        interest_period_days: row.get(5)?,
        last_accrued_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Retrieve an account by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an account,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    let account = connection
        .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_row_to_account)?;

    Ok(account)
}

/// Get the accounts owned by `owner_id`, oldest first.
pub fn get_accounts_for_owner(
    owner_id: UserID,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE owner_id = :owner_id ORDER BY id ASC"
        ))?
        .query_map(&[(":owner_id", &owner_id.as_i64())], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Get every account, including the World Account, ordered by id.
pub fn get_all_accounts(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account ORDER BY id ASC"
        ))?
        .query_map([], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Open a new account for `new_account.owner_id` and fund it from the World Account.
///
/// The opening balance is posted as an ordinary transfer so the new balance
/// is backed by ledger entries and a history record. The account and its
/// funding commit together: inside the caller's transaction if one is open,
/// otherwise in a new one.
///
/// # Errors
/// Returns [Error::InvalidMoney] for a negative opening balance, or an SQL
/// related error if the account or its funding could not be written.
pub fn open_account(
    new_account: &NewAccount,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Account, Error> {
    if !connection.is_autocommit() {
        return insert_funded_account(new_account, now, connection);
    }

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;
    let account = insert_funded_account(new_account, now, &transaction)?;
    transaction.commit()?;

    Ok(account)
}

fn insert_funded_account(
    new_account: &NewAccount,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Account, Error> {
    if new_account.opening_balance < Money::ZERO {
        return Err(Error::InvalidMoney(format!(
            "opening balance {} is negative",
            new_account.opening_balance
        )));
    }

    let id: AccountId = connection
        .prepare(
            "INSERT INTO account
                (owner_id, name, balance, interest_rate, interest_period_days, created_at)
             VALUES (?1, ?2, 0, ?3, ?4, ?5)
             RETURNING id",
        )?
        .query_row(
            (
                new_account.owner_id.as_i64(),
                &new_account.name,
                new_account.interest_rate,
                new_account.interest_period_days,
                now,
            ),
            |row| row.get(0),
        )?;

    if new_account.opening_balance.is_positive() {
        post_transfer(
            &Posting {
                from: WORLD_ACCOUNT_ID,
                to: id,
                amount: new_account.opening_balance,
                note: OPENING_BALANCE_NOTE.to_owned(),
                created_at: now,
            },
            Overdraft::Allow,
            connection,
        )?;
    }

    get_account(id, connection)
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use crate::auth::create_user_table;

    use super::{create_account_table, create_world_account};

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");
        create_user_table(&connection).unwrap();

        assert_eq!(Ok(()), create_account_table(&connection));
        assert_eq!(Ok(()), create_world_account(&connection));
    }
}

#[cfg(test)]
mod account_query_tests {
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use crate::{
        Error,
        ledger::{get_ledger_entries, ledger_balance},
        money::{InterestRate, Money},
        test_utils::{get_test_connection, insert_test_user},
        transaction::get_transactions_for_account,
    };

    use super::{
        NewAccount, OPENING_BALANCE_NOTE, WORLD_ACCOUNT_ID, get_account, get_accounts_for_owner,
        get_all_accounts, open_account,
    };

    #[test]
    fn world_account_exists_after_initialize() {
        let conn = get_test_connection();

        let world = get_account(WORLD_ACCOUNT_ID, &conn).unwrap();

        assert!(world.is_world_account());
        assert_eq!(world.owner_id, None);
        assert_eq!(world.balance, Money::ZERO);
        assert_eq!(world.interest_period_days, -1);
    }

    #[test]
    fn missing_account_is_not_found() {
        let conn = get_test_connection();

        assert_eq!(get_account(42, &conn), Err(Error::NotFound));
    }

    #[test]
    fn open_account_funds_from_world_account() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "student@school.nz");
        let now = datetime!(2025-03-01 09:00 UTC);

        let account = open_account(
            &NewAccount {
                owner_id: owner,
                name: "My account (Room 7)".to_owned(),
                opening_balance: Money::from_cents(10_000),
                interest_rate: InterestRate::new(dec!(0.2) / dec!(365)),
                interest_period_days: 1,
            },
            now,
            &conn,
        )
        .unwrap();

        assert_eq!(account.owner_id, Some(owner));
        assert_eq!(account.balance, Money::from_cents(10_000));
        assert_eq!(account.interest_rate.as_decimal(), dec!(0.2) / dec!(365));
        assert_eq!(account.last_accrued_at, None);
        assert_eq!(account.created_at, now);

        let world = get_account(WORLD_ACCOUNT_ID, &conn).unwrap();
        assert_eq!(world.balance, Money::from_cents(-10_000));
        assert_eq!(ledger_balance(account.id, &conn), Ok(account.balance));
        assert_eq!(get_ledger_entries(account.id, &conn).unwrap().len(), 1);

        let history = get_transactions_for_account(account.id, 10, &conn).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_account_id, WORLD_ACCOUNT_ID);
        assert_eq!(history[0].note, OPENING_BALANCE_NOTE);
    }

    #[test]
    fn open_account_with_zero_balance_writes_no_history() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "student@school.nz");

        let account = open_account(
            &NewAccount {
                owner_id: owner,
                name: "Savings".to_owned(),
                opening_balance: Money::ZERO,
                interest_rate: InterestRate::ZERO,
                interest_period_days: -1,
            },
            datetime!(2025-03-01 09:00 UTC),
            &conn,
        )
        .unwrap();

        assert_eq!(account.balance, Money::ZERO);
        assert!(
            get_transactions_for_account(account.id, 10, &conn)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn open_account_rejects_negative_opening_balance() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "student@school.nz");

        let result = open_account(
            &NewAccount {
                owner_id: owner,
                name: "Overdrawn".to_owned(),
                opening_balance: Money::from_cents(-1),
                interest_rate: InterestRate::ZERO,
                interest_period_days: -1,
            },
            datetime!(2025-03-01 09:00 UTC),
            &conn,
        );

        assert!(matches!(result, Err(Error::InvalidMoney(_))));
        assert_eq!(get_all_accounts(&conn).unwrap().len(), 1);
    }

    #[test]
    fn lists_accounts_by_owner() {
        let conn = get_test_connection();
        let alice = insert_test_user(&conn, "alice@school.nz");
        let bob = insert_test_user(&conn, "bob@school.nz");
        let open = |owner, name: &str| {
            open_account(
                &NewAccount {
                    owner_id: owner,
                    name: name.to_owned(),
                    opening_balance: Money::from_cents(100),
                    interest_rate: InterestRate::ZERO,
                    interest_period_days: -1,
                },
                datetime!(2025-03-01 09:00 UTC),
                &conn,
            )
            .unwrap()
        };
        let alice_first = open(alice, "First");
        let _bob_account = open(bob, "Bob's");
        let alice_second = open(alice, "Second");

        let accounts = get_accounts_for_owner(alice, &conn).unwrap();

        assert_eq!(accounts, vec![alice_first, alice_second]);
        assert_eq!(get_all_accounts(&conn).unwrap().len(), 4);
    }
}
