//! Creates the application's schema.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    account::{create_account_table, create_world_account},
    auth::create_user_table,
    class::{create_class_table, create_enrollment_table},
    ledger::create_ledger_table,
    transaction::create_transaction_table,
};

/// Create every table and the World Account if they do not already exist.
///
/// Safe to call on an existing database.
///
/// # Errors
/// Returns an error if foreign keys cannot be enabled or any table cannot be
/// created. No table is created in that case.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_ledger_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_class_table(&transaction)?;
    create_enrollment_table(&transaction)?;
    create_world_account(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use crate::{
        account::{WORLD_ACCOUNT_ID, WORLD_ACCOUNT_NAME, get_account, get_all_accounts},
        money::Money,
    };

    use super::initialize;

    #[test]
    fn creates_world_account() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let world = get_account(WORLD_ACCOUNT_ID, &conn).unwrap();
        assert_eq!(world.name, WORLD_ACCOUNT_NAME);
        assert_eq!(world.owner_id, None);
        assert_eq!(world.balance, Money::ZERO);
    }

    #[test]
    fn can_initialize_twice() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();
        initialize(&conn).unwrap();

        assert_eq!(get_all_accounts(&conn).unwrap().len(), 1);
    }

    #[test]
    fn enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }
}
