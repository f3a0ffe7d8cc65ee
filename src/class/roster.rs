//! What a class admin can see: every account in the class and the money
//! moving in and out of them.

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    account::{Account, map_row_to_account},
    auth::UserID,
    class::{
        Class, ClassError, Role, get_live_class_by_code, get_role_in_class, normalize_class_code,
    },
    transaction::{TransactionRecord, count_transactions_for_class, get_transactions_for_class},
};

/// How many transactions a page holds when the caller does not ask for a size.
pub const DEFAULT_CLASS_PAGE_SIZE: u32 = 50;

/// The largest page of class transactions a single request may ask for.
pub const MAX_CLASS_PAGE_SIZE: u32 = 100;

/// A checking account in a class and who holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassAccount {
    /// The enrolled account.
    #[serde(flatten)]
    pub account: Account,
    /// The email of the account's owner.
    pub email: String,
    /// The owner's role in the class.
    pub role: Role,
}

/// One page of a class's transactions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassTransactions {
    /// The transactions on this page.
    pub transactions: Vec<TransactionRecord>,
    /// The page number, starting at 1.
    pub page: u32,
    /// The most transactions a page can hold.
    pub page_size: u32,
    /// The number of transactions across every page.
    pub total_records: u32,
}

/// Get the live class with `class_code` if `user_id` is one of its admins.
///
/// # Errors
/// Returns [ClassError::InvalidClassCode] for a malformed code,
/// [ClassError::ClassNotFound] if no live class has the code, or
/// [ClassError::NotAdmin] if the user is a student in the class or not in it
/// at all.
pub fn get_class_as_admin(
    user_id: UserID,
    class_code: &str,
    connection: &Connection,
) -> Result<Class, ClassError> {
    let class_code = normalize_class_code(class_code)?;

    let class = get_live_class_by_code(&class_code, connection)?
        .ok_or_else(|| ClassError::ClassNotFound(class_code.clone()))?;

    match get_role_in_class(user_id, class.id, connection)? {
        Some(Role::Admin) => Ok(class),
        role => {
            tracing::debug!(
                "User {user_id} with role {role:?} tried to manage class {}",
                class.id
            );
            Err(ClassError::NotAdmin)
        }
    }
}

/// Get every enrolled checking account in the class with `class_code`, in
/// the order their owners enrolled.
///
/// # Errors
/// Fails like [get_class_as_admin] unless `user_id` is an admin of the class.
pub fn get_class_accounts(
    user_id: UserID,
    class_code: &str,
    connection: &Connection,
) -> Result<Vec<ClassAccount>, ClassError> {
    let class = get_class_as_admin(user_id, class_code, connection)?;

    connection
        .prepare(
            "SELECT account.id, account.owner_id, account.name, account.balance,
                    account.interest_rate, account.interest_period_days,
                    account.last_accrued_at, account.created_at,
                    user.email, enrollment.role
             FROM enrollment
             INNER JOIN account ON account.id = enrollment.checking_account_id
             INNER JOIN user ON user.id = enrollment.user_id
             WHERE enrollment.class_id = ?1
             ORDER BY enrollment.id ASC",
        )?
        .query_map([class.id], |row| {
            Ok(ClassAccount {
                account: map_row_to_account(row)?,
                email: row.get(8)?,
                role: row.get(9)?,
            })
        })?
        .map(|maybe_account| maybe_account.map_err(ClassError::from))
        .collect()
}

/// Get page `page` of the transactions touching any account in the class
/// with `class_code`.
///
/// Pages start at 1. A page of 0 is treated as 1 and `page_size` is clamped
/// to `1..=MAX_CLASS_PAGE_SIZE`.
///
/// # Errors
/// Fails like [get_class_as_admin] unless `user_id` is an admin of the class.
pub fn get_class_transactions(
    user_id: UserID,
    class_code: &str,
    page: u32,
    page_size: u32,
    connection: &Connection,
) -> Result<ClassTransactions, ClassError> {
    let class = get_class_as_admin(user_id, class_code, connection)?;

    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_CLASS_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(page_size);

    let transactions = get_transactions_for_class(class.id, page_size, offset, connection)?;
    let total_records = count_transactions_for_class(class.id, connection)?;

    Ok(ClassTransactions {
        transactions,
        page,
        page_size,
        total_records,
    })
}
