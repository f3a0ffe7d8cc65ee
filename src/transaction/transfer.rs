//! The transfer engine: validates and atomically executes a movement of money
//! between two accounts.
//!
//! A successful transfer writes two ledger rows, updates both cached balances
//! and appends one history record, all inside one SQLite transaction.

use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    account::{Account, AccountId, get_account},
    auth::UserID,
    error::{GENERIC_ERROR_MESSAGE, error_response},
    ledger::insert_ledger_pair,
    money::Money,
    transaction::{TransactionRecord, core::insert_transaction},
};

/// A request to move money out of one of the caller's accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// The account to take money from, owned by the caller.
    pub from_account_id: AccountId,
    /// The account to pay.
    pub to_account_id: AccountId,
    /// Must be positive and in whole cents.
    pub amount: Decimal,
    /// What the transfer is for. Defaults to an empty note.
    #[serde(default)]
    pub note: String,
}

/// Why a transfer was not executed.
///
/// Every variant means no ledger row, history record or balance change was
/// written.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransferError {
    /// Either account does not exist.
    #[error("account {0} does not exist")]
    AccountNotFound(AccountId),

    /// The caller tried to spend from someone else's account.
    #[error("the caller does not own the source account")]
    NotOwner,

    /// The source and destination are the same account.
    #[error("the source and destination accounts are the same")]
    SameAccount,

    /// The amount was zero, negative, had a fraction of a cent or would overflow.
    #[error("the amount is not a positive number of whole cents")]
    InvalidAmount,

    /// The source balance is less than the amount.
    #[error("the source account cannot cover the amount")]
    InsufficientFunds,

    /// The writes could not be committed and were rolled back.
    #[error("the transfer could not be committed")]
    Persistence,
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        match self {
            TransferError::AccountNotFound(_) => {
                error_response(StatusCode::NOT_FOUND, "Account not found.")
            }
            TransferError::NotOwner => {
                error_response(StatusCode::FORBIDDEN, "You do not own that account.")
            }
            TransferError::SameAccount => error_response(
                StatusCode::BAD_REQUEST,
                "You cannot send money to the same account.",
            ),
            TransferError::InvalidAmount => error_response(
                StatusCode::BAD_REQUEST,
                "Amount must be greater than zero and in whole cents.",
            ),
            TransferError::InsufficientFunds => {
                error_response(StatusCode::UNPROCESSABLE_ENTITY, "Insufficient funds.")
            }
            TransferError::Persistence => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE)
            }
        }
    }
}

/// Whether a posting may take the source account below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Overdraft {
    /// Only the World Account may be overdrawn.
    Allow,
    /// The debit fails if the source balance is too low.
    Deny,
}

/// An already validated movement of money, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Posting {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Money,
    pub note: String,
    pub created_at: OffsetDateTime,
}

/// Write the ledger pair, both balance updates and the history record for `posting`.
///
/// Balances are changed with atomic increments rather than read-modify-write.
/// With [Overdraft::Deny] the debit only applies if the source can cover it.
/// This does not open a transaction; the caller must run it inside one and
/// roll back on error.
///
/// # Errors
/// Returns [Error::LedgerWriteFailure] or [Error::BalanceUpdateFailure] naming
/// the account that could not be written, [Error::InvalidMoney] for a
/// non-positive amount, or an SQL error if the history record failed.
pub(crate) fn post_transfer(
    posting: &Posting,
    overdraft: Overdraft,
    connection: &Connection,
) -> Result<TransactionRecord, Error> {
    if !posting.amount.is_positive() {
        return Err(Error::InvalidMoney(format!(
            "cannot post a transfer of {}",
            posting.amount
        )));
    }

    insert_ledger_pair(
        posting.from,
        posting.to,
        posting.amount,
        posting.created_at,
        connection,
    )
    .map_err(|error| {
        tracing::error!(
            "Could not write ledger entries for transfer {} -> {}: {error}",
            posting.from,
            posting.to
        );
        Error::LedgerWriteFailure(posting.from)
    })?;

    let debit_sql = match overdraft {
        Overdraft::Allow => "UPDATE account SET balance = balance - ?1 WHERE id = ?2",
        Overdraft::Deny => "UPDATE account SET balance = balance - ?1 WHERE id = ?2 AND balance >= ?1",
    };
    update_balance(debit_sql, posting.from, posting.amount, connection)?;
    update_balance(
        "UPDATE account SET balance = balance + ?1 WHERE id = ?2",
        posting.to,
        posting.amount,
        connection,
    )?;

    insert_transaction(
        posting.from,
        posting.to,
        posting.amount,
        &posting.note,
        posting.created_at,
        connection,
    )
    .map_err(Error::from)
}

fn update_balance(
    sql: &str,
    account_id: AccountId,
    amount: Money,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection
        .prepare_cached(sql)
        .and_then(|mut statement| statement.execute((amount, account_id)))
        .map_err(|error| {
            tracing::error!("Could not update the balance of account {account_id}: {error}");
            Error::BalanceUpdateFailure(account_id)
        })?;

    if rows_updated != 1 {
        tracing::error!(
            "Balance update for account {account_id} matched {rows_updated} rows, expected 1"
        );
        return Err(Error::BalanceUpdateFailure(account_id));
    }

    Ok(())
}

fn persistence_failure(operation: &str, error: impl Display) -> TransferError {
    tracing::error!("Transfer failed while {operation}: {error}");
    TransferError::Persistence
}

fn load_account(id: AccountId, connection: &Connection) -> Result<Account, TransferError> {
    match get_account(id, connection) {
        Ok(account) => Ok(account),
        Err(Error::NotFound) => Err(TransferError::AccountNotFound(id)),
        Err(error) => Err(persistence_failure(
            &format!("loading account {id}"),
            error,
        )),
    }
}

/// Move `request.amount` from `request.from_account_id` to `request.to_account_id`
/// on behalf of `caller`.
///
/// Checks run in this order, and the first failure is returned:
/// 1. the amount is positive and in whole cents,
/// 2. the accounts differ,
/// 3. both accounts exist,
/// 4. `caller` owns the source account,
/// 5. the source balance covers the amount.
///
/// The balance check and the writes happen under one immediate (write-locked)
/// SQLite transaction, so two transfers out of the same account cannot both
/// spend the same balance.
///
/// # Errors
/// Returns a [TransferError]. In every case nothing has been written.
pub fn transfer(
    caller: UserID,
    request: &TransferRequest,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<TransactionRecord, TransferError> {
    let amount = Money::try_from(request.amount).map_err(|_| TransferError::InvalidAmount)?;

    if !amount.is_positive() {
        return Err(TransferError::InvalidAmount);
    }

    if request.from_account_id == request.to_account_id {
        return Err(TransferError::SameAccount);
    }

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)
        .map_err(|error| persistence_failure("starting the database transaction", error))?;

    let from = load_account(request.from_account_id, &transaction)?;
    let to = load_account(request.to_account_id, &transaction)?;

    if from.owner_id != Some(caller) {
        return Err(TransferError::NotOwner);
    }

    if from.balance < amount {
        return Err(TransferError::InsufficientFunds);
    }

    if to.balance.checked_add(amount).is_none() {
        return Err(TransferError::InvalidAmount);
    }

    let record = post_transfer(
        &Posting {
            from: from.id,
            to: to.id,
            amount,
            note: request.note.clone(),
            created_at: now,
        },
        Overdraft::Deny,
        &transaction,
    )
    .map_err(|error| {
        persistence_failure(
            &format!("writing transfer {} -> {}", from.id, to.id),
            error,
        )
    })?;

    transaction
        .commit()
        .map_err(|error| persistence_failure("committing", error))?;

    tracing::info!(
        "Transferred {} from account {} to account {}",
        record.amount,
        record.from_account_id,
        record.to_account_id
    );

    Ok(record)
}
