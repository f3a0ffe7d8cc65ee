//! Transfers between accounts and the transaction history they leave behind.
//!
//! This module contains:
//! - The transfer engine, the only code that changes account balances
//! - The `TransactionRecord` history model and its queries
//! - Route handlers for sending money and reading history

mod core;
mod history_endpoint;
mod transfer;
mod transfer_endpoint;

pub use core::{
    DEFAULT_HISTORY_COUNT, TransactionId, TransactionRecord, count_transactions_for_class,
    create_transaction_table, get_recent_transactions_for_owner, get_transactions_for_account,
    get_transactions_for_class,
};
pub use history_endpoint::get_account_transactions_endpoint;
pub use transfer::{TransferError, TransferRequest, transfer};
pub(crate) use transfer::{Overdraft, Posting, post_transfer};
pub use transfer_endpoint::create_transfer_endpoint;

#[cfg(test)]
pub use core::count_transactions;
