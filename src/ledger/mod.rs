//! The append-only double-entry ledger behind every account balance.
//!
//! Each transfer writes two rows: a credit on the account money leaves and a
//! debit on the account money arrives in. An account's balance is the sum of
//! its debits minus the sum of its credits.

mod core;
mod ledger_endpoint;

pub use core::{
    BalanceDrift, LedgerEntry, create_ledger_table, find_balance_drift, get_ledger_entries,
    insert_ledger_pair, ledger_balance,
};
pub use ledger_endpoint::{LedgerState, get_account_ledger_endpoint};
