//! Ken Kash is a play-money bank for classrooms.
//!
//! Teachers create a class and get a well funded checking account, students
//! join with a six character class code and get a small account that earns
//! daily interest. Money moves between accounts with double-entry transfers,
//! and interest is paid by a job triggered over HTTP.
//!
//! This library provides a JSON API and a couple of server-rendered HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod class;
mod db;
mod endpoints;
mod error;
mod html;
mod interest;
mod ledger;
mod logging;
mod money;
mod routing;
#[cfg(test)]
mod test_utils;
mod transaction;

pub use account::{
    Account, AccountId, NewAccount, WORLD_ACCOUNT_ID, get_account, get_accounts_for_owner,
    get_all_accounts, open_account,
};
pub use app_state::{AppState, create_cookie_key};
pub use auth::{PasswordHash, User, UserID, ValidatedPassword, create_user, get_user_by_email};
pub use class::{
    Class, ClassError, Enrollment, Membership, Role, create_class, get_enrollments_for_user,
    join_class,
};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use interest::{AccrualSummary, accrue_interest};
pub use ledger::{
    BalanceDrift, LedgerEntry, find_balance_drift, get_ledger_entries, ledger_balance,
};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use money::{InterestRate, Money};
pub use routing::build_router;
pub use transaction::{
    TransactionRecord, TransferError, TransferRequest, get_transactions_for_account, transfer,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl+C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not listen for the terminate signal: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
