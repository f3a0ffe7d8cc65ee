//! Displays the caller's accounts and their most recent transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    account::{Account, AccountId, get_accounts_for_owner},
    auth::{UserID, get_user_by_id},
    endpoints::{self, format_endpoint},
    html::{
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        format_currency, link,
    },
    transaction::{DEFAULT_HISTORY_COUNT, TransactionRecord, get_recent_transactions_for_owner},
};

/// The state needed for the [get_accounts_page](crate::account::get_accounts_page) route handler.
#[derive(Debug, Clone)]
pub struct AccountsPageState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

const TIMESTAMP_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

fn account_label(id: AccountId, accounts: &[Account]) -> String {
    accounts
        .iter()
        .find(|account| account.id == id)
        .map(|account| account.name.clone())
        .unwrap_or_else(|| format!("Account #{id}"))
}

fn accounts_view(email: &str, accounts: &[Account], transactions: &[TransactionRecord]) -> Markup {
    let content = html!(
        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    div
                    {
                        h1 class="text-xl font-bold" { "Accounts" }
                        p class="text-sm" { "Logged in as " (email) }
                    }

                    (link(endpoints::LOG_OUT, "Log out"))
                }

                table id="accounts" class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Account number" }
                            th scope="col" class="px-6 py-3 text-right" { "Balance" }
                        }
                    }

                    tbody
                    {
                        @for account in accounts {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                th
                                    scope="row"
                                    class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                                {
                                    (account.name)
                                }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (link(
                                        &format_endpoint(endpoints::ACCOUNT_TRANSACTIONS_API, account.id),
                                        &account.id.to_string(),
                                    ))
                                }
                                td class="px-6 py-4 text-right" { (format_currency(account.balance)) }
                            }
                        }

                        @if accounts.is_empty() {
                            tr
                            {
                                td colspan="3" class="px-6 py-4 text-center"
                                {
                                    "You have no accounts yet. Join a class with a class code to open one."
                                }
                            }
                        }
                    }
                }

                h2 class="text-lg font-bold" { "Recent transactions" }

                table id="transactions" class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "From" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "To" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Note" }
                            th scope="col" class="px-6 py-3 text-right" { "Amount" }
                        }
                    }

                    tbody
                    {
                        @for transaction in transactions {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (format_timestamp(transaction.created_at))
                                }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (account_label(transaction.from_account_id, accounts))
                                }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (account_label(transaction.to_account_id, accounts))
                                }
                                td class=(TABLE_CELL_STYLE) { (transaction.note) }
                                td class="px-6 py-4 text-right" { (format_currency(transaction.amount)) }
                            }
                        }

                        @if transactions.is_empty() {
                            tr
                            {
                                td colspan="5" class="px-6 py-4 text-center" { "No transactions yet." }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Accounts", &content)
}

/// Renders the accounts page for the logged in user.
pub async fn get_accounts_page(
    State(state): State<AccountsPageState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)
        .inspect_err(|error| tracing::error!("could not get user {user_id}: {error}"))?;
    let accounts = get_accounts_for_owner(user_id, &connection)
        .inspect_err(|error| tracing::error!("could not get accounts for user {user_id}: {error}"))?;
    let transactions =
        get_recent_transactions_for_owner(user_id, DEFAULT_HISTORY_COUNT, &connection)
            .inspect_err(|error| {
                tracing::error!("could not get transactions for user {user_id}: {error}")
            })?;

    Ok(accounts_view(&user.email, &accounts, &transactions).into_response())
}
