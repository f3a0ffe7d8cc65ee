//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/accounts/{account_id}/transactions', use [format_endpoint].

/// The root route which redirects to the accounts page.
pub const ROOT: &str = "/";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/log_in";
/// The landing page for logged in users, lists their accounts and recent transactions.
pub const ACCOUNTS_VIEW: &str = "/accounts";

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to list the caller's accounts.
pub const ACCOUNTS_API: &str = "/api/accounts";
/// The route to list the transaction history of one account.
pub const ACCOUNT_TRANSACTIONS_API: &str = "/api/accounts/{account_id}/transactions";
/// The route to list the ledger rows of one account next to its cached balance.
pub const ACCOUNT_LEDGER_API: &str = "/api/accounts/{account_id}/ledger";
/// The route to move money between two accounts.
pub const TRANSFERS_API: &str = "/api/transfers";
/// The route to create a class.
pub const CLASSES_API: &str = "/api/classes";
/// The route to join a class with a class code.
pub const JOIN_CLASS_API: &str = "/api/classes/join";
/// The route for a class admin to list every account in the class.
pub const CLASS_ACCOUNTS_API: &str = "/api/classes/{class_code}/accounts";
/// The route for a class admin to page through the transactions in the class.
pub const CLASS_TRANSACTIONS_API: &str = "/api/classes/{class_code}/transactions";
/// The route the scheduler calls to pay interest.
pub const CRON_INTEREST_API: &str = "/api/cron/interest";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/accounts/{account_id}', '{account_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
