//! Accounts, their queries and the pages and endpoints that list them.

mod accounts_endpoint;
mod accounts_page;
mod core;

pub use accounts_endpoint::get_accounts_endpoint;
pub use accounts_page::get_accounts_page;
pub use core::{
    Account, AccountId, NewAccount, OPENING_BALANCE_NOTE, WORLD_ACCOUNT_ID, WORLD_ACCOUNT_NAME,
    create_account_table, create_world_account, get_account, get_accounts_for_owner,
    get_all_accounts, map_row_to_account, open_account,
};
