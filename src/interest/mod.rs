//! Periodic interest on positive balances and the endpoint that triggers it.

mod accrual;
mod cron_endpoint;

pub use accrual::{
    ACCRUAL_TOLERANCE, Accrual, AccrualSummary, accrue_account, accrue_interest, interest_note,
    is_due,
};
pub use cron_endpoint::{CronState, InterestQuery, apply_interest_endpoint};
