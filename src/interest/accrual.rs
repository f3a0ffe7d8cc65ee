//! The interest accrual job.
//!
//! Each run pays one period of interest to every due account. A payment is an
//! ordinary transfer from the World Account, written in its own transaction
//! together with the account's `last_accrued_at`, so one account failing does
//! not stop or undo payments to the others.

use std::collections::HashSet;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    account::{Account, AccountId, WORLD_ACCOUNT_ID, get_account, get_all_accounts},
    money::Money,
    transaction::{Overdraft, Posting, TransactionRecord, post_transfer},
};

/// How early a run may pay interest before a full period has passed.
///
/// Lets a daily schedule that fires a few seconds early still pay every day.
pub const ACCRUAL_TOLERANCE: Duration = Duration::hours(1);

const SECONDS_PER_DAY: i64 = 86_400;

/// The counts from one accrual run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccrualSummary {
    /// Accounts that were paid interest.
    pub credited: usize,
    /// Accounts that were not due or whose interest rounded down to zero.
    pub skipped: usize,
    /// Accounts that could not be paid because of an error.
    pub failed: usize,
}

/// The history note for an interest payment.
pub fn interest_note(interest: Money) -> String {
    format!("You earned ${interest} in interest! 🎉")
}

/// Whether `account` should be paid interest at `now`.
///
/// An account is due when it has a positive balance, a positive rate and a
/// positive period, is not the World Account, and has not been paid within
/// the current period.
pub fn is_due(account: &Account, now: OffsetDateTime) -> bool {
    if account.is_world_account()
        || !account.balance.is_positive()
        || !account.interest_rate.is_positive()
        || account.interest_period_days <= 0
    {
        return false;
    }

    match account.last_accrued_at {
        None => true,
        // A period too long to represent is never due.
        Some(last_accrued_at) => account
            .interest_period_days
            .checked_mul(SECONDS_PER_DAY)
            .map(Duration::seconds)
            .and_then(|period| period.checked_sub(ACCRUAL_TOLERANCE))
            .and_then(|period| last_accrued_at.checked_add(period))
            .is_some_and(|next_due| now >= next_due),
    }
}

/// The outcome of accruing interest for one account.
#[derive(Debug, Clone, PartialEq)]
pub enum Accrual {
    /// Interest was paid with the given transfer.
    Credited(TransactionRecord),
    /// The account was not due or its interest rounded down to zero.
    Skipped,
}

/// Pay one period of interest to `account_id` if it is due.
///
/// The account is re-read under an immediate transaction so the interest is
/// computed from the balance that is actually committed.
///
/// # Errors
/// Returns an error if the account cannot be read, the interest overflows, or
/// any write fails. Nothing is written in that case.
pub fn accrue_account(
    account_id: AccountId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Accrual, Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;
    let account = get_account(account_id, &transaction)?;

    if !is_due(&account, now) {
        return Ok(Accrual::Skipped);
    }

    let interest = account.balance.interest_at(account.interest_rate)?;

    if !interest.is_positive() {
        return Ok(Accrual::Skipped);
    }

    let record = post_transfer(
        &Posting {
            from: WORLD_ACCOUNT_ID,
            to: account.id,
            amount: interest,
            note: interest_note(interest),
            created_at: now,
        },
        Overdraft::Allow,
        &transaction,
    )?;

    transaction.execute(
        "UPDATE account SET last_accrued_at = ?1 WHERE id = ?2",
        (now, account.id),
    )?;

    transaction.commit()?;

    Ok(Accrual::Credited(record))
}

/// Pay interest to every due account, or only to those in `account_ids`.
///
/// Ids that do not refer to an account are ignored. Failures are logged and
/// counted, and the run carries on with the next account.
///
/// # Errors
/// Returns an error only if the list of accounts cannot be loaded.
pub fn accrue_interest(
    account_ids: Option<&[AccountId]>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<AccrualSummary, Error> {
    let wanted: Option<HashSet<AccountId>> = account_ids.map(|ids| ids.iter().copied().collect());
    let accounts = get_all_accounts(connection)
        .inspect_err(|error| tracing::error!("Could not load accounts for interest: {error}"))?;

    let mut summary = AccrualSummary::default();

    for account in accounts {
        if wanted
            .as_ref()
            .is_some_and(|wanted| !wanted.contains(&account.id))
        {
            continue;
        }

        if !is_due(&account, now) {
            summary.skipped += 1;
            continue;
        }

        match accrue_account(account.id, now, connection) {
            Ok(Accrual::Credited(record)) => {
                tracing::debug!("Paid {} interest to account {}", record.amount, account.id);
                summary.credited += 1;
            }
            Ok(Accrual::Skipped) => summary.skipped += 1,
            Err(error) => {
                tracing::error!("Could not pay interest to account {}: {error}", account.id);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Interest run finished: {} credited, {} skipped, {} failed",
        summary.credited,
        summary.skipped,
        summary.failed
    );

    Ok(summary)
}


#[cfg(test)]
mod accrue_interest_tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        account::{Account, NewAccount, WORLD_ACCOUNT_ID, get_account, get_all_accounts, open_account},
        ledger::{find_balance_drift, get_ledger_entries},
        money::{InterestRate, Money},
        test_utils::{get_test_connection, insert_test_user},
        transaction::{count_transactions, get_transactions_for_account},
    };

    use super::{AccrualSummary, accrue_interest};

    const NOW: OffsetDateTime = datetime!(2025-03-01 00:00 UTC);

    fn open(conn: &Connection, email: &str, cents: i64, rate: Decimal) -> Account {
        let owner = insert_test_user(conn, email);
        open_account(
            &NewAccount {
                owner_id: owner,
                name: format!("{email}'s account"),
                opening_balance: Money::from_cents(cents),
                interest_rate: InterestRate::new(rate),
                interest_period_days: 1,
            },
            NOW - Duration::days(30),
            conn,
        )
        .unwrap()
    }

    fn balance(conn: &Connection, account: &Account) -> Money {
        get_account(account.id, conn).unwrap().balance
    }

    #[test]
    fn credits_interest_from_world_account() {
        let conn = get_test_connection();
        let account = open(&conn, "a@school.nz", 10_000, dec!(0.05));
        let world_before = get_account(WORLD_ACCOUNT_ID, &conn).unwrap().balance;

        let summary = accrue_interest(None, NOW, &conn).unwrap();

        assert_eq!(
            summary,
            AccrualSummary {
                credited: 1,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(balance(&conn, &account), Money::from_cents(10_500));
        assert_eq!(
            get_account(WORLD_ACCOUNT_ID, &conn).unwrap().balance,
            Money::from_cents(world_before.cents() - 500)
        );

        let history = get_transactions_for_account(account.id, 1, &conn).unwrap();
        assert_eq!(history[0].from_account_id, WORLD_ACCOUNT_ID);
        assert_eq!(history[0].to_account_id, account.id);
        assert_eq!(history[0].amount, Money::from_cents(500));
        assert_eq!(history[0].note, "You earned $5.00 in interest! 🎉");

        let entries = get_ledger_entries(account.id, &conn).unwrap();
        assert_eq!(entries.last().unwrap().debit, Money::from_cents(500));
        assert_eq!(find_balance_drift(&conn), Ok(vec![]));
        assert_eq!(
            get_account(account.id, &conn).unwrap().last_accrued_at,
            Some(NOW)
        );
    }

    #[test]
    fn interest_is_truncated_not_rounded() {
        let conn = get_test_connection();
        let account = open(&conn, "a@school.nz", 1_000, dec!(0.333));
        let almost_a_cent_more = open(&conn, "b@school.nz", 1_999, dec!(0.5));

        accrue_interest(None, NOW, &conn).unwrap();

        assert_eq!(balance(&conn, &account), Money::from_cents(1_333));
        assert_eq!(balance(&conn, &almost_a_cent_more), Money::from_cents(1_999 + 999));
    }

    #[test]
    fn daily_student_rate_pays_five_cents_on_one_hundred() {
        let conn = get_test_connection();
        let account = open(&conn, "a@school.nz", 10_000, dec!(0.2) / dec!(365));

        accrue_interest(None, NOW, &conn).unwrap();

        assert_eq!(balance(&conn, &account), Money::from_cents(10_005));
    }

    #[test]
    fn interest_below_one_cent_is_skipped_without_side_effects() {
        let conn = get_test_connection();
        let account = open(&conn, "a@school.nz", 100, dec!(0.001));
        let history_before = count_transactions(&conn).unwrap();

        let summary = accrue_interest(None, NOW, &conn).unwrap();

        assert_eq!(summary.credited, 0);
        assert_eq!(balance(&conn, &account), Money::from_cents(100));
        assert_eq!(count_transactions(&conn), Ok(history_before));
        assert_eq!(get_account(account.id, &conn).unwrap().last_accrued_at, None);
    }

    #[test]
    fn world_account_never_earns_interest() {
        let conn = get_test_connection();
        conn.execute(
            "UPDATE account SET balance = 100000, interest_rate = '0.5', interest_period_days = 1
             WHERE id = ?1",
            [WORLD_ACCOUNT_ID],
        )
        .unwrap();

        let summary = accrue_interest(Some(&[WORLD_ACCOUNT_ID]), NOW, &conn).unwrap();

        assert_eq!(summary.credited, 0);
        assert_eq!(
            get_account(WORLD_ACCOUNT_ID, &conn).unwrap().balance,
            Money::from_cents(100_000)
        );
        assert_eq!(count_transactions(&conn), Ok(0));
    }

    #[test]
    fn second_run_in_same_period_does_not_double_credit() {
        let conn = get_test_connection();
        let account = open(&conn, "a@school.nz", 10_000, dec!(0.05));

        accrue_interest(None, NOW, &conn).unwrap();
        let second = accrue_interest(None, NOW + Duration::hours(2), &conn).unwrap();
        assert_eq!(second.credited, 0);
        assert_eq!(balance(&conn, &account), Money::from_cents(10_500));

        let next_day = accrue_interest(None, NOW + Duration::days(1), &conn).unwrap();
        assert_eq!(next_day.credited, 1);
        assert_eq!(balance(&conn, &account), Money::from_cents(11_025));
    }

    #[test]
    fn only_listed_accounts_are_considered() {
        let conn = get_test_connection();
        let listed = open(&conn, "a@school.nz", 10_000, dec!(0.05));
        let unlisted = open(&conn, "b@school.nz", 10_000, dec!(0.05));

        let summary = accrue_interest(Some(&[listed.id, 424_242]), NOW, &conn).unwrap();

        assert_eq!(
            summary,
            AccrualSummary {
                credited: 1,
                skipped: 0,
                failed: 0
            }
        );
        assert_eq!(balance(&conn, &listed), Money::from_cents(10_500));
        assert_eq!(balance(&conn, &unlisted), Money::from_cents(10_000));
    }

    #[test]
    fn one_failure_does_not_stop_the_run() {
        let conn = get_test_connection();
        let broken = open(&conn, "a@school.nz", 10_000, dec!(0.05));
        let healthy = open(&conn, "b@school.nz", 10_000, dec!(0.05));
        conn.execute(
            &format!(
                "CREATE TRIGGER fail_one BEFORE INSERT ON ledger
                 WHEN NEW.account_id = {}
                 BEGIN SELECT RAISE(ABORT, 'disk on fire'); END;",
                broken.id
            ),
            (),
        )
        .unwrap();

        let summary = accrue_interest(None, NOW, &conn).unwrap();

        assert_eq!(summary.credited, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(balance(&conn, &broken), Money::from_cents(10_000));
        assert_eq!(get_account(broken.id, &conn).unwrap().last_accrued_at, None);
        assert_eq!(balance(&conn, &healthy), Money::from_cents(10_500));
        let total: i64 = get_all_accounts(&conn)
            .unwrap()
            .iter()
            .map(|account| account.balance.cents())
            .sum();
        assert_eq!(total, 0);
    }
}
