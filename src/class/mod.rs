//! Classes: creating one opens the admin's checking account, joining one opens
//! a student account, and admins can see every account and transaction in
//! their class.

mod core;
mod endpoints;
mod roster;
mod roster_endpoints;

pub use core::{
    ADMIN_OPENING_BALANCE, CLASS_CODE_LENGTH, Class, ClassError, ClassId, Enrollment, Membership,
    Role, STUDENT_INTEREST_PERIOD_DAYS, STUDENT_OPENING_BALANCE, create_class,
    create_class_table, create_enrollment_table, get_enrollments_for_user,
    get_live_class_by_code, get_role_in_class, join_class, normalize_class_code,
    student_interest_rate,
};
pub use endpoints::{
    ClassState, CreateClassRequest, JoinClassRequest, create_class_endpoint, join_class_endpoint,
};
pub use roster::{
    ClassAccount, ClassTransactions, DEFAULT_CLASS_PAGE_SIZE, MAX_CLASS_PAGE_SIZE,
    get_class_accounts, get_class_as_admin, get_class_transactions,
};
pub use roster_endpoints::{
    ClassTransactionsQuery, get_class_accounts_endpoint, get_class_transactions_endpoint,
};
