#![allow(missing_docs)]

pub(crate) mod db;
pub(crate) mod html;

pub(crate) use db::{get_test_connection, insert_test_user, open_test_account};
pub(crate) use html::{assert_valid_html, parse_html_document};
