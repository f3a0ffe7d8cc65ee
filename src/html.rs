use std::sync::OnceLock;

use maud::{DOCTYPE, Markup, html};
use numfmt::{Formatter, Precision, Scales};

use crate::money::Money;

pub const LINK_STYLE: &str = "text-blue-600 hover:text-blue-500 \
    dark:text-blue-500 dark:hover:text-blue-400 underline";

pub const BUTTON_PRIMARY_STYLE: &str = "w-full px-4 py-2 bg-blue-500 \
    dark:bg-blue-600 disabled:bg-blue-700 hover:enabled:bg-blue-600 \
    hover:enabled:dark:bg-blue-700 text-white rounded";

pub const FORM_LABEL_STYLE: &str = "block mb-2 text-sm font-medium text-gray-900 dark:text-white";
pub const FORM_TEXT_INPUT_STYLE: &str = "block w-full p-2.5 rounded text-sm \
    text-gray-900 dark:text-white bg-gray-50 dark:bg-gray-700 border \
    border-gray-300 dark:border-gray-600 focus:ring-blue-600 focus:border-blue-600";

pub const TABLE_HEADER_STYLE: &str = "text-xs text-gray-700 uppercase \
    bg-gray-50 dark:bg-gray-700 dark:text-gray-400";
pub const TABLE_ROW_STYLE: &str = "bg-white border-b dark:bg-gray-800 dark:border-gray-700";
pub const TABLE_CELL_STYLE: &str = "px-6 py-4";

pub const PAGE_CONTAINER_STYLE: &str =
    "flex flex-col items-center px-6 py-8 mx-auto lg:py-5 text-gray-900 dark:text-white";

pub fn base(title: &str, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en"
        {
            head
            {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " - Ken Kash" }
            }

            body class="container max-w-full min-h-screen bg-gray-50 dark:bg-gray-900"
            {
                (content)
            }
        }
    }
}

pub fn log_in_register(form_title: &str, form: &Markup) -> Markup {
    html! {
        div class="flex flex-col items-center justify-center px-6 py-8 mx-auto"
        {
            span class="flex items-center mb-6 text-2xl font-semibold text-gray-900 dark:text-white"
            {
                "Ken Kash"
            }

            div class="w-full bg-white rounded-lg shadow dark:border md:mt-0 sm:max-w-md xl:p-0 dark:bg-gray-800 dark:border-gray-700"
            {
                div class="p-6 space-y-4 md:space-y-6 sm:p-8"
                {
                    h1 class="text-xl font-bold leading-tight tracking-tight text-gray-900 md:text-2xl dark:text-white"
                    {
                        (form_title)
                    }

                    (form)
                }
            }
        }
    }
}

/// Format an amount as dollars, e.g. `$1,234.50` or `-$0.05`.
///
/// Only the whole dollars go through `numfmt`, the cents are appended exactly.
pub fn format_currency(amount: Money) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("$")
            .expect("'$' is a valid currency prefix")
            .precision(Precision::Decimals(0))
            .scales(Scales::none())
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-$")
            .expect("'-$' is a valid currency prefix")
            .precision(Precision::Decimals(0))
            .scales(Scales::none())
    });

    let cents = amount.cents();
    let dollars = cents.unsigned_abs() / 100;
    let remainder = cents.unsigned_abs() % 100;

    let formatted_dollars = match (cents < 0, dollars) {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        (false, 0) => "$0".to_owned(),
        (true, 0) => "-$0".to_owned(),
        (false, _) => positive_fmt.fmt_string(dollars as f64),
        (true, _) => negative_fmt.fmt_string(dollars as f64),
    };

    format!("{formatted_dollars}.{remainder:02}")
}

pub fn link(url: &str, text: &str) -> Markup {
    html! {
        a href=(url) class=(LINK_STYLE) { (text) }
    }
}
