//! Conditional logging macros that check a module-level `ENABLE_LOGS` flag.
//!
//! Two forms are accepted. The plain form is a format string, exactly like
//! `log::info!`. The structured form is a message followed by `;` and
//! `key = value` pairs, rendered logfmt-style after the message:
//!
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//!
//! log_info!("screenshot was valid"; valid_count = 3, score = 1204);
//! // => screenshot was valid valid_count=3 score=1204
//! log_warn!("capture took {}ms", elapsed);
//! ```

use std::fmt::{Display, Write};

/// Renders `message` followed by ` key=value` for every field. Values containing
/// whitespace, quotes or `=` are quoted.
pub fn with_fields(message: &str, fields: &[(&str, &dyn Display)]) -> String {
    let mut line = String::from(message);
    for (key, value) in fields {
        let value = value.to_string();
        let needs_quotes = value.is_empty()
            || value
                .chars()
                .any(|c| c.is_whitespace() || c == '"' || c == '=');
        if needs_quotes {
            let _ = write!(line, " {key}={:?}", value);
        } else {
            let _ = write!(line, " {key}={value}");
        }
    }
    line
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_gated {
    ($level:ident, $msg:expr; $($key:ident = $value:expr),+ $(,)?) => {
        if ENABLE_LOGS {
            log::$level!(
                "{}",
                $crate::utils::logging::with_fields(
                    $msg,
                    &[$((stringify!($key), &$value as &dyn ::std::fmt::Display)),+],
                )
            );
        }
    };
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

/// Conditional info logging. The calling module must define `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__log_gated!(info, $($arg)*)
    };
}

/// Conditional warn logging. The calling module must define `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__log_gated!(warn, $($arg)*)
    };
}

/// Conditional error logging. The calling module must define `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__log_gated!(error, $($arg)*)
    };
}

/// Conditional debug logging. The calling module must define `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__log_gated!(debug, $($arg)*)
    };
}
