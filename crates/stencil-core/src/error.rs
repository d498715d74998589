//! Process-level diagnostics.
//!
//! Library code returns [`crate::StencilError`]; the harness boundary (test
//! environment, command-line driver) decides what is fatal and reports it here.

use std::fmt::Display;

use console::style;

/// Print `error: <msg>` to stderr and exit with code 1.
pub fn fatal(msg: impl Display) -> ! {
    eprintln!("{} {msg}", style("error:").red().bold());
    std::process::exit(1)
}

/// Print `warning: <msg>` to stderr.
pub fn warning(msg: impl Display) {
    eprintln!("{} {msg}", style("warning:").yellow().bold());
}

/// Unwrap `result` or terminate via [`fatal`].
pub fn or_fatal<T, E: Display>(result: std::result::Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => fatal(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StencilError;

    #[test]
    fn test_or_fatal_passes_ok_through() {
        let value: Result<u32, StencilError> = Ok(7);
        assert_eq!(or_fatal(value), 7);
    }

    #[test]
    fn test_error_messages() {
        let e = StencilError::IterationOutOfRange { index: 3, count: 2 };
        assert_eq!(
            e.to_string(),
            "invalid access of iteration '3' (there are only 2 iterations)"
        );
        let e = StencilError::SizeMismatch {
            name: "u".into(),
            registered: "4, 4, 2".into(),
            given: "4, 4, 3".into(),
        };
        assert_eq!(
            e.to_string(),
            "the requested field 'u' has a different size than the provided field.\n\
             Registered as: (4, 4, 2)\n\
             Given      as: (4, 4, 3)"
        );
    }
}
