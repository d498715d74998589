//! Reporting options parsed from the `--error` keyword string.

use std::fmt;
use std::io::{self, Write};
use std::ops::RangeInclusive;

use console::style;
use stencil_core::utility::{keywords, split_string};
use stencil_core::{Result, StencilError};
use tracing::debug;

const OPTION: &str = "--error";

/// How failures are reported.
///
/// Parsed from a comma-separated keyword list such as
/// `list,visualize,k=1-5,max-errors=100`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationSpec {
    field: String,
    list: bool,
    visualize: bool,
    stop_on_error: bool,
    max_errors: Option<usize>,
    k_interval: Vec<RangeInclusive<usize>>,
    help: bool,
}

impl VerificationSpec {
    /// Parse the argument of `--error`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut spec = Self::default();
        let mut max_errors: Option<i64> = None;

        for kw in keywords(OPTION, s) {
            match kw.name {
                "field" => spec.field = kw.value()?.to_owned(),
                "list" => {
                    kw.flag()?;
                    spec.list = true;
                }
                "stop-on-error" => {
                    kw.flag()?;
                    spec.stop_on_error = true;
                }
                "visualize" => {
                    kw.flag()?;
                    spec.visualize = true;
                }
                "max-errors" => max_errors = Some(kw.parse_value()?),
                "k" => {
                    let value = kw.value()?;
                    let (lo, hi) = match value.split_once('-') {
                        Some((lo, hi)) => (lo, hi),
                        None => (value, value),
                    };
                    let lo: usize = lo.trim().parse().map_err(|_| kw.invalid(value))?;
                    let hi: usize = hi.trim().parse().map_err(|_| kw.invalid(value))?;
                    if lo > hi {
                        return Err(kw.invalid(value));
                    }
                    spec.k_interval.push(lo..=hi);
                }
                "help" => {
                    kw.flag()?;
                    spec.help = true;
                }
                _ => return Err(kw.unrecognised()),
            }
        }

        // A positive limit implies listing; listing without one is unlimited.
        match max_errors {
            Some(n) if n > 0 => {
                spec.list = true;
                spec.max_errors = usize::try_from(n).ok();
            }
            Some(0) => spec.max_errors = Some(0),
            _ => spec.max_errors = None,
        }

        debug!(option = OPTION, spec = %spec, "parsed keywords");
        Ok(spec)
    }

    /// Only report the field with this name. Empty reports every field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Whether `name` passes the field filter.
    pub fn matches_field(&self, name: &str) -> bool {
        self.field.is_empty() || self.field == name
    }

    pub fn list(&self) -> bool {
        self.list
    }

    pub fn visualize(&self) -> bool {
        self.visualize
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    /// Maximum number of listed failures. `None` lists all of them.
    pub fn max_errors_to_list(&self) -> Option<usize> {
        self.max_errors
    }

    /// Explicitly requested k-ranges (inclusive), in the order given.
    pub fn k_interval(&self) -> &[RangeInclusive<usize>] {
        &self.k_interval
    }

    /// Requested k-layers below `k_size`, in the order given. Every layer
    /// below `k_size` when no range was requested.
    pub fn k_layers(&self, k_size: usize) -> Vec<usize> {
        if self.k_interval.is_empty() {
            return (0..k_size).collect();
        }
        self.k_interval
            .iter()
            .filter(|r| *r.start() < k_size)
            .flat_map(|r| *r.start()..=(*r.end()).min(k_size - 1))
            .collect()
    }

    pub fn k_interval_specified(&self) -> bool {
        !self.k_interval.is_empty()
    }

    /// Whether `k` passes the k-layer filter.
    pub fn matches_k(&self, k: usize) -> bool {
        self.k_interval.is_empty() || self.k_interval.iter().any(|r| r.contains(&k))
    }

    /// `help` was requested.
    pub fn help(&self) -> bool {
        self.help
    }

    /// Describe every keyword.
    pub fn print_help(out: &mut impl Write, executable: &str) -> io::Result<()> {
        let entries: [(&str, &str); 6] = [
            (
                "field=<name>",
                "Only report failures of the field <name>. By default every erroneous field is reported.",
            ),
            (
                "list",
                "List the failures in the format 'Position | Actual | Reference'. Use max-errors to \
                 limit the number of rows and k to restrict the listed layers.",
            ),
            (
                "stop-on-error",
                "Abort after the first erroneous field has been reported. Combined with field, abort \
                 after that field has been reported.",
            ),
            (
                "visualize",
                "Visualize the failures of each layer as ASCII art. Use k to restrict the layers.",
            ),
            (
                "max-errors=<N>",
                "List at most <N> failures per field. This implies list.",
            ),
            (
                "k=<X>[-<Y>]",
                "Only report failures of the layers [X, Y]. If <Y> is omitted only layer <X> is \
                 reported. The keyword can be repeated, e.g. k=1-5,k=10.",
            ),
        ];

        writeln!(
            out,
            "Usage: {executable} {OPTION}=<keyword>[,<keyword>...]\n"
        )?;
        writeln!(
            out,
            "{}\n",
            split_string(
                "Control how failures of a verification are reported. The argument is a \
                 comma-separated list of the following keywords:",
                80,
                0,
            )
        )?;
        for (keyword, description) in entries {
            writeln!(out, "  {}", style(keyword).bold().green())?;
            writeln!(out, "     {}\n", split_string(description, 80, 5))?;
        }
        writeln!(
            out,
            "Example:\n  {executable} {OPTION}=visualize,k=1-5,k=6"
        )
    }
}

impl fmt::Display for VerificationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ks: Vec<String> = self
            .k_interval
            .iter()
            .map(|r| {
                if r.start() == r.end() {
                    r.start().to_string()
                } else {
                    format!("{}-{}", r.start(), r.end())
                }
            })
            .collect();
        write!(
            f,
            "field={:?} list={} visualize={} stop-on-error={} max-errors={} k=[{}]",
            self.field,
            self.list,
            self.visualize,
            self.stop_on_error,
            self.max_errors
                .map_or_else(|| "unlimited".to_owned(), |n| n.to_string()),
            ks.join(",")
        )
    }
}

impl std::str::FromStr for VerificationSpec {
    type Err = StencilError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_default() {
        let spec = VerificationSpec::parse("").unwrap();
        assert_eq!(spec, VerificationSpec::default());
        assert!(spec.matches_field("anything"));
        assert!(spec.matches_k(42));
        assert_eq!(spec.max_errors_to_list(), None);
    }

    #[test]
    fn test_all_keywords() {
        let spec =
            VerificationSpec::parse("field=u,list,stop-on-error,visualize,max-errors=7,k=2-4,k=9")
                .unwrap();
        assert_eq!(spec.field(), "u");
        assert!(spec.list() && spec.visualize() && spec.stop_on_error());
        assert_eq!(spec.max_errors_to_list(), Some(7));
        assert_eq!(spec.k_interval(), &[2..=4, 9..=9]);
        assert_eq!(spec.k_layers(10), [2, 3, 4, 9]);
        assert_eq!(spec.k_layers(4), [2, 3]);
        assert!(spec.matches_k(3));
        assert!(!spec.matches_k(5));
        assert!(!spec.matches_field("v"));
    }

    #[test]
    fn test_max_errors_implies_list() {
        let spec = VerificationSpec::parse("max-errors=5").unwrap();
        assert!(spec.list());
        assert_eq!(spec.max_errors_to_list(), Some(5));

        let spec = VerificationSpec::parse("list,max-errors=-1").unwrap();
        assert!(spec.list());
        assert_eq!(spec.max_errors_to_list(), None);
    }

    #[test]
    fn test_parse_errors() {
        let err = VerificationSpec::parse("list,foo").unwrap_err();
        assert_eq!(
            err.to_string(),
            "parsing error in '--error': unrecognised keyword 'foo'"
        );
        let err = VerificationSpec::parse("visualize=1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "parsing error in '--error': keyword 'visualize' cannot have an argument"
        );
        let err = VerificationSpec::parse("field").unwrap_err();
        assert_eq!(
            err.to_string(),
            "parsing error in '--error': missing argument of keyword 'field'"
        );
        assert!(VerificationSpec::parse("k=5-2").is_err());
        assert!(VerificationSpec::parse("k=a").is_err());
        assert!(VerificationSpec::parse("max-errors=x").is_err());
    }

    #[test]
    fn test_wide_k_range_is_not_expanded() {
        let spec = VerificationSpec::parse("k=0-4000000000").unwrap();
        assert_eq!(spec.k_interval(), &[0..=4_000_000_000]);
        assert!(spec.matches_k(3_999_999_999));
        assert_eq!(spec.k_layers(3), [0, 1, 2]);
        assert_eq!(spec.to_string().rsplit(' ').next(), Some("k=[0-4000000000]"));
    }

    #[test]
    fn test_help_keyword() {
        assert!(VerificationSpec::parse("help").unwrap().help());
        let mut out = Vec::new();
        VerificationSpec::print_help(&mut out, "stencil-verify").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("stop-on-error"));
        assert!(text.contains("--error=visualize,k=1-5,k=6"));
    }
}
