//! String helpers shared by the keyword parsers and the help printers.

use std::str::FromStr;

use crate::StencilError;

/// Split `s` on `delim`, dropping empty tokens.
pub fn tokenize<'a>(s: &'a str, delim: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    s.split(delim).filter(|t| !t.is_empty())
}

/// One `key[=value]` token of a comma-separated keyword option such as
/// `--error=list,k=1-5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keyword<'a> {
    option: &'a str,
    pub name: &'a str,
    pub value: Option<&'a str>,
}

impl<'a> Keyword<'a> {
    fn error(&self, what: String) -> StencilError {
        StencilError::Parse(format!("parsing error in '{}': {what}", self.option))
    }

    /// Reject a value on a flag keyword.
    pub fn flag(&self) -> Result<(), StencilError> {
        match self.value {
            Some(_) => Err(self.error(format!("keyword '{}' cannot have an argument", self.name))),
            None => Ok(()),
        }
    }

    /// The value of a keyword that requires one.
    pub fn value(&self) -> Result<&'a str, StencilError> {
        match self.value {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(self.error(format!("missing argument of keyword '{}'", self.name))),
        }
    }

    /// Parse the value of a keyword that requires one.
    pub fn parse_value<T: FromStr>(&self) -> Result<T, StencilError> {
        let value = self.value()?;
        value.trim().parse().map_err(|_| self.invalid(value))
    }

    /// Error for a value the keyword does not accept.
    pub fn invalid(&self, value: &str) -> StencilError {
        self.error(format!("invalid argument '{value}' of keyword '{}'", self.name))
    }

    pub fn unrecognised(&self) -> StencilError {
        self.error(format!("unrecognised keyword '{}'", self.name))
    }
}

/// Split a keyword option string into its keywords. `option` names the
/// command-line option in error messages.
pub fn keywords<'a>(option: &'a str, s: &'a str) -> impl Iterator<Item = Keyword<'a>> + 'a {
    tokenize(s, ",").map(move |token| match token.split_once('=') {
        Some((name, value)) => Keyword {
            option,
            name,
            value: Some(value),
        },
        None => Keyword {
            option,
            name: token,
            value: None,
        },
    })
}

/// Word-wrap `s` into lines of at most `width` columns.
///
/// Every line after the first is indented by `indent` spaces; a single word
/// longer than the available width gets a line of its own.
pub fn split_string(s: &str, width: usize, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let mut out = String::new();
    let mut line_len = 0;

    for word in s.split_whitespace() {
        if line_len > 0 && line_len + 1 + word.len() > width {
            out.push('\n');
            out.push_str(&pad);
            line_len = indent;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += word.len();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_empty() {
        let tokens: Vec<_> = tokenize(",list,,k=1-2,", ",").collect();
        assert_eq!(tokens, ["list", "k=1-2"]);
        assert_eq!(tokenize("", ",").count(), 0);
    }

    #[test]
    fn test_keywords() {
        let kws: Vec<_> = keywords("--error", "list,,field=u,k=1-3").collect();
        assert_eq!(kws.len(), 3);
        assert_eq!(kws[0].name, "list");
        assert!(kws[0].flag().is_ok());
        assert_eq!(kws[1].value().unwrap(), "u");
        assert_eq!(kws[2].value, Some("1-3"));
    }

    #[test]
    fn test_keyword_errors() {
        let kw = keywords("--error", "list=3").next().unwrap();
        assert_eq!(
            kw.flag().unwrap_err().to_string(),
            "parsing error in '--error': keyword 'list' cannot have an argument"
        );

        let kw = keywords("--error", "field").next().unwrap();
        assert_eq!(
            kw.value().unwrap_err().to_string(),
            "parsing error in '--error': missing argument of keyword 'field'"
        );
        assert_eq!(
            kw.unrecognised().to_string(),
            "parsing error in '--error': unrecognised keyword 'field'"
        );

        let kw = keywords("--benchmark", "reps=ten").next().unwrap();
        assert!(kw.parse_value::<usize>().is_err());
        let kw = keywords("--benchmark", "reps=10").next().unwrap();
        assert_eq!(kw.parse_value::<usize>().unwrap(), 10);
    }

    #[test]
    fn test_split_string_wraps_and_indents() {
        let text = "aaaa bbbb cccc dddd";
        assert_eq!(split_string(text, 11, 2), "aaaa bbbb\n  cccc dddd");
        assert_eq!(split_string(text, 80, 5), text);
    }

    #[test]
    fn test_split_string_long_word() {
        assert_eq!(split_string("a verylongword b", 5, 0), "a\nverylongword\nb");
    }
}
