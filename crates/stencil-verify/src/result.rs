//! Pass/fail outcome of a verification with an associative merge.

use std::fmt;

/// Outcome of one or more verifications.
///
/// Merging ANDs the pass flags and collects the non-empty messages in order.
/// A single message is rendered verbatim; several are rendered one per line,
/// each indented by four spaces. The default value (passed, no message) is
/// the identity of [`merge`](Self::merge).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    passed: bool,
    messages: Vec<String>,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            passed: true,
            messages: Vec::new(),
        }
    }
}

impl VerificationResult {
    pub fn new(passed: bool, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            passed,
            messages: if message.is_empty() {
                Vec::new()
            } else {
                vec![message]
            },
        }
    }

    pub fn pass() -> Self {
        Self::default()
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn message(&self) -> String {
        match self.messages.as_slice() {
            [] => String::new(),
            [single] => single.clone(),
            many => many
                .iter()
                .map(|m| format!("    {m}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: VerificationResult) {
        self.passed &= other.passed;
        self.messages.extend(other.messages);
    }

    pub fn merged(mut self, other: VerificationResult) -> Self {
        self.merge(other);
        self
    }
}

impl FromIterator<VerificationResult> for VerificationResult {
    fn from_iter<I: IntoIterator<Item = VerificationResult>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::merged)
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
