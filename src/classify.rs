//! Classification of remote errors.
//!
//! Classification is a pure function of the backend, the phase that produced
//! the error and the `(code, message)` pair. Callers decide whether to retry,
//! recover or abort.
use crate::job::Backend;
use crate::response::ProductError;
use regex::Regex;
use std::sync::OnceLock;

/// altool: the same content was already uploaded.
pub const ALREADY_UPLOADED_CODE: i64 = -18000;
/// altool: a request UUID it just issued is not (yet) known to the status API.
pub const UNKNOWN_REQUEST_CODE: i64 = 1519;

const CONTENT_ID_PATTERN: &str =
    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

/// Which remote call reported the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submit,
    StatusQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Fatal,
    /// Content was submitted before; `content_id` identifies that submission.
    BenignDuplicate { content_id: String },
    TransientRetryable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Duplicate,
    Transient,
}

/// Maps one documented error code to a non-fatal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub backend: Backend,
    pub phase: Phase,
    pub code: i64,
    pub kind: RuleKind,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Default for Classifier {
    /// The documented altool codes. notarytool has no known duplicate code, so
    /// it gets no rules; add one with `with_rule` once one is observed.
    fn default() -> Self {
        Self {
            rules: vec![
                Rule {
                    backend: Backend::Legacy,
                    phase: Phase::Submit,
                    code: ALREADY_UPLOADED_CODE,
                    kind: RuleKind::Duplicate,
                },
                Rule {
                    backend: Backend::Legacy,
                    phase: Phase::StatusQuery,
                    code: UNKNOWN_REQUEST_CODE,
                    kind: RuleKind::Transient,
                },
            ],
        }
    }
}

impl Classifier {
    /// A classifier that treats every error as fatal.
    pub fn strict() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn classify(&self, backend: Backend, phase: Phase, error: &ProductError) -> Classification {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.backend == backend && rule.phase == phase && rule.code == error.code);
        match rule.map(|rule| rule.kind) {
            Some(RuleKind::Duplicate) => match extract_content_id(&error.message) {
                Some(content_id) => Classification::BenignDuplicate {
                    content_id: content_id.to_string(),
                },
                // Without the identifier the duplicate cannot be tied to a job.
                None => Classification::Fatal,
            },
            Some(RuleKind::Transient) => Classification::TransientRetryable,
            None => Classification::Fatal,
        }
    }

    /// Classify a bare exit status. `None` means the call succeeded.
    pub fn classify_exit(&self, status: i32) -> Option<Classification> {
        (status != 0).then_some(Classification::Fatal)
    }
}

/// First 8-4-4-4-12 hexadecimal token in `message`.
pub fn extract_content_id(message: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let regex = PATTERN.get_or_init(|| Regex::new(CONTENT_ID_PATTERN).expect("valid uuid pattern"));
    regex.find(message).map(|found| found.as_str())
}
