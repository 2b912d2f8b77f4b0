//! The expectation queue: every assertion registered on a [`Test`](crate::Test)
//! becomes one descriptor here, evaluated exactly once against the resolved
//! response, in registration order, stopping at the first failure.

use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

use http::StatusCode;
use regex::Regex;
use serde_json::Value;

use crate::TestResponse;

pub(crate) type Predicate = Box<dyn FnOnce(&TestResponse) -> Option<String> + Send>;

/// One registered assertion about the eventual response.
pub(crate) enum Expect {
    Status(StatusCode),
    /// Status and body registered together occupy a single ordinal slot;
    /// status is checked first within the slot.
    StatusAndBody(StatusCode, BodyMatcher),
    Body(BodyMatcher),
    Header { name: String, matcher: HeaderMatcher },
    Predicate(Predicate),
}

impl Expect {
    /// Evaluates the descriptor, producing the failure message on mismatch.
    pub(crate) fn check(self, res: &TestResponse) -> Result<(), String> {
        match self {
            Expect::Status(expected) => check_status(expected, res),
            Expect::StatusAndBody(expected, body) => {
                check_status(expected, res)?;
                body.check(res)
            }
            Expect::Body(body) => body.check(res),
            Expect::Header { name, matcher } => matcher.check(&name, res),
            Expect::Predicate(predicate) => check_predicate(predicate, res),
        }
    }
}

fn check_status(expected: StatusCode, res: &TestResponse) -> Result<(), String> {
    let actual = res.status();
    if actual == expected {
        return Ok(());
    }
    Err(format!(
        "expected {} \"{}\", got {} \"{}\"",
        expected.as_u16(),
        reason(expected),
        actual.as_u16(),
        reason(actual),
    ))
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

fn check_predicate(predicate: Predicate, res: &TestResponse) -> Result<(), String> {
    // A panicking predicate (an assert! inside it, say) fails the expectation
    // with the panic payload instead of unwinding into the caller.
    match catch_unwind(AssertUnwindSafe(|| predicate(res))) {
        Ok(None) => Ok(()),
        Ok(Some(failure)) => Err(failure),
        Err(panic) => Err(panic_message(panic)),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "response predicate panicked".to_string(),
        },
    }
}

/// How a body expectation compares against the response.
pub enum BodyMatcher {
    /// Exact match against the raw text body. An empty string is a literal
    /// target like any other, not "assert nothing".
    Exact(String),
    /// Pattern tested against the raw text body.
    Pattern(Regex),
    /// Deep structural equality against the parsed JSON body.
    Json(Value),
}

impl BodyMatcher {
    fn check(self, res: &TestResponse) -> Result<(), String> {
        match self {
            BodyMatcher::Exact(expected) => {
                let actual = res.text();
                if actual == expected {
                    return Ok(());
                }
                Err(format!(
                    "expected '{expected}' response body, got '{actual}'"
                ))
            }
            BodyMatcher::Pattern(pattern) => {
                let actual = res.text();
                if pattern.is_match(&actual) {
                    return Ok(());
                }
                Err(format!("expected body '{actual}' to match /{pattern}/"))
            }
            BodyMatcher::Json(expected) => {
                if res.json_value() == Some(&expected) {
                    return Ok(());
                }
                let actual = match res.json_value() {
                    Some(actual) => actual.to_string(),
                    None => format!("'{}'", res.text()),
                };
                Err(format!("expected {expected} response body, got {actual}"))
            }
        }
    }
}

impl From<&str> for BodyMatcher {
    fn from(body: &str) -> Self {
        BodyMatcher::Exact(body.to_string())
    }
}

impl From<String> for BodyMatcher {
    fn from(body: String) -> Self {
        BodyMatcher::Exact(body)
    }
}

impl From<Regex> for BodyMatcher {
    fn from(pattern: Regex) -> Self {
        BodyMatcher::Pattern(pattern)
    }
}

impl From<Value> for BodyMatcher {
    fn from(body: Value) -> Self {
        BodyMatcher::Json(body)
    }
}

/// How a header expectation compares against the response's header value.
pub enum HeaderMatcher {
    Exact(String),
    Pattern(Regex),
}

impl HeaderMatcher {
    fn check(self, name: &str, res: &TestResponse) -> Result<(), String> {
        let Some(actual) = res.header_str(name) else {
            return Err(format!("expected \"{name}\" header field"));
        };
        match self {
            HeaderMatcher::Exact(expected) => {
                if actual == expected {
                    return Ok(());
                }
                Err(format!(
                    "expected \"{name}\" of \"{expected}\", got \"{actual}\""
                ))
            }
            HeaderMatcher::Pattern(pattern) => {
                if pattern.is_match(actual) {
                    return Ok(());
                }
                Err(format!(
                    "expected \"{name}\" matching /{pattern}/, got \"{actual}\""
                ))
            }
        }
    }
}

impl From<&str> for HeaderMatcher {
    fn from(value: &str) -> Self {
        HeaderMatcher::Exact(value.to_string())
    }
}

impl From<String> for HeaderMatcher {
    fn from(value: String) -> Self {
        HeaderMatcher::Exact(value)
    }
}

impl From<Regex> for HeaderMatcher {
    fn from(pattern: Regex) -> Self {
        HeaderMatcher::Pattern(pattern)
    }
}

impl From<u64> for HeaderMatcher {
    fn from(value: u64) -> Self {
        HeaderMatcher::Exact(value.to_string())
    }
}

/// The outcome of a response predicate registered with
/// [`Test::expect_that`](crate::Test::expect_that).
///
/// `()`, `None` and `Ok` pass; a returned string or `Err` fails the
/// expectation with that message.
pub trait Verdict {
    fn into_failure(self) -> Option<String>;
}

impl Verdict for () {
    fn into_failure(self) -> Option<String> {
        None
    }
}

impl Verdict for String {
    fn into_failure(self) -> Option<String> {
        Some(self)
    }
}

impl Verdict for &str {
    fn into_failure(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl Verdict for Option<String> {
    fn into_failure(self) -> Option<String> {
        self
    }
}

impl<E: Display> Verdict for Result<(), E> {
    fn into_failure(self) -> Option<String> {
        self.err().map(|err| err.to_string())
    }
}
