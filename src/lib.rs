//! Fluent response expectations for testing HTTP endpoints. Point a test at a
//! remote URL, an active [`Server`], or a bare request handler (which gets
//! bound to an ephemeral local port for the lifetime of that one request),
//! then chain expectations about the response and await the result.
//!
//! Expectations are evaluated in registration order against the fully
//! buffered response, and the first failure wins: [`Test::end`] returns
//! either the response or an error whose message describes exactly one
//! failed expectation. An ephemeral server bound for a request is torn down
//! when the request completes, whatever the outcome.
//!
//! Currently only supports HTTP/1.1 handlers and does not support TLS. Only
//! supports the Tokio async runtime.
//!
//! ## Example
//!
//! ```
//! # // Please keep this example up-to-date with README.md, but remove all
//! # // lines starting with `#` and their contents.
//! use http_expect::{
//!     handle_ok, handler, request,
//!     hyper::{body, Request, Response},
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let res = request(handler(|_: Request<body::Incoming>| async {
//!     handle_ok(
//!         Response::builder()
//!             .header("content-type", "text/plain")
//!             .body("hello".into())
//!             .expect("valid response"),
//!     )
//! }))
//! .get("/")
//! .expect_status(200)
//! .expect_header("Content-Type", "text/plain")
//! .expect_body("hello")
//! .end()
//! .await
//! .expect("request should pass");
//!
//! assert_eq!(res.text(), "hello");
//! # });
//! ```
//!
//! There are also more examples as tests.

mod agent;
mod error;
mod expect;
mod handler;
mod response;
mod server;

pub use agent::Agent;
pub use error::Error;
pub use expect::{BodyMatcher, HeaderMatcher, Verdict};
pub use handler::{handle_ok, Handler, RequestBodyExt};
pub use response::TestResponse;
pub use server::Server;
pub use test::{Target, Test, TestClient};

pub use hyper;
pub use regex::Regex;

use crate::handler::SharedHandler;

/// Returns a [`Test`] factory aimed at the given target: a URL string, a
/// `SocketAddr`, an active [`Server`], or a bare handler wrapped with
/// [`handler`], in which case every produced [`Test`] binds its own
/// ephemeral server.
pub fn request(target: impl Into<Target>) -> TestClient {
    TestClient::new(target.into())
}

/// Returns an [`Agent`]: like [`request`], but the produced tests share one
/// cookie-persisting HTTP session.
pub fn agent(target: impl Into<Target>) -> Agent {
    Agent::new(target.into())
}

/// Wraps a request handler as a [`Target`], so [`request`] and [`agent`] can
/// aim tests at code that is not listening anywhere yet.
pub fn handler<H>(handler: H) -> Target
where
    H: Handler + Clone + Send + Sync + 'static,
{
    Target::from_handler(SharedHandler::new(handler))
}
