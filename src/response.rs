use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Error;

/// A fully buffered response, as handed to expectations and returned from
/// [`Test::end`](crate::Test::end).
///
/// The body is read to completion before any expectation runs, so accessors
/// here are all synchronous. When the content-type indicates JSON the body is
/// parsed once up front and kept alongside the raw bytes.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    json: Option<Value>,
}

impl TestResponse {
    pub(crate) async fn read(res: reqwest::Response) -> Result<Self, Error> {
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await.map_err(Error::Transport)?;
        Ok(Self::new(status, headers, body))
    }

    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        let json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|content_type| is_json(content_type))
            .and_then(|_| serde_json::from_slice(&body).ok());

        Self {
            status,
            headers,
            body,
            json,
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name. Lookup is case-insensitive; for
    /// multi-valued fields the first value is returned.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the raw text body. Invalid UTF-8 is replaced rather than
    /// rejected, since body expectations compare text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The parsed JSON body, if the response declared a JSON content-type and
    /// the body parsed.
    pub fn json_value(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(Error::Json)
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

fn is_json(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.eq_ignore_ascii_case("application/json") || mime.to_ascii_lowercase().ends_with("+json")
}
