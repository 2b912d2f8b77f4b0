use http::Method;

use crate::test::{base_client, Target, Test, TestClient};

/// A [`Test`] factory that persists cookies across the requests issued
/// through it.
///
/// The agent owns a single HTTP client with a cookie store enabled, so a
/// `Set-Cookie` from one response is attached as a `Cookie` header on every
/// subsequent request to the same host. This holds across the distinct
/// ephemeral ports of a bare-handler target, since cookie domain matching
/// ignores the port. Cookie parsing and storage live entirely in the HTTP
/// client; this type only routes requests through the shared session.
pub struct Agent {
    inner: TestClient,
}

impl Agent {
    pub(crate) fn new(target: Target) -> Self {
        let client = base_client()
            .cookie_store(true)
            .build()
            .expect("build cookie-enabled HTTP client");
        Self {
            inner: TestClient::with_client(target, client),
        }
    }

    /// Starts a GET request for the given path.
    pub fn get(&self, path: &str) -> Test {
        self.inner.get(path)
    }

    /// Starts a POST request for the given path.
    pub fn post(&self, path: &str) -> Test {
        self.inner.post(path)
    }

    /// Starts a PUT request for the given path.
    pub fn put(&self, path: &str) -> Test {
        self.inner.put(path)
    }

    /// Starts a PATCH request for the given path.
    pub fn patch(&self, path: &str) -> Test {
        self.inner.patch(path)
    }

    /// Starts a DELETE request for the given path.
    pub fn delete(&self, path: &str) -> Test {
        self.inner.delete(path)
    }

    /// Alias for [`delete`](Agent::delete).
    pub fn del(&self, path: &str) -> Test {
        self.inner.del(path)
    }

    /// Starts a HEAD request for the given path.
    pub fn head(&self, path: &str) -> Test {
        self.inner.head(path)
    }

    /// Starts an OPTIONS request for the given path.
    pub fn options(&self, path: &str) -> Test {
        self.inner.options(path)
    }

    /// Starts a request with a custom method. The path must begin with `/`.
    pub fn request(&self, method: Method, path: impl Into<String>) -> Test {
        self.inner.request(method, path)
    }
}
