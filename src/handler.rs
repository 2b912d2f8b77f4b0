use std::{convert::Infallible, fmt::Display, future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Body, Bytes, Incoming as IncomingBody},
    Request, Response,
};

/// A request handler that can be bound to an ephemeral [`Server`](crate::Server).
/// If the handler returns an error, the error is logged and the client sees a
/// plain 500 response.
#[async_trait]
pub trait Handler {
    type Error: Display;
    async fn handle(self, req: Request<IncomingBody>)
        -> Result<Response<Full<Bytes>>, Self::Error>;
}

impl<F, Fut, E> Handler for F
where
    F: FnOnce(Request<IncomingBody>) -> Fut,
    Fut: Future<Output = Result<Response<Full<Bytes>>, E>> + Send + 'static,
    E: Display,
{
    type Error = E;

    fn handle<'async_trait>(
        self,
        req: Request<IncomingBody>,
    ) -> Pin<
        Box<dyn Future<Output = Result<Response<Full<Bytes>>, Self::Error>> + Send + 'async_trait>,
    > {
        Box::pin(self(req))
    }
}

/// Converts a value into a [Result](Result)<T, [Infallible](Infallible)> so it
/// can be used as the return type for a Handler.
///
/// Useful for closures where you can't specify the return type and you don't
/// need to return an error.
pub fn handle_ok<T>(val: T) -> Result<T, Infallible> {
    Ok(val)
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<Full<Bytes>>, String>> + Send>>;

/// A cloneable, type-erased handler. One instance is shared between the
/// accept loop and every request task of the server it is bound to, and a
/// bare-handler [`Target`](crate::Target) holds one until a request binds it.
#[derive(Clone)]
pub(crate) struct SharedHandler {
    inner: Arc<dyn Fn(Request<IncomingBody>) -> HandlerFuture + Send + Sync>,
}

impl SharedHandler {
    pub(crate) fn new<H>(handler: H) -> Self
    where
        H: Handler + Clone + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(move |req| {
                let handler = handler.clone();
                Box::pin(async move { handler.handle(req).await.map_err(|err| err.to_string()) })
            }),
        }
    }

    /// Runs the handler for one request, converting handler errors into a
    /// plain-text 500 so the connection always gets a response.
    pub(crate) async fn run(
        &self,
        req: Request<IncomingBody>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        match (self.inner)(req).await {
            Ok(res) => Ok(res),
            Err(err) => {
                log::error!("request handler failed: {err}");
                Ok(Response::builder()
                    .status(500)
                    .body(Full::from(Bytes::from_static(b"Internal Server Error")))
                    .expect("should be a valid response"))
            }
        }
    }
}

/// A handy extension to [hyper::Request](hyper::Request) that allows for easily
/// reading the request body as a single `Bytes` object, for handlers that
/// inspect what the test sent.
#[async_trait]
pub trait RequestBodyExt {
    async fn body_bytes(self) -> Result<Bytes, hyper::Error>;
}

#[async_trait]
impl<B> RequestBodyExt for Request<B>
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    <B as Body>::Error: Into<hyper::Error>,
{
    async fn body_bytes(self) -> Result<Bytes, hyper::Error> {
        self.into_body()
            .collect()
            .await
            .map(|full| full.to_bytes())
            .map_err(Into::into)
    }
}
