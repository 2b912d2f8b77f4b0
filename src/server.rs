use std::{
    future::Future,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use hyper::{body, server::conn::http1, service::service_fn, Request, Uri};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, select, sync::watch};

use crate::{handler::SharedHandler, Error, Handler};

/// Listens on an OS-assigned local port, running the given handler for each
/// request.
///
/// A [`Test`](crate::Test) whose target is a bare handler binds one of these
/// for the lifetime of a single request and closes it when the request
/// completes. Servers can also be bound directly and passed to
/// [`request`](crate::request) as an active target, in which case the caller
/// owns the lifecycle.
///
/// The server can be safely cloned and used from multiple threads. Closing is
/// idempotent: explicit [`close`](Server::close) calls and the drop of the
/// last handle funnel into the same signal, and the listener is torn down
/// exactly once.
#[derive(Debug, Clone)]
pub struct Server {
    close_tx: Arc<watch::Sender<bool>>,
    addr: SocketAddr,
    req_count: Arc<Mutex<u64>>,
}

impl Server {
    /// Binds the handler to an unused local port and starts serving.
    ///
    /// Binding failures are returned, not panicked, so they can surface
    /// through the completion path of the test that asked for the server.
    pub async fn bind<H>(handler: H) -> Result<Self, Error>
    where
        H: Handler + Clone + Send + Sync + 'static,
    {
        Self::bind_shared(SharedHandler::new(handler)).await
    }

    pub(crate) async fn bind_shared(handler: SharedHandler) -> Result<Self, Error> {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let tcp_listener = TcpListener::bind(addr).await.map_err(Error::Bind)?;
        let addr = tcp_listener.local_addr().map_err(Error::ListenerAddr)?;

        let (close_tx, close_rx) = watch::channel(false);
        let req_count = Arc::new(Mutex::new(0));

        {
            let req_count = req_count.clone();

            tokio::spawn(async move {
                let mut close_rx = close_rx.clone();

                loop {
                    let (tcp_stream, _) = select! {
                        _ = close_rx.changed() => {
                            return;
                        }
                        res = tcp_listener.accept() => {
                            match res {
                                Ok(res) => res,
                                Err(err) => {
                                    log::error!("accept TCP connection: {err}");
                                    return;
                                }
                            }
                        }
                    };

                    let handler = handler.clone();
                    let mut close_rx = close_rx.clone();
                    let req_count = req_count.clone();
                    tokio::spawn(async move {
                        let handler = &handler;
                        let req_count = &req_count;

                        let service = service_fn(|req: Request<body::Incoming>| async move {
                            let res = handler.run(req).await;
                            *req_count.lock().expect("lock poisoned") += 1;
                            res
                        });

                        let res = select! {
                            _ = close_rx.changed() => {
                                return;
                            }
                            res = http1::Builder::new()
                                .keep_alive(true)
                                .serve_connection(TokioIo::new(tcp_stream), service) => res,
                        };

                        if let Err(http_err) = res {
                            log::debug!("serve HTTP connection: {http_err}");
                        }
                    });
                }
            });
        };

        Ok(Self {
            close_tx: Arc::new(close_tx),
            addr,
            req_count,
        })
    }

    /// Returns the socket address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns a valid request URL for the given path and query string.
    pub fn url(&self, path_and_query: &str) -> Uri {
        Uri::builder()
            .scheme("http")
            .authority(self.addr.to_string().as_str())
            .path_and_query(path_and_query)
            .build()
            .expect("should be a valid URL")
    }

    /// Returns the number of requests handled by the server. This value is
    /// incremented after the request handler has finished, but before the
    /// response has been sent.
    pub fn req_count(&self) -> u64 {
        *self.req_count.lock().expect("lock poisoned")
    }

    /// Shuts the server down and aborts all in-flight requests, without
    /// blocking for them to finish. Closing an already closed server is a
    /// no-op.
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }

    /// Resolves once the server has been closed, whether via
    /// [`close`](Server::close) or by dropping the last handle. Resolves
    /// immediately if the server is already closed.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut close_rx = self.close_tx.subscribe();
        async move {
            loop {
                if *close_rx.borrow() {
                    return;
                }
                // The sender going away means the last handle dropped, which
                // closes the server on its way out.
                if close_rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if Arc::strong_count(&self.close_tx) == 1 {
            self.close();
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use http_body_util::Full;
    use hyper::{body::Bytes, Response};

    use super::*;
    use crate::{handle_ok, RequestBodyExt};

    #[tokio::test]
    async fn server_ok() {
        async fn handler(
            req: Request<body::Incoming>,
        ) -> Result<Response<Full<Bytes>>, hyper::Error> {
            let body = req.body_bytes().await?;

            Ok(Response::new(Full::new(body)))
        }

        let server = Server::bind(handler).await.expect("bind server");

        let client = reqwest::Client::new();

        static ITERATIONS: u64 = 10;
        for i in 0..ITERATIONS {
            let res = client
                .post(server.url("/").to_string())
                .body(format!("hello world {}", i))
                .send()
                .await
                .expect("send request");

            assert_eq!(res.status(), 200);
            assert_eq!(
                res.text().await.expect("read response"),
                format!("hello world {}", i)
            );

            assert_eq!(server.req_count(), i + 1);
        }

        assert_eq!(server.req_count(), ITERATIONS);
    }

    #[tokio::test]
    async fn server_move_closure() {
        let val = 1234;
        let server = Server::bind(move |_: Request<body::Incoming>| async move {
            handle_ok(Response::new(val.to_string().into()))
        })
        .await
        .expect("bind server");

        let res = reqwest::Client::new()
            .get(server.url("/").to_string())
            .send()
            .await
            .expect("send request");

        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.expect("read response"), val.to_string());
        assert_eq!(server.req_count(), 1);
    }

    #[tokio::test]
    async fn server_failure_becomes_500() {
        async fn handler(_: Request<body::Incoming>) -> Result<Response<Full<Bytes>>, String> {
            Err("expected test error".to_string())
        }

        let server = Server::bind(handler).await.expect("bind server");

        let res = reqwest::Client::new()
            .get(server.url("/").to_string())
            .send()
            .await
            .expect("send request");

        assert_eq!(res.status(), 500);
        assert_eq!(
            res.text().await.expect("read response"),
            "Internal Server Error"
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let server = Server::bind(|_: Request<body::Incoming>| async {
            handle_ok(Response::new("hey".into()))
        })
        .await
        .expect("bind server");

        server.close();
        server.close();
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let server = Server::bind(|_: Request<body::Incoming>| async {
            handle_ok(Response::new("hey".into()))
        })
        .await
        .expect("bind server");

        let notified = server.closed();
        server.close();

        tokio::time::timeout(Duration::from_secs(1), notified)
            .await
            .expect("close notification");
    }

    #[tokio::test]
    async fn closed_resolves_after_drop_of_last_handle() {
        let server = Server::bind(|_: Request<body::Incoming>| async {
            handle_ok(Response::new("hey".into()))
        })
        .await
        .expect("bind server");

        let notified = server.closed();
        drop(server);

        tokio::time::timeout(Duration::from_secs(1), notified)
            .await
            .expect("close notification");
    }

    #[tokio::test]
    async fn closed_server_refuses_connections() {
        let server = Server::bind(|_: Request<body::Incoming>| async {
            handle_ok(Response::new("hey".into()))
        })
        .await
        .expect("bind server");

        let url = server.url("/").to_string();
        server.close();
        server.closed().await;

        let res = reqwest::Client::new().get(url).send().await;
        assert!(res.is_err(), "expected connection to be refused");
    }
}
