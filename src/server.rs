//! HTTP server and graceful shutdown.
//!
//! The server owns the connection loop: it accepts sockets, buffers each
//! request body up to a configurable limit, builds a [`Request`] and hands it
//! to the matching handler.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Stops calling `listener.accept()`. No new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::input::InputPolicy;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Bodies larger than this are rejected unless [`Server::max_body_bytes`]
/// says otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The HTTP server.
///
/// ```rust,no_run
/// use deft::{InputPolicy, Router, Server};
///
/// # async fn run(app: Router) -> Result<(), deft::Error> {
/// Server::bind("0.0.0.0:3000")?
///     .max_body_bytes(64 * 1024)
///     .input_policy(InputPolicy::MethodFirst)
///     .serve(app)
///     .await
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Server {
    addr: SocketAddr,
    config: Config,
}

/// Per-request settings shared by every connection task.
#[derive(Clone, Copy, Debug)]
struct Config {
    max_body_bytes: usize,
    input_policy: InputPolicy,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// Fails with [`Error::InvalidAddress`] if `addr` is not a `host:port`
    /// socket address.
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self {
            addr,
            config: Config {
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                input_policy: InputPolicy::default(),
            },
        })
    }

    /// Largest request body the server will buffer. Larger bodies get
    /// `413 Payload Too Large` without reaching a handler.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    /// Input-source policy applied to every request. See [`InputPolicy`].
    pub fn input_policy(mut self, policy: InputPolicy) -> Self {
        self.config.input_policy = policy;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_with_listener(listener, router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), on an already bound listener and with a
    /// caller-supplied shutdown future. The configured address is ignored.
    pub async fn serve_with_listener<F>(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: F,
    ) -> Result<(), Error>
    where
        F: std::future::Future<Output = ()>,
    {
        let router = Arc::new(router);
        let config = self.config;

        info!(
            addr = %listener.local_addr()?,
            max_body_bytes = config.max_body_bytes,
            "deft listening"
        );

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown wins over queued accepts.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, config, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("deft stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure becomes a
/// status code, so hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    config: Config,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let Some((handler, params)) = router.lookup(&parts.method, parts.uri.path()) else {
        debug!(method = %parts.method, path = parts.uri.path(), "no route matched");
        return Ok(Response::status(StatusCode::NOT_FOUND).into_inner());
    };

    let body = match read_body(body, config.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            debug!(peer = %remote_addr, error = %e, "rejecting request body");
            let status = match e {
                Error::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return Ok(Response::status(status).into_inner());
        }
    };

    let request = Request::from_parts(parts, body)
        .with_params(params)
        .with_remote_addr(remote_addr)
        .with_input_policy(config.input_policy);

    Ok(handler(request).await.into_inner())
}

/// Buffers a body, refusing to hold more than `limit` bytes.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, Error>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(Error::BodyTooLarge { limit })
        }
        Err(e) => Err(Error::Body(e.to_string())),
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C
/// is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_rejects_bad_addresses() {
        assert!(matches!(Server::bind("localhost"), Err(Error::InvalidAddress(_))));
        let server = Server::bind("127.0.0.1:0").unwrap();
        assert_eq!(server.addr().port(), 0);
        assert_eq!(server.config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[tokio::test]
    async fn read_body_enforces_the_limit() {
        let small = Full::new(Bytes::from_static(b"hello"));
        assert_eq!(read_body(small, 16).await.unwrap(), "hello");

        let big = Full::new(Bytes::from(vec![b'x'; 32]));
        assert!(matches!(
            read_body(big, 16).await,
            Err(Error::BodyTooLarge { limit: 16 })
        ));
    }
}
