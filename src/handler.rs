//! Route handlers.
//!
//! Any `async fn(Request) -> impl IntoResponse` is a [`Handler`]. The router
//! keeps them as [`BoxedHandler`]s: a shared closure that runs the handler
//! inside a `handler` span and converts its output into a [`Response`].
//!
//! Returning `Result<_, deft::Error>` lets a handler use `?` on the fallible
//! accessors; the error becomes its status code (see
//! [`Error::status_code`](crate::Error::status_code)).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{Instrument, debug_span, error};

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync + 'static>;

/// Implemented for every `async fn(Request) -> impl IntoResponse`. Sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        let handler = self;
        Arc::new(move |req: Request| -> BoxFuture {
            let span = debug_span!("handler", method = %req.method(), path = req.path());
            let fut = handler(req);
            Box::pin(
                async move {
                    let res = fut.await.into_response();
                    if res.status_code().is_server_error() {
                        error!(status = %res.status_code(), "handler failed");
                    }
                    res
                }
                .instrument(span),
            )
        })
    }
}
