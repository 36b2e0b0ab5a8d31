//! # deft
//!
//! A small HTTP framework built around the request: one place to read input
//! from wherever the client put it, and one place to ask what the client
//! wants back.
//!
//! ## What you get
//!
//! - **Unified input**: [`Request::input`] reads the JSON body, the
//!   urlencoded form, or the query string, picked from the method and
//!   content type. Dotted keys (`user.address.city`) and `*` wildcards reach
//!   into nested data. Typed accessors (`string`, `boolean`, `integer`,
//!   `float`, `date`, `enum_value`) coerce leniently.
//! - **Content negotiation**: [`Request::accepts`], [`Request::prefers`] and
//!   [`Request::expects_json`] read `Accept` with q-values, wildcards and
//!   `+json` style suffixes. [`Response::negotiate`] sends JSON or HTML.
//! - **The host**: radix-tree routing via [`matchit`], hyper for HTTP/1.1
//!   and HTTP/2, bounded body buffering, graceful shutdown on SIGTERM /
//!   Ctrl-C.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use deft::{Request, Response, Router, Server};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), deft::Error> {
//!     let app = Router::new()
//!         .get("/users/{id}", show_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn show_user(req: Request) -> Response {
//!     let user = json!({
//!         "id": req.param("id"),
//!         "fields": req.string("fields"),
//!     });
//!     Response::negotiate(&req, &user, |u| format!("<h1>user {}</h1>", u["id"]))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.missing("name") {
//!         return Response::status(StatusCode::UNPROCESSABLE_ENTITY);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .json_value(&req.only(["name", "email"]))
//! }
//! ```

mod bag;
mod error;
mod handler;
mod input;
mod request;
mod response;
mod router;
mod server;

pub mod data;
pub mod format;
pub mod negotiation;

pub use bag::{FileBag, InputBag, ServerBag, UploadedFile};
pub use error::{Error, Result};
pub use handler::Handler;
pub use input::{InputPolicy, Keys};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{DEFAULT_MAX_BODY_BYTES, Server};
