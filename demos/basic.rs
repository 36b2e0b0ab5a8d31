//! deft demo: unified input, negotiated responses, bearer tokens.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl 'http://localhost:3000/users/42?fields=name'
//!   curl -H 'accept: text/html' http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","address":{"city":"Lisbon"},"admin":"yes","birthday":"1990-04-01"}'
//!   curl -X POST http://localhost:3000/users -d 'name=bob&tags[]=a&tags[]=b'
//!   curl -H 'authorization: Bearer s3cret' http://localhost:3000/me

use deft::{Request, Response, Router, Server};
use http::StatusCode;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), deft::Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .get("/users/{id}",    show_user)
        .post("/users",        create_user)
        .delete("/users/{id}", delete_user)
        .get("/me",            me);

    Server::bind("0.0.0.0:3000")?
        .max_body_bytes(64 * 1024)
        .serve(app)
        .await
}

// GET /users/{id}: JSON for API clients, HTML for browsers.
async fn show_user(req: Request) -> Response {
    let user = json!({
        "id": req.param("id"),
        "name": "alice",
        "fields": req.string("fields"),
        "page": req.integer("page", 1),
    });
    Response::negotiate(&req, &user, |u| {
        format!("<h1>{}</h1><p>id {}</p>", u["name"].as_str().unwrap_or(""), u["id"])
    })
}

// POST /users: JSON or form body, the handler does not care which.
// A bad `admin` or `birthday` value answers 422 through `?`.
async fn create_user(req: Request) -> Result<Response, deft::Error> {
    if !req.filled("name") {
        return Ok(Response::builder()
            .status(StatusCode::UNPROCESSABLE_ENTITY)
            .json_value(&json!({ "message": "name is required" })));
    }

    let admin = req.boolean("admin", false)?;
    let birthday = req.date("birthday", Some("%Y-%m-%d"))?;

    let created = json!({
        "id": 99,
        "name": req.string("name"),
        "city": req.input("address.city"),
        "tags": req.input("tags"),
        "admin": admin,
        "birthday": birthday.map(|d| d.date_naive().to_string()),
    });

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json_value(&created))
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> Response {
    Response::status(StatusCode::NO_CONTENT)
}

// GET /me: requires `Authorization: Bearer <token>`.
async fn me(req: Request) -> Response {
    match req.bearer_token() {
        Some(token) => Response::json_value(&json!({ "token_len": token.len() })),
        None => Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header("www-authenticate", "Bearer")
            .no_body(),
    }
}
