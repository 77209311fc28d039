use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::messages;
use crate::middleware::require_auth;
use crate::users;

/// All HTTP routes. Cross-cutting layers (CORS, tracing) are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/users", get(users::list_users));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route(
            "/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use campustalk_types::api::{ErrorResponse, LoginResponse, MessageResponse};

    use super::*;
    use crate::service::test_service;

    fn app() -> Router {
        router(Arc::new(test_service()))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn register(app: &Router, username: &str, password: &str) -> StatusCode {
        let body = json!({ "username": username, "password": password });
        call(app, post_json("/register", None, body)).await.0
    }

    async fn login(app: &Router, username: &str, password: &str) -> String {
        let body = json!({ "username": username, "password": password });
        let (status, bytes) = call(app, post_json("/login", None, body)).await;
        assert_eq!(status, StatusCode::OK);
        let login: LoginResponse = serde_json::from_slice(&bytes).unwrap();
        login.token
    }

    fn error_code(bytes: &[u8]) -> String {
        serde_json::from_slice::<ErrorResponse>(bytes).unwrap().error
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = call(&app(), get_with("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn end_to_end_conversation() {
        let app = app();
        assert_eq!(register(&app, "alice", "pw1").await, StatusCode::OK);
        assert_eq!(register(&app, "bob", "pw2").await, StatusCode::OK);

        let alice = login(&app, "alice", "pw1").await;
        let send = post_json("/messages", Some(&alice), json!({ "receiver": "bob", "body": "hi" }));
        let (status, bytes) = call(&app, send).await;
        assert_eq!(status, StatusCode::CREATED);
        let sent: MessageResponse = serde_json::from_slice(&bytes).unwrap();

        let bob = login(&app, "bob", "pw2").await;
        let (status, bytes) = call(&app, get_with("/messages?with=alice", Some(&bob))).await;
        assert_eq!(status, StatusCode::OK);

        let thread: Vec<MessageResponse> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, sent.id);
        assert_eq!(thread[0].sender, "alice");
        assert_eq!(thread[0].receiver, "bob");
        assert_eq!(thread[0].body, "hi");
    }

    #[tokio::test]
    async fn duplicate_registration_is_409() {
        let app = app();
        assert_eq!(register(&app, "alice", "pw1").await, StatusCode::OK);

        let body = json!({ "username": "alice", "password": "again" });
        let (status, bytes) = call(&app, post_json("/register", None, body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&bytes), "already_exists");
    }

    #[tokio::test]
    async fn bad_logins_share_one_response() {
        let app = app();
        register(&app, "bob", "pw2").await;

        let wrong = json!({ "username": "bob", "password": "wrong" });
        let unknown = json!({ "username": "nobody", "password": "x" });
        let (s1, b1) = call(&app, post_json("/login", None, wrong)).await;
        let (s2, b2) = call(&app, post_json("/login", None, unknown)).await;

        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(b1, b2);
    }

    #[tokio::test]
    async fn messages_require_a_session() {
        let app = app();

        let (status, bytes) = call(&app, get_with("/messages?with=bob", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&bytes), "unauthenticated");

        let (status, _) = call(&app, get_with("/messages?with=bob", Some("forged.token.value"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let send = post_json("/messages", None, json!({ "receiver": "bob", "body": "hi" }));
        assert_eq!(call(&app, send).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_validation_maps_to_status_codes() {
        let app = app();
        register(&app, "alice", "pw1").await;
        register(&app, "bob", "pw2").await;
        let alice = login(&app, "alice", "pw1").await;

        let blank = post_json("/messages", Some(&alice), json!({ "receiver": "bob", "body": "  " }));
        let (status, bytes) = call(&app, blank).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&bytes), "empty_body");

        let ghost = post_json("/messages", Some(&alice), json!({ "receiver": "ghost", "body": "hi" }));
        let (status, bytes) = call(&app, ghost).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&bytes), "invalid_participant");

        let (_, bytes) = call(&app, get_with("/messages?with=bob", Some(&alice))).await;
        let thread: Vec<MessageResponse> = serde_json::from_slice(&bytes).unwrap();
        assert!(thread.is_empty());
    }

    #[tokio::test]
    async fn malformed_bodies_get_the_error_shape() {
        let app = app();

        let missing_password = post_json("/register", None, json!({ "username": "alice" }));
        let (status, bytes) = call(&app, missing_password).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.error, "validation");
        assert_eq!(err.message, "malformed request body");

        let not_json = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{username"))
            .unwrap();
        let (status, bytes) = call(&app, not_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&bytes), "validation");
    }

    #[tokio::test]
    async fn malformed_queries_get_the_error_shape() {
        let app = app();
        register(&app, "alice", "pw1").await;
        let alice = login(&app, "alice", "pw1").await;

        for uri in ["/messages", "/messages?with=bob&after=not-a-uuid", "/messages?with=bob&limit=-1"] {
            let (status, bytes) = call(&app, get_with(uri, Some(&alice))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(err.error, "validation");
            assert_eq!(err.message, "malformed query string");
        }

        let (status, bytes) = call(&app, get_with("/messages?with=bob&limit=0", Some(&alice))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&bytes), "validation");
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let app = app();
        register(&app, "alice", "pw1").await;
        let alice = login(&app, "alice", "pw1").await;

        let (status, _) = call(&app, post_json("/logout", Some(&alice), json!({}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, get_with("/messages?with=bob", Some(&alice))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn users_listing_excludes_the_named_user() {
        let app = app();
        for name in ["carol", "alice", "bob"] {
            register(&app, name, "pw").await;
        }

        let (status, bytes) = call(&app, get_with("/users?excluding=alice", None)).await;
        assert_eq!(status, StatusCode::OK);
        let users: Vec<String> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(users, vec!["bob", "carol"]);

        let (status, bytes) = call(&app, get_with("/users?excluding=nobody", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&bytes), "not_found");
    }
}
