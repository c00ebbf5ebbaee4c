use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::post,
};
use portal_gate::{
    HttpSessionBackend, SessionBackend,
    auth::Credential,
    backend::LoginForm,
    error::BackendError,
    models::Group,
};
use serde_json::json;
use std::{collections::HashMap, time::Duration};
use tokio::net::TcpListener;

const COOKIE: &str = "PHPSESSID";

// --- Fake Session Backend ---

fn session_of(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE)
        .map(|(_, value)| value.to_string())
}

async fn fake_check(headers: HeaderMap) -> Response {
    match session_of(&headers).as_deref() {
        Some("admin") => Json(json!({
            "status": 0,
            "data": { "group": 2, "username": "alice" }
        }))
        .into_response(),
        Some("html") => Html("<html><body>Fatal error</body></html>").into_response(),
        Some("weird") => Json(json!({ "status": 0, "data": { "group": 5 } })).into_response(),
        _ => Json(json!({ "status": 1, "message": "not logged in" })).into_response(),
    }
}

async fn fake_login(Form(form): Form<HashMap<String, String>>) -> Response {
    let accepted = form.get("email").map(String::as_str) == Some("ok@example.com")
        && form.get("password").map(String::as_str) == Some("pw")
        && form.get("captcha").map(String::as_str) == Some("7k3p");
    if !accepted {
        return Json(json!({ "status": 2, "message": "bad captcha" })).into_response();
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, "PHPSESSID=admin; path=/; HttpOnly")],
        Json(json!({ "status": 0, "message": "ok" })),
    )
        .into_response()
}

async fn fake_logout() -> Response {
    (
        [(header::SET_COOKIE, "PHPSESSID=deleted; expires=Thu, 01 Jan 1970 00:00:00 GMT")],
        Json(json!({ "status": 0 })),
    )
        .into_response()
}

async fn spawn_fake_backend() -> String {
    let router = Router::new()
        .route("/obj/Common/User/check", post(fake_check))
        .route("/obj/Common/Login/login", post(fake_login))
        .route("/obj/Common/User/logout", post(fake_logout));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}/obj/", port)
}

async fn client() -> HttpSessionBackend {
    let base_url = spawn_fake_backend().await;
    HttpSessionBackend::new(&base_url, Duration::from_secs(5)).expect("client builds")
}

// --- Tests ---

#[tokio::test]
async fn check_decodes_group_and_name() {
    let backend = client().await;
    let session = backend
        .check(&Credential::session(COOKIE, "admin"))
        .await
        .expect("session");
    assert!(session.is_authenticated);
    assert_eq!(session.group, Group::Admin);
    assert_eq!(session.display_name.as_deref(), Some("alice"));
}

#[tokio::test]
async fn check_forwards_the_whole_cookie_header() {
    let backend = client().await;
    let credential = Credential::from_cookie_header(Some("lang=zh_CN; PHPSESSID=admin"), COOKIE);
    assert!(backend.check(&credential).await.is_ok());
}

#[tokio::test]
async fn business_error_is_rejected() {
    let backend = client().await;
    let err = backend
        .check(&Credential::anonymous())
        .await
        .expect_err("anonymous caller");
    match err {
        BackendError::Rejected { status, message } => {
            assert_eq!(status, 1);
            assert_eq!(message, "not logged in");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let backend = client().await;
    let err = backend
        .check(&Credential::session(COOKIE, "html"))
        .await
        .expect_err("html body");
    assert!(matches!(err, BackendError::Malformed(_)));
}

#[tokio::test]
async fn unknown_group_code_is_malformed() {
    let backend = client().await;
    let err = backend
        .check(&Credential::session(COOKIE, "weird"))
        .await
        .expect_err("group 5");
    assert!(matches!(err, BackendError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let backend =
        HttpSessionBackend::new(&format!("http://127.0.0.1:{port}/obj"), Duration::from_secs(2))
            .unwrap();
    let err = backend
        .check(&Credential::session(COOKIE, "admin"))
        .await
        .expect_err("nothing listening");
    assert!(err.is_transport());
}

#[tokio::test]
async fn login_posts_form_and_returns_set_cookie() {
    let backend = client().await;
    let form = LoginForm {
        email: "ok@example.com".to_string(),
        password: "pw".to_string(),
        captcha: "7k3p".to_string(),
    };
    let reply = backend
        .login(&Credential::anonymous(), &form)
        .await
        .expect("login accepted");
    assert_eq!(reply.set_cookies, vec!["PHPSESSID=admin; path=/; HttpOnly".to_string()]);

    let signed_in = Credential::anonymous().with_set_cookies(&reply.set_cookies, COOKIE);
    assert_eq!(signed_in.session_id(), Some("admin"));
    assert!(backend.check(&signed_in).await.is_ok());
}

#[tokio::test]
async fn login_rejection_carries_backend_message() {
    let backend = client().await;
    let form = LoginForm {
        email: "ok@example.com".to_string(),
        password: "pw".to_string(),
        captcha: "wrong".to_string(),
    };
    let err = backend
        .login(&Credential::anonymous(), &form)
        .await
        .expect_err("bad captcha");
    assert!(matches!(err, BackendError::Rejected { status: 2, ref message } if message == "bad captcha"));
}

#[tokio::test]
async fn logout_passes_expiring_cookie_through() {
    let backend = client().await;
    let reply = backend
        .logout(&Credential::session(COOKIE, "admin"))
        .await
        .expect("logout accepted");
    assert_eq!(reply.set_cookies.len(), 1);
    assert!(reply.set_cookies[0].starts_with("PHPSESSID=deleted"));
}
